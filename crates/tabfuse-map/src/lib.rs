//! Source column profiling and mapping strategy creation.
//!
//! - [`ColumnProfiler`] computes per-column statistics and asks the
//!   classifier what each column is. Failures degrade to fallback profiles.
//! - [`MappingStrategist`] decides how every target column is derived from
//!   the profiled source columns, identity-weighted columns first.

mod error;
mod profiler;
mod prompt;
mod stats;
mod strategist;

// === Errors ===
pub use error::{PlanError, ProfilingError, StrategyError};

// === Profiling ===
pub use profiler::{ColumnProfiler, DEFAULT_SAMPLE_ROWS, ProfileOutcome};
pub use stats::{compute_stats, heuristic_kind, sample_values};

// === Strategy ===
pub use strategist::MappingStrategist;
