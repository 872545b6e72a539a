//! Transformation and merge processing for tabfuse.
//!
//! Two parts:
//!
//! - **Format rules** ([`FormatRule`]): a small declarative language for
//!   deterministic derivations (`{first} {last} | squish | title`).
//! - **Processor** ([`Processor`]): runs each target column's
//!   [`tabfuse_model::TransformationPlan`] against an incoming row and applies
//!   merge precedence when the row matched an existing entity.
//!
//! Every value that reaches a rule, a classifier prompt or the output goes
//! through [`tabfuse_model::CellValue::to_text`], and classifier answers go
//! through [`coerce_scalar`], so numbers always render as plain scalars.

mod error;
mod processor;
mod prompt;
mod rule;
mod scalar;

// Error types
pub use error::{Result, TransformationError};

// Format rules
pub use rule::{CURRENT_PLACEHOLDER, FormatRule, RuleError, rule_syntax};

// Processing
pub use processor::{EntityValues, FailurePolicy, Processor};

// Scalar coercion
pub use scalar::coerce_scalar;
