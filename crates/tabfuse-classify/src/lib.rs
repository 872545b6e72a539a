//! Classification service capability for tabfuse.
//!
//! Components that need semantic judgment depend on the [`Classifier`] trait,
//! never on a concrete client. [`OpenAiClassifier`] talks to an
//! OpenAI-compatible chat-completions endpoint, [`TranscriptClassifier`]
//! records every call as JSON lines, and [`FnClassifier`] turns a closure into
//! a classifier for offline use.

pub mod error;
pub mod function;
pub mod openai;
pub mod request;
pub mod transcript;

pub use error::{ClassifyError, Result};
pub use function::FnClassifier;
pub use openai::{ClassifierSettings, OpenAiClassifier};
pub use request::{ChatMessage, Classifier, ClassifierRequest, classify_as, parse_json_content};
pub use transcript::TranscriptClassifier;
