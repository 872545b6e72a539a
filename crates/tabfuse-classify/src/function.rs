//! Closure-backed classifier.

use serde_json::Value;

use crate::error::Result;
use crate::request::{Classifier, ClassifierRequest};

/// Wraps a closure as a [`Classifier`]. Used for offline runs and tests.
pub struct FnClassifier<F> {
    function: F,
}

impl<F> FnClassifier<F>
where
    F: Fn(&ClassifierRequest) -> Result<Value> + Send + Sync,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&ClassifierRequest) -> Result<Value> + Send + Sync,
{
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        (self.function)(request)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}
