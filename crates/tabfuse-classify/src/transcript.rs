//! Classifier call transcripts.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::request::{ChatMessage, Classifier, ClassifierRequest};

#[derive(Serialize)]
struct TranscriptEntry<'a> {
    timestamp: String,
    request: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
}

/// Decorator that appends every call to `<dir>/<request name>.jsonl`.
///
/// Recording failures are logged and never fail the call itself.
#[derive(Debug)]
pub struct TranscriptClassifier<C> {
    inner: C,
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl<C: Classifier> TranscriptClassifier<C> {
    pub fn new(inner: C, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record(&self, entry: &TranscriptEntry<'_>) -> std::io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.jsonl", file_stem(entry.request)));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")
    }
}

impl<C: Classifier> Classifier for TranscriptClassifier<C> {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        let started = Instant::now();
        let outcome = self.inner.classify(request);
        let entry = TranscriptEntry {
            timestamp: Utc::now().to_rfc3339(),
            request: &request.name,
            messages: &request.messages,
            response: outcome.as_ref().ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        if let Err(error) = self.record(&entry) {
            warn!(dir = %self.dir.display(), error = %error, "failed to write classifier transcript");
        }
        outcome
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "request".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnClassifier;
    use crate::error::ClassifyError;
    use serde_json::json;

    #[test]
    fn appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = TranscriptClassifier::new(
            FnClassifier::new(|request: &ClassifierRequest| {
                if request.user_prompt() == "fail" {
                    Err(ClassifyError::Service("down".to_string()))
                } else {
                    Ok(json!({"value": "ok"}))
                }
            }),
            dir.path(),
        );
        let ok = ClassifierRequest::new("merge_value", vec![ChatMessage::user("hi")], json!({}));
        let bad = ClassifierRequest::new("merge_value", vec![ChatMessage::user("fail")], json!({}));
        classifier.classify(&ok).unwrap();
        classifier.classify(&bad).unwrap_err();

        let content = fs::read_to_string(dir.path().join("merge_value.jsonl")).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["response"], json!({"value": "ok"}));
        assert!(lines[1]["error"].as_str().unwrap().contains("down"));
    }

    #[test]
    fn request_names_become_safe_file_names() {
        assert_eq!(file_stem("column/profile"), "column_profile");
        assert_eq!(file_stem(""), "request");
    }
}
