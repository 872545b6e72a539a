//! Integration tests for the column profiler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tabfuse_classify::{Classifier, ClassifierRequest, ClassifyError, FnClassifier};
use tabfuse_common::ExecutorOptions;
use tabfuse_map::{ColumnProfiler, ProfilingError};
use tabfuse_model::{CellValue, ColumnKind, Dataset};

fn options() -> ExecutorOptions {
    ExecutorOptions {
        max_workers: 3,
        per_item_timeout: Duration::from_secs(5),
        max_retries: 1,
        backoff_unit: Duration::from_millis(1),
    }
}

fn leads() -> Dataset {
    let rows = vec![
        vec!["a@x.com".into(), "Ann Lee".into(), "call back".into()],
        vec!["b@y.org".into(), "Bo Diddley".into(), CellValue::Missing],
        vec!["c@z.net".into(), "Carl Sagan".into(), "vip".into()],
    ];
    Dataset::with_rows(vec!["Email", "Name", "Notes"], rows).unwrap()
}

fn column_of(request: &ClassifierRequest) -> String {
    request
        .user_prompt()
        .lines()
        .find_map(|line| line.strip_prefix("Column: "))
        .unwrap_or_default()
        .to_string()
}

fn table_answer() -> Value {
    json!({
        "table_purpose": "Conference lead list",
        "data_source": "event badge scans",
        "primary_entity": "person",
        "identifier_candidates": ["Email", "Badge"],
        "quality_assessment": {
            "completeness": "notes are sparse",
            "consistency": "good",
            "potential_duplicates": "none seen"
        },
        "reasoning": "emails plus names",
        "confidence": 0.8
    })
}

fn answering() -> Arc<dyn Classifier> {
    Arc::new(FnClassifier::new(|request: &ClassifierRequest| {
        if request.name == "table_profile" {
            return Ok(table_answer());
        }
        assert_eq!(request.name, "column_profile");
        let column = column_of(request);
        let kind = if column == "Email" { "identifier" } else { "text" };
        Ok(json!({
            "kind": kind,
            "purpose": format!("{column} of the lead"),
            "reasoning": "looks like it",
            "confidence": 1.7
        }))
    }))
}

#[test]
fn profiles_every_column_in_source_order() {
    let profiler = ColumnProfiler::new(answering(), options());
    let outcome = profiler.profile(&leads(), "Track sales leads");

    assert!(outcome.is_complete());
    assert_eq!(outcome.profile.row_count, 3);
    assert_eq!(outcome.profile.column_names(), vec!["Email", "Name", "Notes"]);

    let email = outcome.profile.get("Email").unwrap();
    assert_eq!(email.kind, ColumnKind::Identifier);
    assert_eq!(email.purpose, "Email of the lead");
    assert!((email.confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(email.sample_values, vec!["a@x.com", "b@y.org", "c@z.net"]);

    let notes = outcome.profile.get("Notes").unwrap();
    assert_eq!(notes.stats.non_null_count, 2);
    assert!((notes.stats.completeness - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn sample_rows_are_capped() {
    let profiler = ColumnProfiler::new(answering(), options()).with_sample_rows(1);
    let outcome = profiler.profile(&leads(), "Track sales leads");
    assert_eq!(outcome.profile.get("Name").unwrap().sample_values, vec!["Ann Lee"]);
}

#[test]
fn failed_column_falls_back_without_blocking_others() {
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(|request: &ClassifierRequest| {
        if request.name == "table_profile" {
            return Ok(table_answer());
        }
        if column_of(request) == "Notes" {
            return Err(ClassifyError::Service("overloaded".to_string()));
        }
        Ok(json!({"kind": "text", "purpose": "p", "reasoning": "r", "confidence": 0.9}))
    }));
    let profiler = ColumnProfiler::new(classifier, options());
    let outcome = profiler.profile(&leads(), "Track sales leads");

    assert_eq!(outcome.profile.columns.len(), 3);
    let notes = outcome.profile.get("Notes").unwrap();
    assert!(notes.is_fallback());
    assert_eq!(notes.kind, ColumnKind::Text);
    assert_eq!(notes.stats.total_count, 3);
    assert!(!outcome.profile.get("Email").unwrap().is_fallback());

    assert_eq!(outcome.failures.len(), 1);
    match &outcome.failures[0] {
        ProfilingError::Column { column, attempts, .. } => {
            assert_eq!(column, "Notes");
            assert_eq!(*attempts, 2);
        }
        other => panic!("unexpected failure {other:?}"),
    }
}

#[test]
fn malformed_answer_is_a_column_failure() {
    let classifier: Arc<dyn Classifier> =
        Arc::new(FnClassifier::new(|_: &ClassifierRequest| Ok(json!({"kind": "blob"}))));
    let outcome = ColumnProfiler::new(classifier, options()).profile(&leads(), "p");
    assert_eq!(outcome.failures.len(), 3);
    assert!(outcome.profile.columns.iter().all(|entry| entry.profile.is_fallback()));
}

#[test]
fn empty_dataset_profiles_columns_without_rows() {
    let dataset = Dataset::new(["Email"]).unwrap();
    let outcome = ColumnProfiler::new(answering(), options()).profile(&dataset, "p");
    let email = outcome.profile.get("Email").unwrap();
    assert_eq!(email.stats.total_count, 0);
    assert!(email.sample_values.is_empty());
}

#[test]
fn table_summary_follows_column_profiles() {
    let outcome = ColumnProfiler::new(answering(), options()).profile(&leads(), "Track sales leads");
    let table = &outcome.profile.table;
    assert!(!table.is_fallback());
    assert_eq!(table.purpose, "Conference lead list");
    assert_eq!(table.data_source, "event badge scans");
    assert_eq!(table.primary_entity, "person");
    assert_eq!(table.identifier_candidates, vec!["Email"]);
    assert_eq!(table.quality.completeness, "notes are sparse");
    assert!((table.confidence - 0.8).abs() < f32::EPSILON);
}

#[test]
fn failed_table_summary_falls_back() {
    let seen_columns = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&seen_columns);
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        if request.name == "table_profile" {
            assert!(request.user_prompt().contains("- Email: identifier"));
            return Err(ClassifyError::Service("overloaded".to_string()));
        }
        seen.lock().unwrap().push(column_of(request));
        Ok(json!({"kind": "identifier", "purpose": "p", "reasoning": "r", "confidence": 0.9}))
    }));
    let outcome = ColumnProfiler::new(classifier, options()).profile(&leads(), "p");

    assert_eq!(seen_columns.lock().unwrap().len(), 3);
    assert!(outcome.profile.columns.iter().all(|entry| !entry.profile.is_fallback()));
    assert!(outcome.profile.table.is_fallback());
    assert!(outcome.profile.table.reasoning.contains("overloaded"));
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(outcome.failures[0], ProfilingError::Table(_)));
    assert!(!outcome.is_complete());
}

#[test]
fn table_summary_is_skipped_when_every_column_fell_back() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        assert_eq!(request.name, "column_profile");
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ClassifyError::Service("down".to_string()))
    }));
    let outcome = ColumnProfiler::new(classifier, options()).profile(&leads(), "p");
    assert!(outcome.profile.table.is_fallback());
    assert_eq!(outcome.failures.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}
