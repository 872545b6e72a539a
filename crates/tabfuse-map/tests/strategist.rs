//! Integration tests for mapping strategy creation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tabfuse_classify::{Classifier, ClassifierRequest, ClassifyError, FnClassifier};
use tabfuse_common::ExecutorOptions;
use tabfuse_map::{MappingStrategist, PlanError};
use tabfuse_model::{
    ColumnKind, ColumnProfile, ColumnSpec, ColumnStats, DatasetProfile, Phase, ProfiledColumn,
    TableSummary, TargetSchema, TransformationType,
};

fn options() -> ExecutorOptions {
    ExecutorOptions {
        max_workers: 4,
        per_item_timeout: Duration::from_secs(5),
        max_retries: 2,
        backoff_unit: Duration::from_millis(1),
    }
}

fn schema() -> TargetSchema {
    TargetSchema::new(
        "Track sales leads",
        vec![
            ("notes".to_string(), ColumnSpec::descriptive("Sales notes")),
            ("email".to_string(), ColumnSpec::identifier("Work email", 1.0)),
            ("company".to_string(), ColumnSpec::identifier("Employer", 0.0)),
            ("full_name".to_string(), ColumnSpec::identifier("Person name", 0.5)),
        ],
    )
    .unwrap()
}

fn profile() -> DatasetProfile {
    let column = |name: &str, kind| ProfiledColumn {
        name: name.to_string(),
        profile: ColumnProfile {
            kind,
            purpose: String::new(),
            reasoning: String::new(),
            confidence: 0.9,
            stats: ColumnStats::default(),
            sample_values: Vec::new(),
        },
    };
    DatasetProfile {
        row_count: 0,
        columns: vec![
            column("Email", ColumnKind::Identifier),
            column("Name", ColumnKind::Text),
            column("Remarks", ColumnKind::Text),
        ],
        table: TableSummary::default(),
    }
}

fn target_of(request: &ClassifierRequest) -> String {
    request
        .user_prompt()
        .lines()
        .find_map(|line| line.strip_prefix("Target column: "))
        .and_then(|rest| rest.split(" (").next())
        .unwrap_or_default()
        .to_string()
}

fn answer(column: &str) -> Value {
    match column {
        "email" => json!({
            "reasoning": "copy",
            "transformation_type": "format",
            "transformation_rule": "{Email} | trim | lower",
            "llm_source_columns": null
        }),
        "full_name" => json!({
            "reasoning": "copy",
            "transformation_type": "format",
            "transformation_rule": "{Name} | squish",
            "llm_source_columns": null
        }),
        "notes" => json!({
            "reasoning": "summarise",
            "transformation_type": "llm_format",
            "transformation_rule": null,
            "llm_source_columns": ["Remarks", "Nope"]
        }),
        _ => json!({
            "reasoning": "no source",
            "transformation_type": "none",
            "transformation_rule": null,
            "llm_source_columns": null
        }),
    }
}

#[test]
fn plans_every_column_in_schema_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        assert_eq!(request.name, "column_plan");
        let column = target_of(request);
        recorder.lock().unwrap().push(column.clone());
        Ok(answer(&column))
    }));

    let strategy = MappingStrategist::new(classifier, options())
        .create_plan(&schema(), &profile())
        .unwrap();

    let columns: Vec<&str> = strategy.plans.iter().map(|entry| entry.column.as_str()).collect();
    assert_eq!(columns, vec!["notes", "email", "company", "full_name"]);

    let email = &strategy.plans[1];
    assert_eq!(email.phase, Phase::EntityMatching);
    assert_eq!(email.plan.transformation_rule.as_deref(), Some("{Email} | trim | lower"));

    let notes = strategy.get("notes").unwrap();
    assert_eq!(notes.transformation_type, TransformationType::LlmFormat);
    assert_eq!(notes.llm_source_columns, Some(vec!["Remarks".to_string()]));
    assert_eq!(strategy.get("company").unwrap().transformation_type, TransformationType::None);

    // Phase 1 finished before any Phase 2 request went out.
    let seen = seen.lock().unwrap();
    let first_remaining = seen
        .iter()
        .position(|column| column == "notes" || column == "company")
        .unwrap();
    assert!(seen[..first_remaining].contains(&"email".to_string()));
    assert!(seen[..first_remaining].contains(&"full_name".to_string()));
    assert_eq!(seen.len(), 4);
}

#[test]
fn invalid_rule_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        let column = target_of(request);
        if column == "email" && counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(json!({
                "reasoning": "typo",
                "transformation_type": "format",
                "transformation_rule": "{E-mail} | lower",
                "llm_source_columns": null
            }));
        }
        Ok(answer(&column))
    }));

    let strategy = MappingStrategist::new(classifier, options())
        .create_plan(&schema(), &profile())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        strategy.get("email").unwrap().transformation_rule.as_deref(),
        Some("{Email} | trim | lower")
    );
}

#[test]
fn phase_one_failure_aborts_before_phase_two() {
    let remaining_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&remaining_calls);
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        let column = target_of(request);
        match column.as_str() {
            "email" => Err(ClassifyError::Service("quota exceeded".to_string())),
            "notes" | "company" => {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(answer(&column))
            }
            _ => Ok(answer(&column)),
        }
    }));

    let error = MappingStrategist::new(classifier, options())
        .create_plan(&schema(), &profile())
        .unwrap_err();
    assert_eq!(error.phase, Phase::EntityMatching);
    assert_eq!(error.column.as_deref(), Some("email"));
    let failure = error.source.item_failure().unwrap();
    assert_eq!(failure.attempts, 3);
    assert!(matches!(failure.source, PlanError::Classify(_)));
    assert_eq!(remaining_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn format_without_rule_fails_the_phase() {
    let classifier: Arc<dyn Classifier> = Arc::new(FnClassifier::new(|request: &ClassifierRequest| {
        let column = target_of(request);
        if column == "notes" {
            return Ok(json!({
                "reasoning": "oops",
                "transformation_type": "format",
                "transformation_rule": null,
                "llm_source_columns": null
            }));
        }
        Ok(answer(&column))
    }));

    let error = MappingStrategist::new(classifier, options())
        .create_plan(&schema(), &profile())
        .unwrap_err();
    assert_eq!(error.phase, Phase::Remaining);
    assert_eq!(error.column.as_deref(), Some("notes"));
    assert!(matches!(
        error.source.item_failure().map(|failure| &failure.source),
        Some(PlanError::MissingRule)
    ));
}
