//! Integration tests for the transformation and merge processor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tabfuse_classify::{Classifier, ClassifierRequest, ClassifyError, FnClassifier};
use tabfuse_model::{
    CellValue, ColumnPlan, ColumnSpec, MappingStrategy, Phase, Row, TargetSchema,
    TransformationPlan,
};
use tabfuse_transform::{FailurePolicy, Processor, TransformationError};

fn schema() -> TargetSchema {
    TargetSchema::new(
        "Track sales leads",
        vec![
            ("email".to_string(), ColumnSpec::identifier("Work email", 1.0)),
            ("full_name".to_string(), ColumnSpec::identifier("Person name", 0.5)),
            ("company".to_string(), ColumnSpec::identifier("Employer", 0.0)),
            ("salary".to_string(), ColumnSpec::descriptive("Yearly salary")),
            ("notes".to_string(), ColumnSpec::descriptive("Sales notes")),
        ],
    )
    .unwrap()
}

fn source_columns() -> Vec<String> {
    ["Email", "Name", "Company", "Salary", "Notes"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn strategy(notes_rule: &str) -> MappingStrategy {
    let entry = |column: &str, phase, plan| ColumnPlan {
        column: column.to_string(),
        phase,
        plan,
    };
    MappingStrategy {
        plans: vec![
            entry("email", Phase::EntityMatching, TransformationPlan::format("{Email} | trim | lower", "")),
            entry("full_name", Phase::EntityMatching, TransformationPlan::format("Name | squish | lower", "")),
            entry(
                "company",
                Phase::Remaining,
                TransformationPlan::llm_format(Some(vec!["Company".to_string()]), "needs cleanup"),
            ),
            entry("salary", Phase::Remaining, TransformationPlan::format("{Salary}", "")),
            entry("notes", Phase::Remaining, TransformationPlan::format(notes_rule, "")),
        ],
    }
}

fn incoming() -> Row {
    Row::from_pairs([
        ("Email", CellValue::from(" J@x.com ")),
        ("Name", CellValue::from("J  Smith")),
        ("Company", CellValue::from("acme corp.")),
        ("Salary", CellValue::Integer(50000)),
        ("Notes", CellValue::from("met at conf")),
    ])
}

/// Derives companies as a one-element list and merges by joining with "; ".
fn scripted(calls: Arc<AtomicUsize>) -> Arc<dyn Classifier> {
    Arc::new(FnClassifier::new(move |request: &ClassifierRequest| {
        calls.fetch_add(1, Ordering::SeqCst);
        match request.name.as_str() {
            "derive_value" => Ok(json!({"reasoning": "normalised", "value": ["Acme Corp"]})),
            "merge_value" => Ok(json!({"reasoning": "both add detail", "value": "cold lead; met at conf"})),
            other => Err(ClassifyError::Service(format!("unexpected request {other}"))),
        }
    }))
}

fn failing() -> Arc<dyn Classifier> {
    Arc::new(FnClassifier::new(|_: &ClassifierRequest| {
        Err(ClassifyError::Service("service down".to_string()))
    }))
}

fn processor(classifier: Arc<dyn Classifier>, policy: FailurePolicy) -> Processor {
    Processor::new(&schema(), &strategy("{Notes}"), &source_columns(), classifier, policy).unwrap()
}

#[test]
fn entity_values_cover_only_weighted_identifiers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = processor(scripted(Arc::clone(&calls)), FailurePolicy::Strict);
    let values = processor.entity_values(&incoming()).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values["email"], CellValue::from("j@x.com"));
    assert_eq!(values["full_name"], CellValue::from("j smith"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn new_entity_takes_all_transformed_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = processor(scripted(Arc::clone(&calls)), FailurePolicy::Strict);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, None).unwrap();

    assert_eq!(row.get("email").to_text(), "j@x.com");
    assert_eq!(row.get("full_name").to_text(), "j smith");
    assert_eq!(row.get("company").to_text(), "Acme Corp");
    assert_eq!(row.get("salary").to_text(), "50000");
    assert_eq!(row.get("notes").to_text(), "met at conf");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn matched_entity_keeps_identity_and_merges_descriptions() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = processor(scripted(Arc::clone(&calls)), FailurePolicy::Strict);
    let existing = Row::from_pairs([
        ("email", CellValue::from("J@X.com")),
        ("full_name", CellValue::Missing),
        ("company", CellValue::from("Acme Corporation")),
        ("salary", CellValue::Missing),
        ("notes", CellValue::from("cold lead")),
    ]);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, Some(&existing)).unwrap();

    // Non-empty identity values are never overwritten; empty ones are filled.
    assert_eq!(row.get("email").to_text(), "J@X.com");
    assert_eq!(row.get("full_name").to_text(), "j smith");
    assert_eq!(row.get("company").to_text(), "Acme Corporation");
    assert_eq!(row.get("salary").to_text(), "50000");
    assert_eq!(row.get("notes").to_text(), "cold lead; met at conf");
}

#[test]
fn equal_descriptive_values_skip_the_classifier() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = Processor::new(
        &schema(),
        &strategy("{Notes}"),
        &source_columns(),
        scripted(Arc::clone(&calls)),
        FailurePolicy::Strict,
    )
    .unwrap();
    let existing = Row::from_pairs([
        ("email", "j@x.com"),
        ("full_name", "j smith"),
        ("company", "Acme Corp"),
        ("salary", "50000"),
        ("notes", "Met at  conf"),
    ]);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, Some(&existing)).unwrap();
    assert_eq!(row.get("notes").to_text(), "Met at  conf");
    assert_eq!(row.get("company").to_text(), "Acme Corp");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn stored_identity_is_kept_without_deriving() {
    let processor = processor(failing(), FailurePolicy::Strict);
    let existing = Row::from_pairs([
        ("email", "j@x.com"),
        ("company", "Acme Corp"),
        ("notes", "met at conf"),
    ]);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, Some(&existing)).unwrap();
    assert_eq!(row.get("company").to_text(), "Acme Corp");
    assert_eq!(row.get("notes").to_text(), "met at conf");

    // An empty stored identity still gets derived, and the failure surfaces.
    let gap = Row::from_pairs([("email", "j@x.com"), ("notes", "met at conf")]);
    let err = processor.apply(&source, &values, Some(&gap)).unwrap_err();
    assert_eq!(err.column(), "company");
}

#[test]
fn empty_sources_leave_stored_description_alone() {
    let schema = TargetSchema::new(
        "Track sales leads",
        vec![
            ("email".to_string(), ColumnSpec::identifier("Work email", 1.0)),
            ("bio".to_string(), ColumnSpec::descriptive("Short biography")),
        ],
    )
    .unwrap();
    let strategy = MappingStrategy {
        plans: vec![
            ColumnPlan {
                column: "email".to_string(),
                phase: Phase::EntityMatching,
                plan: TransformationPlan::format("{Email}", ""),
            },
            ColumnPlan {
                column: "bio".to_string(),
                phase: Phase::Remaining,
                plan: TransformationPlan::llm_format(Some(vec!["Notes".to_string()]), "summarise"),
            },
        ],
    };
    let processor = Processor::new(
        &schema,
        &strategy,
        &source_columns(),
        failing(),
        FailurePolicy::Strict,
    )
    .unwrap();
    let source = Row::from_pairs([("Email", "j@x.com"), ("Notes", " ")]);
    let existing = Row::from_pairs([("email", "j@x.com"), ("bio", "Founder of Acme")]);
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, Some(&existing)).unwrap();
    assert_eq!(row.get("bio").to_text(), "Founder of Acme");
}

#[test]
fn current_placeholder_merges_without_classifier() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = Processor::new(
        &schema(),
        &strategy("{current} | {Notes} | squish"),
        &source_columns(),
        scripted(Arc::clone(&calls)),
        FailurePolicy::Strict,
    );
    // `|` after the template starts the pipeline, so a literal separator is not allowed there.
    assert!(matches!(processor, Err(TransformationError::Rule { .. })));

    let processor = Processor::new(
        &schema(),
        &strategy(r#"{current}; {Notes} | regex_replace("^; ", "") | squish"#),
        &source_columns(),
        scripted(Arc::clone(&calls)),
        FailurePolicy::Strict,
    )
    .unwrap();
    let existing = Row::from_pairs([("email", "j@x.com"), ("notes", "cold lead")]);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let merged = processor.apply(&source, &values, Some(&existing)).unwrap();
    assert_eq!(merged.get("notes").to_text(), "cold lead; met at conf");

    let inserted = processor.apply(&source, &values, None).unwrap();
    assert_eq!(inserted.get("notes").to_text(), "met at conf");
}

#[test]
fn strict_policy_propagates_classifier_failure() {
    let processor = processor(failing(), FailurePolicy::Strict);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();
    let err = processor.apply(&source, &values, None).unwrap_err();
    assert!(matches!(err, TransformationError::Derive { .. }));
    assert_eq!(err.column(), "company");
}

#[test]
fn lenient_policy_treats_failure_as_none() {
    let processor = processor(failing(), FailurePolicy::Lenient);
    let source = incoming();
    let values = processor.entity_values(&source).unwrap();

    let inserted = processor.apply(&source, &values, None).unwrap();
    assert_eq!(inserted.get("company"), &CellValue::Missing);
    assert_eq!(inserted.get("notes").to_text(), "met at conf");

    let existing = Row::from_pairs([("company", "Acme"), ("notes", "cold lead")]);
    let merged = processor.apply(&source, &values, Some(&existing)).unwrap();
    assert_eq!(merged.get("company").to_text(), "Acme");
    assert_eq!(merged.get("notes").to_text(), "cold lead");
}

#[test]
fn empty_sources_skip_classifier_derivation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processor = processor(scripted(Arc::clone(&calls)), FailurePolicy::Strict);
    let source = Row::from_pairs([("Email", "a@b.c"), ("Company", "")]);
    let values = processor.entity_values(&source).unwrap();
    let row = processor.apply(&source, &values, None).unwrap();
    assert_eq!(row.get("company"), &CellValue::Missing);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn format_plans_need_valid_rules() {
    let mut missing_rule = strategy("{Notes}");
    missing_rule.plans[4].plan.transformation_rule = None;
    let err = Processor::new(&schema(), &missing_rule, &source_columns(), failing(), FailurePolicy::Strict)
        .unwrap_err();
    assert!(matches!(err, TransformationError::MissingRule { column } if column == "notes"));

    let err = Processor::new(
        &schema(),
        &strategy("{Nope} | lower"),
        &source_columns(),
        failing(),
        FailurePolicy::Strict,
    )
    .unwrap_err();
    assert!(matches!(err, TransformationError::Rule { column, .. } if column == "notes"));
}
