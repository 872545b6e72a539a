use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use tabfuse_cli::commands::IngestResult;
use tabfuse_core::RowAction;
use tabfuse_map::ProfileOutcome;
use tabfuse_model::{ColumnKind, DatasetProfile, MappingStrategy, TableSummary, TransformationType};

pub fn print_report(result: &IngestResult) {
    let outcome = &result.outcome;
    let report = &outcome.report;
    match &result.output {
        Some(path) => println!("Output: {}", path.display()),
        None => println!("Output: (dry run, not written)"),
    }
    print_table_summary(&outcome.profile.table);

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source row"),
        header_cell("Action"),
        header_cell("Target row"),
        header_cell("Score"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for decision in &report.rows {
        table.add_row(vec![
            Cell::new(decision.source_row),
            action_cell(decision.action),
            Cell::new(decision.target_row),
            dim_cell(format!("{:.2}", decision.score)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{} merged, {} inserted", report.merged, report.inserted))
            .add_attribute(Attribute::Bold),
        Cell::new(outcome.dataset.len()).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");

    if !report.fallback_columns.is_empty() {
        eprintln!(
            "Fallback profiles used for: {}",
            report.fallback_columns.join(", ")
        );
    }
}

pub fn print_profile(outcome: &ProfileOutcome) {
    print_profile_table(&outcome.profile);
    if !outcome.failures.is_empty() {
        eprintln!("Errors:");
        for failure in &outcome.failures {
            eprintln!("- {failure}");
        }
    }
}

pub fn print_profile_table(profile: &DatasetProfile) {
    println!("Rows: {}", profile.row_count);
    print_table_summary(&profile.table);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Kind"),
        header_cell("Complete"),
        header_cell("Distinct"),
        header_cell("Confidence"),
        header_cell("Purpose"),
        header_cell("Samples"),
    ]);
    apply_table_style(&mut table);
    for column in 2..=4 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for entry in &profile.columns {
        let column = &entry.profile;
        let confidence = if column.is_fallback() {
            Cell::new("fallback").fg(Color::Yellow)
        } else {
            Cell::new(format!("{:.2}", column.confidence))
        };
        table.add_row(vec![
            Cell::new(&entry.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            kind_cell(column.kind),
            Cell::new(format!("{:.0}%", column.stats.completeness * 100.0)),
            Cell::new(column.stats.unique_count),
            confidence,
            Cell::new(&column.purpose),
            dim_cell(column.sample_values.join(", ")),
        ]);
    }
    println!("{table}");
}

fn print_table_summary(summary: &TableSummary) {
    if summary.is_fallback() {
        println!("Table summary: unavailable");
        return;
    }
    let mut table = Table::new();
    apply_table_style(&mut table);
    let rows = [
        ("Purpose", summary.purpose.clone()),
        ("Source", summary.data_source.clone()),
        ("Entity", summary.primary_entity.clone()),
        ("Identifiers", summary.identifier_candidates.join(", ")),
        ("Completeness", summary.quality.completeness.clone()),
        ("Consistency", summary.quality.consistency.clone()),
        ("Duplicates", summary.quality.potential_duplicates.clone()),
        ("Confidence", format!("{:.2}", summary.confidence)),
    ];
    for (label, value) in rows {
        table.add_row(vec![header_cell(label), Cell::new(value)]);
    }
    println!("{table}");
}

pub fn print_strategy(strategy: &MappingStrategy) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Phase"),
        header_cell("Transformation"),
        header_cell("Rule / sources"),
        header_cell("Reasoning"),
    ]);
    apply_table_style(&mut table);
    for entry in &strategy.plans {
        let plan = &entry.plan;
        let detail = match plan.transformation_type {
            TransformationType::Format => plan.transformation_rule.clone().unwrap_or_default(),
            TransformationType::LlmFormat => plan
                .llm_source_columns
                .as_ref()
                .map_or_else(|| "(all columns)".to_string(), |columns| columns.join(", ")),
            TransformationType::None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&entry.column)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(entry.phase),
            transformation_cell(plan.transformation_type),
            Cell::new(detail),
            dim_cell(&plan.reasoning),
        ]);
    }
    println!("{table}");
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(160);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn action_cell(action: RowAction) -> Cell {
    match action {
        RowAction::Merged => Cell::new("merged").fg(Color::Green),
        RowAction::Inserted => Cell::new("inserted").fg(Color::Blue),
    }
}

fn kind_cell(kind: ColumnKind) -> Cell {
    match kind {
        ColumnKind::Identifier => Cell::new(kind).fg(Color::Magenta),
        ColumnKind::Text => Cell::new(kind),
    }
}

fn transformation_cell(kind: TransformationType) -> Cell {
    match kind {
        TransformationType::None => dim_cell(kind),
        TransformationType::Format => Cell::new(kind).fg(Color::Green),
        TransformationType::LlmFormat => Cell::new(kind).fg(Color::Yellow),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
