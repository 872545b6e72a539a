use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span, warn};

use tabfuse_classify::{Classifier, OpenAiClassifier, TranscriptClassifier};
use tabfuse_config::{SchemaDocument, Settings, load_schema_document, load_settings};
use tabfuse_core::{IngestionOutcome, Ingestor};
use tabfuse_ingest::{read_dataset, read_dataset_or_empty, write_dataset};
use tabfuse_map::ProfileOutcome;
use tabfuse_model::{DatasetProfile, MappingStrategy};

use crate::cli::{IngestArgs, InitSchemaArgs, PlanArgs, ProfileArgs};

/// Settings and classifier shared by every command that talks to the classifier.
pub struct Runtime {
    pub settings: Settings,
    pub classifier: Arc<dyn Classifier>,
}

impl Runtime {
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let settings = load_settings(settings_path).context("load settings")?;
        let client = OpenAiClassifier::from_settings(&settings.classifier_settings())
            .context("create classifier client")?;
        let classifier: Arc<dyn Classifier> = match settings.transcript_dir() {
            Some(dir) => {
                info!(dir = %dir.display(), "recording classifier transcripts");
                Arc::new(TranscriptClassifier::new(client, dir))
            }
            None => Arc::new(client),
        };
        Ok(Self {
            settings,
            classifier,
        })
    }

    fn ingestor(&self, sample_rows: usize) -> Ingestor {
        Ingestor::new(Arc::clone(&self.classifier), self.settings.executor_options())
            .with_failure_policy(self.settings.failure_policy())
            .with_sample_rows(sample_rows)
    }
}

pub struct IngestResult {
    pub outcome: IngestionOutcome,
    pub output: Option<PathBuf>,
}

pub fn run_ingest(args: &IngestArgs, settings_path: Option<&Path>) -> Result<IngestResult> {
    let document = load_schema_document(&args.schema).context("load schema document")?;
    let target_path = args
        .target
        .clone()
        .or_else(|| document.target_file_path.clone())
        .ok_or_else(|| anyhow!("no target table: pass --target or set target_file_path"))?;
    let sample_rows = document.sample_rows;
    let schema = document.into_schema().context("build target schema")?;

    let span = info_span!("run", target = %target_path.display());
    let _guard = span.enter();

    let source = read_dataset(&args.source)
        .with_context(|| format!("read source table {}", args.source.display()))?;
    let target = read_dataset_or_empty(&target_path, &schema.column_names())
        .with_context(|| format!("read target table {}", target_path.display()))?;

    let mut runtime = Runtime::load(settings_path)?;
    if let Some(policy) = args.failure_policy {
        runtime.settings.transform.failure_policy = policy.into();
    }
    let ingestor = runtime.ingestor(sample_rows);

    let progress = row_progress(source.len());
    let started = Instant::now();
    let outcome = ingestor
        .ingest_with(&schema, &source, target, |_| progress.inc(1))
        .context("ingest source table");
    progress.finish_and_clear();
    let outcome = outcome?;
    info!(
        duration_ms = started.elapsed().as_millis(),
        rows = outcome.dataset.len(),
        "run finished"
    );

    let output = if args.dry_run {
        warn!("dry run, merged table not written");
        None
    } else {
        let path = args.output.clone().unwrap_or(target_path);
        write_dataset(&outcome.dataset, &path)
            .with_context(|| format!("write merged table {}", path.display()))?;
        Some(path)
    };
    Ok(IngestResult { outcome, output })
}

pub fn run_profile(args: &ProfileArgs, settings_path: Option<&Path>) -> Result<ProfileOutcome> {
    let source = read_dataset(&args.source)
        .with_context(|| format!("read table {}", args.source.display()))?;
    let runtime = Runtime::load(settings_path)?;
    Ok(runtime.ingestor(args.sample_rows).profile(&source, &args.purpose))
}

pub fn run_plan(
    args: &PlanArgs,
    settings_path: Option<&Path>,
) -> Result<(DatasetProfile, MappingStrategy)> {
    let document = load_schema_document(&args.schema).context("load schema document")?;
    let sample_rows = document.sample_rows;
    let schema = document.into_schema().context("build target schema")?;
    let source = read_dataset(&args.source)
        .with_context(|| format!("read source table {}", args.source.display()))?;

    let runtime = Runtime::load(settings_path)?;
    let ingestor = runtime.ingestor(sample_rows);
    let profile = ingestor.profile(&source, schema.purpose()).profile;
    let strategy = ingestor
        .plan(&schema, &profile)
        .context("create mapping strategy")?;
    Ok((profile, strategy))
}

/// Writes a starter schema document; returns the TOML when printing to stdout.
pub fn run_init_schema(args: &InitSchemaArgs) -> Result<Option<String>> {
    let table = read_dataset(&args.table)
        .with_context(|| format!("read table {}", args.table.display()))?;
    let document = SchemaDocument::from_table_columns(&args.purpose, table.columns());
    let text = document.to_toml_string()?;
    match &args.output {
        Some(path) => {
            if path.exists() && !args.force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(path, &text)
                .with_context(|| format!("write schema document {}", path.display()))?;
            info!(path = %path.display(), columns = table.columns().len(), "wrote schema document");
            Ok(None)
        }
        None => Ok(Some(text)),
    }
}

fn row_progress(rows: usize) -> ProgressBar {
    let bar = ProgressBar::new(rows as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
