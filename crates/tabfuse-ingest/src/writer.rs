//! Dataset output as CSV.

use std::path::Path;

use tabfuse_model::Dataset;
use tracing::info;

use crate::error::{IngestError, Result};

/// Writes `dataset` as CSV with a header row, creating parent directories.
///
/// Cells are rendered with [`tabfuse_model::CellValue::to_text`]; missing
/// values become empty fields.
pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IngestError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let csv_error = |source: csv::Error| IngestError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(dataset.columns()).map_err(csv_error)?;
    for row in dataset.rows() {
        writer
            .write_record(dataset.columns().iter().map(|column| row.get(column).to_text()))
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), rows = dataset.len(), "wrote table");
    Ok(())
}
