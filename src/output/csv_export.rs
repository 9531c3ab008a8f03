//! CSV export of stored records

use crate::state::JobRecord;
use crate::CrawlError;
use std::path::Path;

/// Writes `records` to `path` with a header row, one row per record
///
/// Columns follow the field order of `JobRecord`. Returns the number of
/// rows written.
pub fn export_csv(records: &[JobRecord], path: &Path) -> Result<usize, CrawlError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    tracing::info!("Exported {} jobs to {}", records.len(), path.display());
    Ok(records.len())
}
