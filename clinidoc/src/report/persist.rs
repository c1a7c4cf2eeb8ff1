//! Writing reports to disk.

use super::{BatchReport, RunReport};
use crate::config::ReportConfig;
use crate::utils::write_atomic;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the batch summary in structured form.
pub const BATCH_SUMMARY_JSON: &str = "batch_summary.json";
/// File name of the batch summary in narrative form.
pub const BATCH_SUMMARY_TEXT: &str = "batch_summary.txt";

/// Paths a report was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReport {
    /// The structured (JSON) rendering.
    pub structured: PathBuf,
    /// The narrative (text) rendering.
    pub narrative: PathBuf,
}

fn write_pair(
    dir: &Path,
    structured_name: &str,
    structured: &serde_json::Value,
    narrative_name: &str,
    narrative: &str,
) -> io::Result<PersistedReport> {
    let structured_path = dir.join(structured_name);
    let narrative_path = dir.join(narrative_name);

    let json = serde_json::to_vec_pretty(structured).map_err(io::Error::other)?;
    write_atomic(&structured_path, &json)?;
    write_atomic(&narrative_path, narrative.as_bytes())?;

    Ok(PersistedReport {
        structured: structured_path,
        narrative: narrative_path,
    })
}

/// Writes both renderings of a run report into its output directory.
pub fn persist_run_report(report: &RunReport, config: &ReportConfig) -> io::Result<PersistedReport> {
    write_pair(
        report.output_dir(),
        &config.json_file_name,
        &report.to_structured(),
        &config.text_file_name,
        &report.to_narrative(),
    )
}

/// Writes both renderings of a batch report into the batch output root.
pub fn persist_batch_report(report: &BatchReport, root: &Path) -> io::Result<PersistedReport> {
    write_pair(
        root,
        BATCH_SUMMARY_JSON,
        &report.to_structured(),
        BATCH_SUMMARY_TEXT,
        &report.to_narrative(),
    )
}
