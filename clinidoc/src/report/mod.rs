//! Run and batch reports.
//!
//! A [`ReportBuilder`] collects terminal tasks while a run executes and is
//! finalized exactly once into an immutable [`RunReport`]. The batch
//! controller rolls run reports up into a [`BatchReport`].

mod batch_report;
mod builder;
mod persist;
mod run_report;

pub use batch_report::{BatchCounts, BatchOutcome, BatchReport, FailedInput};
pub use builder::ReportBuilder;
pub use persist::{
    persist_batch_report, persist_run_report, PersistedReport, BATCH_SUMMARY_JSON,
    BATCH_SUMMARY_TEXT,
};
pub use run_report::{RunReport, TaskCounts};
