//! Runtime helpers for stage execution.
//!
//! These helpers wrap collaborator calls with timeouts so a stage never
//! stays running indefinitely.

use crate::errors::StageError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::Instrument;

/// Result of a timed operation.
#[derive(Debug)]
pub enum TimedResult<T, E> {
    /// Operation completed successfully.
    Ok(T),
    /// Operation failed with an error.
    Err(E),
    /// Operation timed out.
    Timeout,
}

impl<T, E> TimedResult<T, E> {
    /// Returns true if the operation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, TimedResult::Ok(_))
    }

    /// Returns true if the operation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimedResult::Timeout)
    }

    /// Converts to a standard Result, treating timeout as an error.
    pub fn into_result(self, timeout_error: E) -> Result<T, E> {
        match self {
            TimedResult::Ok(v) => Ok(v),
            TimedResult::Err(e) => Err(e),
            TimedResult::Timeout => Err(timeout_error),
        }
    }
}

/// Runs a future with a timeout.
pub async fn run_with_timeout<T, E, F>(duration: Duration, future: F) -> TimedResult<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => TimedResult::Ok(value),
        Ok(Err(error)) => TimedResult::Err(error),
        Err(_) => TimedResult::Timeout,
    }
}

/// Runs one stage's collaborator call, applying the optional timeout.
///
/// A timeout becomes [`StageError::Timeout`] naming the stage.
pub async fn run_stage<T, F>(
    stage: &str,
    limit: Option<Duration>,
    future: F,
) -> Result<T, StageError>
where
    F: Future<Output = Result<T, StageError>>,
{
    let Some(limit) = limit else {
        return future.await;
    };

    run_with_timeout(limit, future)
        .await
        .into_result(StageError::Timeout {
            stage: stage.to_string(),
            after: limit,
        })
}

/// Runs a stage on its own tokio task so a panic in the collaborator is
/// contained.
///
/// The timeout applies inside the spawned task, so an expired stage is
/// dropped rather than left running. A panic becomes
/// [`StageError::Panicked`].
pub async fn run_isolated<T, F>(
    stage: impl Into<String>,
    limit: Option<Duration>,
    future: F,
) -> Result<T, StageError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, StageError>> + Send + 'static,
{
    let stage = stage.into();
    let worker = async move { run_stage(&stage, limit, future).await };
    match tokio::spawn(worker.in_current_span()).await {
        Ok(result) => result,
        Err(join_error) => Err(StageError::Panicked(join_error_message(join_error))),
    }
}

fn join_error_message(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return "stage worker was cancelled".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
