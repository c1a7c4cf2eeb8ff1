//! Cooperative cancellation signal for batch processing.

use std::sync::OnceLock;
use tracing::info;

/// A cooperative cancellation signal.
///
/// The batch controller checks the token between inputs; a run that is
/// already executing finishes normally. Only the first reason is kept.
#[derive(Debug, Default)]
pub struct CancellationToken {
    reason: OnceLock<String>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Later calls are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.reason.set(reason).is_ok() {
            info!(reason = self.reason.get().map(String::as_str), "Cancellation requested");
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The reason given by the first `cancel` call.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_reason_wins() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());

        token.cancel("interrupted by user");
        token.cancel("second");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("interrupted by user"));
    }

    #[tokio::test]
    async fn test_cancel_from_another_task() {
        let token = Arc::new(CancellationToken::new());
        let remote = token.clone();
        tokio::spawn(async move { remote.cancel("signal") })
            .await
            .unwrap();
        assert_eq!(token.reason(), Some("signal"));
    }
}
