//! Event sinks for run and batch lifecycle events.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives lifecycle events from the run and batch controllers.
///
/// Sinks must not fail the pipeline: delivery problems are theirs to swallow.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits one event. `event_type` is one of the constants in [`crate::events`].
    async fn emit(&self, event_type: &str, data: Option<Value>);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// A sink that forwards events to `tracing`.
///
/// `stage.failed` is always logged at WARN; everything else at the
/// configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level (DEBUG or INFO).
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

fn field<'a>(data: Option<&'a Value>, key: &str) -> &'a str {
    data.and_then(|d| d.get(key))
        .and_then(Value::as_str)
        .unwrap_or("-")
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        let data = data.as_ref();
        let run_id = field(data, "run_id");
        let stage = field(data, "stage");

        if event_type == super::STAGE_FAILED {
            warn!(run_id, stage, error = field(data, "error"), "{event_type}");
        } else if self.level == Level::DEBUG {
            debug!(run_id, stage, event_data = ?data, "{event_type}");
        } else {
            info!(run_id, stage, "{event_type}");
        }
    }
}

/// One event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// The event type constant.
    pub event_type: String,
    /// The payload, if any.
    pub data: Option<Value>,
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit("run.started", None).await;
        LoggingEventSink::default()
            .emit("stage.failed", Some(json!({"stage": "dvp", "error": "boom"})))
            .await;
        LoggingEventSink::new(Level::DEBUG).emit("stage.skipped", None).await;
    }

    #[test]
    fn test_field_lookup() {
        let data = json!({"run_id": "r1", "duration_ms": 5});
        assert_eq!(field(Some(&data), "run_id"), "r1");
        assert_eq!(field(Some(&data), "duration_ms"), "-");
        assert_eq!(field(None, "stage"), "-");
    }

    #[tokio::test]
    async fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("stage.started", None).await;
        sink.emit("stage.completed", Some(json!({"stage": "crf"}))).await;
        sink.emit("run.completed", Some(json!({"failed": 0}))).await;

        assert_eq!(sink.len(), 3);
        let stages = sink.events_of_type("stage.");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].data, Some(json!({"stage": "crf"})));
        assert_eq!(
            sink.event_types(),
            vec!["stage.started", "stage.completed", "run.completed"]
        );
    }
}
