//! Per-run log files.
//!
//! Every run executes inside a [`RUN_SPAN`] span that records its output
//! directory. [`RunLogLayer`] opens `run.log` in that directory when the span
//! starts and appends every event recorded inside the span, so each output
//! directory carries the log of the run that produced it.

use clinidoc::pipeline::RUN_SPAN;
use clinidoc::utils::iso_timestamp;
use parking_lot::Mutex;
use std::fmt::{self, Write as _};
use std::io::Write as _;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// File name of the per-run log inside an output directory.
pub const RUN_LOG_FILE: &str = "run.log";

/// Span field naming the directory the log file goes into.
const OUTPUT_DIR_FIELD: &str = "output_dir";

/// Log file attached to a run span's extensions.
struct RunLog(Mutex<RollingFileAppender>);

/// Tracing layer that mirrors each run's events into its output directory.
#[derive(Debug, Default)]
pub struct RunLogLayer;

impl RunLogLayer {
    /// Creates the layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RunLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != RUN_SPAN {
            return;
        }
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        let Some(dir) = fields.output_dir else {
            return;
        };

        // A directory we cannot write into still gets its console log.
        let appender = match RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(RUN_LOG_FILE)
            .build(&dir)
        {
            Ok(appender) => appender,
            Err(e) => {
                eprintln!("clinidoc: cannot open {RUN_LOG_FILE} in {dir}: {e}");
                return;
            }
        };
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(RunLog(Mutex::new(appender)));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        for span in scope {
            let extensions = span.extensions();
            let Some(log) = extensions.get::<RunLog>() else {
                continue;
            };
            let line = format_event(event);
            let mut file = log.0.lock();
            if file.write_all(line.as_bytes()).and_then(|()| file.flush()).is_err() {
                eprintln!("clinidoc: failed to append to {RUN_LOG_FILE}");
            }
            return;
        }
    }
}

fn format_event(event: &Event<'_>) -> String {
    let mut fields = FieldCollector::default();
    event.record(&mut fields);
    let metadata = event.metadata();
    let mut line = format!(
        "{} {:>5} {}: {}",
        iso_timestamp(),
        metadata.level(),
        metadata.target(),
        fields.message
    );
    for (name, value) in &fields.rest {
        let _ = write!(line, " {name}={value}");
    }
    line.push('\n');
    line
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    output_dir: Option<String>,
    rest: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            OUTPUT_DIR_FIELD => {
                self.rest.push((OUTPUT_DIR_FIELD, value.clone()));
                self.output_dir = Some(value);
            }
            name => self.rest.push((name, value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, info_span, warn};
    use tracing_subscriber::prelude::*;

    fn read_log(dir: &std::path::Path) -> String {
        std::fs::read_to_string(dir.join(RUN_LOG_FILE)).unwrap()
    }

    #[test]
    fn test_run_events_land_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let subscriber = tracing_subscriber::registry().with(RunLogLayer::new());

        tracing::subscriber::with_default(subscriber, || {
            info!("before the run");
            let span = info_span!(RUN_SPAN, run_id = "r1", output_dir = %dir.path().display());
            let _guard = span.enter();
            info!(stage = "crf", "Stage completed");
            let child = info_span!("stage");
            let _inner = child.enter();
            warn!("nested warning");
        });

        let log = read_log(dir.path());
        assert!(log.contains("Stage completed stage=crf"), "{log}");
        assert!(log.contains("WARN"), "{log}");
        assert!(log.contains("nested warning"), "{log}");
        assert!(!log.contains("before the run"), "{log}");
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn test_concurrent_runs_keep_separate_logs() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let subscriber = tracing_subscriber::registry().with(RunLogLayer::new());

        tracing::subscriber::with_default(subscriber, || {
            let a = info_span!(RUN_SPAN, output_dir = %first.path().display());
            let b = info_span!(RUN_SPAN, output_dir = %second.path().display());
            a.in_scope(|| info!("from first"));
            b.in_scope(|| info!("from second"));
        });

        let first_log = read_log(first.path());
        let second_log = read_log(second.path());
        assert!(first_log.contains("from first") && !first_log.contains("from second"));
        assert!(second_log.contains("from second") && !second_log.contains("from first"));
    }

    #[test]
    fn test_spans_without_output_dir_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let subscriber = tracing_subscriber::registry().with(RunLogLayer::new());

        tracing::subscriber::with_default(subscriber, || {
            info_span!(RUN_SPAN, run_id = "r1").in_scope(|| info!("no directory"));
            info_span!("other", output_dir = %dir.path().display()).in_scope(|| info!("wrong span"));
        });

        assert!(!dir.path().join(RUN_LOG_FILE).exists());
    }
}
