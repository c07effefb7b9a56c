use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use tokio::runtime::{Handle, Runtime};

/// Builder for helm telemetry sinks.
pub struct HelmTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    log_sink: Option<Arc<dyn LogSink>>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl HelmTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            log_sink: None,
            event_publisher: None,
        }
    }

    /// Writes JSON-lines records to a file.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Writes records to an existing sink. Takes precedence over
    /// [`Self::log_path`].
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<HelmTelemetry> {
        let sink = match (self.log_sink, self.log_path) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => Some(Arc::new(JsonLogger::new(path)?) as Arc<dyn LogSink>),
            (None, None) => None,
        };
        let event = self.event_publisher.map(EventHandle::new).transpose()?;
        Ok(HelmTelemetry {
            inner: Arc::new(TelemetryInner {
                component: self.component,
                sink,
                event,
            }),
        })
    }
}

/// Telemetry handle shared by the engine and the runtime.
#[derive(Clone)]
pub struct HelmTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for HelmTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelmTelemetry")
            .field("component", &self.inner.component)
            .field("logs", &self.inner.sink.is_some())
            .field("events", &self.inner.event.is_some())
            .finish()
    }
}

struct TelemetryInner {
    component: String,
    sink: Option<Arc<dyn LogSink>>,
    event: Option<EventHandle>,
}

struct EventHandle {
    runtime: Runtime,
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandle {
    fn new(publisher: Arc<dyn EventPublisher>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        Ok(Self { runtime, publisher })
    }

    fn publish(&self, record: EventRecord) -> Result<()> {
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(&self.publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    tracing::warn!(error = %err, "telemetry event publish failed");
                }
            });
            Ok(())
        } else {
            self.runtime.block_on(self.publisher.publish(record))
        }
    }
}

impl HelmTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> HelmTelemetryBuilder {
        HelmTelemetryBuilder::new(component)
    }

    /// Component name stamped on every record.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.inner.component
    }

    /// Logs a record tagged with the helm iteration.
    pub fn log(&self, level: LogLevel, message: &str, iteration: u64, fields: Value) -> Result<()> {
        if let Some(sink) = &self.inner.sink {
            let record = LogRecord::new(&self.inner.component, level, message)
                .with_iteration(iteration)
                .with_fields(fields);
            sink.write(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    pub fn event(&self, topic: &str, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            handle.publish(EventRecord::new(&self.inner.component, topic, payload))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use shared_logging::MemorySink;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("helm.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = HelmTelemetry::builder("helm")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "helm.cycle.complete", 3, json!({ "functions": 2 }))
            .unwrap();
        telemetry
            .event("helm.decision", json!({ "complete": true }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("helm.cycle.complete"));
        assert!(content.contains("\"iteration\":3"));
        assert_eq!(bus.topic("helm.decision").len(), 1);
    }

    #[test]
    fn sink_takes_precedence_and_silent_without_outputs() {
        let sink = Arc::new(MemorySink::new(8));
        let telemetry = HelmTelemetry::builder("helm")
            .log_path("/nonexistent/dir/never-created.log")
            .log_sink(sink.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Warn, "helm.behavior.abstain", 1, json!({ "behavior": "wpt" }))
            .unwrap();
        assert_eq!(sink.matching("helm.behavior.abstain").len(), 1);

        let quiet = HelmTelemetry::builder("helm").build().unwrap();
        quiet.log(LogLevel::Info, "x", 0, Value::Null).unwrap();
        quiet.event("helm.decision", Value::Null).unwrap();
        assert_eq!(quiet.component(), "helm");
    }
}
