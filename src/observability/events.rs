//! Per-project log events.
//!
//! An event is a plain text line tagged with the project it concerns (empty
//! before the project is known). The pipeline hands every event to an
//! [`EventEmitter`], which fans it out to independent sinks: the local log and
//! the live broadcast hub. Sinks never fail and never block the caller.

use std::sync::Arc;

use crate::hub::HubHandle;

/// Destination for per-project log events.
pub trait EventSink: Send + Sync {
    fn emit(&self, project_id: &str, message: &str);
}

/// Writes events to the process log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, project_id: &str, message: &str) {
        tracing::info!(project_id = %project_id, "{}", message);
    }
}

/// Forwards events to the hub's subscribers of the event's project.
#[derive(Clone)]
pub struct BroadcastSink {
    hub: HubHandle,
}

impl BroadcastSink {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, project_id: &str, message: &str) {
        if project_id.is_empty() {
            return;
        }
        self.hub.broadcast(project_id, message);
    }
}

/// Composes sinks; every event goes to each one in order.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log locally and broadcast to `hub`.
    pub fn with_hub(hub: HubHandle) -> Self {
        Self::new()
            .with_sink(Arc::new(TracingSink))
            .with_sink(Arc::new(BroadcastSink::new(hub)))
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn emit(&self, project_id: &str, message: impl AsRef<str>) {
        let message = message.as_ref();
        for sink in &self.sinks {
            sink.emit(project_id, message);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::EventSink;

    /// Collects events for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<(String, String)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, project_id: &str, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push((project_id.to_string(), message.to_string()));
        }
    }
}
