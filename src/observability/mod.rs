//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch pipeline / hub / forwarder produce:
//!     → logging.rs (structured log events, stdout)
//!     → metrics.rs (counters, gauges, histograms)
//!     → events.rs  (per-project log lines: tracing + live subscribers)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → WebSocket subscribers of a project
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - Metric updates are no-ops until a recorder is installed

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{BroadcastSink, EventEmitter, EventSink, TracingSink};
