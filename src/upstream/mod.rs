//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch pipeline (prefix already stripped)
//!     → ForwarderFactory::forwarder(project.upstream_url)
//!     → Forwarder::forward(request)
//!         → pooled hyper client → upstream origin
//!     ← upstream response, verbatim
//! ```

pub mod forwarder;

pub use forwarder::{ForwardError, Forwarder, ForwarderFactory};
