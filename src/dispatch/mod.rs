//! Request dispatch pipeline.
//!
//! # Data Flow
//! ```text
//! Request + RequestContext
//!     → prefix.rs     first path segment ("/proj-a")
//!     → pipeline.rs   project (cache → store) → rules (cache → store)
//!                     → firewall::evaluate → rewrite target → Forwarder
//!     → Response (upstream's, or a GatewayError body)
//! ```
//!
//! Each decision point emits an event for the project's live log stream.

pub mod context;
pub mod pipeline;
pub mod prefix;

pub use context::RequestContext;
pub use pipeline::{CacheStats, Dispatcher};
