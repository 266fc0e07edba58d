//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (attach caller identity, never rejects)
//!     → dispatch pipeline
//!         → firewall.rs (per-project rules: address / keyword block)
//!     → Forward, or reject with 403
//! ```
//!
//! # Design Decisions
//! - Rule evaluation is pure; reporting lives in the pipeline
//! - Identity is advisory on the proxy path, enforced on the log stream

pub mod firewall;
pub mod identity;

pub use firewall::{evaluate, Decision, Inspection, Verdict};
pub use identity::{identity_middleware, Identity, IdentityProvider, StaticTokenProvider};
