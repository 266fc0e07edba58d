//! Broadcast hub for live per-project log streams.
//!
//! # Data Flow
//! ```text
//! Request tasks ──broadcast──┐
//! WebSocket tasks ─register──┼──▶ command queue ──▶ Hub task (owns subscriber sets)
//!               ─unregister──┘                          │
//!                                                       ▼
//!                                      per-subscriber bounded queue ──▶ write pump
//! ```
//!
//! # Design Decisions
//! - One task owns all subscriber state; everyone else sends commands
//! - Producers never wait: a full subscriber queue evicts that subscriber
//! - A project entry exists only while it has subscribers

pub mod broker;
pub mod subscriber;

pub use broker::{BroadcastEvent, Hub, HubError, HubHandle, HubStats};
pub use subscriber::{coalesce, SubscriberId, Subscription};
