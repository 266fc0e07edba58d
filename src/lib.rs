//! Multi-tenant request gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────────┐
//!                        │                     TENANT GATEWAY                       │
//!                        │                                                          │
//!   Client Request       │  ┌─────────┐    ┌──────────────────────────────┐         │
//!   ─────────────────────┼─▶│  http   │───▶│        dispatch pipeline     │         │
//!                        │  │ server  │    │ prefix → project → rules →   │         │
//!                        │  └────┬────┘    │ firewall → rewrite           │         │
//!                        │       │         └──┬───────────┬───────────┬───┘         │
//!                        │       │            │           │           │             │
//!                        │       │      ┌─────▼────┐ ┌────▼────┐ ┌────▼─────┐       │
//!                        │       │      │  cache   │ │  store  │ │ upstream │───────┼──▶ Tenant
//!                        │       │      └──────────┘ └─────────┘ └──────────┘       │    Origin
//!                        │       │             events │                             │
//!   Log subscriber       │  ┌────▼──────┐     ┌──────▼──────┐                       │
//!   ◀────────────────────┼──│ websocket │◀────│     hub     │                       │
//!                        │  └───────────┘     └─────────────┘                       │
//!                        │                                                          │
//!                        │  config · observability · lifecycle · admin · security   │
//!                        └──────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod hub;
pub mod store;
pub mod upstream;

// Cross-cutting concerns
pub mod admin;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
