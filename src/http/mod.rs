//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers: trace, request id, identity)
//!         ├─ {api_prefix}/projects/{id}/logs → websocket.rs (log stream)
//!         └─ everything else                 → dispatch pipeline
//!     → Send to client
//! ```

pub mod request;
pub mod server;
pub mod websocket;

pub use request::{request_id_layers, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
