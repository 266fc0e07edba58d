//! Project and rule storage.
//!
//! The gateway never owns tenant data: it reads projects and rules through the
//! [`ProjectStore`] trait and keeps only a shadow of them in the caches.
//!
//! # Data Flow
//! ```text
//! projects.toml
//!     → memory.rs (parse, validate kinds/prefixes/upstreams, atomic snapshot swap)
//!     → ProjectStore::project_by_prefix / rules_for_project
//!     → dispatch pipeline (cache-first)
//!
//! On file change:
//!     watcher.rs → MemoryStore::reload → StoreChange → cache invalidation
//! ```

pub mod memory;
pub mod model;
pub mod watcher;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryStore, StoreChange, StoreSeed};
pub use model::{Project, Rule, RuleKind};
pub use watcher::StoreWatcher;

/// Errors returned by a [`ProjectStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No matching project, or the caller does not own it.
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Seed data failed validation.
    #[error("invalid store data: {0}")]
    Invalid(String),
}

/// The lookups the dispatch pipeline needs from the authoritative store.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Resolve the active project routed under `prefix` (e.g. `/shop`).
    async fn project_by_prefix(&self, prefix: &str) -> Result<Project, StoreError>;

    /// Rules of `project_id` in evaluation order, scoped to `owner`.
    async fn rules_for_project(
        &self,
        owner: Option<&str>,
        project_id: &str,
    ) -> Result<Vec<Rule>, StoreError>;
}
