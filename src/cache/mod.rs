//! Process-local shadow caches of store data.
//!
//! # Data Flow
//! ```text
//! dispatch pipeline
//!     → ProjectCache::get(prefix)      miss → store → set
//!     → RuleCache::get(project_id)     miss → store → set
//!
//! store change (watcher / admin endpoint)
//!     → clear(key) on the affected entries
//! ```
//!
//! # Design Decisions
//! - No TTL and no eviction: entries live until explicitly cleared. The key
//!   space is bounded by the tenant count; an unbounded tenant set would need
//!   an eviction policy here.
//! - Values are `Arc`s so a hit is a pointer clone under a read lock.

pub mod shadow;

use std::sync::Arc;

use crate::store::{Project, Rule};

pub use shadow::ShadowCache;

/// Path prefix → project.
pub type ProjectCache = ShadowCache<String, Arc<Project>>;

/// Project id → rules in evaluation order.
pub type RuleCache = ShadowCache<String, Arc<Vec<Rule>>>;
