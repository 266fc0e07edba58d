//! In-memory store seeded from a TOML file.
//!
//! # Responsibilities
//! - Parse `[[projects]]` / `[[rules]]` seed data
//! - Reject data the pipeline must never see (unknown rule kinds, clashing
//!   prefixes, non-http upstreams, orphan rules)
//! - Swap the whole snapshot atomically on reload and report which keys changed
//!
//! # Design Decisions
//! - Readers take a lock-free `arc-swap` snapshot; a reload never blocks lookups
//! - A failed reload keeps the previous snapshot
//! - Replacements are serialized, so each reported change is the diff against
//!   the snapshot it actually replaced

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::store::model::{Project, Rule};
use crate::store::{ProjectStore, StoreError};

/// Raw seed file contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    pub projects: Vec<Project>,
    pub rules: Vec<Rule>,
}

impl StoreSeed {
    pub fn from_toml(content: &str) -> Result<Self, StoreError> {
        toml::from_str(content).map_err(|e| StoreError::Invalid(e.to_string()))
    }
}

/// Cache keys whose backing rows changed in a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    /// Prefixes to clear from the project cache.
    pub prefixes: Vec<String>,
    /// Project ids to clear from the rule cache.
    pub project_ids: Vec<String>,
}

impl StoreChange {
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.project_ids.is_empty()
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    by_prefix: HashMap<String, Project>,
    by_id: HashMap<String, Project>,
    rules: HashMap<String, Vec<Rule>>,
}

impl Snapshot {
    fn build(seed: StoreSeed) -> Result<Self, StoreError> {
        let mut snapshot = Snapshot::default();

        for project in seed.projects {
            validate_prefix(&project.path_prefix)?;
            validate_upstream(&project)?;

            if project.is_active() {
                if let Some(existing) = snapshot.by_prefix.get(&project.path_prefix) {
                    return Err(StoreError::Invalid(format!(
                        "prefix {} is used by both '{}' and '{}'",
                        project.path_prefix, existing.id, project.id
                    )));
                }
                snapshot
                    .by_prefix
                    .insert(project.path_prefix.clone(), project.clone());
            }

            if snapshot.by_id.insert(project.id.clone(), project.clone()).is_some() {
                return Err(StoreError::Invalid(format!(
                    "duplicate project id '{}'",
                    project.id
                )));
            }
        }

        for rule in seed.rules {
            if !rule.kind.is_known() {
                return Err(StoreError::Invalid(format!(
                    "rule '{}' has unknown kind '{}'",
                    rule.id, rule.kind
                )));
            }
            if rule.value.is_empty() {
                return Err(StoreError::Invalid(format!("rule '{}' has an empty value", rule.id)));
            }
            if !snapshot.by_id.contains_key(&rule.project_id) {
                return Err(StoreError::Invalid(format!(
                    "rule '{}' references unknown project '{}'",
                    rule.id, rule.project_id
                )));
            }
            snapshot
                .rules
                .entry(rule.project_id.clone())
                .or_default()
                .push(rule);
        }

        Ok(snapshot)
    }

    /// Keys whose values differ between `self` and `next`.
    fn diff(&self, next: &Snapshot) -> StoreChange {
        let prefixes: BTreeSet<&String> =
            self.by_prefix.keys().chain(next.by_prefix.keys()).collect();
        let ids: BTreeSet<&String> = self
            .by_id
            .keys()
            .chain(next.by_id.keys())
            .chain(self.rules.keys())
            .chain(next.rules.keys())
            .collect();

        StoreChange {
            prefixes: prefixes
                .into_iter()
                .filter(|p| self.by_prefix.get(*p) != next.by_prefix.get(*p))
                .cloned()
                .collect(),
            project_ids: ids
                .into_iter()
                .filter(|id| {
                    self.by_id.get(*id) != next.by_id.get(*id)
                        || self.rules.get(*id) != next.rules.get(*id)
                })
                .cloned()
                .collect(),
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), StoreError> {
    let segment = prefix.strip_prefix('/').unwrap_or_default();
    if segment.is_empty() || segment.contains('/') {
        return Err(StoreError::Invalid(format!(
            "path prefix '{prefix}' must be a single segment like '/name'"
        )));
    }
    Ok(())
}

fn validate_upstream(project: &Project) -> Result<(), StoreError> {
    let url = url::Url::parse(&project.upstream_url).map_err(|e| {
        StoreError::Invalid(format!(
            "project '{}' upstream '{}': {e}",
            project.id, project.upstream_url
        ))
    })?;
    if url.scheme() != "http" || url.host_str().is_none() {
        return Err(StoreError::Invalid(format!(
            "project '{}' upstream '{}' must be an http:// URL",
            project.id, project.upstream_url
        )));
    }
    Ok(())
}

/// A [`ProjectStore`] holding validated seed data in memory.
pub struct MemoryStore {
    path: Option<PathBuf>,
    snapshot: ArcSwap<Snapshot>,
    replacing: Mutex<()>,
}

impl MemoryStore {
    /// Build a store from already parsed seed data.
    pub fn from_seed(seed: StoreSeed) -> Result<Self, StoreError> {
        Ok(Self {
            path: None,
            snapshot: ArcSwap::from_pointee(Snapshot::build(seed)?),
            replacing: Mutex::new(()),
        })
    }

    /// Build a store from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, StoreError> {
        Self::from_seed(StoreSeed::from_toml(content)?)
    }

    /// Load a store from a seed file. The path is remembered for [`reload`](Self::reload).
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self::from_seed(read_seed(path)?)?;
        store.path = Some(path.to_path_buf());
        tracing::info!(
            path = %path.display(),
            projects = store.project_count(),
            "Project store loaded"
        );
        Ok(store)
    }

    /// Path of the seed file, if the store was loaded from one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the seed file and swap in the new data.
    pub fn reload(&self) -> Result<StoreChange, StoreError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| StoreError::Invalid("store was not loaded from a file".into()))?;
        self.replace(read_seed(path)?)
    }

    /// Replace the whole data set, returning the keys that changed.
    pub fn replace(&self, seed: StoreSeed) -> Result<StoreChange, StoreError> {
        let next = Snapshot::build(seed)?;
        let _guard = self.replacing.lock();
        let change = self.snapshot.load().diff(&next);
        self.snapshot.store(Arc::new(next));
        Ok(change)
    }

    /// Number of projects, active or not.
    pub fn project_count(&self) -> usize {
        self.snapshot.load().by_id.len()
    }
}

fn read_seed(path: &Path) -> Result<StoreSeed, StoreError> {
    let content = fs::read_to_string(path)
        .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))?;
    StoreSeed::from_toml(&content)
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn project_by_prefix(&self, prefix: &str) -> Result<Project, StoreError> {
        self.snapshot
            .load()
            .by_prefix
            .get(prefix)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("project for prefix '{prefix}'")))
    }

    async fn rules_for_project(
        &self,
        owner: Option<&str>,
        project_id: &str,
    ) -> Result<Vec<Rule>, StoreError> {
        let snapshot = self.snapshot.load();
        let project = snapshot
            .by_id
            .get(project_id)
            .filter(|p| p.owner.as_deref() == owner)
            .ok_or_else(|| StoreError::NotFound(format!("project '{project_id}'")))?;
        tracing::trace!(project_id = %project.id, "Serving rules from memory store");

        Ok(snapshot.rules.get(project_id).cloned().unwrap_or_default())
    }
}
