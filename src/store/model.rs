//! Tenant data model shared by the store, cache, and pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status value of a project that can receive traffic.
pub const ACTIVE_STATUS: &str = "active";

fn default_status() -> String {
    ACTIVE_STATUS.to_string()
}

fn default_enabled() -> bool {
    true
}

/// A tenant: maps a routing prefix to an upstream origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Owning identity; rules are looked up scoped to it.
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
    /// Routing key, always `/<segment>`.
    pub path_prefix: String,
    pub upstream_url: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

/// What a rule's value is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    /// Exact match on the client address.
    AddressBlock,
    /// Substring match on the request target (path + query).
    KeywordBlock,
    /// A kind this build does not understand.
    Other(String),
}

impl RuleKind {
    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::AddressBlock => "ip_block",
            RuleKind::KeywordBlock => "keyword_block",
            RuleKind::Other(kind) => kind,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RuleKind::Other(_))
    }
}

impl From<String> for RuleKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "ip_block" => RuleKind::AddressBlock,
            "keyword_block" => RuleKind::KeywordBlock,
            _ => RuleKind::Other(kind),
        }
    }
}

impl From<RuleKind> for String {
    fn from(kind: RuleKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant-scoped predicate that can reject a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    pub kind: RuleKind,
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}
