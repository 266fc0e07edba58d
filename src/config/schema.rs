//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream connection pool and forwarding settings.
    pub upstream: UpstreamConfig,

    /// Log broadcast hub settings.
    pub hub: HubConfig,

    /// Rule evaluation settings.
    pub firewall: FirewallConfig,

    /// Project/rule seed store.
    pub store: StoreConfig,

    /// Optional static identity provider.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// TCP keepalive interval in seconds.
    pub keepalive_secs: u64,

    /// How long an idle pooled connection is kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per upstream host.
    pub pool_max_idle_per_host: usize,

    /// Header added to every forwarded request.
    pub forward_header: String,

    /// Value of the forwarding header.
    pub forward_header_value: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keepalive_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 100,
            forward_header: "x-mini-ngfw".to_string(),
            forward_header_value: "true".to_string(),
        }
    }
}

/// Broadcast hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HubConfig {
    /// Prefix of the log stream endpoint: `<api_prefix>/projects/{id}/logs`.
    pub api_prefix: String,

    /// Outbound queue capacity of each subscriber.
    pub subscriber_queue_capacity: usize,

    /// Capacity of the hub's command queue.
    pub command_queue_capacity: usize,

    /// Origins allowed to open a log stream. Empty allows any origin.
    pub allowed_origins: Vec<String>,

    /// Reject log stream upgrades from callers without an identity.
    pub require_identity: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api/v1".to_string(),
            subscriber_queue_capacity: 256,
            command_queue_capacity: 1024,
            allowed_origins: Vec::new(),
            require_identity: false,
        }
    }
}

impl HubConfig {
    /// Route of the log stream endpoint in axum path syntax.
    pub fn logs_route(&self) -> String {
        format!(
            "{}/projects/{{project_id}}/logs",
            self.api_prefix.trim_end_matches('/')
        )
    }
}

/// What the pipeline does with a rule whose kind it does not recognise.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRulePolicy {
    /// Log a warning and continue with the next rule.
    #[default]
    Skip,
    /// Treat it as a server misconfiguration and fail the request.
    Reject,
}

/// Rule evaluation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FirewallConfig {
    pub unknown_rule_policy: UnknownRulePolicy,
}

/// Seed store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the TOML file holding projects and rules.
    pub path: String,

    /// Reload the file (and invalidate cached entries) when it changes.
    pub watch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "projects.toml".to_string(),
            watch: true,
        }
    }
}

/// Static bearer token identities.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Token -> subject.
    pub tokens: HashMap<String, String>,
}

/// Log output shape.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

/// Placeholder key shipped in defaults; validation refuses to run admin with it.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
