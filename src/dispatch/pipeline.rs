//! The per-request orchestrator.
//!
//! # Responsibilities
//! - Resolve the project for a prefix, cache first
//! - Resolve the project's rules, cache first
//! - Evaluate rules and reject before any upstream contact
//! - Rewrite the target and hand the request to the project's forwarder
//! - Report each step as a project event
//!
//! # Design Decisions
//! - Two racing misses for one key both query the store and both set the
//!   cache; the writes are idempotent so no single-flight is needed
//! - A rules lookup that started before a store reload can set the old rules
//!   after the reload cleared that key; they stay until the next clear for
//!   the project
//! - Store failures never populate the cache

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::Instrument;

use crate::cache::{ProjectCache, RuleCache};
use crate::config::UnknownRulePolicy;
use crate::dispatch::{prefix, RequestContext};
use crate::error::GatewayError;
use crate::observability::{metrics, EventEmitter};
use crate::security::firewall::{self, Inspection, Verdict};
use crate::store::{Project, ProjectStore, Rule, StoreChange};
use crate::upstream::ForwarderFactory;

/// Entry counts of the shadow caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub projects: usize,
    pub rules: usize,
}

pub struct Dispatcher {
    store: Arc<dyn ProjectStore>,
    projects: ProjectCache,
    rules: RuleCache,
    forwarders: ForwarderFactory,
    events: EventEmitter,
    unknown_rules: UnknownRulePolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        forwarders: ForwarderFactory,
        events: EventEmitter,
        unknown_rules: UnknownRulePolicy,
    ) -> Self {
        Self {
            store,
            projects: ProjectCache::new(),
            rules: RuleCache::new(),
            forwarders,
            events,
            unknown_rules,
        }
    }

    /// Run `request` through the pipeline. Never fails: errors become
    /// responses.
    pub async fn dispatch(&self, ctx: &RequestContext, request: Request<Body>) -> Response {
        let span = tracing::info_span!(
            "dispatch",
            request_id = %ctx.request_id,
            client = %ctx.client_addr,
        );

        match self.try_dispatch(ctx, request).instrument(span).await {
            Ok(response) => {
                metrics::record_request("forwarded");
                response
            }
            Err(err) => {
                metrics::record_request(err.kind());
                err.into_response()
            }
        }
    }

    async fn try_dispatch(
        &self,
        ctx: &RequestContext,
        mut request: Request<Body>,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path();
        let Some(prefix) = prefix::project_prefix(path).map(str::to_string) else {
            self.events.emit("", format!("No project prefix in path {path}"));
            return Err(GatewayError::NotFound(
                "project path prefix missing".to_string(),
            ));
        };

        let project = self.resolve_project(&prefix).await?;
        let rules = self.resolve_rules(&project).await?;

        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();
        self.check_rules(ctx, &project, &rules, &target)?;

        let rewritten = prefix::strip_prefix(&target, &prefix);
        let forwarder = self.forwarders.forwarder(&project.upstream_url)?;
        *request.uri_mut() = rewritten.parse::<Uri>().map_err(|e| {
            GatewayError::Internal(format!("rewritten target '{rewritten}' is invalid: {e}"))
        })?;
        self.events.emit(
            &project.id,
            format!(
                "Rewriting {} to {} for upstream {}",
                target,
                rewritten,
                forwarder.upstream()
            ),
        );

        match forwarder.forward(request).await {
            Ok(response) => {
                self.events.emit(
                    &project.id,
                    format!("Upstream {} responded {}", forwarder.upstream(), response.status()),
                );
                Ok(response)
            }
            Err(err) => {
                self.events
                    .emit(&project.id, format!("Forwarding failed: {err}"));
                Err(err.into())
            }
        }
    }

    async fn resolve_project(&self, prefix: &str) -> Result<Arc<Project>, GatewayError> {
        if let Some(project) = self.projects.get(prefix) {
            metrics::record_cache("project", true);
            self.events.emit(
                &project.id,
                format!("Project cache hit for {}: '{}'", prefix, project.name),
            );
            return Ok(project);
        }
        metrics::record_cache("project", false);

        let project = match self.store.project_by_prefix(prefix).await {
            Ok(project) if project.is_active() => Arc::new(project),
            Ok(project) => {
                self.events.emit(
                    "",
                    format!("Project '{}' for {} is {}", project.id, prefix, project.status),
                );
                return Err(GatewayError::NotFound(format!("project '{prefix}' not found")));
            }
            Err(err) => {
                self.events
                    .emit("", format!("No project for prefix {prefix}: {err}"));
                return Err(GatewayError::NotFound(format!("project '{prefix}' not found")));
            }
        };

        self.projects.set(prefix.to_string(), project.clone());
        self.events.emit(
            &project.id,
            format!(
                "Project cache miss for {}: loaded '{}' with upstream {}",
                prefix, project.name, project.upstream_url
            ),
        );
        Ok(project)
    }

    async fn resolve_rules(&self, project: &Project) -> Result<Arc<Vec<Rule>>, GatewayError> {
        if let Some(rules) = self.rules.get(&project.id) {
            metrics::record_cache("rules", true);
            self.events.emit(
                &project.id,
                format!("Rule cache hit: {} rules for '{}'", rules.len(), project.name),
            );
            return Ok(rules);
        }
        metrics::record_cache("rules", false);

        let rules = self
            .store
            .rules_for_project(project.owner.as_deref(), &project.id)
            .await
            .map_err(|err| {
                self.events.emit(
                    &project.id,
                    format!("Failed to load rules for '{}': {}", project.name, err),
                );
                GatewayError::Internal(format!(
                    "failed to get rules for project '{}'",
                    project.name
                ))
            })?;

        let rules = Arc::new(rules);
        self.rules.set(project.id.clone(), rules.clone());
        self.events.emit(
            &project.id,
            format!(
                "Rule cache miss: loaded {} rules for '{}'",
                rules.len(),
                project.name
            ),
        );
        Ok(rules)
    }

    fn check_rules(
        &self,
        ctx: &RequestContext,
        project: &Project,
        rules: &[Rule],
        target: &str,
    ) -> Result<(), GatewayError> {
        let inspection = Inspection {
            client_addr: &ctx.client_addr,
            target,
        };
        let decision = firewall::evaluate(rules, &inspection, self.unknown_rules);

        for rule in &decision.skipped {
            tracing::warn!(rule = %rule.id, kind = %rule.kind, "Unknown rule kind skipped");
            self.events.emit(
                &project.id,
                format!("Unknown rule kind '{}' in rule {}, skipped", rule.kind, rule.id),
            );
        }

        match decision.verdict {
            Verdict::Allow => Ok(()),
            Verdict::Block(rule) => {
                self.events.emit(
                    &project.id,
                    format!(
                        "Blocked {} {} by rule {} ({} '{}')",
                        ctx.client_addr, target, rule.id, rule.kind, rule.value
                    ),
                );
                Err(GatewayError::Forbidden("blocked by firewall".to_string()))
            }
            Verdict::Misconfigured(rule) => {
                self.events.emit(
                    &project.id,
                    format!("Rule {} has unknown kind '{}', rejecting", rule.id, rule.kind),
                );
                Err(GatewayError::Internal(format!(
                    "rule {} has unsupported kind '{}'",
                    rule.id, rule.kind
                )))
            }
        }
    }

    /// Drop the cached project for `prefix`. True if an entry existed.
    pub fn invalidate_project(&self, prefix: &str) -> bool {
        self.projects.clear(prefix)
    }

    /// Drop the cached rules for `project_id`. True if an entry existed.
    pub fn invalidate_rules(&self, project_id: &str) -> bool {
        self.rules.clear(project_id)
    }

    /// Clear every key touched by a store reload. Returns entries removed.
    pub fn apply_change(&self, change: &StoreChange) -> usize {
        let projects = change
            .prefixes
            .iter()
            .filter(|prefix| self.invalidate_project(prefix))
            .count();
        let rules = change
            .project_ids
            .iter()
            .filter(|id| self.invalidate_rules(id))
            .count();
        tracing::info!(projects, rules, "Cache entries invalidated");
        projects + rules
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            projects: self.projects.len(),
            rules: self.rules.len(),
        }
    }
}
