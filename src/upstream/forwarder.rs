//! Reverse-proxy forwarding to a project's upstream.
//!
//! # Responsibilities
//! - Own one pooled HTTP client shared by every upstream
//! - Turn an upstream base URL into a [`Forwarder`]
//! - Rewrite scheme/authority/path of outbound requests
//! - Tag forwarded requests with the identifying header
//!
//! # Design Decisions
//! - No retries: a failed exchange surfaces once as a bad gateway
//! - Hop-by-hop headers are dropped on both legs; everything else passes unchanged
//! - Only `http` upstreams; TLS origination is not handled here

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwarding failures.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream base URL cannot be used. A configuration problem.
    #[error("invalid upstream '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    /// The forwarding header in configuration is unusable.
    #[error("invalid forwarding header: {0}")]
    InvalidHeader(String),

    /// The exchange with the upstream failed.
    #[error("upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },
}

/// Creates forwarders that share one connection pool.
#[derive(Clone)]
pub struct ForwarderFactory {
    client: Client<HttpConnector, Body>,
    header_name: HeaderName,
    header_value: HeaderValue,
}

impl ForwarderFactory {
    /// Build the pooled client from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ForwardError> {
        let header_name = HeaderName::from_bytes(config.forward_header.as_bytes())
            .map_err(|e| ForwardError::InvalidHeader(e.to_string()))?;
        let header_value = HeaderValue::from_str(&config.forward_header_value)
            .map_err(|e| ForwardError::InvalidHeader(e.to_string()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_keepalive(Some(Duration::from_secs(config.keepalive_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Ok(Self {
            client,
            header_name,
            header_value,
        })
    }

    /// A forwarder for `upstream`. Fails only if the URL is unusable.
    pub fn forwarder(&self, upstream: &str) -> Result<Forwarder, ForwardError> {
        let invalid = |reason: String| ForwardError::InvalidUpstream {
            url: upstream.to_string(),
            reason,
        };

        let base = Url::parse(upstream).map_err(|e| invalid(e.to_string()))?;
        if base.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        if base.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Forwarder {
            client: self.client.clone(),
            base,
            header_name: self.header_name.clone(),
            header_value: self.header_value.clone(),
        })
    }
}

/// Forwards requests to a single upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    base: Url,
    header_name: HeaderName,
    header_value: HeaderValue,
}

impl Forwarder {
    /// The upstream base URL.
    pub fn upstream(&self) -> &Url {
        &self.base
    }

    /// Outbound URI for an already rewritten `path_and_query`.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, ForwardError> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let mut target = format!(
            "{}://{}{}",
            self.base.scheme(),
            authority(&self.base),
            join_paths(self.base.path(), path)
        );
        match (self.base.query(), query) {
            (Some(base), Some(req)) if !base.is_empty() && !req.is_empty() => {
                target.push('?');
                target.push_str(base);
                target.push('&');
                target.push_str(req);
            }
            (Some(q), _) | (_, Some(q)) if !q.is_empty() => {
                target.push('?');
                target.push_str(q);
            }
            _ => {}
        }

        target.parse().map_err(|e: axum::http::uri::InvalidUri| {
            ForwardError::InvalidUpstream {
                url: self.base.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Send `request` upstream and return the upstream's response, minus its
    /// hop-by-hop headers.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = self.target_uri(path_and_query)?;

        let mut builder = Request::builder().method(parts.method).uri(uri.clone());
        if let Some(headers) = builder.headers_mut() {
            copy_end_to_end(&parts.headers, headers);
            headers.append(self.header_name.clone(), self.header_value.clone());
        }
        let outbound = builder
            .body(body)
            .map_err(|e| ForwardError::Upstream {
                url: uri.to_string(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        match self.client.request(outbound).await {
            Ok(response) => {
                let status = response.status();
                tracing::debug!(upstream = %uri, status = %status, "Response from upstream");
                metrics::record_upstream(status.as_u16(), start);
                Ok(end_to_end_response(response.map(Body::new)))
            }
            Err(e) => {
                tracing::warn!(upstream = %uri, error = %e, "Upstream request failed");
                metrics::record_upstream(502, start);
                Err(ForwardError::Upstream {
                    url: uri.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Join two path pieces with exactly one slash between them.
pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Copy every header except hop-by-hop ones, including any named in `Connection`.
fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    let listed: Vec<String> = from
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();

    for (name, value) in from {
        if HOP_BY_HOP.contains(&name.as_str()) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

fn end_to_end_response<B>(response: Response<B>) -> Response<B> {
    let (mut parts, body) = response.into_parts();
    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    copy_end_to_end(&parts.headers, &mut headers);
    parts.headers = headers;
    Response::from_parts(parts, body)
}
