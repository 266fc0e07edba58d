//! Caller identity.
//!
//! Identity is optional: the middleware attaches an [`Identity`] to the
//! request extensions when the provider recognises the caller, and never
//! rejects on its own. Handlers that need one decide what a missing identity
//! means.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Resolves the caller behind a request.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Bearer tokens mapped to subjects, from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// `None` when there are no tokens, so no provider gets installed.
    pub fn from_config(tokens: &HashMap<String, String>) -> Option<Arc<dyn IdentityProvider>> {
        if tokens.is_empty() {
            None
        } else {
            Some(Arc::new(Self::new(tokens.clone())))
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is
/// case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn identify(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        self.tokens.get(token).map(|subject| Identity {
            subject: subject.clone(),
        })
    }
}

/// Attach the caller's [`Identity`], if any, to the request.
pub async fn identity_middleware(
    State(provider): State<Option<Arc<dyn IdentityProvider>>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(provider) = provider {
        if let Some(identity) = provider.identify(req.headers()) {
            tracing::debug!(subject = %identity.subject, "Request authenticated");
            req.extensions_mut().insert(identity);
        }
    }
    next.run(req).await
}
