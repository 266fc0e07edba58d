//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0, addresses parse)
//! - Refuse to expose admin endpoints with a placeholder key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("upstream.forward_header: '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("upstream.forward_header_value: '{0}' is not a valid header value")]
    InvalidHeaderValue(String),

    #[error("hub.api_prefix: '{0}' must start with '/'")]
    InvalidApiPrefix(String),

    #[error("admin.api_key must be set when admin endpoints are enabled")]
    MissingAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let upstream = &config.upstream;
    if upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.connect_timeout_secs"));
    }
    if upstream.pool_idle_timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.pool_idle_timeout_secs"));
    }
    if HeaderName::from_bytes(upstream.forward_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(upstream.forward_header.clone()));
    }
    if HeaderValue::from_str(&upstream.forward_header_value).is_err() {
        errors.push(ValidationError::InvalidHeaderValue(
            upstream.forward_header_value.clone(),
        ));
    }

    let hub = &config.hub;
    if hub.subscriber_queue_capacity == 0 {
        errors.push(ValidationError::Zero("hub.subscriber_queue_capacity"));
    }
    if hub.command_queue_capacity == 0 {
        errors.push(ValidationError::Zero("hub.command_queue_capacity"));
    }
    if !hub.api_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidApiPrefix(hub.api_prefix.clone()));
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
