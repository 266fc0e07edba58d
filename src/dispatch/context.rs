use std::net::IpAddr;

use crate::security::Identity;

/// Per-request data the pipeline needs besides the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    /// Peer address without port, IPv4-mapped addresses shown as IPv4.
    pub client_addr: String,
    pub identity: Option<Identity>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, client: IpAddr) -> Self {
        Self {
            request_id: request_id.into(),
            client_addr: client.to_canonical().to_string(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }
}
