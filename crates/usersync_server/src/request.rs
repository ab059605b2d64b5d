//! Transport-neutral inbound requests and responses.

use axum::http::Method;
use serde_json::Value;
use std::collections::HashMap;

/// An inbound HTTP request, as seen by the sync core.
///
/// Header names are stored lowercase.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Request method.
    pub method: Method,
    /// Request path, without query string.
    pub path: String,
    /// Headers, keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
    /// Socket peer address, if known.
    pub remote_addr: Option<String>,
}

impl InboundRequest {
    /// Creates a request with no headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            remote_addr: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the socket peer address.
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Looks up a header (case-insensitive). Empty values count as absent.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// A response produced by the sync core.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    /// HTTP status.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl ServerResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Serializes a 200 response.
    pub fn ok<T: serde::Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self::new(200, value),
            Err(e) => crate::error::ServerError::Internal(e.to_string()).into(),
        }
    }
}

impl From<crate::error::ServerError> for ServerResponse {
    fn from(err: crate::error::ServerError) -> Self {
        let status = err.status();
        let body = serde_json::to_value(err.to_body()).unwrap_or(Value::Null);
        Self::new(status, body)
    }
}
