use crate::error::{MigrationError, Result};
use serde_json::Value;
use std::fmt;

mod http;

pub use http::{HttpApiClient, HttpClientFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which environment's credentials and tenant a request is sent with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthContext {
    #[default]
    Source,
    Target,
}

/// One REST call against the source or target environment
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub payload: Option<Value>,
    pub auth: AuthContext,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            endpoint: endpoint.into(),
            payload: None,
            auth: AuthContext::Source,
        }
    }

    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            endpoint: endpoint.into(),
            payload: Some(payload),
            auth: AuthContext::Source,
        }
    }

    pub fn put(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            endpoint: endpoint.into(),
            payload: Some(payload),
            auth: AuthContext::Source,
        }
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = auth;
        self
    }

    /// Reject requests that can never succeed before they hit the network
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(MigrationError::Validation("Endpoint cannot be empty".to_string()));
        }
        if matches!(self.method, HttpMethod::Put | HttpMethod::Post) && self.payload.is_none() {
            return Err(MigrationError::Validation(format!(
                "A JSON payload is required for {} requests",
                self.method
            )));
        }
        Ok(())
    }
}

/// Blocking REST client used by item processors.
///
/// Instances are never shared between workers; each worker gets its own
/// from a [`ClientFactory`].
pub trait ApiClient {
    fn call(&self, request: &ApiRequest) -> Result<Value>;

    fn get(&self, endpoint: &str, auth: AuthContext) -> Result<Value> {
        self.call(&ApiRequest::get(endpoint).with_auth(auth))
    }

    fn post(&self, endpoint: &str, payload: Value, auth: AuthContext) -> Result<Value> {
        self.call(&ApiRequest::post(endpoint, payload).with_auth(auth))
    }
}

/// Builds an independent client per worker from shared, read-only settings
pub trait ClientFactory: Sync {
    type Client: ApiClient;

    fn create(&self) -> Result<Self::Client>;
}
