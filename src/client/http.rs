use super::{ApiClient, ApiRequest, AuthContext, ClientFactory, HttpMethod};
use crate::config::{ApiConfig, Credentials, TENANT_PLACEHOLDER};
use crate::error::{MigrationError, Result};
use crate::metrics;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// REST client for one worker, with its own connection pool
pub struct HttpApiClient {
    http: Client,
    config: ApiConfig,
}

impl HttpApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(MigrationError::Config("API host is required".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| MigrationError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Credentials for the given auth context. Target requests fail when no
    /// target environment is configured.
    pub fn credentials(&self, auth: AuthContext) -> Result<&Credentials> {
        match auth {
            AuthContext::Source => Ok(&self.config.source),
            AuthContext::Target => self.config.target.as_ref().ok_or_else(|| {
                MigrationError::Config("Target credentials are not configured".to_string())
            }),
        }
    }

    /// Host URL with `${tenant}` substituted and no trailing slash
    pub fn base_url(&self, auth: AuthContext) -> Result<String> {
        let tenant = &self.credentials(auth)?.tenant;
        Ok(self
            .config
            .host
            .replace(TENANT_PLACEHOLDER, tenant)
            .trim_end_matches('/')
            .to_string())
    }

    pub fn url_for(&self, request: &ApiRequest) -> Result<String> {
        let base = self.base_url(request.auth)?;
        if request.endpoint.starts_with('/') {
            Ok(format!("{}{}", base, request.endpoint))
        } else {
            Ok(format!("{}/{}", base, request.endpoint))
        }
    }
}

impl ApiClient for HttpApiClient {
    fn call(&self, request: &ApiRequest) -> Result<Value> {
        request.validate()?;

        let credentials = self.credentials(request.auth)?;
        let url = self.url_for(request)?;
        debug!("{} {} ({:?})", request.method, url, request.auth);

        let builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Put => self.http.put(&url),
            HttpMethod::Post => self.http.post(&url),
        };
        let builder = builder
            .header("accessKey", &credentials.access_key)
            .header("secretKey", &credentials.secret_key)
            .header("X-Tenant", &credentials.tenant);
        let builder = match &request.payload {
            Some(payload) => builder.json(payload),
            None => builder,
        };

        let started = Instant::now();
        let response = builder.send().map_err(|e| {
            MigrationError::Http(format!("{} {} failed: {}", request.method, request.endpoint, e))
        })?;
        let status = response.status();
        metrics::record_api_request(request.method.as_str(), status.as_u16(), started.elapsed());

        let body = response.text().map_err(|e| {
            MigrationError::Http(format!(
                "Failed to read response body for {} {}: {}",
                request.method, request.endpoint, e
            ))
        })?;

        if !status.is_success() {
            debug!(
                "{} {} returned {}",
                request.method,
                request.endpoint,
                status.as_u16()
            );
            return Err(MigrationError::Api {
                method: request.method.to_string(),
                endpoint: request.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Creates a fresh [`HttpApiClient`] for each worker
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    config: ApiConfig,
}

impl HttpClientFactory {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HttpApiClient;

    fn create(&self) -> Result<HttpApiClient> {
        HttpApiClient::new(self.config.clone())
    }
}
