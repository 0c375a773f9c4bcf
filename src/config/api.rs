use serde::{Deserialize, Serialize};

/// Placeholder substituted with the tenant name in `ApiConfig::host`
pub const TENANT_PLACEHOLDER: &str = "${tenant}";

const REDACTED: &str = "********";

/// Connection settings shared by every worker's API client.
///
/// The host may contain `${tenant}`, which is replaced by the source or
/// target tenant depending on the request's auth context.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://${tenant}.example.app`
    pub host: String,

    /// Credentials used for reads against the source environment
    pub source: Credentials,

    /// Credentials used for writes against the target environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Credentials>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    /// Usually supplied through `CATALOG_MIGRATE__API__<ENV>__ACCESS_KEY`
    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    pub tenant: String,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            tenant: tenant.into(),
        }
    }

    pub(crate) fn redact(&mut self) {
        self.access_key = REDACTED.to_string();
        self.secret_key = REDACTED.to_string();
    }

    pub(crate) fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.access_key.trim().is_empty() {
            missing.push("access_key");
        }
        if self.secret_key.trim().is_empty() {
            missing.push("secret_key");
        }
        if self.tenant.trim().is_empty() {
            missing.push("tenant");
        }
        missing
    }
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, source: Credentials) -> Self {
        Self {
            host: host.into(),
            source,
            target: None,
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_target(mut self, target: Credentials) -> Self {
        self.target = Some(target);
        self
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("catalog-migrate/{}", env!("CARGO_PKG_VERSION"))
}
