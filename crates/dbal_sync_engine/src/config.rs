//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Default remote service URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
/// Default tenant.
pub const DEFAULT_TENANT: &str = "default";

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the remote data-access service.
    pub base_url: String,
    /// Tenant every entity route is scoped to.
    pub tenant_id: String,
    /// Bearer token for the admin plane. Server-side callers only.
    pub admin_token: Option<String>,
    /// Upper bound for a single request, connection included.
    pub request_timeout: Duration,
    /// Upper bound for establishing a connection.
    pub connect_timeout: Duration,
    /// Maximum in-flight upserts during a bulk push.
    pub push_concurrency: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            admin_token: None,
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            push_concurrency: 8,
        }
    }

    /// Reads the configuration from `DBAL_*` environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DBAL_BASE_URL` | `http://localhost:8080` |
    /// | `DBAL_TENANT_ID` | `default` |
    /// | `DBAL_ADMIN_TOKEN` | unset |
    /// | `DBAL_TIMEOUT_SECS` | 15 |
    /// | `DBAL_PUSH_CONCURRENCY` | 8 |
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(
            var("DBAL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            var("DBAL_TENANT_ID").unwrap_or_else(|| DEFAULT_TENANT.to_string()),
        );
        config.admin_token = var("DBAL_ADMIN_TOKEN");

        if let Some(raw) = var("DBAL_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| SyncError::Config(format!("DBAL_TIMEOUT_SECS: {raw}")))?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = var("DBAL_PUSH_CONCURRENCY") {
            let n: usize = raw
                .trim()
                .parse()
                .map_err(|_| SyncError::Config(format!("DBAL_PUSH_CONCURRENCY: {raw}")))?;
            config = config.with_push_concurrency(n);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the values a transport cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.tenant_id.is_empty() {
            return Err(SyncError::Config("tenant id is empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the tenant.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Sets the admin bearer token.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the bulk push concurrency. Zero is treated as one.
    pub fn with_push_concurrency(mut self, concurrency: usize) -> Self {
        self.push_concurrency = concurrency.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TENANT)
    }
}
