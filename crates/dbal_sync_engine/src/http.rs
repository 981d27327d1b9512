//! HTTP transport over `reqwest`.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use async_trait::async_trait;

const TENANT_HEADER: &str = "X-Tenant-ID";

/// Production transport for the remote data-access service.
///
/// Bodies are JSON; every request carries the tenant header. Any HTTP status
/// is returned as a response, only network failures become errors.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    tenant_id: String,
}

impl ReqwestTransport {
    /// Builds a client with the configured connect and request timeouts.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(base_url = %config.base_url, tenant = %config.tenant_id, "http transport ready");

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            tenant_id: config.tenant_id.clone(),
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::TimedOut
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), self.url(&request.path))
            .header(TENANT_HEADER, &self.tenant_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(classify)?;

        // Non-JSON bodies (HTML error pages from proxies) are dropped.
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        Ok(HttpResponse { status, body })
    }
}
