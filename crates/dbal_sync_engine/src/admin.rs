//! Admin/control plane of the remote service.
//!
//! Every call is a single request with no retry. The bearer token is meant
//! for server-side callers and is never required by the entity routes.

use crate::client::rejection;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{send_bounded, HttpRequest, HttpResponse, HttpTransport, Method};
use dbal_sync_protocol::{
    error_message, unwrap_data, AdapterConfig, AdapterInfo, AdapterRequest, ConnectionTest,
    HealthStatus, SeedRequest, SeedSummary,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Client for `/health` and the `/admin/*` routes.
pub struct AdminClient {
    config: SyncConfig,
    transport: Arc<dyn HttpTransport>,
}

impl AdminClient {
    /// Creates an admin client.
    pub fn new(config: SyncConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// `GET /health`. Needs no token.
    pub async fn health(&self) -> SyncResult<HealthStatus> {
        let response = self.call(HttpRequest::new(Method::Get, "/health")).await?;
        decode(expect_success(response)?)
    }

    /// `GET /admin/config`: the active adapter, password redacted.
    pub async fn config(&self) -> SyncResult<AdapterConfig> {
        let response = self.admin(Method::Get, "/admin/config", None).await?;
        decode(unwrap_data(expect_success(response)?))
    }

    /// `GET /admin/adapters`.
    pub async fn adapters(&self) -> SyncResult<Vec<AdapterInfo>> {
        let response = self.admin(Method::Get, "/admin/adapters", None).await?;
        let body = expect_success(response)?;
        match body {
            Value::Object(mut map) => decode(map.remove("data").unwrap_or(Value::Null)),
            other => decode(other),
        }
    }

    /// `POST /admin/test-connection`.
    ///
    /// A 422 is a failed test, not an error.
    pub async fn test_connection(
        &self,
        adapter: &str,
        database_url: &str,
    ) -> SyncResult<ConnectionTest> {
        let body = adapter_body(adapter, database_url)?;
        let response = self
            .admin(Method::Post, "/admin/test-connection", Some(body))
            .await?;

        if response.status == 422 {
            let message = response
                .body
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| "connection failed".into());
            return Ok(ConnectionTest {
                success: false,
                message,
            });
        }

        let body = expect_success(response)?;
        Ok(ConnectionTest {
            success: body.get("success").and_then(Value::as_bool).unwrap_or(true),
            message: error_message(&body).unwrap_or_default(),
        })
    }

    /// `POST /admin/config`: switches the active adapter.
    ///
    /// Returns the remote confirmation message.
    pub async fn switch_adapter(&self, adapter: &str, database_url: &str) -> SyncResult<String> {
        let body = adapter_body(adapter, database_url)?;
        let response = self.admin(Method::Post, "/admin/config", Some(body)).await?;
        let body = expect_success(response)?;
        let message =
            error_message(&body).unwrap_or_else(|| format!("Switched to {adapter} adapter"));
        info!(adapter, "adapter switched");
        Ok(message)
    }

    /// `POST /admin/seed`.
    pub async fn seed(&self, request: &SeedRequest) -> SyncResult<SeedSummary> {
        let body = serde_json::to_value(request)?;
        let response = self.admin(Method::Post, "/admin/seed", Some(body)).await?;

        if !response.is_success() {
            // A failed seed still reports per-entity errors.
            let detail = response
                .body
                .as_ref()
                .and_then(|b| SeedSummary::from_body(b).ok())
                .map(|s| {
                    s.errors
                        .into_iter()
                        .chain(s.results.into_iter().flat_map(|r| r.errors))
                        .collect::<Vec<_>>()
                })
                .filter(|errors| !errors.is_empty());
            let err = match detail {
                Some(errors) => SyncError::rejected(response.status, errors.join("; ")),
                None => rejection(&response),
            };
            error!(error = %err, "seed failed");
            return Err(err);
        }

        let summary = SeedSummary::from_body(response.body.as_ref().unwrap_or(&Value::Null))?;
        info!(
            inserted = summary.total_inserted,
            skipped = summary.total_skipped,
            failed = summary.total_failed,
            "seed complete"
        );
        Ok(summary)
    }

    async fn admin(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> SyncResult<HttpResponse> {
        let token = self
            .config
            .admin_token
            .as_deref()
            .ok_or(SyncError::AdminTokenMissing)?;
        let mut request = HttpRequest::new(method, path).with_bearer(token);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.call(request).await
    }

    async fn call(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        let path = request.path.clone();
        send_bounded(self.transport.as_ref(), request, self.config.request_timeout)
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "admin call failed, remote unavailable");
                SyncError::from(e)
            })
    }
}

fn adapter_body(adapter: &str, database_url: &str) -> SyncResult<Value> {
    if adapter.is_empty() || database_url.is_empty() {
        return Err(SyncError::InvalidArgument(
            "adapter and database url are required".into(),
        ));
    }
    Ok(serde_json::to_value(AdapterRequest {
        adapter: adapter.to_string(),
        database_url: database_url.to_string(),
    })?)
}

fn expect_success(response: HttpResponse) -> SyncResult<Value> {
    if response.is_success() {
        Ok(response.body.unwrap_or(Value::Null))
    } else {
        let err = rejection(&response);
        error!(error = %err, "admin call rejected");
        Err(err)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> SyncResult<T> {
    Ok(serde_json::from_value(value)?)
}
