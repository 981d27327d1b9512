//! Single-record client for the remote entity routes.
//!
//! Reads never fail on remote trouble: `fetch` yields `None` and `list` an
//! empty vector, with the cause logged. Writes report `RemoteUnavailable` or
//! `RemoteRejected`.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::throttle::{NoThrottle, Priority, Throttle};
use crate::transport::{send_bounded, HttpRequest, HttpResponse, HttpTransport, Method};
use dbal_sync_protocol::{
    error_message, extract_records, unwrap_data, Collection, EntityMapping, EntityRecord,
    TENANT_FIELD,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Translates `(collection, id, record)` into calls against the remote service.
pub struct EntitySyncClient {
    config: SyncConfig,
    mapping: Arc<EntityMapping>,
    transport: Arc<dyn HttpTransport>,
    throttle: Arc<dyn Throttle>,
}

impl EntitySyncClient {
    /// Creates a client without throttling.
    pub fn new(
        config: SyncConfig,
        mapping: Arc<EntityMapping>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            mapping,
            transport,
            throttle: Arc::new(NoThrottle),
        }
    }

    /// Routes every call through `throttle`.
    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The mapping table in use.
    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    /// Idempotent create-or-replace of one record.
    ///
    /// `id` and `tenantId` are injected into the body whatever `record` holds.
    pub async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        record: &EntityRecord,
    ) -> SyncResult<()> {
        self.put_record(collection, id, record, Priority::High)
            .await
            .inspect_err(|e| log_direct_failure("upsert", collection, e))
    }

    /// Upsert without direct-call logging; used by bulk pushes and resolutions.
    pub(crate) async fn put_record(
        &self,
        collection: Collection,
        id: &str,
        record: &EntityRecord,
        priority: Priority,
    ) -> SyncResult<()> {
        require_id(id)?;
        let path = self.path(collection, Some(id))?;
        self.admit(Method::Put, collection, priority)?;

        let body = record.with_scope(id, &self.config.tenant_id).to_value();
        let response = self
            .send(HttpRequest::new(Method::Put, path).with_body(body))
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(rejection(&response))
        }
    }

    /// Creates a record, letting the remote assign derived fields.
    pub async fn create(
        &self,
        collection: Collection,
        record: &EntityRecord,
    ) -> SyncResult<EntityRecord> {
        self.post_record(collection, record)
            .await
            .inspect_err(|e| log_direct_failure("create", collection, e))
    }

    async fn post_record(
        &self,
        collection: Collection,
        record: &EntityRecord,
    ) -> SyncResult<EntityRecord> {
        let path = self.path(collection, None)?;
        self.admit(Method::Post, collection, Priority::High)?;

        let sent = record
            .clone()
            .with(TENANT_FIELD, self.config.tenant_id.as_str());
        let response = self
            .send(HttpRequest::new(Method::Post, path).with_body(sent.to_value()))
            .await?;
        if !response.is_success() {
            return Err(rejection(&response));
        }
        match response.body {
            None => Ok(sent),
            Some(body) => EntityRecord::from_value(unwrap_data(body))
                .ok_or_else(|| SyncError::Decode("create response is not a record".into())),
        }
    }

    /// Fetches one record.
    ///
    /// Returns `Ok(None)` for 404 and for any remote failure. Errors are
    /// reserved for malformed arguments.
    pub async fn fetch(
        &self,
        collection: Collection,
        id: &str,
    ) -> SyncResult<Option<EntityRecord>> {
        require_id(id)?;
        let path = self.path(collection, Some(id))?;
        if self.admit(Method::Get, collection, Priority::Normal).is_err() {
            return Ok(None);
        }

        match self.send(HttpRequest::new(Method::Get, path)).await {
            Ok(response) if response.is_success() => {
                Ok(response.body.map(unwrap_data).and_then(EntityRecord::from_value))
            }
            Ok(response) if response.is_not_found() => {
                debug!(%collection, id, "record not found");
                Ok(None)
            }
            Ok(response) => {
                warn!(%collection, id, status = response.status, "fetch rejected");
                Ok(None)
            }
            Err(e) => {
                warn!(%collection, id, error = %e, "fetch failed, remote unavailable");
                Ok(None)
            }
        }
    }

    /// Lists a collection, optionally filtered by query pairs.
    ///
    /// Remote failures yield an empty vector. The only error is an unmapped
    /// collection.
    pub async fn list(
        &self,
        collection: Collection,
        query: &[(String, String)],
    ) -> SyncResult<Vec<EntityRecord>> {
        self.path(collection, None)?;

        match self.try_list(collection, query).await {
            Ok(records) => Ok(records),
            Err(SyncError::Throttled(_)) => Ok(Vec::new()),
            Err(SyncError::RemoteRejected { status, .. }) => {
                warn!(%collection, status, "list rejected");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(%collection, error = %e, "list failed, remote unavailable");
                Ok(Vec::new())
            }
        }
    }

    /// Like [`list`](Self::list), but reports remote failures instead of
    /// absorbing them.
    pub(crate) async fn try_list(
        &self,
        collection: Collection,
        query: &[(String, String)],
    ) -> SyncResult<Vec<EntityRecord>> {
        let path = self.path(collection, None)?;
        self.admit(Method::Get, collection, Priority::Normal)?;

        let response = self
            .send(HttpRequest::new(Method::Get, path).with_query(query))
            .await?;
        if response.is_success() {
            Ok(response
                .body
                .as_ref()
                .map(extract_records)
                .unwrap_or_default())
        } else {
            Err(rejection(&response))
        }
    }

    /// Deletes a record. A 404 counts as success.
    pub async fn remove(&self, collection: Collection, id: &str) -> SyncResult<()> {
        self.delete_record(collection, id)
            .await
            .inspect_err(|e| log_direct_failure("remove", collection, e))
    }

    async fn delete_record(&self, collection: Collection, id: &str) -> SyncResult<()> {
        require_id(id)?;
        let path = self.path(collection, Some(id))?;
        self.admit(Method::Delete, collection, Priority::High)?;

        let response = self.send(HttpRequest::new(Method::Delete, path)).await?;
        if response.is_success() || response.is_not_found() {
            Ok(())
        } else {
            Err(rejection(&response))
        }
    }

    fn path(&self, collection: Collection, id: Option<&str>) -> SyncResult<String> {
        Ok(self
            .mapping
            .entity_path(&self.config.tenant_id, collection, id)?)
    }

    fn admit(&self, method: Method, collection: Collection, priority: Priority) -> SyncResult<()> {
        let key = format!("{method}:{collection}");
        if self.throttle.try_acquire(&key, priority) {
            Ok(())
        } else {
            Err(SyncError::Throttled(key))
        }
    }

    async fn send(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        Ok(send_bounded(self.transport.as_ref(), request, self.config.request_timeout).await?)
    }
}

fn require_id(id: &str) -> SyncResult<()> {
    if id.is_empty() {
        Err(SyncError::InvalidArgument("entity id must not be empty".into()))
    } else {
        Ok(())
    }
}

pub(crate) fn rejection(response: &HttpResponse) -> SyncError {
    let message = response
        .body
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    SyncError::rejected(response.status, message)
}

fn log_direct_failure(operation: &str, collection: Collection, err: &SyncError) {
    match err {
        SyncError::RemoteRejected { status, message } => {
            error!(operation, %collection, status, message = %message, "remote rejected write");
        }
        SyncError::RemoteUnavailable(reason) => {
            warn!(operation, %collection, reason = %reason, "remote unavailable, working offline");
        }
        other => debug!(operation, %collection, error = %other, "write not sent"),
    }
}
