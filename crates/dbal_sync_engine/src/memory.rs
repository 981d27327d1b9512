//! In-memory remote service.
//!
//! Serves the tenant-scoped entity routes and the admin routes with the same
//! envelopes as the real daemon, so the client and admin plane can be
//! exercised without a network. Can be switched offline, made slow, or told
//! to fail specific paths.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use async_trait::async_trait;
use dbal_sync_protocol::{redact_database_url, EntityRecord, ID_FIELD};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const ADAPTERS: [(&str, &str); 13] = [
    ("sqlite", "SQLite (embedded)"),
    ("postgres", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mongodb", "MongoDB"),
    ("redis", "Redis (cache layer)"),
    ("elasticsearch", "Elasticsearch (search)"),
    ("cassandra", "Apache Cassandra"),
    ("surrealdb", "SurrealDB"),
    ("supabase", "Supabase"),
    ("prisma", "Prisma (ORM bridge)"),
    ("dynamodb", "AWS DynamoDB"),
    ("cockroachdb", "CockroachDB"),
    ("tidb", "TiDB"),
];

const SUPPORTED_ADAPTERS: [&str; 4] = ["sqlite", "postgres", "mysql", "mongodb"];

const DEFAULT_SEED_DIR: &str = "/app/seeds";

type EntityKey = (String, String, String);

#[derive(Debug)]
struct RemoteState {
    entities: BTreeMap<EntityKey, BTreeMap<String, EntityRecord>>,
    adapter: String,
    database_url: String,
    unreachable_databases: Vec<String>,
    seeds: Vec<(EntityKey, Vec<EntityRecord>)>,
    failures: Vec<(String, u16, String)>,
}

/// An in-memory stand-in for the remote data-access service.
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    requests: Mutex<Vec<HttpRequest>>,
    admin_token: Option<String>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Creates an empty, online remote on the `sqlite` adapter with the admin API disabled.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState {
                entities: BTreeMap::new(),
                adapter: "sqlite".into(),
                database_url: "sqlite:///var/lib/dbal/dbal.db".into(),
                unreachable_databases: Vec::new(),
                seeds: Vec::new(),
                failures: Vec::new(),
            }),
            requests: Mutex::new(Vec::new()),
            admin_token: None,
            offline: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    /// Enables the admin API behind `token`.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Registers seed records loaded by `POST /admin/seed`.
    pub fn with_seed(
        self,
        tenant: &str,
        package: &str,
        entity_type: &str,
        records: Vec<EntityRecord>,
    ) -> Self {
        self.state
            .lock()
            .seeds
            .push((key(tenant, package, entity_type), records));
        self
    }

    /// Makes connection tests and adapter switches to `database_url` fail.
    pub fn with_unreachable_database(self, database_url: impl Into<String>) -> Self {
        self.state
            .lock()
            .unreachable_databases
            .push(database_url.into());
        self
    }

    /// Simulates a network outage.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delays every response.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Answers every request whose path starts with `prefix` with `status`.
    pub fn fail_path(&self, prefix: impl Into<String>, status: u16, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .push((prefix.into(), status, message.into()));
    }

    /// Removes every [`fail_path`](Self::fail_path) rule.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Stores a record directly, bypassing the routes.
    pub fn insert(&self, tenant: &str, package: &str, entity_type: &str, record: EntityRecord) {
        let id = record.id().unwrap_or_default().to_string();
        self.state
            .lock()
            .entities
            .entry(key(tenant, package, entity_type))
            .or_default()
            .insert(id, record);
    }

    /// Returns one stored record.
    pub fn entity(
        &self,
        tenant: &str,
        package: &str,
        entity_type: &str,
        id: &str,
    ) -> Option<EntityRecord> {
        self.state
            .lock()
            .entities
            .get(&key(tenant, package, entity_type))
            .and_then(|records| records.get(id).cloned())
    }

    /// Returns every stored record of one entity type, in id order.
    pub fn entities(&self, tenant: &str, package: &str, entity_type: &str) -> Vec<EntityRecord> {
        self.state
            .lock()
            .entities
            .get(&key(tenant, package, entity_type))
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The active adapter and its unredacted URL.
    pub fn adapter(&self) -> (String, String) {
        let state = self.state.lock();
        (state.adapter.clone(), state.database_url.clone())
    }

    /// Every request received so far, including those refused while offline.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let segments: Vec<String> = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["health"]) => {
                HttpResponse::json(200, json!({"status": "healthy", "service": "dbal"}))
            }
            (_, ["admin", route]) => self.admin(request, route),
            (Method::Get, [tenant, package, entity]) => {
                self.list(key(tenant, package, entity), &request.query)
            }
            (Method::Post, [tenant, package, entity]) => {
                self.create(key(tenant, package, entity), request.body.as_ref())
            }
            (Method::Get, [tenant, package, entity, id]) => {
                self.get(&key(tenant, package, entity), id)
            }
            (Method::Put, [tenant, package, entity, id]) => {
                self.put(key(tenant, package, entity), id, request.body.as_ref())
            }
            (Method::Delete, [tenant, package, entity, id]) => {
                self.delete(&key(tenant, package, entity), id)
            }
            _ => error(404, "Not found"),
        }
    }

    fn list(&self, key: EntityKey, query: &[(String, String)]) -> HttpResponse {
        let state = self.state.lock();
        let mut page = 1usize;
        let mut limit = None;
        let mut filters = Vec::new();
        for (k, v) in query {
            match k.as_str() {
                "page" => page = v.parse::<usize>().unwrap_or(1).max(1),
                "limit" => limit = v.parse::<usize>().ok(),
                _ => filters.push((k, v)),
            }
        }

        let matching: Vec<Value> = state
            .entities
            .get(&key)
            .into_iter()
            .flat_map(|records| records.values())
            .filter(|r| {
                filters.iter().all(|(k, v)| match r.get(k) {
                    Some(Value::String(s)) => s == *v,
                    Some(other) => other.to_string() == **v,
                    None => false,
                })
            })
            .map(EntityRecord::to_value)
            .collect();

        let total = matching.len();
        let limit = limit.unwrap_or(total.max(1));
        let data: Vec<Value> = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        HttpResponse::json(
            200,
            json!({
                "success": true,
                "data": {"data": data, "total": total, "page": page, "limit": limit}
            }),
        )
    }

    fn create(&self, key: EntityKey, body: Option<&Value>) -> HttpResponse {
        let Some(mut record) = body.cloned().and_then(EntityRecord::from_value) else {
            return error(400, "Request body must be a JSON object");
        };
        let id = match record.id() {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.insert(ID_FIELD, id.as_str());
                id
            }
        };
        let mut state = self.state.lock();
        let records = state.entities.entry(key).or_default();
        if records.contains_key(&id) {
            return error(409, "Entity already exists");
        }
        records.insert(id, record.clone());
        HttpResponse::json(201, json!({"success": true, "data": record}))
    }

    fn get(&self, key: &EntityKey, id: &str) -> HttpResponse {
        match self
            .state
            .lock()
            .entities
            .get(key)
            .and_then(|records| records.get(id))
        {
            Some(record) => HttpResponse::json(200, json!({"success": true, "data": record})),
            None => error(404, "Entity not found"),
        }
    }

    fn put(&self, key: EntityKey, id: &str, body: Option<&Value>) -> HttpResponse {
        let Some(record) = body.cloned().and_then(EntityRecord::from_value) else {
            return error(400, "Request body must be a JSON object");
        };
        let record = record.with(ID_FIELD, id);
        self.state
            .lock()
            .entities
            .entry(key)
            .or_default()
            .insert(id.to_string(), record.clone());
        HttpResponse::json(200, json!({"success": true, "data": record}))
    }

    fn delete(&self, key: &EntityKey, id: &str) -> HttpResponse {
        let removed = self
            .state
            .lock()
            .entities
            .get_mut(key)
            .and_then(|records| records.remove(id));
        match removed {
            Some(_) => HttpResponse::json(200, json!({"success": true, "data": {"deleted": true}})),
            None => error(404, "Entity not found"),
        }
    }

    fn admin(&self, request: &HttpRequest, route: &str) -> HttpResponse {
        let Some(token) = &self.admin_token else {
            return error(403, "Admin API disabled: DBAL_ADMIN_TOKEN not set");
        };
        if request.bearer.as_deref() != Some(token.as_str()) {
            return error(401, "Unauthorized");
        }

        match (request.method, route) {
            (Method::Get, "config") => {
                let state = self.state.lock();
                HttpResponse::json(
                    200,
                    json!({"success": true, "data": {
                        "adapter": state.adapter,
                        "database_url": redact_database_url(&state.database_url),
                        "status": "connected"
                    }}),
                )
            }
            (Method::Get, "adapters") => {
                let state = self.state.lock();
                let adapters: Vec<Value> = ADAPTERS
                    .iter()
                    .map(|(name, description)| {
                        json!({
                            "name": name,
                            "description": description,
                            "supported": SUPPORTED_ADAPTERS.contains(name),
                            "active": *name == state.adapter
                        })
                    })
                    .collect();
                HttpResponse::json(200, json!({"success": true, "data": adapters}))
            }
            (Method::Post, "config") => self.switch_adapter(request.body.as_ref()),
            (Method::Post, "test-connection") => self.test_connection(request.body.as_ref()),
            (Method::Post, "seed") => self.seed(request.body.as_ref()),
            _ => error(404, "Not found"),
        }
    }

    fn adapter_request(body: Option<&Value>) -> Result<(String, String), HttpResponse> {
        let field = |name: &str| {
            body.and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let (Some(adapter), Some(url)) = (field("adapter"), field("database_url")) else {
            return Err(error(400, "Both 'adapter' and 'database_url' are required"));
        };
        if !SUPPORTED_ADAPTERS.contains(&adapter.as_str()) {
            return Err(error(400, &format!("Unsupported adapter type: {adapter}")));
        }
        Ok((adapter, url))
    }

    fn switch_adapter(&self, body: Option<&Value>) -> HttpResponse {
        let (adapter, url) = match Self::adapter_request(body) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        let mut state = self.state.lock();
        if state.unreachable_databases.contains(&url) {
            return error(500, "Failed to switch adapter: connection refused");
        }
        state.adapter = adapter.clone();
        state.database_url = url;
        HttpResponse::json(
            200,
            json!({"success": true, "message": format!("Switched to {adapter} adapter")}),
        )
    }

    fn test_connection(&self, body: Option<&Value>) -> HttpResponse {
        let (adapter, url) = match Self::adapter_request(body) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        if self.state.lock().unreachable_databases.contains(&url) {
            return error(422, "Connection failed: connection refused");
        }
        HttpResponse::json(
            200,
            json!({"success": true, "message": format!("Connection to {adapter} successful")}),
        )
    }

    fn seed(&self, body: Option<&Value>) -> HttpResponse {
        let force = body
            .and_then(|b| b.get("force"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let seed_dir = body
            .and_then(|b| b.get("seed_dir"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SEED_DIR)
            .to_string();

        let mut state = self.state.lock();
        let seeds = state.seeds.clone();
        let mut results = Vec::new();
        let (mut inserted, mut skipped, mut failed) = (0u64, 0u64, 0u64);

        for (key, records) in seeds {
            let entity = key.2.clone();
            let stored = state.entities.entry(key).or_default();
            let (mut ins, mut skip, mut fail, mut errors) = (0u64, 0u64, 0u64, Vec::new());
            for record in records {
                match record.id() {
                    None => {
                        fail += 1;
                        errors.push(format!("{entity}: record without id"));
                    }
                    Some(id) if stored.contains_key(id) && !force => skip += 1,
                    Some(id) => {
                        stored.insert(id.to_string(), record.clone());
                        ins += 1;
                    }
                }
            }
            inserted += ins;
            skipped += skip;
            failed += fail;
            results.push(json!({
                "entity": entity, "inserted": ins, "skipped": skip, "failed": fail, "errors": errors
            }));
        }

        let status = if inserted == 0 && failed > 0 { 500 } else { 200 };
        HttpResponse::json(
            status,
            json!({
                "success": status == 200,
                "data": {
                    "total_inserted": inserted,
                    "total_skipped": skipped,
                    "total_failed": failed,
                    "seed_dir": seed_dir,
                    "force": force,
                    "results": results
                }
            }),
        )
    }
}

fn key(tenant: &str, package: &str, entity_type: &str) -> EntityKey {
    (tenant.to_string(), package.to_string(), entity_type.to_string())
}

fn error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, json!({"success": false, "error": message}))
}

#[async_trait]
impl HttpTransport for MemoryRemote {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("connection refused".into()));
        }

        let failure = self
            .state
            .lock()
            .failures
            .iter()
            .find(|(prefix, _, _)| request.path.starts_with(prefix.as_str()))
            .map(|(_, status, message)| error(*status, message));
        if let Some(response) = failure {
            return Ok(response);
        }

        Ok(self.route(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(remote: &MemoryRemote, request: HttpRequest) -> HttpResponse {
        remote.send(request).await.unwrap()
    }

    #[tokio::test]
    async fn entity_routes() {
        let remote = MemoryRemote::new();
        let put = HttpRequest::new(Method::Put, "/t1/core/File/f%201")
            .with_body(json!({"content": "a"}));
        assert_eq!(call(&remote, put).await.status, 200);

        let got = call(&remote, HttpRequest::new(Method::Get, "/t1/core/File/f%201")).await;
        assert_eq!(got.body.unwrap()["data"]["id"], json!("f 1"));

        let listed = call(&remote, HttpRequest::new(Method::Get, "/t1/core/File")).await;
        assert_eq!(listed.body.unwrap()["data"]["total"], json!(1));

        let other_tenant = call(&remote, HttpRequest::new(Method::Get, "/t2/core/File")).await;
        assert_eq!(other_tenant.body.unwrap()["data"]["total"], json!(0));

        let del = HttpRequest::new(Method::Delete, "/t1/core/File/f%201");
        assert_eq!(call(&remote, del.clone()).await.status, 200);
        assert_eq!(call(&remote, del).await.status, 404);
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let remote = MemoryRemote::new();
        for i in 0..5 {
            let record = EntityRecord::new()
                .with("id", format!("m{i}"))
                .with("kind", if i % 2 == 0 { "even" } else { "odd" });
            remote.insert("t1", "core", "Model", record);
        }
        let req = HttpRequest::new(Method::Get, "/t1/core/Model").with_query(&[
            ("kind".into(), "even".into()),
            ("limit".into(), "2".into()),
            ("page".into(), "2".into()),
        ]);
        let body = call(&remote, req).await.body.unwrap();
        assert_eq!(body["data"]["total"], json!(3));
        assert_eq!(body["data"]["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["data"][0]["id"], json!("m4"));
    }

    #[tokio::test]
    async fn huge_page_is_empty() {
        let remote = MemoryRemote::new();
        remote.insert("t1", "core", "Model", EntityRecord::new().with("id", "m1"));
        let req = HttpRequest::new(Method::Get, "/t1/core/Model").with_query(&[
            ("limit".into(), "50".into()),
            ("page".into(), usize::MAX.to_string()),
        ]);
        let body = call(&remote, req).await.body.unwrap();
        assert_eq!(body["data"]["total"], json!(1));
        assert!(body["data"]["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_requires_token() {
        let disabled = MemoryRemote::new();
        let res = call(&disabled, HttpRequest::new(Method::Get, "/admin/config")).await;
        assert_eq!(res.status, 403);

        let remote = MemoryRemote::new().with_admin_token("tok");
        let res = call(&remote, HttpRequest::new(Method::Get, "/admin/config")).await;
        assert_eq!(res.status, 401);
        let res = call(
            &remote,
            HttpRequest::new(Method::Get, "/admin/config").with_bearer("tok"),
        )
        .await;
        assert_eq!(res.status, 200);

        let health = call(&remote, HttpRequest::new(Method::Get, "/health")).await;
        assert_eq!(health.body.unwrap()["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn offline_and_failures() {
        let remote = MemoryRemote::new();
        remote.fail_path("/t1/core/Theme", 503, "maintenance");
        let res = call(&remote, HttpRequest::new(Method::Get, "/t1/core/Theme")).await;
        assert_eq!(res.status, 503);

        remote.set_offline(true);
        let err = remote
            .send(HttpRequest::new(Method::Get, "/health"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert_eq!(remote.requests().len(), 2);
    }
}
