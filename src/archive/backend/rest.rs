//! PostgREST table backend
//!
//! Talks to a hosted Postgres table through its REST gateway
//! (`{url}/rest/v1/{table}`), the dialect served by Supabase. Filters are
//! encoded as query parameters (`owner_id=eq.u1`, `title=ilike.*flu*`,
//! `order=saved_at.desc`). Requests carry the project key as `apikey` and
//! the user's access token as a bearer token, so row-level security on the
//! server applies on top of the explicit owner filters.
//!
//! The change feed polls the subscribed rows on a fixed interval and emits
//! [`TableChange::Refreshed`] whenever the response body changes.

use super::{cell_contains, Filter, Query, Row, TableBackend, TableChange};
use crate::config::CloudConfig;
use crate::error::{ArchiveResult, MedibotError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 16;

/// Columns hashed by the change poller
const FINGERPRINT_COLUMNS: &str = "id,title,saved_at,message_count";

type FeedKey = (String, Vec<Filter>);

struct RestInner {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl RestInner {
    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let mut req = req;
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key.as_str());
        }
        match self.access_token.as_ref().or(self.api_key.as_ref()) {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Fetch a snapshot of the scoped rows and hash it
    async fn fingerprint(&self, table: &str, scope: &[Filter]) -> ArchiveResult<u64> {
        let mut params = vec![
            ("select".to_string(), FINGERPRINT_COLUMNS.to_string()),
            ("order".to_string(), "id.asc".to_string()),
        ];
        params.extend(filter_params(scope));
        let req = self.client.get(self.table_url(table)).query(&params);
        let body = read_body(self.authorize(req).send().await).await?;
        let mut hasher = DefaultHasher::new();
        body.hash(&mut hasher);
        Ok(hasher.finish())
    }
}

/// Table backend speaking PostgREST over HTTP
///
/// # Examples
///
/// ```no_run
/// use medibot::archive::backend::RestTableBackend;
/// use medibot::config::CloudConfig;
/// use std::time::Duration;
///
/// let config = CloudConfig {
///     url: Some("https://project.supabase.co".to_string()),
///     api_key: Some("public-anon-key".to_string()),
///     access_token: None,
///     timeout_seconds: 30,
/// };
/// let backend = RestTableBackend::new(&config, Duration::from_secs(5)).unwrap();
/// ```
pub struct RestTableBackend {
    inner: Arc<RestInner>,
    poll_interval: Duration,
    feeds: Mutex<HashMap<FeedKey, broadcast::Sender<TableChange>>>,
}

impl RestTableBackend {
    /// Create a backend for the configured project
    ///
    /// # Errors
    ///
    /// Returns `Config` if `url` is missing and `StorageUnavailable` if the
    /// HTTP client cannot be built
    pub fn new(config: &CloudConfig, poll_interval: Duration) -> ArchiveResult<Self> {
        let base_url = config
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| MedibotError::Config("cloud.url is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("medibot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                MedibotError::StorageUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!("Initialized cloud table backend: url={}", base_url);

        Ok(Self {
            inner: Arc::new(RestInner {
                client,
                base_url,
                api_key: config.api_key.clone(),
                access_token: config.access_token.clone(),
            }),
            poll_interval,
            feeds: Mutex::new(HashMap::new()),
        })
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.inner.authorize(
            self.inner
                .client
                .request(method, self.inner.table_url(table)),
        )
    }

    fn spawn_poller(&self, (table, scope): FeedKey, tx: broadcast::Sender<TableChange>) {
        let inner = Arc::clone(&self.inner);
        let period = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut last: Option<u64> = None;
            loop {
                ticker.tick().await;
                if tx.receiver_count() == 0 {
                    tracing::debug!("Change feed for {} has no subscribers; stopping", table);
                    break;
                }
                match inner.fingerprint(&table, &scope).await {
                    Ok(current) => {
                        if last.is_some_and(|prev| prev != current) {
                            let _ = tx.send(TableChange::Refreshed);
                        }
                        last = Some(current);
                    }
                    Err(e) => tracing::warn!("Polling {} failed: {}", table, e),
                }
            }
        });
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

/// ILIKE pattern body for a literal substring
///
/// `%`, `_` and `\` are backslash-escaped. PostgREST turns every `*` into
/// `%` and offers no escape for it, so `*` is sent as the one-character
/// wildcard `_` and the returned rows are re-checked after the select.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len());
    for c in needle.chars() {
        match c {
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            c => pattern.push(c),
        }
    }
    pattern
}

async fn read_body(sent: reqwest::Result<Response>) -> ArchiveResult<String> {
    let response = sent.map_err(|e| MedibotError::StoreRead(format!("Request failed: {}", e)))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| MedibotError::StoreRead(format!("Failed to read response: {}", e)))?;
    if !status.is_success() {
        tracing::error!("Table backend returned error {}: {}", status, body);
        return Err(MedibotError::StoreRead(format!("{}: {}", status, body)));
    }
    Ok(body)
}

async fn write_response(sent: reqwest::Result<Response>) -> ArchiveResult<Vec<Row>> {
    let response = sent.map_err(|e| MedibotError::StoreWrite(format!("Request failed: {}", e)))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| MedibotError::StoreWrite(format!("Failed to read response: {}", e)))?;
    if !status.is_success() {
        tracing::error!("Table backend rejected write {}: {}", status, body);
        return Err(MedibotError::StoreWrite(format!("{}: {}", status, body)));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&body)
        .map_err(|e| MedibotError::StoreWrite(format!("Unexpected write response: {}", e)))
}

#[async_trait]
impl TableBackend for RestTableBackend {
    async fn insert(&self, table: &str, row: Row) -> ArchiveResult<()> {
        tracing::debug!("POST {} row", table);
        let sent = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await;
        write_response(sent).await?;
        Ok(())
    }

    async fn select(&self, table: &str, query: &Query) -> ArchiveResult<Vec<Row>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        if let Some((column, needle)) = &query.ilike {
            params.push((column.clone(), format!("ilike.*{}*", like_pattern(needle))));
        }
        if let Some(order) = &query.order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        tracing::debug!("GET {} with {:?}", table, params);

        let sent = self
            .request(reqwest::Method::GET, table)
            .query(&params)
            .send()
            .await;
        let body = read_body(sent).await?;
        let mut rows: Vec<Row> = serde_json::from_str(&body)
            .map_err(|e| MedibotError::StoreRead(format!("Unexpected select response: {}", e)))?;
        if let Some((column, needle)) = &query.ilike {
            rows.retain(|row| cell_contains(row, column, needle));
        }
        Ok(rows)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> ArchiveResult<usize> {
        tracing::debug!("PATCH {} where {:?}", table, filters);
        let sent = self
            .request(reqwest::Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch)
            .send()
            .await;
        Ok(write_response(sent).await?.len())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> ArchiveResult<usize> {
        tracing::debug!("DELETE {} where {:?}", table, filters);
        let sent = self
            .request(reqwest::Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .send()
            .await;
        Ok(write_response(sent).await?.len())
    }

    async fn subscribe(
        &self,
        table: &str,
        scope: &[Filter],
    ) -> ArchiveResult<broadcast::Receiver<TableChange>> {
        let key: FeedKey = (table.to_string(), scope.to_vec());
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds.retain(|_, tx| tx.receiver_count() > 0);
        if let Some(tx) = feeds.get(&key) {
            return Ok(tx.subscribe());
        }

        let (tx, rx) = broadcast::channel(CHANGE_CAPACITY);
        feeds.insert(key.clone(), tx.clone());
        self.spawn_poller(key, tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> RestTableBackend {
        let config = CloudConfig {
            url: Some(format!("{}/", server.uri())),
            api_key: Some("anon-key".to_string()),
            access_token: Some("user-token".to_string()),
            timeout_seconds: 5,
        };
        RestTableBackend::new(&config, Duration::from_millis(20)).unwrap()
    }

    #[test]
    fn test_new_requires_url() {
        let err = RestTableBackend::new(&CloudConfig::default(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, MedibotError::Config(_)));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("flu"), "flu");
        assert_eq!(like_pattern("flu_1"), "flu\\_1");
        assert_eq!(like_pattern("50%"), "50\\%");
        assert_eq!(like_pattern("a\\b"), "a\\\\b");
        assert_eq!(like_pattern("c*ld"), "c_ld");
    }

    #[tokio::test]
    async fn test_select_encodes_filters_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("owner_id", "eq.u1"))
            .and(query_param("title", "ilike.*flu*"))
            .and(query_param("order", "saved_at.desc"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "id": "a", "title": "Flu" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows = backend_for(&server)
            .select(
                "saved_chats",
                &Query::new()
                    .eq("owner_id", "u1")
                    .ilike("title", "flu")
                    .order_desc("saved_at"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_conflict_is_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/saved_chats"))
            .and(body_json(json!({ "id": "a" })))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
            .mount(&server)
            .await;

        let row = json!({ "id": "a" }).as_object().unwrap().clone();
        let err = backend_for(&server)
            .insert("saved_chats", row)
            .await
            .unwrap_err();
        assert!(matches!(err, MedibotError::StoreWrite(_)));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[tokio::test]
    async fn test_delete_counts_returned_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("id", "eq.a"))
            .and(query_param("owner_id", "eq.u1"))
            .and(header("prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a" }])))
            .mount(&server)
            .await;

        let deleted = backend_for(&server)
            .delete(
                "saved_chats",
                &[Filter::eq("id", "a"), Filter::eq("owner_id", "u1")],
            )
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_select_server_error_is_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .select("saved_chats", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MedibotError::StoreRead(_)));
    }

    #[tokio::test]
    async fn test_select_needle_underscore_is_literal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("title", "ilike.*flu\\_1*"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "id": "a", "title": "Flu_1 follow-up" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rows = backend_for(&server)
            .select("saved_chats", &Query::new().ilike("title", "flu_1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_select_needle_star_is_rechecked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("title", "ilike.*c_ld*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "a", "title": "C*LD notes" },
                { "id": "b", "title": "Cold" }
            ])))
            .mount(&server)
            .await;

        let rows = backend_for(&server)
            .select("saved_chats", &Query::new().ilike("title", "c*ld"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");
    }

    #[tokio::test]
    async fn test_requests_use_configured_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = CloudConfig {
            url: Some(server.uri()),
            api_key: None,
            access_token: None,
            timeout_seconds: 1,
        };
        let backend = RestTableBackend::new(&config, Duration::from_secs(60)).unwrap();
        let err = backend
            .select("saved_chats", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MedibotError::StoreRead(_)));
    }

    #[tokio::test]
    async fn test_poller_emits_on_snapshot_change() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("owner_id", "eq.u1"))
            .and(query_param("select", "id,title,saved_at,message_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/saved_chats"))
            .and(query_param("owner_id", "eq.u1"))
            .and(query_param("select", "id,title,saved_at,message_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a" }])))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let mut rx = backend
            .subscribe("saved_chats", &[Filter::eq("owner_id", "u1")])
            .await
            .unwrap();
        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no change emitted")
            .unwrap();
        assert_eq!(change, TableChange::Refreshed);
    }
}
