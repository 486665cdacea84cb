/// HTTP transport to an OpenSearch-compatible cluster
use super::sigv4::{self, AwsCredentials, SigningRequest};
use super::{
    BulkItemResult, BulkResponse, ClusterHealth, ClusterInfo, HealthStatus, SearchBackend,
    SearchError, SearchHit, SearchResponse,
};
use crate::document::IndexDocument;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Where and how to connect
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub verify_certs: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Host header value as the HTTP client will send it
    fn host_header(&self) -> String {
        let default_port = if self.use_tls { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Request authentication
#[derive(Debug, Clone)]
pub enum AuthMode {
    None,
    Basic { username: String, password: String },
    AwsSigV4 {
        region: String,
        service: String,
        credentials: AwsCredentials,
    },
}

/// [`SearchBackend`] over HTTP
pub struct OpenSearchClient {
    http: reqwest::Client,
    config: TransportConfig,
    auth: AuthMode,
}

impl OpenSearchClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `config` - Host, port, TLS and timeout
    /// * `auth` - Authentication applied to every request
    pub fn new(config: TransportConfig, auth: AuthMode) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.use_tls && !config.verify_certs)
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        Ok(Self { http, config, auth })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<(Vec<u8>, &'static str)>,
    ) -> Result<(StatusCode, Value), SearchError> {
        let path = if segments.is_empty() {
            "/".to_string()
        } else {
            segments
                .iter()
                .map(|s| sigv4::uri_encode(s))
                .fold(String::new(), |acc, s| acc + "/" + &s)
        };
        let mut url = format!("{}{}", self.config.base_url(), path);
        if !query.is_empty() {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{}={}", sigv4::uri_encode(k), sigv4::uri_encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{}?{}", url, qs);
        }

        let payload = body.as_ref().map(|(b, _)| b.as_slice()).unwrap_or(&[]);
        let mut request = self.http.request(method.clone(), &url);

        match &self.auth {
            AuthMode::None => {}
            AuthMode::Basic { username, password } => {
                request = request.basic_auth(username, Some(password));
            }
            AuthMode::AwsSigV4 {
                region,
                service,
                credentials,
            } => {
                let host = self.config.host_header();
                let signing = SigningRequest {
                    method: method.as_str(),
                    host: &host,
                    path: &path,
                    query,
                    payload,
                };
                let headers = sigv4::sign(credentials, region, service, &signing, Utc::now())?;
                for (name, value) in headers {
                    request = request.header(name, value);
                }
            }
        }

        if let Some((bytes, content_type)) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes);
        }

        debug!("{} {}", method, path);
        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, value))
    }

    /// Send and treat any non-2xx status as a rejection
    async fn send_ok(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<(Vec<u8>, &'static str)>,
    ) -> Result<Value, SearchError> {
        let (status, value) = self.send(method, segments, query, body).await?;
        if status.is_success() {
            Ok(value)
        } else {
            Err(rejection(status, &value))
        }
    }
}

fn json_body(value: &Value) -> Result<Option<(Vec<u8>, &'static str)>, SearchError> {
    let bytes = serde_json::to_vec(value).map_err(|e| SearchError::Decode(e.to_string()))?;
    Ok(Some((bytes, "application/json")))
}

fn rejection(status: StatusCode, body: &Value) -> SearchError {
    let reason = body
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| body.get("error").map(|e| e.to_string()))
        .unwrap_or_else(|| body.to_string());
    SearchError::Rejected {
        status: status.as_u16(),
        reason,
    }
}

/// NDJSON body: one `index` action line and one source line per document
pub(crate) fn encode_bulk(index: &str, docs: &[IndexDocument]) -> Result<Vec<u8>, SearchError> {
    let mut out = Vec::new();
    for doc in docs {
        let action = json!({"index": {"_index": index, "_id": doc.id}});
        serde_json::to_writer(&mut out, &action).map_err(|e| SearchError::Decode(e.to_string()))?;
        out.push(b'\n');
        serde_json::to_writer(&mut out, &doc.source)
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Parse a `_bulk` response body
pub(crate) fn parse_bulk_response(body: &Value) -> Result<BulkResponse, SearchError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Decode("bulk response has no items".to_string()))?;

    let items = items
        .iter()
        .map(|item| {
            // each item is keyed by its action type
            let result = item
                .as_object()
                .and_then(|o| o.values().next())
                .cloned()
                .unwrap_or(Value::Null);
            let error = result.get("error").map(|e| {
                let kind = e.get("type").and_then(Value::as_str).unwrap_or("error");
                let reason = e.get("reason").and_then(Value::as_str).unwrap_or("");
                format!("{}: {}", kind, reason)
            });
            BulkItemResult {
                id: match result.get("_id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                status: result.get("status").and_then(Value::as_u64).unwrap_or(0) as u16,
                error,
            }
        })
        .collect();

    Ok(BulkResponse {
        errors: body.get("errors").and_then(Value::as_bool).unwrap_or(false),
        items,
    })
}

fn parse_search_response(body: &Value) -> SearchResponse {
    let total = match body.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .map(|hit| SearchHit {
                    id: hit
                        .get("_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: hit.get("_score").and_then(Value::as_f64),
                    source: hit.get("_source").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default();
    SearchResponse { total, hits }
}

#[async_trait]
impl SearchBackend for OpenSearchClient {
    async fn info(&self) -> Result<ClusterInfo, SearchError> {
        let body = self.send_ok(Method::GET, &[], &[], None).await?;
        Ok(ClusterInfo {
            cluster_name: body
                .get("cluster_name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            version: body
                .pointer("/version/number")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        })
    }

    async fn plugins(&self) -> Result<Vec<String>, SearchError> {
        let body = self
            .send_ok(Method::GET, &["_nodes", "plugins"], &[], None)
            .await?;
        let mut names: Vec<String> = body
            .get("nodes")
            .and_then(Value::as_object)
            .map(|nodes| {
                nodes
                    .values()
                    .filter_map(|node| node.get("plugins").and_then(Value::as_array))
                    .flatten()
                    .filter_map(|p| p.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        let (status, body) = self.send(Method::HEAD, &[index], &[], None).await?;
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(rejection(other, &body)),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchError> {
        self.send_ok(Method::PUT, &[index], &[], json_body(body)?)
            .await
            .map(|_| ())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchError> {
        self.send_ok(Method::DELETE, &[index], &[], None)
            .await
            .map(|_| ())
    }

    async fn health(
        &self,
        index: Option<&str>,
        wait_for: Option<HealthStatus>,
        timeout: Duration,
    ) -> Result<ClusterHealth, SearchError> {
        let mut segments = vec!["_cluster", "health"];
        if let Some(index) = index {
            segments.push(index);
        }
        let mut query = Vec::new();
        if let Some(status) = wait_for {
            query.push(("wait_for_status".to_string(), status.to_string()));
            query.push(("timeout".to_string(), format!("{}s", timeout.as_secs().max(1))));
        }

        // a wait that times out still answers with the current status
        let (status, body) = self.send(Method::GET, &segments, &query, None).await?;
        if !status.is_success() && status != StatusCode::REQUEST_TIMEOUT {
            return Err(rejection(status, &body));
        }
        let health: HealthStatus = body
            .get("status")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SearchError::Decode(e.to_string()))?
            .unwrap_or(HealthStatus::Red);
        Ok(ClusterHealth {
            status: health,
            timed_out: body
                .get("timed_out")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    async fn bulk(&self, index: &str, docs: &[IndexDocument]) -> Result<BulkResponse, SearchError> {
        let payload = encode_bulk(index, docs)?;
        let body = self
            .send_ok(
                Method::POST,
                &["_bulk"],
                &[],
                Some((payload, "application/x-ndjson")),
            )
            .await?;
        parse_bulk_response(&body)
    }

    async fn index_document(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError> {
        self.send_ok(Method::PUT, &[index, "_doc", doc.id.as_str()], &[], json_body(&doc.source)?)
            .await
            .map(|_| ())
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchError> {
        self.send_ok(Method::POST, &[index, "_refresh"], &[], None)
            .await
            .map(|_| ())
    }

    async fn count(&self, index: &str) -> Result<u64, SearchError> {
        let body = self
            .send_ok(Method::GET, &[index, "_count"], &[], None)
            .await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::Decode("count missing from response".to_string()))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SearchError> {
        let response = self
            .send_ok(Method::POST, &[index, "_search"], &[], json_body(body)?)
            .await?;
        Ok(parse_search_response(&response))
    }
}
