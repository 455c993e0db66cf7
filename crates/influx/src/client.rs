//! InfluxDB HTTP client wrapper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use migrate_core::{Error, Result};
use tracing::{debug, info};
use url::Url;

use crate::config::{parse_address, InfluxConfig};

/// Raw response of a `/write` request.
#[derive(Debug, Clone)]
pub struct WriteResponse {
    pub status: u16,
    /// Round-trip time of this request
    pub elapsed: Duration,
    pub body: String,
}

impl WriteResponse {
    /// Only 204 No Content counts as a stored batch.
    pub fn is_success(&self) -> bool {
        self.status == migrate_core::limits::WRITE_SUCCESS_STATUS
    }
}

/// InfluxDB client over HTTP.
///
/// Cheap to clone; clones share the connection pool and the round-robin
/// address cursor.
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    addresses: Arc<[Url]>,
    next: Arc<AtomicUsize>,
    config: Arc<InfluxConfig>,
}

impl InfluxClient {
    /// Creates a new client from validated configuration.
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let addresses = config
            .addresses
            .iter()
            .map(|a| parse_address(a))
            .collect::<Result<Vec<_>>>()?;
        if addresses.is_empty() {
            return Err(Error::config("influx.addresses is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            addresses = ?config.addresses,
            database = %config.database,
            precision = config.precision.as_str(),
            "Created InfluxDB client"
        );

        Ok(Self {
            http,
            addresses: addresses.into(),
            next: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        })
    }

    /// Creates a client bound to a single host, e.g. for administrative
    /// queries against a node other than the write endpoints.
    pub fn for_host(config: &InfluxConfig, host: &str, database: &str) -> Result<Self> {
        let mut config = config.clone();
        config.addresses = vec![host.to_string()];
        if !database.is_empty() {
            config.database = database.to_string();
        }
        Self::new(config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }

    fn next_address(&self) -> &Url {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.addresses.len();
        &self.addresses[i]
    }

    fn endpoint(&self, base: &Url, path: &str) -> Result<Url> {
        base.join(path)
            .map_err(|e| Error::internal(format!("Invalid endpoint {}{}: {}", base, path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    /// Posts a line-protocol body to `/write`.
    ///
    /// Any HTTP status is returned as a response; only transport failures
    /// are errors.
    pub async fn write(&self, retention_policy: &str, body: String) -> Result<WriteResponse> {
        let base = self.next_address();
        let mut url = self.endpoint(base, "write")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("db", &self.config.database)
                .append_pair("precision", self.config.precision.as_str());
            if !retention_policy.is_empty() {
                query.append_pair("rp", retention_policy);
            }
        }

        let start = Instant::now();
        let response = self
            .authorize(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::sink(format!("Write to {} failed: {}", base, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::sink(format!("Failed to read write response: {}", e)))?;
        let elapsed = start.elapsed();

        debug!(
            address = %base,
            retention_policy = retention_policy,
            status = status,
            latency_ms = %elapsed.as_millis(),
            "Write request completed"
        );

        Ok(WriteResponse {
            status,
            elapsed,
            body,
        })
    }

    /// Runs an InfluxQL statement through `/query`.
    pub async fn query(&self, statement: &str) -> Result<serde_json::Value> {
        let base = self.next_address();
        let url = self.endpoint(base, "query")?;

        let response = self
            .authorize(self.http.post(url))
            .form(&[("q", statement)])
            .send()
            .await
            .map_err(|e| Error::sink(format!("Query to {} failed: {}", base, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::sink(format!("Failed to read query response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::sink(format!(
                "Query {:?} returned {}: {}",
                statement,
                status.as_u16(),
                text.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| Error::sink(format!("Invalid query response: {}", e)))?;
        if let Some(message) = query_error(&json) {
            return Err(Error::sink(format!("Query {:?} failed: {}", statement, message)));
        }

        Ok(json)
    }

    /// Sends `/ping`, returning the HTTP status.
    pub async fn ping(&self) -> Result<u16> {
        let base = self.next_address();
        let url = self.endpoint(base, "ping")?;
        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| Error::sink(format!("Ping to {} failed: {}", base, e)))?;
        Ok(response.status().as_u16())
    }
}

/// Extract the first error message from a `/query` response body.
pub fn query_error(json: &serde_json::Value) -> Option<String> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Some(err.to_string());
    }
    json.get("results")?
        .as_array()?
        .iter()
        .find_map(|r| r.get("error").and_then(|e| e.as_str()))
        .map(str::to_string)
}
