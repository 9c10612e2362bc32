//! etcd v3 backend
//!
//! Talks to the etcd v3 JSON gateway (`/v3/kv/*`). Keys and values are
//! base64 encoded on the wire; prefix listings use a `range_end` computed
//! from the prefix. Endpoints are tried in order when one is unreachable.

use crate::domain::ports::KvBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the etcd backend
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Gateway endpoints, tried in order
    pub endpoints: Vec<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "http://localhost:2379".to_string(),
                "http://localhost:2380".to_string(),
            ],
            request_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
}

#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
struct DeleteRangeRequest {
    key: String,
}

// =============================================================================
// etcd Backend
// =============================================================================

/// Key-value backend over the etcd v3 JSON gateway
#[derive(Debug)]
pub struct EtcdBackend {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl EtcdBackend {
    /// Create a backend; no connection is made until the first call
    pub fn new(config: EtcdConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(Error::Configuration("etcd backend needs at least one endpoint".into()));
        }

        let endpoints = config
            .endpoints
            .iter()
            .map(|e| normalize_endpoint(e))
            .collect();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build etcd client: {}", e)))?;

        Ok(Self { endpoints, client })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn post<B, R>(
        &self,
        operation: &'static str,
        key: &str,
        path: &str,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut last_error = None;

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint, path);
            let response = match self.client.post(&url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("etcd endpoint {} unreachable: {}", endpoint, e);
                    last_error = Some(format!("{}: {}", endpoint, e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::Store {
                    operation,
                    key: key.to_string(),
                    reason: format!("{} returned {}: {}", url, status, text),
                });
            }

            debug!("etcd {} {} via {}", operation, key, endpoint);
            return response.json::<R>().await.map_err(|e| Error::Store {
                operation,
                key: key.to_string(),
                reason: format!("undecodable response from {}: {}", endpoint, e),
            });
        }

        Err(Error::Store {
            operation,
            key: key.to_string(),
            reason: last_error.unwrap_or_else(|| "no endpoint reachable".to_string()),
        })
    }

    async fn range(
        &self,
        operation: &'static str,
        key: &str,
        range_end: Option<Vec<u8>>,
    ) -> Result<Vec<String>> {
        let request = RangeRequest {
            key: STANDARD.encode(key),
            range_end: range_end.map(|end| STANDARD.encode(end)),
        };
        let response: RangeResponse = self.post(operation, key, "/v3/kv/range", &request).await?;

        response
            .kvs
            .into_iter()
            .map(|kv| decode_value(operation, key, &kv.value))
            .collect()
    }
}

#[async_trait]
impl KvBackend for EtcdBackend {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let request = PutRequest {
            key: STANDARD.encode(key),
            value: STANDARD.encode(value),
        };
        let _: serde_json::Value = self.post("put", key, "/v3/kv/put", &request).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.range("get", key, None).await?.into_iter().next())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.range("list", prefix, Some(prefix_range_end(prefix.as_bytes())))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let request = DeleteRangeRequest {
            key: STANDARD.encode(key),
        };
        let _: serde_json::Value = self
            .post("delete", key, "/v3/kv/deleterange", &request)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "etcd"
    }
}

/// Smallest key greater than every key starting with `prefix`
fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xff (or empty): "\0" means every key
    vec![0]
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn decode_value(operation: &'static str, key: &str, encoded: &str) -> Result<String> {
    let bytes = STANDARD.decode(encoded).map_err(|e| Error::Store {
        operation,
        key: key.to_string(),
        reason: format!("invalid base64 value: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| Error::Store {
        operation,
        key: key.to_string(),
        reason: format!("value is not UTF-8: {}", e),
    })
}
