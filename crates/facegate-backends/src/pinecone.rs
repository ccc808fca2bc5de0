//! Pinecone vector database client over its REST API.
//!
//! The control plane creates and describes the index; the data plane (a
//! per-index host resolved once and cached) serves upserts and queries.

use async_trait::async_trait;
use facegate_core::store::{CollectionSpec, Metric};
use facegate_core::types::RecordMetadata;
use facegate_core::{ScoredRecord, Signature, SignatureRecord, StoreError, VectorIndex};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
pub const PINECONE_API_VERSION: &str = "2024-07";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub control_plane_url: String,
    /// Serverless placement used when the index has to be created.
    pub cloud: String,
    pub region: String,
    pub namespace: Option<String>,
    /// Upper bound on every request.
    pub timeout: Duration,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_name: index_name.into(),
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            cloud: "aws".to_string(),
            region: "us-west-2".to_string(),
            namespace: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct PineconeIndex {
    client: reqwest::Client,
    config: PineconeConfig,
    host: OnceCell<String>,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Serialize)]
struct CreateIndex<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    serverless: Placement<'a>,
}

#[derive(Serialize)]
struct Placement<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [SignatureRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f64,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(request_error)?;
        Ok(Self {
            client,
            config,
            host: OnceCell::new(),
        })
    }

    fn control(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            path
        )
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    /// Data-plane base URL, described once and then cached.
    async fn data_plane(&self) -> Result<&str, StoreError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let path = format!("indexes/{}", self.config.index_name);
                let resp = self
                    .authed(self.client.get(self.control(&path)))
                    .send()
                    .await
                    .map_err(request_error)?;
                let description: IndexDescription = decode(check(resp).await?).await?;
                let host = description.host.ok_or_else(|| {
                    StoreError::Malformed(format!("index {} has no host yet", description.name))
                })?;
                tracing::debug!(index = %description.name, %host, "resolved data plane host");
                Ok::<_, StoreError>(base_url(&host))
            })
            .await?;
        Ok(host.as_str())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        let resp = self
            .authed(self.client.get(self.control("indexes")))
            .send()
            .await
            .map_err(request_error)?;
        let list: IndexList = decode(check(resp).await?).await?;

        if let Some(existing) = list.indexes.into_iter().find(|i| i.name == spec.name) {
            tracing::debug!(index = %spec.name, "index already exists");
            if let Some(host) = existing.host {
                let _ = self.host.set(base_url(&host));
            }
            return Ok(());
        }

        let body = CreateIndex {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: Placement {
                    cloud: &self.config.cloud,
                    region: &self.config.region,
                },
            },
        };
        let resp = self
            .authed(self.client.post(self.control("indexes")))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        // Lost a creation race with another process.
        if resp.status() == StatusCode::CONFLICT {
            tracing::debug!(index = %spec.name, "index created concurrently");
            return Ok(());
        }

        let created: IndexDescription = decode(check(resp).await?).await?;
        tracing::info!(
            index = %created.name,
            dimension = spec.dimension,
            cloud = %self.config.cloud,
            region = %self.config.region,
            "created index"
        );
        if let Some(host) = created.host {
            let _ = self.host.set(base_url(&host));
        }
        Ok(())
    }

    async fn upsert(&self, records: &[SignatureRecord]) -> Result<usize, StoreError> {
        let url = format!("{}/vectors/upsert", self.data_plane().await?);
        let body = UpsertRequest {
            vectors: records,
            namespace: self.config.namespace.as_deref(),
        };
        let resp = self
            .authed(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let upserted: UpsertResponse = decode(check(resp).await?).await?;
        Ok(upserted.upserted_count.unwrap_or(records.len()))
    }

    async fn query(&self, vector: &Signature, top_k: usize) -> Result<Vec<ScoredRecord>, StoreError> {
        let url = format!("{}/query", self.data_plane().await?);
        let body = QueryRequest {
            vector: &vector.values,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.config.namespace.as_deref(),
        };
        let resp = self
            .authed(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let response: QueryResponse = decode(check(resp).await?).await?;

        response
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m
                    .metadata
                    .ok_or_else(|| StoreError::Malformed(format!("match {} has no metadata", m.id)))?;
                let metadata: RecordMetadata = serde_json::from_value(metadata)
                    .map_err(|e| StoreError::Malformed(format!("match {}: {e}", m.id)))?;
                Ok(ScoredRecord {
                    id: m.id,
                    score: m.score,
                    metadata,
                })
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("pinecone index {}", self.config.index_name)
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn request_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_decode() {
        StoreError::Malformed(e.to_string())
    } else {
        StoreError::Request(e.to_string())
    }
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
    resp.json::<T>().await.map_err(request_error)
}
