use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::VectorStore;
use super::types::{ChunkPayload, Passage, VectorPoint};

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_dim: usize,
    pub http_timeout_ms: u64,
}

/// Minimal client for Qdrant's REST surface, scoped to one collection.
pub struct QdrantClient {
    http: reqwest::Client,
    config: QdrantConfig,
}

impl QdrantClient {
    pub fn new(config: QdrantConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.http_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Qdrant HTTP client")?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn collection_path(&self, suffix: &str) -> String {
        self.endpoint(&format!("collections/{}{suffix}", self.config.collection))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Probe the collection and create it (cosine distance) when it does not exist yet.
    pub async fn ensure_collection(&self) -> anyhow::Result<()> {
        let response = self
            .apply_auth(self.http.get(self.collection_path("")))
            .send()
            .await
            .context("Qdrant collection probe failed")?;

        if response.status().is_success() {
            debug!(collection = %self.config.collection, "Qdrant collection exists");
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(anyhow!(
                "Qdrant collection probe returned status {}",
                response.status()
            ));
        }

        info!(
            collection = %self.config.collection,
            vector_dim = self.config.vector_dim,
            "Creating Qdrant collection"
        );
        let body = json!({
            "vectors": { "size": self.config.vector_dim, "distance": "Cosine" }
        });
        let _: QdrantEnvelope<serde_json::Value> = self
            .send_json(self.http.put(self.collection_path("")), &body, "create collection")
            .await?;

        Ok(())
    }

    async fn send_json<T: Serialize, R: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        payload: &T,
        action: &str,
    ) -> anyhow::Result<R> {
        let response = self
            .apply_auth(builder)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Qdrant {action} request failed"))?
            .error_for_status()
            .with_context(|| format!("Qdrant {action} returned error status"))?;

        response
            .json::<R>()
            .await
            .with_context(|| format!("Failed to deserialize Qdrant {action} response"))
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    fn collection(&self) -> &str {
        &self.config.collection
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> anyhow::Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let body = json!({ "points": points });
        let _: QdrantEnvelope<serde_json::Value> = self
            .send_json(
                self.http.put(self.collection_path("/points?wait=true")),
                &body,
                "upsert",
            )
            .await?;

        debug!(count, collection = %self.config.collection, "Upserted points");
        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> anyhow::Result<Vec<Passage>> {
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let envelope: QdrantEnvelope<Vec<ScoredPoint>> = self
            .send_json(
                self.http.post(self.collection_path("/points/search")),
                &body,
                "search",
            )
            .await?;

        let collection = &self.config.collection;
        Ok(envelope
            .result
            .into_iter()
            .filter_map(|hit| {
                let payload = hit.payload?;
                match serde_json::from_value::<ChunkPayload>(payload) {
                    Ok(payload) => Some(Passage::from_payload(payload, hit.score)),
                    Err(err) => {
                        // The collection is shared; other writers use other payload shapes.
                        warn!(%collection, id = %hit.id, %err, "Skipping point with foreign payload");
                        None
                    }
                }
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}
