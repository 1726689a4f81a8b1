use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client as OpenAiClient};
use async_trait::async_trait;

use crate::config::Settings;
use crate::llm_client::openai_config;

#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// One vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

pub type SharedEmbedder = Arc<dyn EmbeddingsProvider>;

/// Vectors keyed by the blake3 digest of their text. Cleared wholesale when full.
struct EmbeddingCache {
    entries: Mutex<HashMap<blake3::Hash, Vec<f32>>>,
    capacity: usize,
}

impl EmbeddingCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &blake3::Hash) -> anyhow::Result<Option<Vec<f32>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, key: blake3::Hash, vector: Vec<f32>) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("embedding cache poisoned"))?;
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, vector);
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }
}

/// Embeds chunks and queries through any OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingsClient {
    client: OpenAiClient<OpenAIConfig>,
    model: String,
    cache: EmbeddingCache,
}

impl OpenAiEmbeddingsClient {
    const CACHE_CAPACITY: usize = 512;

    pub fn new(api_key: &str, settings: &Settings) -> Self {
        Self {
            client: OpenAiClient::with_config(openai_config(api_key, settings)),
            model: settings.embedding_model.clone(),
            cache: EmbeddingCache::new(Self::CACHE_CAPACITY),
        }
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddingsClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        // Queries repeat across team members; chunks rarely do.
        let key = blake3::hash(text.as_bytes());
        if let Some(hit) = self.cache.get(&key)? {
            return Ok(hit);
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .with_context(|| format!("embedding with model '{}' failed", self.model))?;
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .context("Embedding response missing data")?;

        self.cache.insert(key, vector.clone())?;
        Ok(vector)
    }

    // Chunks bypass the cache; a whole upsert batch goes out as one request.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .with_context(|| {
                format!(
                    "embedding {} texts with model '{}' failed",
                    texts.len(),
                    self.model
                )
            })?;

        let mut data = response.data;
        anyhow::ensure!(
            data.len() == texts.len(),
            "embedding response returned {} vectors for {} inputs",
            data.len(),
            texts.len()
        );
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}
