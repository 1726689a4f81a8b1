use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::chunk::{chunk_with_overlap, normalize_extracted_text};
use super::client::{SharedVectorStore, VectorStore};
use super::embed::{EmbeddingsProvider, SharedEmbedder};
use super::types::{ChunkPayload, Passage, VectorPoint};
use crate::config::Settings;

/// Turns a file on disk into plain text.
pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> anyhow::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read(&self, path: &Path) -> anyhow::Result<String> {
        pdf_extract::extract_text(path)
            .map_err(|err| anyhow!("{err:?}"))
            .with_context(|| format!("Failed to extract text from {}", path.display()))
    }
}

pub type SharedKnowledgeBase = Arc<KnowledgeBase>;

/// Document chunks embedded into the session's vector collection.
pub struct KnowledgeBase {
    store: SharedVectorStore,
    embedder: SharedEmbedder,
    reader: Arc<dyn DocumentReader>,
    chunk_size: usize,
    chunk_overlap: usize,
    search_limit: usize,
}

impl KnowledgeBase {
    const UPSERT_BATCH: usize = 64;

    pub fn new(store: SharedVectorStore, embedder: SharedEmbedder, settings: &Settings) -> Self {
        Self {
            store,
            embedder,
            reader: Arc::new(PdfReader),
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            search_limit: settings.search_limit,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    /// Extract, chunk, embed and store one document. Returns the number of chunks written.
    /// Chunks already upserted stay in the collection if a later batch fails.
    #[instrument(skip_all, fields(source = %source, collection = %self.collection()))]
    pub async fn add_content(&self, path: &Path, source: &str) -> anyhow::Result<usize> {
        let reader = Arc::clone(&self.reader);
        let owned: PathBuf = path.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || reader.read(&owned))
            .await
            .context("document reader panicked")??;

        let text = normalize_extracted_text(&raw);
        let chunks = chunk_with_overlap(&text, self.chunk_size, self.chunk_overlap);
        anyhow::ensure!(!chunks.is_empty(), "no extractable text in {source}");

        let ingested_at = Utc::now();
        let mut written = 0usize;
        for (batch_no, batch) in chunks.chunks(Self::UPSERT_BATCH).enumerate() {
            let first = batch_no * Self::UPSERT_BATCH;
            let vectors = self
                .embedder
                .embed_batch(batch)
                .await
                .with_context(|| {
                    format!(
                        "embedding chunks {first}..{} of {source}",
                        first + batch.len()
                    )
                })?;
            anyhow::ensure!(
                vectors.len() == batch.len(),
                "embedder returned {} vectors for {} chunks of {source}",
                vectors.len(),
                batch.len()
            );

            let points: Vec<VectorPoint> = batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(offset, (content, vector))| VectorPoint {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    payload: ChunkPayload {
                        content: content.clone(),
                        source: source.to_string(),
                        chunk_index: first + offset,
                        ingested_at,
                    },
                })
                .collect();

            written += points.len();
            self.store
                .upsert(points)
                .await
                .with_context(|| format!("storing chunks of {source}"))?;
        }

        info!(chunks = written, "Document indexed");
        Ok(written)
    }

    pub async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Passage>> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .context("embedding query failed")?;
        self.store
            .search(vector, limit.max(1))
            .await
            .context("knowledge base search failed")
    }
}
