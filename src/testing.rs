//! In-process doubles shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::agents::tools::WebSearch;
use crate::config::{Profile, Settings};
use crate::llm_client::LlmClient;
use crate::rag::client::VectorStore;
use crate::rag::embed::EmbeddingsProvider;
use crate::rag::knowledge::DocumentReader;
use crate::rag::types::{Passage, VectorPoint};

pub fn test_settings() -> Settings {
    Settings {
        chunk_size: 48,
        chunk_overlap: 0,
        search_limit: 3,
        web_search_enabled: false,
        ..Settings::defaults(Profile::Cloud)
    }
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    points: Mutex<Vec<VectorPoint>>,
    upserts: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn points(&self) -> Vec<VectorPoint> {
        self.points.lock().expect("lock poisoned").clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        "legal_documents"
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> anyhow::Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.points.lock().expect("lock poisoned").extend(points);
        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> anyhow::Result<Vec<Passage>> {
        let points = self.points.lock().expect("lock poisoned");
        let mut scored: Vec<Passage> = points
            .iter()
            .map(|p| Passage::from_payload(p.payload.clone(), cosine(&vector, &p.vector)))
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Embeds text as counts over a small legal vocabulary plus one bucket for everything else.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    const VOCAB: [&'static str; 8] = [
        "indemnity",
        "termination",
        "payment",
        "liability",
        "confidential",
        "governing",
        "notice",
        "warranty",
    ];
}

#[async_trait]
impl EmbeddingsProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0; Self::VOCAB.len() + 1];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            match Self::VOCAB.iter().position(|v| *v == word) {
                Some(idx) => vector[idx] += 1.0,
                None => vector[Self::VOCAB.len()] += 1.0,
            }
        }
        Ok(vector)
    }
}

/// Keyword embeddings that record the size of every batch request.
#[derive(Default)]
pub struct BatchRecordingEmbedder {
    batches: Mutex<Vec<usize>>,
    singles: AtomicUsize,
}

impl BatchRecordingEmbedder {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().expect("lock poisoned").clone()
    }

    pub fn single_calls(&self) -> usize {
        self.singles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingsProvider for BatchRecordingEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.singles.fetch_add(1, Ordering::SeqCst);
        KeywordEmbedder.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batches.lock().expect("lock poisoned").push(texts.len());
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(KeywordEmbedder.embed(text).await?);
        }
        Ok(vectors)
    }
}

pub struct TextReader {
    text: String,
}

impl TextReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl DocumentReader for TextReader {
    fn read(&self, _path: &Path) -> anyhow::Result<String> {
        Ok(self.text.clone())
    }
}

pub struct FailingReader;

impl DocumentReader for FailingReader {
    fn read(&self, path: &Path) -> anyhow::Result<String> {
        Err(anyhow!("corrupt xref table in {}", path.display()))
    }
}

/// Records every path it is handed and whether the file existed at read time.
pub struct RecordingReader {
    text: Option<String>,
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl RecordingReader {
    pub fn succeeding(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().expect("lock poisoned").clone()
    }
}

impl DocumentReader for RecordingReader {
    fn read(&self, path: &Path) -> anyhow::Result<String> {
        self.seen
            .lock()
            .expect("lock poisoned")
            .push((path.to_path_buf(), path.exists()));
        self.text
            .clone()
            .ok_or_else(|| anyhow!("unreadable document"))
    }
}

/// Returns a fixed answer and remembers every prompt it saw.
pub struct MockLlmClient {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("lock poisoned").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .expect("lock poisoned")
            .push(prompt.to_string());
        self.response
            .clone()
            .ok_or_else(|| anyhow!("mock LLM failure"))
    }
}

pub struct StaticSearch {
    snippets: Vec<String>,
}

impl StaticSearch {
    pub fn new(snippets: &[&str]) -> Self {
        Self {
            snippets: snippets.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl WebSearch for StaticSearch {
    async fn search(&self, _query: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.snippets.clone())
    }
}
