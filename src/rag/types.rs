use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload stored alongside each chunk vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// One retrieval hit handed to an agent as grounding.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
}

impl Passage {
    pub fn from_payload(payload: ChunkPayload, score: f32) -> Self {
        Self {
            content: payload.content,
            source: payload.source,
            chunk_index: payload.chunk_index,
            score,
        }
    }
}

pub fn render_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| {
            format!(
                "- [{} #{} score={:.2}]\n{}",
                p.source,
                p.chunk_index,
                p.score,
                p.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
