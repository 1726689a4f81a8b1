use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Passage, VectorPoint};

/// Handle on a single vector collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn collection(&self) -> &str;

    async fn upsert(&self, points: Vec<VectorPoint>) -> anyhow::Result<()>;

    async fn search(&self, vector: Vec<f32>, limit: usize) -> anyhow::Result<Vec<Passage>>;
}

pub type SharedVectorStore = Arc<dyn VectorStore>;
