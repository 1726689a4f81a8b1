use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::client::SharedVectorStore;
use super::embed::{OpenAiEmbeddingsClient, SharedEmbedder};
use super::qdrant::{QdrantClient, QdrantConfig};
use crate::config::{Credentials, Settings};
use crate::error::{LegalTeamError, LegalTeamResult};

/// A live collection plus the embedder every chunk and query goes through.
#[derive(Clone)]
pub struct VectorHandle {
    pub store: SharedVectorStore,
    pub embedder: SharedEmbedder,
}

/// `Ok(None)` when any credential is missing; nothing is sent over the wire in that case.
#[instrument(skip_all, fields(collection = %settings.collection))]
pub async fn connect(
    credentials: &Credentials,
    settings: &Settings,
) -> LegalTeamResult<Option<VectorHandle>> {
    let Some(complete) = credentials.complete() else {
        debug!(missing = ?credentials.missing(), "Credentials incomplete; not connecting");
        return Ok(None);
    };

    let qdrant = QdrantClient::new(QdrantConfig {
        url: complete.qdrant_url.clone(),
        api_key: Some(complete.qdrant_api_key.clone()),
        collection: settings.collection.clone(),
        vector_dim: settings.vector_dim,
        http_timeout_ms: settings.http_timeout_ms,
    })
    .map_err(LegalTeamError::connection)?;

    qdrant
        .ensure_collection()
        .await
        .map_err(LegalTeamError::connection)?;

    info!(url = %complete.qdrant_url, "Connected to Qdrant");
    Ok(Some(VectorHandle {
        store: Arc::new(qdrant),
        embedder: Arc::new(OpenAiEmbeddingsClient::new(
            &complete.openai_api_key,
            settings,
        )),
    }))
}
