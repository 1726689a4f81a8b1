use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::error::{LegalTeamError, LegalTeamResult};
use crate::rag::knowledge::{DocumentReader, PdfReader};
use crate::rag::{KnowledgeBase, SharedKnowledgeBase, VectorHandle};

/// Filenames ingested during this session. Keyed by name only: a different
/// document uploaded under a known name is skipped.
#[derive(Debug, Default)]
pub struct ProcessedFiles {
    names: HashSet<String>,
}

impl ProcessedFiles {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[derive(Clone)]
pub struct IngestReport {
    pub knowledge: SharedKnowledgeBase,
    pub chunks: usize,
}

/// Writes uploads to a scratch `.pdf` and indexes them through a fresh knowledge base.
pub struct Ingestor {
    settings: Settings,
    reader: Arc<dyn DocumentReader>,
}

impl Ingestor {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            reader: Arc::new(PdfReader),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = reader;
        self
    }

    #[instrument(skip_all, fields(file = %file_name, bytes = bytes.len()))]
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: &[u8],
        handle: &VectorHandle,
    ) -> LegalTeamResult<IngestReport> {
        if bytes.is_empty() {
            return Err(LegalTeamError::ingestion(anyhow::anyhow!(
                "{file_name} is empty"
            )));
        }

        let scratch = write_scratch(bytes).map_err(LegalTeamError::ingestion)?;
        debug!(path = %scratch.path().display(), "Upload written to scratch file");

        let knowledge = KnowledgeBase::new(
            Arc::clone(&handle.store),
            Arc::clone(&handle.embedder),
            &self.settings,
        )
        .with_reader(Arc::clone(&self.reader));

        let indexed = knowledge.add_content(scratch.path(), file_name).await;

        // Removal failures are tolerated; the OS temp dir is reaped eventually.
        if let Err(err) = scratch.close() {
            warn!(?err, "Failed to remove scratch upload");
        }

        let chunks = indexed.map_err(LegalTeamError::ingestion)?;
        info!(chunks, "Upload ingested");

        Ok(IngestReport {
            knowledge: Arc::new(knowledge),
            chunks,
        })
    }
}

fn write_scratch(bytes: &[u8]) -> anyhow::Result<NamedTempFile> {
    let mut scratch = tempfile::Builder::new()
        .prefix("legal-upload-")
        .suffix(".pdf")
        .tempfile()
        .context("Failed to create scratch file")?;
    scratch
        .write_all(bytes)
        .context("Failed to write upload to scratch file")?;
    scratch.flush().context("Failed to flush scratch file")?;
    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_settings, InMemoryVectorStore, KeywordEmbedder, RecordingReader};

    fn handle(store: Arc<InMemoryVectorStore>) -> VectorHandle {
        VectorHandle {
            store,
            embedder: Arc::new(KeywordEmbedder),
        }
    }

    #[tokio::test]
    async fn scratch_file_is_gone_after_success() {
        let reader = Arc::new(RecordingReader::succeeding("The warranty lasts twelve months."));
        let store = Arc::new(InMemoryVectorStore::default());
        let ingestor = Ingestor::new(test_settings()).with_reader(reader.clone());

        let report = ingestor
            .ingest("nda.pdf", b"%PDF-1.7 fake", &handle(Arc::clone(&store)))
            .await
            .expect("ingested");

        assert_eq!(report.chunks, store.points().len());
        let seen = reader.seen();
        assert_eq!(seen.len(), 1);
        let (path, existed) = &seen[0];
        assert!(*existed);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn scratch_file_is_gone_after_failure() {
        let reader = Arc::new(RecordingReader::failing());
        let store = Arc::new(InMemoryVectorStore::default());
        let ingestor = Ingestor::new(test_settings()).with_reader(reader.clone());

        let err = ingestor
            .ingest("broken.pdf", b"%PDF-garbage", &handle(store))
            .await
            .err()
            .expect("ingestion should fail");

        assert!(matches!(err, LegalTeamError::IngestionFailure(_)));
        let (path, existed) = reader.seen().remove(0);
        assert!(existed);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_uploads_are_rejected_before_touching_disk() {
        let reader = Arc::new(RecordingReader::succeeding("unused"));
        let ingestor = Ingestor::new(test_settings()).with_reader(reader.clone());

        let result = ingestor
            .ingest("empty.pdf", b"", &handle(Arc::new(InMemoryVectorStore::default())))
            .await;

        assert!(matches!(result, Err(LegalTeamError::IngestionFailure(_))));
        assert!(reader.seen().is_empty());
    }

    #[test]
    fn processed_files_track_names_only() {
        let mut processed = ProcessedFiles::default();
        assert!(processed.is_empty());
        processed.insert("lease.pdf");
        processed.insert("lease.pdf");
        assert_eq!(processed.len(), 1);
        assert!(processed.contains("lease.pdf"));
        assert!(!processed.contains("Lease.pdf"));
    }
}
