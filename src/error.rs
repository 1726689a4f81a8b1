use thiserror::Error;

/// User-facing failure taxonomy. Missing credentials are not represented here;
/// the connector guards against them up front and simply yields no handle.
#[derive(Debug, Error)]
pub enum LegalTeamError {
    #[error("vector store connection failed: {0:#}")]
    ConnectionFailure(anyhow::Error),

    #[error("document ingestion failed: {0:#}")]
    IngestionFailure(anyhow::Error),

    #[error("query failed: {0:#}")]
    QueryFailure(anyhow::Error),
}

impl LegalTeamError {
    pub fn connection(err: impl Into<anyhow::Error>) -> Self {
        Self::ConnectionFailure(err.into())
    }

    pub fn ingestion(err: impl Into<anyhow::Error>) -> Self {
        Self::IngestionFailure(err.into())
    }

    pub fn query(err: impl Into<anyhow::Error>) -> Self {
        Self::QueryFailure(err.into())
    }
}

pub type LegalTeamResult<T> = Result<T, LegalTeamError>;
