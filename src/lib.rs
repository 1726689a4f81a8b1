pub mod agents;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm_client;
pub mod orchestrator;
pub mod rag;
pub mod session;

#[cfg(test)]
mod testing;

pub use error::{LegalTeamError, LegalTeamResult};
pub use session::{Session, SessionStatus, UploadOutcome};
