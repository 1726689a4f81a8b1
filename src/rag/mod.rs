pub mod chunk;
pub mod client;
pub mod connector;
pub mod embed;
pub mod knowledge;
pub mod qdrant;
pub mod types;

pub use client::SharedVectorStore;
pub use connector::{connect, VectorHandle};
pub use knowledge::{KnowledgeBase, SharedKnowledgeBase};
pub use types::Passage;
