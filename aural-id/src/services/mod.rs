//! External-tool and store adapters
//!
//! Each service wraps one collaborator: the chromaprint tool, the olaf
//! fingerprint store, the embedding model process, the Qdrant vector store,
//! tag metadata extraction, and canonical file storage.

pub mod chromaprint;
pub mod dedup;
pub mod embedding;
pub mod metadata;
pub mod olaf;
pub mod qdrant;
pub mod storage;

pub use embedding::{AudioChunk, Embedder, EmbeddingError};
pub use olaf::{OlafClient, OlafError, OlafMatch};
pub use qdrant::{QdrantClient, QdrantError};
