//! Domain layer - Cache entries, contracts and error taxonomy

pub mod embedding;
pub mod error;
pub mod semantic_cache;

pub use error::CacheError;
