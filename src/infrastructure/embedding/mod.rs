//! Embedding infrastructure

mod generator;
mod http_client;
mod openai;

pub use generator::EmbeddingGenerator;
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiEmbeddingProvider;
