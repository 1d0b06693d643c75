//! Infrastructure layer - Store backends, embedding adapters and the cache service

pub mod embedding;
pub mod logging;
pub mod semantic_cache;
pub mod services;
