//! File-byte storage collaborator. Document rows only hold the storage key.

pub mod local;
pub mod memory;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use uuid::Uuid;

pub use local::LocalFileStorage;
pub use memory::MemoryFileStorage;

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()>;
    async fn read(&self, path: &str) -> io::Result<Vec<u8>>;
    async fn delete(&self, path: &str) -> io::Result<()>;
}

/// A fresh storage key for an uploaded file, keeping a sanitized extension.
pub fn storage_key(original_filename: &str) -> String {
    let id = Uuid::now_v7();
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(10)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty());

    match extension {
        Some(ext) => format!("documents/{id}.{ext}"),
        None => format!("documents/{id}"),
    }
}
