use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FileStorage;

/// Keeps file bytes in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

fn missing(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no stored file at {path}"))
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.files
            .write()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| missing(path))
    }

    async fn delete(&self, path: &str) -> io::Result<()> {
        self.files
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| missing(path))
    }
}
