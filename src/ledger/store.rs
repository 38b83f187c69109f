//! Chain Persistence
//!
//! Narrow load/save interface the ledger depends on, with a JSON file
//! backend and an in-memory backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::ledger::block::Block;

/// Durable home of the serialized chain
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Load the persisted chain. `LedgerError::NotFound` when nothing has
    /// been saved yet.
    async fn load(&self) -> Result<Vec<Block>>;

    /// Replace the persisted chain with `chain`
    async fn save(&self, chain: &[Block]) -> Result<()>;
}

/// On-disk document layout
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainDocument {
    pub chain: Vec<Block>,
}

/// Chain stored as a single pretty-printed JSON document
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "chain.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parse a chain document
pub fn parse_chain_document(contents: &str) -> Result<Vec<Block>> {
    let document: ChainDocument = serde_json::from_str(contents)
        .map_err(|e| LedgerError::persistence("Failed to parse chain document", e))?;
    Ok(document.chain)
}

#[async_trait]
impl ChainStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Block>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(LedgerError::NotFound),
            Err(e) => return Err(LedgerError::persistence("Failed to read chain file", e)),
        };

        let chain = parse_chain_document(&contents)?;
        info!("Loaded {} blocks from {}", chain.len(), self.path.display());
        Ok(chain)
    }

    async fn save(&self, chain: &[Block]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::persistence("Failed to create chain directory", e))?;
        }

        let json = serde_json::to_string_pretty(&ChainDocumentRef { chain })
            .map_err(|e| LedgerError::persistence("Failed to serialize chain", e))?;

        // Write then rename so a crash never leaves a half-written document
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| LedgerError::persistence("Failed to write chain file", e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| LedgerError::persistence("Failed to replace chain file", e))?;

        debug!("Saved {} blocks to {}", chain.len(), self.path.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct ChainDocumentRef<'a> {
    chain: &'a [Block],
}

/// In-process store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    chain: Mutex<Option<Vec<Block>>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already persisted chain
    pub fn with_chain(chain: Vec<Block>) -> Self {
        Self {
            chain: Mutex::new(Some(chain)),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail with a persistence error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Copy of what was last saved
    pub async fn snapshot(&self) -> Option<Vec<Block>> {
        self.chain.lock().await.clone()
    }
}

#[async_trait]
impl ChainStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Block>> {
        self.chain.lock().await.clone().ok_or(LedgerError::NotFound)
    }

    async fn save(&self, chain: &[Block]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence("Memory store rejected save".to_string()));
        }
        *self.chain.lock().await = Some(chain.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("chain.json"));
        assert!(matches!(store.load().await, Err(LedgerError::NotFound)));
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data").join("chain.json"));

        let mut genesis = Block::genesis();
        genesis.mine(1, None).unwrap();
        store.save(&[genesis.clone()]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![genesis]);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("chain.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(matches!(store.load().await, Err(LedgerError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_document_layout() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("chain.json");
        let store = JsonFileStore::new(&path);
        store.save(&[Block::genesis()]).await.unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let first = &raw["chain"][0];
        for field in ["index", "timestamp", "data", "previous_hash", "nonce", "hash"] {
            assert!(first.get(field).is_some(), "missing field {}", field);
        }
    }

    #[tokio::test]
    async fn test_memory_store_failures() {
        let store = MemoryStore::new();
        assert!(matches!(store.load().await, Err(LedgerError::NotFound)));

        store.set_fail_saves(true);
        assert!(store.save(&[Block::genesis()]).await.is_err());
        assert!(store.snapshot().await.is_none());

        store.set_fail_saves(false);
        store.save(&[Block::genesis()]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }
}
