//! Ledger state access for the chaincode
//!
//! `ChaincodeStub` is the contract the host peer offers to chaincode;
//! `MemoryStub` is the in-process implementation used by the development peer.

use crate::error::{Result, ShareVoteError};
use crate::wal::WriteAheadLog;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State-access interface the host exposes to chaincode
pub trait ChaincodeStub: Send + Sync {
    /// Persist `value` under `key`, replacing any previous value
    fn put_state(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the bytes stored under `key`; absent keys are an error
    fn get_state(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Thread-safe in-memory world state
pub struct MemoryStub {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    wal: Option<Arc<WriteAheadLog>>,
}

impl MemoryStub {
    /// Create a new stub without WAL
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            wal: None,
        }
    }

    /// Create a new stub whose writes are logged to `wal`
    pub fn with_wal(wal: Arc<WriteAheadLog>) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            wal: Some(wal),
        }
    }

    /// Rebuild state from the WAL
    pub async fn restore_from_wal(&self) -> Result<()> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };

        let mut restored = HashMap::new();
        wal.replay(|key, value| {
            restored.insert(key, value);
            Ok(())
        })?;

        debug!(entries = restored.len(), "replayed state writes");
        let mut data = self.data.write().await;
        data.extend(restored);
        Ok(())
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> bool {
        let data = self.data.read().await;
        data.contains_key(key)
    }

    /// Number of keys in the world state
    pub async fn len(&self) -> usize {
        let data = self.data.read().await;
        data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every key-value pair
    pub async fn entries(&self) -> Vec<(String, Vec<u8>)> {
        let data = self.data.read().await;
        data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Rewrite the WAL so it holds one entry per live key
    pub async fn compact_wal(&self) -> Result<()> {
        if let Some(wal) = &self.wal {
            // Writers wait until the rewritten log is in place
            let data = self.data.read().await;
            let entries = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            wal.compact(entries).await?;
        }
        Ok(())
    }
}

impl Default for MemoryStub {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStub {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            wal: self.wal.clone(),
        }
    }
}

impl ChaincodeStub for MemoryStub {
    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        // The map lock spans the log append so log order matches apply order
        let mut data = self.data.write().await;

        // Log to WAL first for durability
        if let Some(wal) = &self.wal {
            wal.log_write(key, &value).await?;
        }

        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_state(&self, key: &str) -> Result<Vec<u8>> {
        let data = self.data.read().await;
        data.get(key)
            .cloned()
            .ok_or_else(|| ShareVoteError::KeyNotFound(key.to_string()))
    }
}
