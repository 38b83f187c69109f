//! Integrity Verifier
//!
//! Read-only answers to "is entry X intact?" and "what state is the chain
//! in?". Nothing here can mutate the ledger.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ledger::block::Block;
use crate::ledger::chain::Ledger;
use crate::ledger::entry::LogEntry;
use crate::ledger::verify::validate_chain;

/// Source of the externally stored copy of a log entry
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Payload as stored outside the ledger, or `None` if unknown
    async fn fetch_payload(&self, entry_id: &str) -> Result<Option<Value>>;
}

/// Snapshot of ledger health for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub chain_length: usize,
    pub is_valid: bool,
    pub pending_count: usize,
    pub last_block: Option<Block>,
}

/// Check one entry against a chain and staging buffer.
///
/// Staged entries are only provisionally intact. A committed entry is
/// rejected when its block hash is stale or lacks `difficulty` proof of
/// work, whatever the payload says.
pub fn verify_entry_in(
    chain: &[Block],
    pending: &[LogEntry],
    entry_id: &str,
    external_payload: &Value,
    difficulty: usize,
) -> bool {
    if let Some(staged) = pending.iter().find(|entry| entry.id == entry_id) {
        debug!("Entry {} is staged; verifying provisionally", entry_id);
        return staged.payload == *external_payload;
    }

    let Some(block) = chain.iter().find(|block| block.contains_entry(entry_id)) else {
        debug!("Entry {} not found in ledger", entry_id);
        return false;
    };

    if !block.has_valid_hash() {
        warn!("Block {} holding entry {} failed its hash check", block.index, entry_id);
        return false;
    }

    if !block.meets_difficulty(difficulty) {
        warn!("Block {} holding entry {} was never mined", block.index, entry_id);
        return false;
    }

    block
        .entry(entry_id)
        .is_some_and(|sealed| sealed.payload == *external_payload)
}

/// Read-only view over a ledger and the external record store
#[derive(Clone)]
pub struct IntegrityVerifier {
    ledger: Arc<Ledger>,
    records: Arc<dyn RecordSource>,
}

impl IntegrityVerifier {
    pub fn new(ledger: Arc<Ledger>, records: Arc<dyn RecordSource>) -> Self {
        Self { ledger, records }
    }

    /// Compare `external_payload` with the copy held by the ledger
    pub async fn verify_entry(&self, entry_id: &str, external_payload: &Value) -> bool {
        let difficulty = self.ledger.settings().difficulty;
        self.ledger
            .read(|chain, pending| verify_entry_in(chain, pending, entry_id, external_payload, difficulty))
            .await
    }

    /// Verify an entry against the record store's copy of it
    pub async fn verify_log_integrity(&self, entry_id: &str) -> Result<bool> {
        let Some(external) = self.records.fetch_payload(entry_id).await? else {
            debug!("No stored record for {}", entry_id);
            return Ok(false);
        };

        let verified = self.verify_entry(entry_id, &external).await;
        if !verified {
            warn!("Log {} failed integrity verification", entry_id);
        }
        Ok(verified)
    }

    pub async fn get_status(&self) -> ChainStatus {
        let difficulty = self.ledger.settings().difficulty;
        self.ledger
            .read(|chain, pending| ChainStatus {
                chain_length: chain.len(),
                is_valid: validate_chain(chain, difficulty).is_none(),
                pending_count: pending.len(),
                last_block: chain.last().cloned(),
            })
            .await
    }
}
