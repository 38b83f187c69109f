//! Ledger Block
//!
//! A sealed batch of log entries linked to its predecessor by hash and
//! stamped with a proof-of-work nonce.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ledger::entry::LogEntry;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Payload message of the genesis block
pub const GENESIS_MESSAGE: &str = "Genesis Block";

/// Hex length of a SHA-256 digest; no difficulty above this can be met
pub const MAX_DIFFICULTY: usize = 64;

/// Genesis sentinel payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisData {
    pub message: String,
}

/// Block payload: the genesis sentinel or an ordered batch of entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Entries(Vec<LogEntry>),
    Genesis(GenesisData),
}

impl BlockData {
    pub fn genesis() -> Self {
        Self::Genesis(GenesisData {
            message: GENESIS_MESSAGE.to_string(),
        })
    }

    /// Entries held by this payload; empty for genesis
    pub fn entries(&self) -> &[LogEntry] {
        match self {
            Self::Entries(entries) => entries,
            Self::Genesis(_) => &[],
        }
    }

    /// Mutable access to the sealed entries. Only useful for simulating
    /// tampering; any change invalidates the owning block.
    pub fn entries_mut(&mut self) -> Option<&mut Vec<LogEntry>> {
        match self {
            Self::Entries(entries) => Some(entries),
            Self::Genesis(_) => None,
        }
    }

    /// Canonical JSON value; object keys are emitted in sorted order
    fn canonical_value(&self) -> Value {
        match self {
            Self::Genesis(genesis) => {
                let mut map = Map::new();
                map.insert("message".to_string(), Value::String(genesis.message.clone()));
                Value::Object(map)
            }
            Self::Entries(entries) => Value::Array(
                entries
                    .iter()
                    .map(|entry| {
                        let mut map = Map::new();
                        map.insert("id".to_string(), Value::String(entry.id.clone()));
                        map.insert("payload".to_string(), entry.payload.clone());
                        map.insert(
                            "created_at".to_string(),
                            Value::String(entry.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                        );
                        Value::Object(map)
                    })
                    .collect(),
            ),
        }
    }
}

/// One immutable unit of ledger history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Unix time in milliseconds
    pub timestamp: i64,
    pub data: BlockData,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Create an unmined block stamped with the current time
    pub fn new(index: u64, data: BlockData, previous_hash: String) -> Self {
        Self::with_timestamp(index, Utc::now().timestamp_millis(), data, previous_hash)
    }

    pub fn with_timestamp(index: u64, timestamp: i64, data: BlockData, previous_hash: String) -> Self {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_fingerprint();
        block
    }

    /// Unmined genesis block
    pub fn genesis() -> Self {
        Self::new(0, BlockData::genesis(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Canonical string representation for hashing
    pub fn canonical_string(&self) -> String {
        format!(
            "index:{}|timestamp:{}|data:{}|previous_hash:{}|nonce:{}",
            self.index,
            self.timestamp,
            self.data.canonical_value(),
            self.previous_hash,
            self.nonce
        )
    }

    /// SHA-256 fingerprint over all fields except the stored hash
    pub fn compute_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Stored hash equals a fresh recomputation
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_fingerprint()
    }

    /// Stored hash starts with `difficulty` zero hex digits
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        leading_zeros(&self.hash) >= difficulty
    }

    /// Proof-of-work search: bump the nonce until the hash has `difficulty`
    /// leading zero hex digits. `max_attempts` bounds the search.
    pub fn mine(&mut self, difficulty: usize, max_attempts: Option<u64>) -> Result<()> {
        let difficulty = difficulty.min(MAX_DIFFICULTY);
        let mut attempts: u64 = 0;

        self.hash = self.compute_fingerprint();
        while !self.meets_difficulty(difficulty) {
            if max_attempts.is_some_and(|limit| attempts >= limit) {
                return Err(LedgerError::MiningExhausted { attempts });
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_fingerprint();
            attempts += 1;
        }

        debug!(
            "Mined block {} after {} attempts (nonce {}, hash {})",
            self.index, attempts, self.nonce, self.hash
        );
        Ok(())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn entries(&self) -> &[LogEntry] {
        self.data.entries()
    }

    /// First entry sealed in this block with the given id
    pub fn entry(&self, entry_id: &str) -> Option<&LogEntry> {
        self.entries().iter().find(|entry| entry.id == entry_id)
    }

    pub fn contains_entry(&self, entry_id: &str) -> bool {
        self.entry(entry_id).is_some()
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "block {} ({} entries, nonce {}, hash {})",
            self.index,
            self.entries().len(),
            self.nonce,
            self.hash
        )
    }
}

fn leading_zeros(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_block() -> Block {
        let entries = vec![
            LogEntry::new("e1", json!({"message": "login", "severity": "low"})),
            LogEntry::new("e2", json!({"message": "logout", "severity": "low"})),
        ];
        Block::new(1, BlockData::Entries(entries), "abc".to_string())
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let block = sample_block();
        let hash1 = block.compute_fingerprint();
        let hash2 = block.compute_fingerprint();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_fingerprint_survives_serialization() {
        let mut block = sample_block();
        block.mine(1, None).unwrap();

        let json = serde_json::to_string(&block).unwrap();
        let restored: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, block);
        assert_eq!(restored.compute_fingerprint(), block.hash);
    }

    #[test]
    fn test_field_changes_alter_fingerprint() {
        let block = sample_block();
        let original = block.compute_fingerprint();

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.compute_fingerprint(), original);

        let mut changed = block.clone();
        changed.previous_hash = "abd".to_string();
        assert_ne!(changed.compute_fingerprint(), original);

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_fingerprint(), original);

        let mut changed = block;
        changed.data.entries_mut().unwrap()[0].payload = json!({"message": "login", "severity": "high"});
        assert_ne!(changed.compute_fingerprint(), original);
    }

    #[test]
    fn test_payload_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let created_at = Utc::now();

        let block_a = Block::with_timestamp(
            1,
            1_700_000_000_000,
            BlockData::Entries(vec![LogEntry::with_timestamp("e1", a, created_at)]),
            "prev".to_string(),
        );
        let block_b = Block::with_timestamp(
            1,
            1_700_000_000_000,
            BlockData::Entries(vec![LogEntry::with_timestamp("e1", b, created_at)]),
            "prev".to_string(),
        );
        assert_eq!(block_a.hash, block_b.hash);
    }

    #[test]
    fn test_mining_meets_difficulty() {
        let mut block = sample_block();
        block.mine(2, None).unwrap();
        assert!(block.hash.starts_with("00"));
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_mining_zero_difficulty_keeps_nonce() {
        let mut block = sample_block();
        block.mine(0, None).unwrap();
        assert_eq!(block.nonce, 0);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_bounded_mining_gives_up() {
        let mut block = sample_block();
        let result = block.mine(MAX_DIFFICULTY, Some(10));
        assert!(matches!(result, Err(LedgerError::MiningExhausted { attempts: 10 })));
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.entries().is_empty());

        let json = serde_json::to_value(&genesis).unwrap();
        assert_eq!(json["data"]["message"], GENESIS_MESSAGE);
    }

    #[test]
    fn test_entry_lookup() {
        let block = sample_block();
        assert!(block.contains_entry("e2"));
        assert!(!block.contains_entry("e3"));
        assert_eq!(block.entry("e1").unwrap().payload["message"], "login");
    }

    proptest! {
        #[test]
        fn prop_mined_hash_has_leading_zeros(difficulty in 0usize..=2, nonce in 0u64..1_000, message in "[a-z]{0,16}") {
            let entry = LogEntry::new("p1", json!({ "message": message }));
            let mut block = Block::new(3, BlockData::Entries(vec![entry]), "prev".to_string());
            block.nonce = nonce;
            block.mine(difficulty, None).unwrap();
            prop_assert!(block.hash.chars().take(difficulty).all(|c| c == '0'));
            prop_assert!(block.has_valid_hash());
        }

        #[test]
        fn prop_nonce_change_breaks_hash(nonce in 0u64..u64::MAX) {
            let mut block = sample_block();
            block.nonce = nonce;
            block.hash = block.compute_fingerprint();
            let mut tampered = block.clone();
            tampered.nonce = nonce.wrapping_add(1);
            prop_assert!(!tampered.has_valid_hash());
        }
    }
}
