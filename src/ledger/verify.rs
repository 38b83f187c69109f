//! Chain Verification
//!
//! Pure checks over a sequence of blocks. Integrity failures are returned
//! as values; a broken chain is a queryable state, not an exception.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::block::{Block, GENESIS_PREVIOUS_HASH};

/// First problem found while walking a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    #[error("chain has no blocks")]
    EmptyChain,

    #[error("genesis block is malformed: {reason}")]
    BadGenesis { reason: String },

    #[error("block at position {position} carries index {found}")]
    IndexGap { position: usize, found: u64 },

    #[error("block {index} hash does not match its contents")]
    FingerprintMismatch { index: u64 },

    #[error("block {index} hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: usize },

    #[error("block {index} does not link to the previous block hash")]
    BrokenLink { index: u64 },
}

/// Walk the chain and return the first violation, if any. Every block,
/// genesis included, must carry `difficulty` leading zero hex digits.
pub fn validate_chain(blocks: &[Block], difficulty: usize) -> Option<IntegrityViolation> {
    let Some(genesis) = blocks.first() else {
        return Some(IntegrityViolation::EmptyChain);
    };

    if genesis.index != 0 {
        return Some(IntegrityViolation::BadGenesis {
            reason: format!("index is {}", genesis.index),
        });
    }
    if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
        return Some(IntegrityViolation::BadGenesis {
            reason: format!("previous hash is {}", genesis.previous_hash),
        });
    }

    for (position, block) in blocks.iter().enumerate() {
        if block.index != position as u64 {
            return Some(IntegrityViolation::IndexGap {
                position,
                found: block.index,
            });
        }

        if !block.has_valid_hash() {
            return Some(IntegrityViolation::FingerprintMismatch { index: block.index });
        }

        if !block.meets_difficulty(difficulty) {
            return Some(IntegrityViolation::InsufficientWork {
                index: block.index,
                difficulty,
            });
        }

        if position > 0 && block.previous_hash != blocks[position - 1].hash {
            return Some(IntegrityViolation::BrokenLink { index: block.index });
        }
    }

    None
}

/// Indexes of blocks whose stored hash no longer matches their contents
pub fn find_tampered_blocks(blocks: &[Block]) -> Vec<u64> {
    blocks
        .iter()
        .filter(|block| !block.has_valid_hash())
        .map(|block| block.index)
        .collect()
}

/// Verification result with detailed information
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub block_count: usize,
    pub entry_count: usize,
    pub hashes_valid: bool,
    pub links_valid: bool,
    pub work_valid: bool,
    pub timestamps_monotonic: bool,
    pub tampered_blocks: Vec<u64>,
    pub violation: Option<IntegrityViolation>,
}

impl VerificationResult {
    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.is_valid {
            format!(
                "Chain is valid ({} blocks, {} entries)",
                self.block_count, self.entry_count
            )
        } else {
            format!(
                "Chain is invalid ({} blocks): {}",
                self.block_count,
                self.violation
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "timestamps are not monotonic".to_string())
            )
        }
    }

    /// Get detailed status
    pub fn detailed_status(&self) -> String {
        format!(
            "Blocks: {}\nEntries: {}\nHashes: {}\nLinks: {}\nWork: {}\nTimestamps: {}\nTampered: {:?}",
            self.block_count,
            self.entry_count,
            if self.hashes_valid { "valid" } else { "INVALID" },
            if self.links_valid { "valid" } else { "INVALID" },
            if self.work_valid { "sufficient" } else { "INSUFFICIENT" },
            if self.timestamps_monotonic { "monotonic" } else { "NON-MONOTONIC" },
            self.tampered_blocks
        )
    }
}

/// Full report over a chain, collecting every class of problem
pub fn verify_chain(blocks: &[Block], difficulty: usize) -> VerificationResult {
    let violation = validate_chain(blocks, difficulty);
    let tampered_blocks = find_tampered_blocks(blocks);

    let work_valid = blocks.iter().all(|block| block.meets_difficulty(difficulty));

    let links_valid = blocks
        .windows(2)
        .all(|pair| pair[1].previous_hash == pair[0].hash);

    let timestamps_monotonic = blocks
        .windows(2)
        .all(|pair| pair[1].timestamp >= pair[0].timestamp);

    let entry_count = blocks.iter().map(|block| block.entries().len()).sum();
    let is_valid = violation.is_none() && timestamps_monotonic;

    if is_valid {
        info!("Chain verification successful: {} blocks", blocks.len());
    } else {
        warn!("Chain verification failed: {:?}", violation);
    }

    VerificationResult {
        is_valid,
        block_count: blocks.len(),
        entry_count,
        hashes_valid: tampered_blocks.is_empty(),
        links_valid,
        work_valid,
        timestamps_monotonic,
        tampered_blocks,
        violation,
    }
}
