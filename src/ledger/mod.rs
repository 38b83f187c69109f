//! Tamper-Evident Log Ledger
//!
//! Log entries are staged, sealed in batches into hash-linked,
//! proof-of-work-stamped blocks and persisted, so that later edits to
//! history are detectable.

pub mod block;
pub mod chain;
pub mod entry;
pub mod ingest;
pub mod store;
pub mod verifier;
pub mod verify;

pub use block::{Block, BlockData};
pub use chain::{Ledger, LedgerSettings, DEFAULT_BATCH_SIZE, DEFAULT_DIFFICULTY};
pub use entry::LogEntry;
pub use ingest::LogIngestor;
pub use store::{ChainStore, JsonFileStore, MemoryStore};
pub use verifier::{ChainStatus, IntegrityVerifier, RecordSource};
pub use verify::{validate_chain, verify_chain, IntegrityViolation, VerificationResult};
