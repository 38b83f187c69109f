#![allow(dead_code)]

use log_ledger::ledger::{Ledger, LedgerSettings, LogEntry, MemoryStore};
use serde_json::json;
use std::sync::Arc;

/// Settings used across the integration tests: batches of five at a
/// difficulty low enough to mine instantly
pub fn test_settings() -> LedgerSettings {
    LedgerSettings {
        difficulty: 1,
        batch_size: 5,
        max_mining_attempts: None,
    }
}

/// Ledger backed by an in-memory store
pub async fn setup_test_ledger() -> (Arc<Ledger>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(store.clone(), test_settings())
        .await
        .expect("Failed to open test ledger");
    (Arc::new(ledger), store)
}

/// Security event entry with a recognisable payload
pub fn create_test_entry(id: &str) -> LogEntry {
    LogEntry::new(
        id,
        json!({
            "type": "security",
            "severity": "medium",
            "message": format!("Security event {}", id),
            "source": "integration-test"
        }),
    )
}

/// Entries e1..=en
pub fn create_test_entries(count: usize) -> Vec<LogEntry> {
    (1..=count).map(|i| create_test_entry(&format!("e{}", i))).collect()
}
