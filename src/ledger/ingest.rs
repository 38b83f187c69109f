//! Ingestion Facade
//!
//! Single entry point for the log-creation path: store the record, then
//! hand its ledger entry to the ledger.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::ledger::block::Block;
use crate::ledger::chain::Ledger;
use crate::ledger::entry::LogEntry;
use crate::logs::{LogRecord, LogStore, NewLogRecord};

#[derive(Clone)]
pub struct LogIngestor {
    ledger: Arc<Ledger>,
    records: LogStore,
}

impl LogIngestor {
    pub fn new(ledger: Arc<Ledger>, records: LogStore) -> Self {
        Self { ledger, records }
    }

    /// Validate, store and chain a new log record.
    ///
    /// A commit failure is returned to the caller, but the record is
    /// already stored and its entry stays staged for the next commit.
    pub async fn submit_log(&self, new: NewLogRecord) -> Result<LogRecord> {
        new.validate()?;

        let record = LogRecord::create(new);
        let entry = record.to_entry()?;
        entry.validate()?;

        self.records.insert(&record).await?;
        if let Some(block) = self.ledger.add_entry(entry).await? {
            info!("Log {} sealed into block {}", record.id, block.index);
        }

        Ok(record)
    }

    /// Chain an entry that is stored elsewhere
    pub async fn submit_entry(&self, entry: LogEntry) -> Result<Option<Block>> {
        self.ledger.add_entry(entry).await
    }
}
