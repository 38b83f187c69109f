//! Log Record Store
//!
//! Full security log records kept outside the ledger. The ledger seals a
//! copy of each record; this store is what the verifier checks against.

pub mod models;
pub mod query;
pub mod store;

pub use models::{LogRecord, LogType, NewLogRecord, Severity};
pub use query::{LogPage, LogQuery, TimeRange};
pub use store::LogStore;
