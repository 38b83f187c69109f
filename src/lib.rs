pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logs;

pub use error::LedgerError;
