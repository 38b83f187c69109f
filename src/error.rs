use thiserror::Error;

use crate::ledger::IntegrityViolation;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(format!("Database error: {}", err))
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("Migration error: {}", err))
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No persisted chain found")]
    NotFound,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(IntegrityViolation),

    #[error("Mining gave up after {attempts} attempts")]
    MiningExhausted { attempts: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("{}: {}", context, err))
    }

    pub fn invalid_entry(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// True for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Database(_))
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
