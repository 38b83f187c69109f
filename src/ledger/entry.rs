//! Log Entry
//!
//! The unit of data sealed into ledger blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, Result};

/// A domain event waiting to be, or already, chained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Create an entry with an explicit creation time
    pub fn with_timestamp(id: impl Into<String>, payload: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at,
        }
    }

    /// Reject entries that must never reach the staging buffer
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::invalid_entry("Log entry id must not be empty"));
        }

        if !self.payload.is_object() {
            return Err(LedgerError::invalid_entry(format!(
                "Log entry {} payload must be a JSON object",
                self.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_entry() {
        let entry = LogEntry::new("e1", json!({"message": "login"}));
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let entry = LogEntry::new("  ", json!({"message": "login"}));
        assert!(matches!(entry.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let entry = LogEntry::new("e1", json!("just a string"));
        assert!(matches!(entry.validate(), Err(LedgerError::Validation(_))));

        let entry = LogEntry::new("e2", json!([1, 2, 3]));
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_serde_preserves_entry() {
        let entry = LogEntry::new("e1", json!({"message": "login", "attempt": 3}));
        let json = serde_json::to_string(&entry).unwrap();
        let restored: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, restored);
    }
}
