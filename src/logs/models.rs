use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::ledger::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Access,
    Error,
    Security,
    System,
    Audit,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Error => "error",
            Self::Security => "security",
            Self::System => "system",
            Self::Audit => "audit",
        }
    }
}

impl FromStr for LogType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access" => Ok(Self::Access),
            "error" => Ok(Self::Error),
            "security" => Ok(Self::Security),
            "system" => Ok(Self::System),
            "audit" => Ok(Self::Audit),
            other => Err(LedgerError::Validation(format!("Unknown log type: {}", other))),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(LedgerError::Validation(format!("Unknown severity: {}", other))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log record as submitted, before it has an id or timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLogRecord {
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub severity: Severity,
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub is_anomaly: bool,
}

impl NewLogRecord {
    pub fn new(log_type: LogType, severity: Severity, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            log_type,
            severity,
            message: message.into(),
            source: source.into(),
            method: None,
            path: None,
            status_code: None,
            response_time_ms: None,
            ip: None,
            user_id: None,
            metadata: Map::new(),
            is_anomaly: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(LedgerError::invalid_entry("Log message is required"));
        }
        if self.source.trim().is_empty() {
            return Err(LedgerError::invalid_entry("Log source is required"));
        }
        if let Some(code) = self.status_code {
            if !(100..=599).contains(&code) {
                return Err(LedgerError::invalid_entry(format!("Invalid status code: {}", code)));
            }
        }
        Ok(())
    }
}

/// A stored security log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub severity: Severity,
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub is_anomaly: bool,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Assign a fresh id and a millisecond-precision timestamp
    pub fn create(new: NewLogRecord) -> Self {
        Self::from_parts(uuid::Uuid::new_v4().to_string(), Utc::now().trunc_subsecs(3), new)
    }

    pub fn from_parts(id: String, timestamp: DateTime<Utc>, new: NewLogRecord) -> Self {
        Self {
            id,
            log_type: new.log_type,
            severity: new.severity,
            message: new.message,
            source: new.source,
            method: new.method,
            path: new.path,
            status_code: new.status_code,
            response_time_ms: new.response_time_ms,
            ip: new.ip,
            user_id: new.user_id,
            metadata: new.metadata,
            is_anomaly: new.is_anomaly,
            timestamp,
        }
    }

    /// The record as the JSON payload sealed into the ledger
    pub fn payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Ledger entry carrying this record
    pub fn to_entry(&self) -> Result<LogEntry> {
        Ok(LogEntry::with_timestamp(self.id.clone(), self.payload()?, self.timestamp))
    }
}
