//! Typed log filters and pagination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::logs::models::{LogRecord, LogType, Severity};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Inclusive time bounds; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    pub fn validate(&self) -> Result<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(LedgerError::Validation(format!(
                "Time range start {} is after end {}",
                from, to
            ))),
            _ => Ok(()),
        }
    }
}

/// Filter over stored log records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub log_type: Option<LogType>,
    pub severity: Option<Severity>,
    pub range: TimeRange,
    pub anomalies_only: bool,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            log_type: None,
            severity: None,
            range: TimeRange::default(),
            anomalies_only: false,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl LogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, log_type: LogType) -> Self {
        self.log_type = Some(log_type);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub fn anomalies(mut self) -> Self {
        self.anomalies_only = true;
        self
    }

    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// In-process equivalent of the store's SQL filter
    #[cfg(test)]
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.log_type.map_or(true, |t| record.log_type == t)
            && self.severity.map_or(true, |s| record.severity == s)
            && (!self.anomalies_only || record.is_anomaly)
            && self.range.contains(record.timestamp)
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<LogRecord>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

impl LogPage {
    pub fn new(logs: Vec<LogRecord>, total: u64, query: &LogQuery) -> Self {
        let limit = u64::from(query.limit());
        Self {
            logs,
            total,
            page: query.page(),
            pages: total.div_ceil(limit) as u32,
        }
    }
}
