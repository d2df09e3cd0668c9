//! Persistent store for duty, warning and counter records
//!
//! The core talks to storage only through [`RecordStore`]: four keyed primitives over
//! three record kinds. The store enforces no business rules; per-member consistency is
//! the job of the services, which serialize access with [`KeyLocks`].

mod locks;
mod memory;
mod yaml;

pub use locks::KeyLocks;
pub use memory::MemoryStore;
pub use yaml::YamlStore;

use crate::duty::DutyRecord;
use crate::ledger::WarningRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of record held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// One [`DutyRecord`] per member, keyed by member id
    Duty,
    /// One [`WarningRecord`] per warning, keyed by warning id
    Warning,
    /// Named sequence high-water marks
    Counter,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duty => write!(f, "duty"),
            Self::Warning => write!(f, "warning"),
            Self::Counter => write!(f, "counter"),
        }
    }
}

/// A stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record")]
pub enum Record {
    Duty(DutyRecord),
    Warning(WarningRecord),
    /// Next value a sequence will hand out
    Counter(u64),
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Duty(_) => RecordKind::Duty,
            Self::Warning(_) => RecordKind::Warning,
            Self::Counter(_) => RecordKind::Counter,
        }
    }

    /// Unwrap a duty record
    ///
    /// # Errors
    /// Returns [`StoreError::Corrupt`] if this is not a duty record
    pub fn into_duty(self) -> StoreResult<DutyRecord> {
        match self {
            Self::Duty(record) => Ok(record),
            other => Err(StoreError::Corrupt(format!(
                "expected duty record, found {}",
                other.kind()
            ))),
        }
    }

    /// Unwrap a counter value
    ///
    /// # Errors
    /// Returns [`StoreError::Corrupt`] if this is not a counter record
    pub fn into_counter(self) -> StoreResult<u64> {
        match self {
            Self::Counter(next) => Ok(next),
            other => Err(StoreError::Corrupt(format!(
                "expected counter record, found {}",
                other.kind()
            ))),
        }
    }

    /// Unwrap a warning record
    ///
    /// # Errors
    /// Returns [`StoreError::Corrupt`] if this is not a warning record
    pub fn into_warning(self) -> StoreResult<WarningRecord> {
        match self {
            Self::Warning(record) => Ok(record),
            other => Err(StoreError::Corrupt(format!(
                "expected warning record, found {}",
                other.kind()
            ))),
        }
    }
}

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend is offline or refused the request
    #[error("Store offline: {0}")]
    Unavailable(String),

    /// Filesystem failure in a durable backend
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes could not be encoded or decoded
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// A record did not match the kind it was stored under
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed record storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read one record
    async fn get(&self, kind: RecordKind, key: &str) -> StoreResult<Option<Record>>;

    /// Insert or replace one record
    async fn put(&self, kind: RecordKind, key: &str, record: Record) -> StoreResult<()>;

    /// Remove one record; removing a missing key is not an error
    async fn delete(&self, kind: RecordKind, key: &str) -> StoreResult<()>;

    /// Read every record of a kind
    async fn scan_all(&self, kind: RecordKind) -> StoreResult<Vec<(String, Record)>>;
}

/// Reject a record whose variant disagrees with the kind it is written under
pub(crate) fn ensure_kind(kind: RecordKind, record: &Record) -> StoreResult<()> {
    if record.kind() == kind {
        Ok(())
    } else {
        Err(StoreError::Corrupt(format!(
            "cannot store {} record under {kind}",
            record.kind()
        )))
    }
}
