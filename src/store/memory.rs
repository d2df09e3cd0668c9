//! In-memory store
//!
//! Backs tests and local runs. It can be switched offline to exercise the
//! `StoreUnavailable` path and counts writes so callers can assert none happened.

use super::{Record, RecordKind, RecordStore, StoreError, StoreResult, ensure_kind};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Store backed by one `DashMap` per record kind
#[derive(Debug, Default)]
pub struct MemoryStore {
    duty: DashMap<String, Record>,
    warnings: DashMap<String, Record>,
    counters: DashMap<String, Record>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every primitive fail with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful puts and deletes
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of records held for a kind
    #[must_use]
    pub fn len(&self, kind: RecordKind) -> usize {
        self.table(kind).len()
    }

    fn table(&self, kind: RecordKind) -> &DashMap<String, Record> {
        match kind {
            RecordKind::Duty => &self.duty,
            RecordKind::Warning => &self.warnings,
            RecordKind::Counter => &self.counters,
        }
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, kind: RecordKind, key: &str) -> StoreResult<Option<Record>> {
        self.check_online()?;
        Ok(self.table(kind).get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, kind: RecordKind, key: &str, record: Record) -> StoreResult<()> {
        self.check_online()?;
        ensure_kind(kind, &record)?;
        self.table(kind).insert(key.to_string(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, key: &str) -> StoreResult<()> {
        self.check_online()?;
        self.table(kind).remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scan_all(&self, kind: RecordKind) -> StoreResult<Vec<(String, Record)>> {
        self.check_online()?;
        Ok(self
            .table(kind)
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}
