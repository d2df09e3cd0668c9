//! YAML file store
//!
//! Durable backend used by the bot. Each record kind lives in its own YAML file
//! under the data directory. Reads are served from memory; every mutation rewrites
//! the kind's file (temp file + rename) before the in-memory map changes, so a
//! failed write leaves both untouched.

use super::{Record, RecordKind, RecordStore, StoreResult, ensure_kind};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const DUTY_FILE: &str = "duty_records.yaml";
const WARNINGS_FILE: &str = "warnings.yaml";
const COUNTERS_FILE: &str = "counters.yaml";

/// One line of a kind file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    record: Record,
}

/// Store persisted as YAML files
///
/// Writes to one kind never wait on writes to another.
#[derive(Debug)]
pub struct YamlStore {
    dir: PathBuf,
    duty: DashMap<String, Record>,
    warnings: DashMap<String, Record>,
    counters: DashMap<String, Record>,
    duty_lock: Mutex<()>,
    warnings_lock: Mutex<()>,
    counters_lock: Mutex<()>,
}

impl YamlStore {
    /// Open the store, creating the data directory if needed and loading existing files
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or a file cannot be read or parsed
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let duty = load_kind(&dir.join(DUTY_FILE)).await?;
        let warnings = load_kind(&dir.join(WARNINGS_FILE)).await?;
        let counters = load_kind(&dir.join(COUNTERS_FILE)).await?;

        info!(
            data_dir = %dir.display(),
            duty_records = duty.len(),
            warnings = warnings.len(),
            counters = counters.len(),
            "Loaded record store"
        );

        Ok(Self {
            dir,
            duty,
            warnings,
            counters,
            duty_lock: Mutex::new(()),
            warnings_lock: Mutex::new(()),
            counters_lock: Mutex::new(()),
        })
    }

    fn table(&self, kind: RecordKind) -> &DashMap<String, Record> {
        match kind {
            RecordKind::Duty => &self.duty,
            RecordKind::Warning => &self.warnings,
            RecordKind::Counter => &self.counters,
        }
    }

    fn path(&self, kind: RecordKind) -> PathBuf {
        match kind {
            RecordKind::Duty => self.dir.join(DUTY_FILE),
            RecordKind::Warning => self.dir.join(WARNINGS_FILE),
            RecordKind::Counter => self.dir.join(COUNTERS_FILE),
        }
    }

    /// Serializes rewrites of one kind's file
    fn write_lock(&self, kind: RecordKind) -> &Mutex<()> {
        match kind {
            RecordKind::Duty => &self.duty_lock,
            RecordKind::Warning => &self.warnings_lock,
            RecordKind::Counter => &self.counters_lock,
        }
    }

    /// Current contents of a kind with one key replaced or removed
    fn snapshot_with(
        &self,
        kind: RecordKind,
        key: &str,
        replacement: Option<&Record>,
    ) -> Vec<StoredEntry> {
        let mut entries: Vec<StoredEntry> = self
            .table(kind)
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| StoredEntry {
                key: entry.key().clone(),
                record: entry.value().clone(),
            })
            .collect();

        if let Some(record) = replacement {
            entries.push(StoredEntry {
                key: key.to_string(),
                record: record.clone(),
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    async fn persist(&self, kind: RecordKind, entries: &[StoredEntry]) -> StoreResult<()> {
        let path = self.path(kind);
        let tmp = path.with_extension("yaml.tmp");

        let yaml = serde_yaml::to_string(entries)?;
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(kind = %kind, records = entries.len(), path = %path.display(), "Persisted records");
        Ok(())
    }
}

async fn load_kind(path: &Path) -> StoreResult<DashMap<String, Record>> {
    let map = DashMap::new();

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(map),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(map);
    }

    for entry in serde_yaml::from_str::<Vec<StoredEntry>>(&content)? {
        map.insert(entry.key, entry.record);
    }
    Ok(map)
}

#[async_trait]
impl RecordStore for YamlStore {
    async fn get(&self, kind: RecordKind, key: &str) -> StoreResult<Option<Record>> {
        Ok(self.table(kind).get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, kind: RecordKind, key: &str, record: Record) -> StoreResult<()> {
        ensure_kind(kind, &record)?;

        let _guard = self.write_lock(kind).lock().await;
        let entries = self.snapshot_with(kind, key, Some(&record));
        self.persist(kind, &entries).await?;
        self.table(kind).insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock(kind).lock().await;
        if !self.table(kind).contains_key(key) {
            return Ok(());
        }
        let entries = self.snapshot_with(kind, key, None);
        self.persist(kind, &entries).await?;
        self.table(kind).remove(key);
        Ok(())
    }

    async fn scan_all(&self, kind: RecordKind) -> StoreResult<Vec<(String, Record)>> {
        Ok(self
            .table(kind)
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::{DutyRecord, MemberId};
    use crate::ledger::WarningRecord;
    use crate::store::StoreError;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn warning(id: u64) -> Record {
        Record::Warning(WarningRecord {
            id,
            subject_id: MemberId(10),
            moderator_id: MemberId(20),
            reason: format!("reason {id}"),
            issued_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = YamlStore::open(dir.path()).await.unwrap();
            let mut duty = DutyRecord::off_duty(MemberId(10));
            duty.accumulated_minutes = 95;
            store
                .put(RecordKind::Duty, "10", Record::Duty(duty))
                .await
                .unwrap();
            store.put(RecordKind::Warning, "1", warning(1)).await.unwrap();
            store.put(RecordKind::Warning, "2", warning(2)).await.unwrap();
            store.delete(RecordKind::Warning, "1").await.unwrap();
        }

        let store = YamlStore::open(dir.path()).await.unwrap();
        let duty = store
            .get(RecordKind::Duty, "10")
            .await
            .unwrap()
            .unwrap()
            .into_duty()
            .unwrap();
        assert_eq!(duty.accumulated_minutes, 95);

        let warnings = store.scan_all(RecordKind::Warning).await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, "2");
        assert_eq!(warnings[0].1, warning(2));
    }

    #[tokio::test]
    async fn test_open_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlStore::open(dir.path().join("nested")).await.unwrap();
        assert!(store.scan_all(RecordKind::Duty).await.unwrap().is_empty());
        assert!(store.get(RecordKind::Warning, "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(DUTY_FILE), "not: [valid")
            .await
            .unwrap();

        let result = YamlStore::open(dir.path()).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlStore::open(dir.path()).await.unwrap();
        store.delete(RecordKind::Warning, "404").await.unwrap();
        assert!(!dir.path().join(WARNINGS_FILE).exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_file_and_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlStore::open(dir.path()).await.unwrap();

        let original = DutyRecord::off_duty(MemberId(10));
        store
            .put(RecordKind::Duty, "10", Record::Duty(original.clone()))
            .await
            .unwrap();
        let on_disk = tokio::fs::read_to_string(dir.path().join(DUTY_FILE))
            .await
            .unwrap();

        // A directory squatting on the temp path makes the write fail
        tokio::fs::create_dir(dir.path().join("duty_records.yaml.tmp"))
            .await
            .unwrap();

        let mut changed = original.clone();
        changed.accumulated_minutes = 120;
        let result = store
            .put(RecordKind::Duty, "10", Record::Duty(changed))
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));

        let held = store.get(RecordKind::Duty, "10").await.unwrap();
        assert_eq!(held, Some(Record::Duty(original)));
        let after = tokio::fs::read_to_string(dir.path().join(DUTY_FILE))
            .await
            .unwrap();
        assert_eq!(after, on_disk);

        let result = store.delete(RecordKind::Duty, "10").await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.get(RecordKind::Duty, "10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_kinds_do_not_share_a_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlStore::open(dir.path()).await.unwrap();

        let _duty_guard = store.write_lock(RecordKind::Duty).lock().await;
        let warning_put = store.put(RecordKind::Warning, "1", warning(1));
        tokio::time::timeout(Duration::from_secs(5), warning_put)
            .await
            .expect("warning write waited on the duty lock")
            .unwrap();
        let counter_put = store.put(RecordKind::Counter, "warning_id", Record::Counter(2));
        tokio::time::timeout(Duration::from_secs(5), counter_put)
            .await
            .expect("counter write waited on the duty lock")
            .unwrap();

        assert!(store.write_lock(RecordKind::Duty).try_lock().is_err());
        assert!(store.write_lock(RecordKind::Warning).try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_counters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = YamlStore::open(dir.path()).await.unwrap();
            store
                .put(RecordKind::Counter, "warning_id", Record::Counter(7))
                .await
                .unwrap();
        }

        let store = YamlStore::open(dir.path()).await.unwrap();
        let next = store
            .get(RecordKind::Counter, "warning_id")
            .await
            .unwrap()
            .unwrap()
            .into_counter()
            .unwrap();
        assert_eq!(next, 7);
        assert!(dir.path().join(COUNTERS_FILE).exists());
    }
}
