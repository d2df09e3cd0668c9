//! Warning ledger service
//!
//! Issue, list and retract warnings. Authorization is the caller's concern.

use crate::LEDGER_TARGET;
use crate::duty::MemberId;
use crate::error::{CoreError, CoreResult};
use crate::ledger::WarningRecord;
use crate::store::{KeyLocks, Record, RecordKind, RecordStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Counter key holding the next warning id
pub const WARNING_SEQUENCE_KEY: &str = "warning_id";

/// Append-only warning ledger with undo-last retraction
///
/// Ids are never reused: the next id is persisted before a warning is written, so
/// retracting the newest warning does not hand its id out again after a restart.
#[derive(Clone)]
pub struct WarningLedger {
    store: Arc<dyn RecordStore>,
    locks: KeyLocks,
    next_id: Arc<Mutex<u64>>,
}

impl WarningLedger {
    /// Open the ledger, resuming the persisted id sequence
    ///
    /// Falls back to one past the highest stored id when no sequence record exists.
    ///
    /// # Errors
    /// `StoreUnavailable` if the sequence or the existing warnings cannot be read
    pub async fn open(store: Arc<dyn RecordStore>) -> CoreResult<Self> {
        let persisted = match store.get(RecordKind::Counter, WARNING_SEQUENCE_KEY).await? {
            Some(record) => record.into_counter()?,
            None => 0,
        };

        let highest = store
            .scan_all(RecordKind::Warning)
            .await?
            .into_iter()
            .map(|(_, record)| record.into_warning().map(|warning| warning.id))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .max()
            .unwrap_or(0);

        let next = persisted.max(highest + 1);
        info!(target: LEDGER_TARGET, next_id = next, "Warning ledger opened");

        Ok(Self {
            store,
            locks: KeyLocks::new(),
            next_id: Arc::new(Mutex::new(next)),
        })
    }

    /// Hand out the next id, persisting the advanced sequence first
    async fn reserve_id(&self) -> CoreResult<u64> {
        let mut next = self.next_id.lock().await;
        let id = *next;
        self.store
            .put(
                RecordKind::Counter,
                WARNING_SEQUENCE_KEY,
                Record::Counter(id + 1),
            )
            .await?;
        *next = id + 1;
        Ok(id)
    }

    /// Record a warning against `subject`
    ///
    /// # Errors
    /// `InvalidReason` if `reason` is blank, `StoreUnavailable` on store failure
    pub async fn issue_warning(
        &self,
        subject: MemberId,
        moderator: MemberId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<WarningRecord> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::InvalidReason);
        }

        let _guard = self.locks.lock(&subject.key()).await;
        let warning = WarningRecord {
            id: self.reserve_id().await?,
            subject_id: subject,
            moderator_id: moderator,
            reason: reason.to_string(),
            issued_at: now,
        };

        self.store
            .put(
                RecordKind::Warning,
                &warning.key(),
                Record::Warning(warning.clone()),
            )
            .await?;

        info!(
            target: LEDGER_TARGET,
            warning_id = warning.id,
            subject_id = %subject,
            moderator_id = %moderator,
            "Warning issued"
        );
        Ok(warning)
    }

    /// Warnings for `subject`, newest first; empty when there are none
    ///
    /// # Errors
    /// `StoreUnavailable` on store failure
    pub async fn list_warnings(&self, subject: MemberId) -> CoreResult<Vec<WarningRecord>> {
        let mut warnings = Vec::new();
        for (_, record) in self.store.scan_all(RecordKind::Warning).await? {
            let warning = record.into_warning()?;
            if warning.subject_id == subject {
                warnings.push(warning);
            }
        }
        warnings.sort_by(WarningRecord::newest_first);
        Ok(warnings)
    }

    /// Remove and return the newest warning for `subject`
    ///
    /// # Errors
    /// `NoWarnings` if the subject has none, `StoreUnavailable` on store failure
    pub async fn retract_latest(&self, subject: MemberId) -> CoreResult<WarningRecord> {
        let _guard = self.locks.lock(&subject.key()).await;

        let latest = self
            .list_warnings(subject)
            .await?
            .into_iter()
            .next()
            .ok_or(CoreError::NoWarnings)?;

        self.store
            .delete(RecordKind::Warning, &latest.key())
            .await?;

        info!(
            target: LEDGER_TARGET,
            warning_id = latest.id,
            subject_id = %subject,
            "Warning retracted"
        );
        Ok(latest)
    }
}
