//! Duty service
//!
//! Runs duty transitions against the store. Each transition holds the member's key
//! lock across load, transition and write; a rejected transition writes nothing.

use crate::duty::{DutyRecord, MemberId, ShiftSummary, effective};
use crate::error::CoreResult;
use crate::store::{KeyLocks, Record, RecordKind, RecordStore};
use crate::DUTY_TARGET;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Service for duty operations
#[derive(Clone)]
pub struct DutyService {
    store: Arc<dyn RecordStore>,
    locks: KeyLocks,
}

impl DutyService {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// Start a shift for `member`
    ///
    /// # Errors
    /// `AlreadyActive` if a shift is running, `StoreUnavailable` on store failure
    pub async fn start(&self, member: MemberId, now: DateTime<Utc>) -> CoreResult<DutyRecord> {
        self.transition(member, "start", |record| {
            record.start(now)?;
            Ok(record.clone())
        })
        .await
    }

    /// Put `member` on break
    ///
    /// # Errors
    /// `NoActiveShift`, `AlreadyOnBreak`, or `StoreUnavailable`
    pub async fn take_break(
        &self,
        member: MemberId,
        now: DateTime<Utc>,
    ) -> CoreResult<DutyRecord> {
        self.transition(member, "break", |record| {
            record.take_break(now)?;
            Ok(record.clone())
        })
        .await
    }

    /// Bring `member` back from a break
    ///
    /// # Errors
    /// `NotOnBreak` or `StoreUnavailable`
    pub async fn resume(&self, member: MemberId, now: DateTime<Utc>) -> CoreResult<DutyRecord> {
        self.transition(member, "resume", |record| {
            record.resume(now)?;
            Ok(record.clone())
        })
        .await
    }

    /// End the shift for `member` and bank its minutes
    ///
    /// # Errors
    /// `NoActiveShift` or `StoreUnavailable`
    pub async fn end(&self, member: MemberId, now: DateTime<Utc>) -> CoreResult<ShiftSummary> {
        self.transition(member, "end", |record| record.end(now)).await
    }

    /// Add or remove banked minutes for `member`, returning the new total
    ///
    /// # Errors
    /// `StoreUnavailable` on store failure
    pub async fn adjust(&self, member: MemberId, delta_minutes: i64) -> CoreResult<u64> {
        self.transition(member, "adjust", |record| Ok(record.adjust(delta_minutes)))
            .await
    }

    /// Current effective record for `member`
    ///
    /// # Errors
    /// `StoreUnavailable` on store failure
    pub async fn status(&self, member: MemberId) -> CoreResult<DutyRecord> {
        self.load(member).await
    }

    async fn load(&self, member: MemberId) -> CoreResult<DutyRecord> {
        let stored = self
            .store
            .get(RecordKind::Duty, &member.key())
            .await?
            .map(Record::into_duty)
            .transpose()?;
        Ok(effective(member, stored))
    }

    async fn transition<T, F>(&self, member: MemberId, operation: &str, apply: F) -> CoreResult<T>
    where
        F: FnOnce(&mut DutyRecord) -> CoreResult<T> + Send,
        T: Send,
    {
        let key = member.key();
        let _guard = self.locks.lock(&key).await;

        let mut record = self.load(member).await?;
        let output = match apply(&mut record) {
            Ok(output) => output,
            Err(e) => {
                debug!(
                    target: DUTY_TARGET,
                    member_id = %member,
                    operation,
                    status = %record.status,
                    error = %e,
                    "Duty transition rejected"
                );
                return Err(e);
            }
        };

        self.store
            .put(RecordKind::Duty, &key, Record::Duty(record.clone()))
            .await?;

        info!(
            target: DUTY_TARGET,
            member_id = %member,
            operation,
            status = %record.status,
            accumulated_minutes = record.accumulated_minutes,
            "Duty record updated"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::DutyStatus;
    use crate::error::CoreError;
    use crate::store::{MemoryStore, MockRecordStore, StoreError};
    use chrono::{TimeDelta, TimeZone};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + TimeDelta::minutes(minutes)
    }

    fn service() -> (Arc<MemoryStore>, DutyService) {
        let store = Arc::new(MemoryStore::new());
        let service = DutyService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_start_then_end_banks_floor_of_elapsed() {
        let (_, duty) = service();
        let member = MemberId(1);

        duty.start(member, t0()).await.unwrap();
        let summary = duty
            .end(member, t0() + TimeDelta::seconds(37 * 60 + 59))
            .await
            .unwrap();

        assert_eq!(summary.elapsed_minutes, 37);
        assert_eq!(summary.total_minutes, 37);
        assert_eq!(duty.status(member).await.unwrap().accumulated_minutes, 37);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected_without_write() {
        let (store, duty) = service();
        let member = MemberId(1);

        let started = duty.start(member, t0()).await.unwrap();
        let writes = store.write_count();

        let result = duty.start(member, at(5)).await;
        assert!(matches!(result, Err(CoreError::AlreadyActive)));
        assert_eq!(store.write_count(), writes);
        assert_eq!(duty.status(member).await.unwrap(), started);
    }

    #[tokio::test]
    async fn test_break_resume_excludes_break() {
        let (_, duty) = service();
        let member = MemberId(1);

        duty.start(member, t0()).await.unwrap();
        duty.take_break(member, at(10)).await.unwrap();
        duty.resume(member, at(15)).await.unwrap();
        let summary = duty.end(member, at(20)).await.unwrap();

        assert_eq!(summary.elapsed_minutes, 15);
    }

    #[tokio::test]
    async fn test_end_preserves_record_for_history() {
        let (store, duty) = service();
        let member = MemberId(1);

        duty.start(member, t0()).await.unwrap();
        duty.end(member, at(45)).await.unwrap();

        assert_eq!(store.len(RecordKind::Duty), 1);
        let record = duty.status(member).await.unwrap();
        assert_eq!(record.status, DutyStatus::OffDuty);
        assert_eq!(record.accumulated_minutes, 45);
        assert!(record.shift_started_at.is_none());
    }

    #[tokio::test]
    async fn test_end_without_record_never_writes() {
        let mut store = MockRecordStore::new();
        store.expect_get().returning(|_, _| Ok(None));
        store.expect_put().never();
        store.expect_delete().never();

        let duty = DutyService::new(Arc::new(store));
        let result = duty.end(MemberId(99), t0()).await;
        assert!(matches!(result, Err(CoreError::NoActiveShift)));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, duty) = service();
        store.set_offline(true);

        let result = duty.start(MemberId(1), t0()).await;
        assert!(matches!(
            result,
            Err(CoreError::StoreUnavailable(StoreError::Unavailable(_)))
        ));

        store.set_offline(false);
        assert_eq!(
            duty.status(MemberId(1)).await.unwrap().status,
            DutyStatus::OffDuty
        );
    }

    #[tokio::test]
    async fn test_adjust_creates_record_and_saturates() {
        let (_, duty) = service();
        let member = MemberId(3);

        assert_eq!(duty.adjust(member, 25).await.unwrap(), 25);
        assert_eq!(duty.adjust(member, -40).await.unwrap(), 0);
        assert_eq!(
            duty.status(member).await.unwrap().status,
            DutyStatus::OffDuty
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_starts_admit_one() {
        let (_, duty) = service();
        let member = MemberId(8);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let duty = duty.clone();
                tokio::spawn(async move { duty.start(member, at(i)).await })
            })
            .collect();

        let mut started = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => started += 1,
                Err(e) => assert!(matches!(e, CoreError::AlreadyActive)),
            }
        }
        assert_eq!(started, 1);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start,
        Break,
        Resume,
        End,
        Adjust(i64),
    }

    fn random_ops(rng: &mut StdRng, len: usize) -> Vec<Op> {
        (0..len)
            .map(|_| match rng.random_range(0..5) {
                0 => Op::Start,
                1 => Op::Break,
                2 => Op::Resume,
                3 => Op::End,
                _ => Op::Adjust(rng.random_range(-30..=30)),
            })
            .collect()
    }

    async fn run_ops(duty: &DutyService, member: MemberId, ops: &[Op]) {
        for (step, op) in ops.iter().enumerate() {
            let now = at(i64::try_from(step).unwrap() * 7);
            let _ = match *op {
                Op::Start => duty.start(member, now).await.map(|_| ()),
                Op::Break => duty.take_break(member, now).await.map(|_| ()),
                Op::Resume => duty.resume(member, now).await.map(|_| ()),
                Op::End => duty.end(member, now).await.map(|_| ()),
                Op::Adjust(delta) => duty.adjust(member, delta).await.map(|_| ()),
            };
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_members_match_isolated_runs() {
        let mut rng = StdRng::seed_from_u64(0x5EED);

        for _round in 0..8 {
            let plans: Vec<(MemberId, Vec<Op>)> = (1..=6)
                .map(|id| (MemberId(id), random_ops(&mut rng, 40)))
                .collect();

            let (_, shared) = service();
            let handles: Vec<_> = plans
                .iter()
                .cloned()
                .map(|(member, ops)| {
                    let duty = shared.clone();
                    tokio::spawn(async move { run_ops(&duty, member, &ops).await })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }

            for (member, ops) in &plans {
                let (_, isolated) = service();
                run_ops(&isolated, *member, ops).await;

                assert_eq!(
                    shared.status(*member).await.unwrap(),
                    isolated.status(*member).await.unwrap(),
                    "member {member} diverged"
                );
            }
        }
    }
}
