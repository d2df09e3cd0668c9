//! Duty leaderboard
//!
//! Ranks members by banked duty minutes. Time in a running shift is not counted
//! until the shift ends.

use crate::duty::MemberId;
use crate::error::{CoreError, CoreResult};
use crate::store::{RecordKind, RecordStore};
use std::cmp::Reverse;
use std::sync::Arc;

/// Number of entries returned when no limit is given
pub const DEFAULT_LIMIT: usize = 10;

/// One ranked row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub member_id: MemberId,
    pub total_minutes: u64,
}

/// Computes leaderboards from a full scan of duty records
#[derive(Clone)]
pub struct Leaderboard {
    store: Arc<dyn RecordStore>,
    default_limit: usize,
}

impl Leaderboard {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_default_limit(store, DEFAULT_LIMIT)
    }

    /// Use `default_limit` when callers pass no limit (zero falls back to [`DEFAULT_LIMIT`])
    #[must_use]
    pub fn with_default_limit(store: Arc<dyn RecordStore>, default_limit: usize) -> Self {
        let default_limit = if default_limit == 0 {
            DEFAULT_LIMIT
        } else {
            default_limit
        };
        Self {
            store,
            default_limit,
        }
    }

    /// Top members by total minutes, ties broken by ascending member id
    ///
    /// # Errors
    /// `InvalidLimit` if `limit` is zero or negative, `StoreUnavailable` on store failure
    pub async fn top(&self, limit: Option<i64>) -> CoreResult<Vec<LeaderboardEntry>> {
        let limit = match limit {
            None => self.default_limit,
            Some(n) if n <= 0 => return Err(CoreError::InvalidLimit(n)),
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let mut totals = self
            .store
            .scan_all(RecordKind::Duty)
            .await?
            .into_iter()
            .map(|(_, record)| {
                record
                    .into_duty()
                    .map(|duty| (duty.member_id, duty.accumulated_minutes))
            })
            .collect::<Result<Vec<_>, _>>()?;

        totals.sort_by_key(|&(member_id, minutes)| (Reverse(minutes), member_id));

        Ok(totals
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (member_id, total_minutes))| LeaderboardEntry {
                rank: i + 1,
                member_id,
                total_minutes,
            })
            .collect())
    }
}
