//! Warning record

use crate::duty::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A warning issued against a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// Unique, monotonically assigned id; the handle for retraction
    pub id: u64,
    /// Member who was warned
    pub subject_id: MemberId,
    /// Moderator who issued the warning
    pub moderator_id: MemberId,
    /// Trimmed, non-empty reason
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

impl WarningRecord {
    /// Store key for this warning
    #[must_use]
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    /// Ordering that puts the newest warning first (`issued_at` desc, then id desc)
    #[must_use]
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.issued_at.cmp(&a.issued_at).then_with(|| b.id.cmp(&a.id))
    }
}

impl Display for WarningRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Warning #{} for {} by {} at {}: {}",
            self.id,
            self.subject_id,
            self.moderator_id,
            self.issued_at.to_rfc3339(),
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn warning(id: u64, minute: u32) -> WarningRecord {
        WarningRecord {
            id,
            subject_id: MemberId(1),
            moderator_id: MemberId(2),
            reason: "spam".to_string(),
            issued_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_newest_first_orders_by_time_then_id() {
        let mut warnings = vec![warning(1, 0), warning(3, 5), warning(2, 5), warning(4, 1)];
        warnings.sort_by(WarningRecord::newest_first);

        let ids: Vec<u64> = warnings.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_warning_display() {
        let display = warning(7, 0).to_string();
        assert!(display.starts_with("Warning #7 for 1 by 2"));
        assert!(display.ends_with(": spam"));
    }
}
