//! Duty record and state machine
//!
//! A member cycles OFF_DUTY -> ON_DUTY <-> ON_BREAK -> OFF_DUTY. Break time is
//! excluded by moving `shift_started_at` forward by the length of the break when the
//! break closes, so the elapsed time at `end` is simply `now - shift_started_at`.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Stable identifier of a tracked member (Discord user snowflake)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl MemberId {
    /// Key used for this member's duty record in the store
    #[must_use]
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

/// Duty lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DutyStatus {
    #[default]
    OffDuty,
    OnDuty,
    OnBreak,
}

impl std::fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OffDuty => write!(f, "Off Duty"),
            Self::OnDuty => write!(f, "On Duty"),
            Self::OnBreak => write!(f, "On Break"),
        }
    }
}

/// Per-member duty state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyRecord {
    pub member_id: MemberId,
    pub status: DutyStatus,
    /// Set while on duty or on break
    pub shift_started_at: Option<DateTime<Utc>>,
    /// Set while on break; never earlier than `shift_started_at`
    pub break_started_at: Option<DateTime<Utc>>,
    /// Completed duty minutes across all ended shifts
    pub accumulated_minutes: u64,
}

/// Outcome of ending a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSummary {
    /// Worked minutes in the shift that just ended
    pub elapsed_minutes: u64,
    /// Accumulated minutes including this shift
    pub total_minutes: u64,
}

/// The record a member effectively has: the stored one, or a fresh OFF_DUTY record
#[must_use]
pub fn effective(member_id: MemberId, record: Option<DutyRecord>) -> DutyRecord {
    record.unwrap_or_else(|| DutyRecord::off_duty(member_id))
}

/// Whole minutes between two instants, floored and clamped at zero
fn whole_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_minutes()).unwrap_or(0)
}

impl DutyRecord {
    /// A record with no shift history
    #[must_use]
    pub fn off_duty(member_id: MemberId) -> Self {
        Self {
            member_id,
            status: DutyStatus::OffDuty,
            shift_started_at: None,
            break_started_at: None,
            accumulated_minutes: 0,
        }
    }

    /// Begin a shift
    ///
    /// # Errors
    /// Returns `AlreadyActive` unless the member is off duty
    pub fn start(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != DutyStatus::OffDuty {
            return Err(CoreError::AlreadyActive);
        }

        self.status = DutyStatus::OnDuty;
        self.shift_started_at = Some(now);
        self.break_started_at = None;
        Ok(())
    }

    /// Pause the running shift
    ///
    /// # Errors
    /// Returns `NoActiveShift` when off duty and `AlreadyOnBreak` when on break
    pub fn take_break(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        let started = match self.status {
            DutyStatus::OffDuty => return Err(CoreError::NoActiveShift),
            DutyStatus::OnBreak => return Err(CoreError::AlreadyOnBreak),
            DutyStatus::OnDuty => self.shift_started_at.unwrap_or(now),
        };

        self.status = DutyStatus::OnBreak;
        self.break_started_at = Some(now.max(started));
        Ok(())
    }

    /// Return from a break
    ///
    /// # Errors
    /// Returns `NotOnBreak` unless the member is on break
    pub fn resume(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != DutyStatus::OnBreak {
            return Err(CoreError::NotOnBreak);
        }

        self.close_break(now);
        self.status = DutyStatus::OnDuty;
        Ok(())
    }

    /// Finish the shift and bank its worked minutes
    ///
    /// # Errors
    /// Returns `NoActiveShift` when off duty
    pub fn end(&mut self, now: DateTime<Utc>) -> CoreResult<ShiftSummary> {
        if self.status == DutyStatus::OffDuty {
            return Err(CoreError::NoActiveShift);
        }

        self.close_break(now);
        let elapsed_minutes = self
            .shift_started_at
            .map_or(0, |started| whole_minutes(started, now));

        self.accumulated_minutes = self.accumulated_minutes.saturating_add(elapsed_minutes);
        self.status = DutyStatus::OffDuty;
        self.shift_started_at = None;
        self.break_started_at = None;

        Ok(ShiftSummary {
            elapsed_minutes,
            total_minutes: self.accumulated_minutes,
        })
    }

    /// Add or remove banked minutes, saturating at zero; status is untouched
    pub fn adjust(&mut self, delta_minutes: i64) -> u64 {
        let magnitude = delta_minutes.unsigned_abs();
        self.accumulated_minutes = if delta_minutes >= 0 {
            self.accumulated_minutes.saturating_add(magnitude)
        } else {
            self.accumulated_minutes.saturating_sub(magnitude)
        };
        self.accumulated_minutes
    }

    /// Shift the start forward by the break length so the break is not counted
    fn close_break(&mut self, now: DateTime<Utc>) {
        if let Some(break_started) = self.break_started_at.take() {
            let paused = (now - break_started).max(TimeDelta::zero());
            self.shift_started_at = self.shift_started_at.map(|started| started + paused);
        }
    }
}
