//! Error types for the duty and moderation core
//!
//! Every core operation reports failures through [`CoreError`]. Store failures are
//! wrapped unchanged so callers can decide whether to retry.

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during duty, warning and leaderboard operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// `start` on a member who is already on duty or on break
    #[error("Member already has an active shift")]
    AlreadyActive,

    /// `break` on a member who is already on break
    #[error("Member is already on break")]
    AlreadyOnBreak,

    /// `break` or `end` on a member who is off duty
    #[error("Member has no active shift")]
    NoActiveShift,

    /// `resume` on a member who is not on break
    #[error("Member is not on break")]
    NotOnBreak,

    /// Warning reason was empty after trimming
    #[error("Warning reason must not be empty")]
    InvalidReason,

    /// `retract_latest` on a member with no warnings
    #[error("Member has no warnings")]
    NoWarnings,

    /// Leaderboard limit was zero or negative
    #[error("Invalid leaderboard limit: {0}")]
    InvalidLimit(i64),

    /// The persistent store could not serve the request
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
