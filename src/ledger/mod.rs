//! Moderation ledger
//!
//! Per-member warnings: append on issue, newest-first listing, and retraction of the
//! newest warning only.

mod record;
mod service;

pub use record::WarningRecord;
pub use service::{WARNING_SEQUENCE_KEY, WarningLedger};
