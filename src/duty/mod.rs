//! Duty tracking
//!
//! Members toggle between off duty, on duty and on break; completed shift time is
//! banked into a running total per member.

mod record;
mod service;

pub use record::{DutyRecord, DutyStatus, MemberId, ShiftSummary, effective};
pub use service::DutyService;
