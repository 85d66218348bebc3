//! Candidate filter pipeline stages.
//!
//! Each scan batch runs through these in a fixed order: blocklist
//! reconciliation, ranking by the candidate provider, the delayed-carrier
//! hold-back, then (only while moving fast) the high-movement stability check.

mod blocklist;
mod delayed_carrier;
mod high_movement;

pub use blocklist::{BlockReason, BssidBlocklist};
pub use delayed_carrier::{CarrierFilterOutcome, DelayedCarrierFilter};
pub use high_movement::{HighMovementFilter, HighMovementOutcome};
