//! School activity registration portal.
//!
//! Students register, sign in and apply for classroom core-leader and student committee
//! roles; administrators open and close activities, set room quotas and grade eligibility,
//! post announcements and manage the student roster.

pub mod config;
pub mod error;
pub mod portal;
pub mod telemetry;
