//! Admission rules for the core-leader and committee applications.
//!
//! Everything here is a pure function of its inputs: no store access, no clock reads.

mod policy;
mod rules;
mod tally;

pub use policy::{BlockReason, EligibilityDecision};
pub use rules::is_within_window;
pub use tally::{room_count, room_tally, RoomKey};

use chrono::{DateTime, Utc};

use super::domain::{ActivityConfig, ApplicationTrack, Student};

/// Snapshot a decision is made against.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub student: &'a Student,
    pub config: &'a ActivityConfig,
    pub now: DateTime<Utc>,
    /// Students in the same grade and room who already hold the track's flag.
    pub room_count: usize,
}

/// First failing rule wins.
pub fn evaluate(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> EligibilityDecision {
    rules::RULES
        .iter()
        .find_map(|rule| rule(track, ctx))
        .into()
}

/// Every failing rule, in decision order. Empty when the student may apply.
pub fn failing_reasons(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Vec<BlockReason> {
    rules::RULES
        .iter()
        .filter_map(|rule| rule(track, ctx))
        .collect()
}

/// Withdrawing is allowed whenever the activity is accepting applications.
pub fn evaluate_cancellation(config: &ActivityConfig, now: DateTime<Utc>) -> EligibilityDecision {
    rules::system_gate(config, now).into()
}

/// True when the switch is on and `now` falls inside any configured window.
pub fn system_open(config: &ActivityConfig, now: DateTime<Utc>) -> bool {
    rules::system_gate(config, now).is_none()
}

/// Project submissions follow the manual switch only.
pub fn project_gate(config: &ActivityConfig) -> EligibilityDecision {
    if config.is_open {
        EligibilityDecision::Allowed
    } else {
        EligibilityDecision::Blocked(BlockReason::SystemClosed)
    }
}
