use chrono::{DateTime, Utc};

use super::super::domain::{ActivityConfig, ApplicationTrack};
use super::policy::BlockReason;
use super::EligibilityContext;

type Rule = fn(ApplicationTrack, &EligibilityContext<'_>) -> Option<BlockReason>;

/// Rules in decision order; the first failure is the canonical answer.
pub(crate) const RULES: [Rule; 5] = [
    already_applied,
    system_gate_rule,
    grade_allowed,
    prerequisite_held,
    room_quota,
];

/// Inclusive on both bounds. A missing bound never restricts.
pub fn is_within_window(
    now: DateTime<Utc>,
    open_date: Option<DateTime<Utc>>,
    close_date: Option<DateTime<Utc>>,
) -> bool {
    open_date.map_or(true, |open| now >= open) && close_date.map_or(true, |close| now <= close)
}

/// Manual switch first, then the automatic window.
pub(crate) fn system_gate(config: &ActivityConfig, now: DateTime<Utc>) -> Option<BlockReason> {
    if !config.is_open {
        return Some(BlockReason::SystemClosed);
    }
    if !is_within_window(now, config.open_date, config.close_date) {
        return Some(BlockReason::OutsideWindow);
    }
    None
}

fn already_applied(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Option<BlockReason> {
    ctx.student
        .has_applied(track)
        .then_some(BlockReason::AlreadyApplied)
}

fn system_gate_rule(_track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Option<BlockReason> {
    system_gate(ctx.config, ctx.now)
}

fn grade_allowed(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Option<BlockReason> {
    if !track.has_grade_allowlist() {
        return None;
    }

    match &ctx.config.allowed_grades {
        Some(grades) if !grades.is_empty() && !grades.contains(&ctx.student.grade) => {
            Some(BlockReason::GradeNotAllowed)
        }
        _ => None,
    }
}

fn prerequisite_held(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Option<BlockReason> {
    match track.prerequisite() {
        Some(required) if !ctx.student.has_applied(required) => {
            Some(BlockReason::MissingPrerequisite)
        }
        _ => None,
    }
}

fn room_quota(track: ApplicationTrack, ctx: &EligibilityContext<'_>) -> Option<BlockReason> {
    if !track.has_room_quota() {
        return None;
    }

    match ctx.config.quota_per_room {
        Some(quota) if ctx.room_count >= quota as usize => Some(BlockReason::RoomQuotaFull),
        _ => None,
    }
}
