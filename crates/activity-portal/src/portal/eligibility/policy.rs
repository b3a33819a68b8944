use serde::{Deserialize, Serialize};

/// Why an apply (or cancel) action was refused. These are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    SystemClosed,
    OutsideWindow,
    RoomQuotaFull,
    GradeNotAllowed,
    MissingPrerequisite,
    AlreadyApplied,
}

impl BlockReason {
    /// Stable machine-readable code used in API payloads.
    pub const fn code(self) -> &'static str {
        match self {
            BlockReason::SystemClosed => "system_closed",
            BlockReason::OutsideWindow => "outside_window",
            BlockReason::RoomQuotaFull => "room_quota_full",
            BlockReason::GradeNotAllowed => "grade_not_allowed",
            BlockReason::MissingPrerequisite => "missing_prerequisite",
            BlockReason::AlreadyApplied => "already_applied",
        }
    }

    pub const fn summary(self) -> &'static str {
        match self {
            BlockReason::SystemClosed => "applications are closed",
            BlockReason::OutsideWindow => "outside the application window",
            BlockReason::RoomQuotaFull => "this classroom has reached its quota",
            BlockReason::GradeNotAllowed => "your grade level is not eligible",
            BlockReason::MissingPrerequisite => "you must be a core leader before applying",
            BlockReason::AlreadyApplied => "you have already applied",
        }
    }
}

/// Result of running the eligibility rules for one student and activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum EligibilityDecision {
    Allowed,
    Blocked(BlockReason),
}

impl EligibilityDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, EligibilityDecision::Allowed)
    }

    pub fn blocked_reason(&self) -> Option<BlockReason> {
        match self {
            EligibilityDecision::Allowed => None,
            EligibilityDecision::Blocked(reason) => Some(*reason),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            EligibilityDecision::Allowed => "eligible to apply".to_string(),
            EligibilityDecision::Blocked(reason) => format!("blocked: {}", reason.summary()),
        }
    }
}

impl From<Option<BlockReason>> for EligibilityDecision {
    fn from(value: Option<BlockReason>) -> Self {
        match value {
            Some(reason) => EligibilityDecision::Blocked(reason),
            None => EligibilityDecision::Allowed,
        }
    }
}
