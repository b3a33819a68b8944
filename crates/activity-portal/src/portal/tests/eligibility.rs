use super::common::*;
use std::collections::BTreeSet;

use chrono::Duration;

use crate::portal::domain::{ActivityKind, ApplicationTrack, GradeLevel, Student};
use crate::portal::eligibility::{
    evaluate, evaluate_cancellation, failing_reasons, is_within_window, project_gate, room_count,
    room_tally, system_open, BlockReason, EligibilityContext, EligibilityDecision, RoomKey,
};

fn decide(
    track: ApplicationTrack,
    student: &Student,
    config: &crate::portal::domain::ActivityConfig,
    room_count: usize,
) -> EligibilityDecision {
    evaluate(
        track,
        &EligibilityContext {
            student,
            config,
            now: at(2025, 6, 1, 3, 0),
            room_count,
        },
    )
}

#[test]
fn already_applied_dominates_every_other_rule() {
    let mut applicant = student(GradeLevel::M1, 1);
    applicant.is_core_leader = true;

    let mut config = open_config(ActivityKind::CoreLeader);
    config.is_open = false;
    config.quota_per_room = Some(1);

    assert_eq!(
        decide(ApplicationTrack::CoreLeader, &applicant, &config, 5),
        EligibilityDecision::Blocked(BlockReason::AlreadyApplied)
    );
}

#[test]
fn closed_switch_dominates_window_quota_and_grade() {
    let mut config = open_config(ActivityKind::Committee);
    config.is_open = false;
    config.open_date = Some(at(2025, 1, 1, 0, 0));
    config.close_date = Some(at(2025, 12, 31, 0, 0));
    config.allowed_grades = Some(BTreeSet::from([GradeLevel::M6]));

    assert_eq!(
        decide(ApplicationTrack::Committee, &student(GradeLevel::M1, 1), &config, 0),
        EligibilityDecision::Blocked(BlockReason::SystemClosed)
    );

    let mut core = open_config(ActivityKind::CoreLeader);
    core.is_open = false;
    core.quota_per_room = Some(1);
    assert_eq!(
        decide(ApplicationTrack::CoreLeader, &student(GradeLevel::M1, 1), &core, 3),
        EligibilityDecision::Blocked(BlockReason::SystemClosed)
    );
}

#[test]
fn window_bounds_are_inclusive() {
    let open = at(2025, 6, 1, 1, 0);
    let close = at(2025, 6, 10, 16, 59);

    assert!(is_within_window(open, Some(open), Some(close)));
    assert!(is_within_window(close, Some(open), Some(close)));
    assert!(!is_within_window(open - Duration::seconds(1), Some(open), Some(close)));
    assert!(!is_within_window(close + Duration::seconds(1), Some(open), Some(close)));
}

#[test]
fn missing_bounds_never_restrict() {
    let now = at(2025, 6, 1, 0, 0);
    assert!(is_within_window(now, None, None));
    assert!(is_within_window(now, Some(now - Duration::days(1)), None));
    assert!(!is_within_window(now, Some(now + Duration::days(1)), None));
    assert!(is_within_window(now, None, Some(now + Duration::days(1))));
    assert!(!is_within_window(now, None, Some(now - Duration::days(1))));
}

#[test]
fn outside_window_blocks_an_open_activity() {
    let mut config = open_config(ActivityKind::CoreLeader);
    config.close_date = Some(at(2025, 5, 31, 0, 0));

    assert_eq!(
        decide(ApplicationTrack::CoreLeader, &student(GradeLevel::M1, 1), &config, 0),
        EligibilityDecision::Blocked(BlockReason::OutsideWindow)
    );
    assert!(!system_open(&config, at(2025, 6, 1, 0, 0)));
}

#[test]
fn committee_grade_allow_list() {
    let mut config = open_config(ActivityKind::Committee);
    config.allowed_grades = Some(BTreeSet::from([GradeLevel::M4, GradeLevel::M5]));

    let mut junior = student(GradeLevel::M2, 1);
    junior.is_core_leader = true;
    assert_eq!(
        decide(ApplicationTrack::Committee, &junior, &config, 0),
        EligibilityDecision::Blocked(BlockReason::GradeNotAllowed)
    );

    let mut senior = student(GradeLevel::M4, 1);
    senior.is_core_leader = true;
    assert!(decide(ApplicationTrack::Committee, &senior, &config, 0).is_allowed());

    config.allowed_grades = Some(BTreeSet::new());
    assert!(decide(ApplicationTrack::Committee, &junior, &config, 0).is_allowed());
}

#[test]
fn core_leader_ignores_grade_allow_list() {
    let mut config = open_config(ActivityKind::CoreLeader);
    config.allowed_grades = Some(BTreeSet::from([GradeLevel::M6]));

    assert!(decide(ApplicationTrack::CoreLeader, &student(GradeLevel::M1, 1), &config, 0).is_allowed());
}

#[test]
fn committee_requires_core_leader_role() {
    let config = open_config(ActivityKind::Committee);
    let applicant = student(GradeLevel::M4, 2);

    assert_eq!(
        decide(ApplicationTrack::Committee, &applicant, &config, 0),
        EligibilityDecision::Blocked(BlockReason::MissingPrerequisite)
    );
}

#[test]
fn room_quota_blocks_at_capacity() {
    let mut config = open_config(ActivityKind::CoreLeader);
    config.quota_per_room = Some(2);
    let applicant = student(GradeLevel::M1, 1);

    assert!(decide(ApplicationTrack::CoreLeader, &applicant, &config, 1).is_allowed());
    assert_eq!(
        decide(ApplicationTrack::CoreLeader, &applicant, &config, 2),
        EligibilityDecision::Blocked(BlockReason::RoomQuotaFull)
    );

    config.quota_per_room = None;
    assert!(decide(ApplicationTrack::CoreLeader, &applicant, &config, 40).is_allowed());
}

#[test]
fn committee_has_no_room_quota() {
    let mut config = open_config(ActivityKind::Committee);
    config.quota_per_room = Some(1);
    let mut applicant = student(GradeLevel::M5, 3);
    applicant.is_core_leader = true;

    assert!(decide(ApplicationTrack::Committee, &applicant, &config, 10).is_allowed());
}

#[test]
fn failing_reasons_lists_every_failure_in_order() {
    let mut config = open_config(ActivityKind::Committee);
    config.is_open = false;
    config.allowed_grades = Some(BTreeSet::from([GradeLevel::M6]));
    let applicant = student(GradeLevel::M1, 1);

    let reasons = failing_reasons(
        ApplicationTrack::Committee,
        &EligibilityContext {
            student: &applicant,
            config: &config,
            now: at(2025, 6, 1, 0, 0),
            room_count: 0,
        },
    );
    assert_eq!(
        reasons,
        vec![
            BlockReason::SystemClosed,
            BlockReason::GradeNotAllowed,
            BlockReason::MissingPrerequisite,
        ]
    );
}

#[test]
fn cancellation_follows_the_system_gate_only() {
    let now = at(2025, 6, 1, 0, 0);
    let mut config = open_config(ActivityKind::CoreLeader);
    config.quota_per_room = Some(1);
    assert_eq!(evaluate_cancellation(&config, now), EligibilityDecision::Allowed);

    config.close_date = Some(now - Duration::minutes(1));
    assert_eq!(
        evaluate_cancellation(&config, now),
        EligibilityDecision::Blocked(BlockReason::OutsideWindow)
    );

    config.is_open = false;
    assert_eq!(
        evaluate_cancellation(&config, now),
        EligibilityDecision::Blocked(BlockReason::SystemClosed)
    );
}

#[test]
fn project_gate_ignores_dates() {
    let mut config = open_config(ActivityKind::Project);
    config.close_date = Some(at(2020, 1, 1, 0, 0));
    assert!(project_gate(&config).is_allowed());

    config.is_open = false;
    assert_eq!(
        project_gate(&config),
        EligibilityDecision::Blocked(BlockReason::SystemClosed)
    );
}

#[test]
fn room_tally_groups_by_grade_and_room() {
    let mut a = student(GradeLevel::M1, 1);
    a.is_core_leader = true;
    let mut b = student(GradeLevel::M1, 1);
    b.is_core_leader = true;
    let mut c = student(GradeLevel::M1, 2);
    c.is_core_leader = true;
    let d = student(GradeLevel::M1, 2);
    let students = vec![a, b, c, d];

    let tally = room_tally(&students, ApplicationTrack::CoreLeader);
    assert_eq!(tally.len(), 2);
    assert_eq!(
        tally.get(&RoomKey {
            grade: GradeLevel::M1,
            room: room(1)
        }),
        Some(&2)
    );
    assert_eq!(
        room_count(
            &students,
            ApplicationTrack::CoreLeader,
            RoomKey {
                grade: GradeLevel::M1,
                room: room(2)
            }
        ),
        1
    );
    assert!(room_tally(&students, ApplicationTrack::Committee).is_empty());
}

#[test]
fn decisions_serialize_with_reason_codes() {
    let value = serde_json::to_value(EligibilityDecision::Blocked(BlockReason::RoomQuotaFull))
        .expect("serializes");
    assert_eq!(
        value,
        serde_json::json!({ "status": "blocked", "reason": "room_quota_full" })
    );
    assert_eq!(BlockReason::RoomQuotaFull.code(), "room_quota_full");
}
