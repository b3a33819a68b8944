use super::common::*;
use std::sync::Arc;

use chrono::Duration;

use crate::portal::domain::{
    ActivityConfigPatch, ActivityKind, AnnouncementCategory, ApplicationTrack, GradeLevel,
    NewAnnouncement, ProjectSubmission, RecordId, SettingsPatch, StudentPatch, ValidationError,
};
use crate::portal::eligibility::{room_count, BlockReason, RoomKey};
use crate::portal::repository::{ActivityConfigStore, RepositoryError, StudentStore};
use crate::portal::service::{
    ApplicationOutcome, PortalService, PortalServiceError, ProjectOutcome,
};

fn now() -> chrono::DateTime<chrono::Utc> {
    at(2025, 6, 1, 3, 0)
}

fn applied(outcome: &ApplicationOutcome) -> bool {
    matches!(outcome, ApplicationOutcome::Applied { .. })
}

fn blocked_reason(outcome: &ApplicationOutcome) -> Option<BlockReason> {
    match outcome {
        ApplicationOutcome::Blocked { reason } => Some(*reason),
        _ => None,
    }
}

#[test]
fn duplicate_registration_is_rejected() {
    let (service, _) = build_service();
    service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("first registration");

    let err = service
        .register(registration("10001", GradeLevel::M2, 4))
        .expect_err("duplicate student id");
    assert!(matches!(err, PortalServiceError::DuplicateStudentId(id) if id == "10001"));
}

#[test]
fn registration_validates_the_form() {
    let (service, _) = build_service();
    let mut form = registration("10001", GradeLevel::M1, 1);
    form.first_name = "   ".to_string();

    let err = service.register(form).expect_err("blank first name");
    assert!(matches!(
        err,
        PortalServiceError::Validation(ValidationError::MissingField {
            field: "first_name"
        })
    ));
}

#[test]
fn login_hides_which_field_was_wrong() {
    let (service, _) = build_service();
    service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let wrong_phone = service
        .login_student("10001", "0899999999")
        .expect_err("wrong phone");
    let wrong_id = service
        .login_student("99999", "0800010001")
        .expect_err("wrong student id");
    assert!(matches!(wrong_phone, PortalServiceError::InvalidCredentials));
    assert!(matches!(wrong_id, PortalServiceError::InvalidCredentials));

    let student = service
        .login_student(" 10001 ", "080-001-0001")
        .expect("dashed phone normalizes");
    assert_eq!(student.student_id, "10001");
}

#[test]
fn apply_cancel_and_reapply() {
    let (service, _) = build_service();
    open_core_leader(&service, Some(3));
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let first = service
        .apply(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("apply");
    assert!(applied(&first));
    let flagged = first.student().expect("student returned");
    assert!(flagged.is_core_leader);
    assert_eq!(flagged.core_leader_applied_at, Some(now()));

    let again = service
        .apply(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("second apply");
    assert_eq!(blocked_reason(&again), Some(BlockReason::AlreadyApplied));

    let cancelled = service
        .cancel(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("cancel");
    let cleared = cancelled.student().expect("student returned");
    assert!(!cleared.is_core_leader);
    assert_eq!(cleared.core_leader_applied_at, None);

    let later = now() + Duration::hours(1);
    let reapplied = service
        .apply(&student.id, ApplicationTrack::CoreLeader, later)
        .expect("re-apply");
    assert_eq!(
        reapplied.student().and_then(|s| s.core_leader_applied_at),
        Some(later)
    );
}

#[test]
fn room_quota_is_per_classroom() {
    let (service, _) = build_service();
    open_core_leader(&service, Some(1));
    let first = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    let same_room = service
        .register(registration("10002", GradeLevel::M1, 1))
        .expect("registered");
    let other_room = service
        .register(registration("10003", GradeLevel::M1, 2))
        .expect("registered");
    let other_grade = service
        .register(registration("10004", GradeLevel::M2, 1))
        .expect("registered");

    let track = ApplicationTrack::CoreLeader;
    assert!(applied(&service.apply(&first.id, track, now()).expect("apply")));
    assert_eq!(
        blocked_reason(&service.apply(&same_room.id, track, now()).expect("apply")),
        Some(BlockReason::RoomQuotaFull)
    );
    assert!(applied(&service.apply(&other_room.id, track, now()).expect("apply")));
    assert!(applied(&service.apply(&other_grade.id, track, now()).expect("apply")));

    service
        .cancel(&first.id, track, now())
        .expect("cancel frees the seat");
    assert!(applied(&service.apply(&same_room.id, track, now()).expect("apply")));
}

#[test]
fn concurrent_applications_respect_the_quota() {
    let (service, store) = build_service();
    open_core_leader(&service, Some(2));
    let ids: Vec<RecordId> = (0..8)
        .map(|n| {
            service
                .register(registration(&format!("2000{n}"), GradeLevel::M3, 5))
                .expect("registered")
                .id
        })
        .collect();

    std::thread::scope(|scope| {
        for id in &ids {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                service
                    .apply(id, ApplicationTrack::CoreLeader, now())
                    .expect("apply returns an outcome")
            });
        }
    });

    let flagged = StudentStore::list_all(store.as_ref())
        .expect("students")
        .into_iter()
        .filter(|student| student.is_core_leader)
        .count();
    assert_eq!(flagged, 2);
}

#[test]
fn cancelling_without_an_application_is_a_no_op() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let outcome = service
        .cancel(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("cancel");
    assert!(matches!(outcome, ApplicationOutcome::Withdrawn { ref student } if !student.is_core_leader));
}

#[test]
fn cancelling_after_close_is_blocked() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    service
        .apply(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("apply");

    service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                is_open: Some(false),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("close");

    let outcome = service
        .cancel(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("cancel");
    assert_eq!(blocked_reason(&outcome), Some(BlockReason::SystemClosed));
    assert!(service.profile(&student.id).expect("profile").student.is_core_leader);
}

#[test]
fn committee_requires_core_leader_and_allowed_grade() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    open_committee(&service, &[GradeLevel::M4, GradeLevel::M5]);

    let senior = service
        .register(registration("40001", GradeLevel::M4, 1))
        .expect("registered");
    let junior = service
        .register(registration("20001", GradeLevel::M2, 1))
        .expect("registered");

    let outcome = service
        .apply(&senior.id, ApplicationTrack::Committee, now())
        .expect("apply");
    assert_eq!(blocked_reason(&outcome), Some(BlockReason::MissingPrerequisite));

    service
        .apply(&senior.id, ApplicationTrack::CoreLeader, now())
        .expect("core leader");
    assert!(applied(
        &service
            .apply(&senior.id, ApplicationTrack::Committee, now())
            .expect("apply")
    ));

    service
        .apply(&junior.id, ApplicationTrack::CoreLeader, now())
        .expect("core leader");
    let outcome = service
        .apply(&junior.id, ApplicationTrack::Committee, now())
        .expect("apply");
    assert_eq!(blocked_reason(&outcome), Some(BlockReason::GradeNotAllowed));
}

#[test]
fn unconfigured_activity_is_closed() {
    let (service, _) = build_service();
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let outcome = service
        .apply(&student.id, ApplicationTrack::CoreLeader, now())
        .expect("apply");
    assert_eq!(blocked_reason(&outcome), Some(BlockReason::SystemClosed));
}

#[test]
fn overview_reports_every_failing_reason() {
    let (service, _) = build_service();
    service
        .save_activity_config(
            ActivityKind::Committee,
            ActivityConfigPatch {
                is_open: Some(false),
                allowed_grades: Some(Some([GradeLevel::M6].into_iter().collect())),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("config");
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let overview = service
        .activity_overview(ActivityKind::Committee, Some(&student.id), now())
        .expect("overview");
    assert!(!overview.system_open);
    assert_eq!(
        overview.failing_reasons,
        vec![
            BlockReason::SystemClosed,
            BlockReason::GradeNotAllowed,
            BlockReason::MissingPrerequisite,
        ]
    );

    let anonymous = service
        .activity_overview(ActivityKind::Committee, None, now())
        .expect("overview");
    assert_eq!(anonymous.decision, None);
}

#[test]
fn project_submission_is_gated_and_upserted_per_room() {
    let (service, _) = build_service();
    let author = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    let classmate = service
        .register(registration("10002", GradeLevel::M1, 1))
        .expect("registered");
    let submission = ProjectSubmission {
        title: "Temple clean-up".to_string(),
        description: Some("Saturday mornings".to_string()),
        link: None,
    };

    let closed = service
        .submit_project(&author.id, submission.clone(), now())
        .expect("submit");
    assert!(matches!(
        closed,
        ProjectOutcome::Blocked {
            reason: BlockReason::SystemClosed
        }
    ));

    service
        .save_activity_config(
            ActivityKind::Project,
            ActivityConfigPatch {
                is_open: Some(true),
                close_date: Some(Some(now() - Duration::days(30))),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("open projects");

    let err = service
        .submit_project(&author.id, submission.clone(), now())
        .expect_err("no academic year");
    assert!(matches!(
        err,
        PortalServiceError::Validation(ValidationError::AcademicYearNotConfigured)
    ));

    service
        .save_settings(SettingsPatch {
            current_academic_year: Some(Some("2568".to_string())),
        })
        .expect("settings");

    let ProjectOutcome::Submitted { project } = service
        .submit_project(&author.id, submission, now())
        .expect("submit")
    else {
        panic!("expected a new project");
    };
    assert_eq!(project.academic_year, "2568");
    assert_eq!(project.submitted_by, "10001");

    let revised = ProjectSubmission {
        title: "Temple and canal clean-up".to_string(),
        description: None,
        link: Some("https://example.org/plan".to_string()),
    };
    let later = now() + Duration::days(1);
    let ProjectOutcome::Updated { project: updated } = service
        .submit_project(&classmate.id, revised, later)
        .expect("resubmit")
    else {
        panic!("expected the room's project to be updated");
    };
    assert_eq!(updated.id, project.id);
    assert_eq!(updated.title, "Temple and canal clean-up");
    assert_eq!(updated.description, None);
    assert_eq!(updated.updated_at, later);
    assert_eq!(service.projects(Some("2568")).expect("projects").len(), 1);
    assert_eq!(
        service.room_project(&classmate.id).expect("room project"),
        Some(updated)
    );
}

#[test]
fn config_validation() {
    let (service, _) = build_service();

    let quota_on_committee = service
        .save_activity_config(
            ActivityKind::Committee,
            ActivityConfigPatch {
                quota_per_room: Some(Some(2)),
                ..ActivityConfigPatch::default()
            },
        )
        .expect_err("quota is core leader only");
    assert!(matches!(
        quota_on_committee,
        PortalServiceError::Validation(ValidationError::FieldNotApplicable {
            field: "quota_per_room",
            ..
        })
    ));

    let zero = service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                quota_per_room: Some(Some(0)),
                ..ActivityConfigPatch::default()
            },
        )
        .expect_err("zero quota");
    assert!(matches!(
        zero,
        PortalServiceError::Validation(ValidationError::ZeroQuota)
    ));

    let inverted = service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                open_date: Some(Some(now())),
                close_date: Some(Some(now() - Duration::days(1))),
                ..ActivityConfigPatch::default()
            },
        )
        .expect_err("inverted window");
    assert!(matches!(
        inverted,
        PortalServiceError::Validation(ValidationError::InvertedWindow)
    ));

    assert!(!service
        .activity_config(ActivityKind::CoreLeader)
        .expect("config")
        .is_open);
}

#[test]
fn config_patch_merges_with_saved_values() {
    let (service, store) = build_service();
    open_core_leader(&service, Some(4));

    service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                close_date: Some(Some(now())),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("save");

    let stored = ActivityConfigStore::get(store.as_ref(), ActivityKind::CoreLeader)
        .expect("config")
        .expect("saved");
    assert!(stored.is_open);
    assert_eq!(stored.quota_per_room, Some(4));
    assert_eq!(stored.close_date, Some(now()));
}

#[test]
fn profile_goes_stale_until_confirmed() {
    let (service, _) = build_service();
    service
        .save_settings(SettingsPatch {
            current_academic_year: Some(Some("2567".to_string())),
        })
        .expect("settings");
    let student = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    assert!(!service.profile(&student.id).expect("profile").stale);

    service
        .save_settings(SettingsPatch {
            current_academic_year: Some(Some("2568".to_string())),
        })
        .expect("new year");
    let profile = service.profile(&student.id).expect("profile");
    assert!(profile.stale);
    assert_eq!(profile.current_academic_year.as_deref(), Some("2568"));

    let confirmed = service
        .update_profile(
            &student.id,
            StudentPatch {
                grade: Some(GradeLevel::M2),
                ..StudentPatch::default()
            },
        )
        .expect("update");
    assert!(!confirmed.stale);
    assert_eq!(confirmed.student.grade, GradeLevel::M2);
    assert_eq!(confirmed.student.academic_year.as_deref(), Some("2568"));
}

#[test]
fn flagged_student_cannot_move_into_a_full_room() {
    let (service, store) = build_service();
    open_core_leader(&service, Some(1));
    let seated = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    let mover = service
        .register(registration("10002", GradeLevel::M1, 2))
        .expect("registered");
    for id in [&seated.id, &mover.id] {
        assert!(applied(
            &service
                .apply(id, ApplicationTrack::CoreLeader, now())
                .expect("apply")
        ));
    }

    let into_room_one = StudentPatch {
        room: Some(room(1)),
        ..StudentPatch::default()
    };
    let err = service
        .update_profile(&mover.id, into_room_one.clone())
        .expect_err("room one is full");
    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::ConditionFailed(
            BlockReason::RoomQuotaFull
        ))
    ));
    let err = service
        .update_student(&mover.id, into_room_one)
        .expect_err("admin edit respects the quota too");
    assert!(matches!(
        err,
        PortalServiceError::Repository(RepositoryError::ConditionFailed(
            BlockReason::RoomQuotaFull
        ))
    ));

    let students = StudentStore::list_all(store.as_ref()).expect("students");
    let key = RoomKey::of(&seated);
    assert_eq!(room_count(&students, ApplicationTrack::CoreLeader, key), 1);
    let unchanged = StudentStore::find_by_id(store.as_ref(), &mover.id)
        .expect("lookup")
        .expect("still stored");
    assert_eq!(unchanged.room, room(2));

    // Room 1 of another grade is a separate seat pool.
    let moved = service
        .update_student(
            &mover.id,
            StudentPatch {
                grade: Some(GradeLevel::M2),
                room: Some(room(1)),
                ..StudentPatch::default()
            },
        )
        .expect("empty classroom");
    assert_eq!((moved.grade, moved.room), (GradeLevel::M2, room(1)));
}

#[test]
fn classroom_moves_without_a_quota_flag_are_free() {
    let (service, _) = build_service();
    open_core_leader(&service, Some(1));
    let seated = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    service
        .apply(&seated.id, ApplicationTrack::CoreLeader, now())
        .expect("apply");
    let unflagged = service
        .register(registration("10002", GradeLevel::M1, 2))
        .expect("registered");

    let profile = service
        .update_profile(
            &unflagged.id,
            StudentPatch {
                room: Some(room(1)),
                ..StudentPatch::default()
            },
        )
        .expect("not holding a seat");
    assert_eq!(profile.student.room, room(1));

    // Editing other fields of a seated student never trips the check.
    let renamed = service
        .update_student(
            &seated.id,
            StudentPatch {
                nickname: Some(Some("Ploy".to_string())),
                room: Some(room(1)),
                ..StudentPatch::default()
            },
        )
        .expect("same classroom");
    assert!(renamed.is_core_leader);
}

#[test]
fn roster_import_counts_each_row() {
    let (service, _) = build_service();
    service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");

    let summary = service.import_students_csv(
        "\u{feff}10002,1,2,เด็กชาย,Anan,Srisuk,Nan,0810000002\n\
         10001,1,1,เด็กหญิง,Taken,Already,,0810000003\n\
         10003,9,1,นาย,Bad,Grade,,0810000004\n\
         \n\
         10004,ม.5,12,นางสาว,Ploy,Chai,,081-000-0005\n",
    );
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failures.len(), 2);

    let students = service.students().expect("students");
    assert_eq!(students.len(), 3);
    let imported = students
        .iter()
        .find(|student| student.student_id == "10004")
        .expect("imported row");
    assert_eq!(imported.phone, "0810000005");
    assert_eq!(imported.room, room(12));
}

#[test]
fn export_lists_applicants_in_classroom_order() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    let late_room = service
        .register(registration("30002", GradeLevel::M2, 3))
        .expect("registered");
    let early_room = service
        .register(registration("30001", GradeLevel::M2, 1))
        .expect("registered");
    let junior = service
        .register(registration("30003", GradeLevel::M1, 9))
        .expect("registered");
    service
        .register(registration("30004", GradeLevel::M1, 9))
        .expect("not applying");

    for id in [&late_room.id, &early_room.id] {
        service
            .apply(id, ApplicationTrack::CoreLeader, now())
            .expect("apply");
    }
    // 20:00 UTC is already the next day in Bangkok.
    service
        .apply(&junior.id, ApplicationTrack::CoreLeader, at(2025, 6, 1, 20, 0))
        .expect("apply");

    let bytes = service
        .export_applicants_csv(ApplicationTrack::CoreLeader)
        .expect("export");
    assert!(bytes.starts_with("\u{feff}".as_bytes()));

    let text = String::from_utf8(bytes).expect("utf-8");
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(
        lines,
        vec![
            "studentId,prefix,firstName,lastName,grade,room,appliedDate",
            "30003,นาย,First30003,Last30003,ม.1,9,2025-06-02",
            "30001,นาย,First30001,Last30001,ม.2,1,2025-06-01",
            "30002,นาย,First30002,Last30002,ม.2,3,2025-06-01",
        ]
    );
}

#[test]
fn admin_can_remove_and_clear_applications() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    let a = service
        .register(registration("10001", GradeLevel::M1, 1))
        .expect("registered");
    let b = service
        .register(registration("10002", GradeLevel::M1, 2))
        .expect("registered");
    for id in [&a.id, &b.id] {
        service
            .apply(id, ApplicationTrack::CoreLeader, now())
            .expect("apply");
    }

    service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                is_open: Some(false),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("close");

    let removed = service
        .remove_application(&a.id, ApplicationTrack::CoreLeader)
        .expect("admin removal ignores the switch");
    assert!(!removed.is_core_leader);
    assert_eq!(service.dashboard().expect("dashboard").core_leaders, 1);

    assert_eq!(
        service
            .clear_applications(ApplicationTrack::CoreLeader)
            .expect("clear"),
        1
    );
    assert!(service
        .applicants(ApplicationTrack::CoreLeader, None)
        .expect("applicants")
        .is_empty());
}

#[test]
fn applicants_filter_by_grade() {
    let (service, _) = build_service();
    open_core_leader(&service, None);
    for (student_id, grade) in [("10001", GradeLevel::M1), ("20001", GradeLevel::M2)] {
        let student = service
            .register(registration(student_id, grade, 1))
            .expect("registered");
        service
            .apply(&student.id, ApplicationTrack::CoreLeader, now())
            .expect("apply");
    }

    let seniors = service
        .applicants(ApplicationTrack::CoreLeader, Some(GradeLevel::M2))
        .expect("applicants");
    assert_eq!(seniors.len(), 1);
    assert_eq!(seniors[0].student_id, "20001");
}

#[test]
fn unavailable_store_surfaces_as_retryable() {
    let service = PortalService::new(Arc::new(UnavailableStore), Arc::new(identity()), bangkok());

    let err = service
        .apply(
            &RecordId("stu-1".to_string()),
            ApplicationTrack::CoreLeader,
            now(),
        )
        .expect_err("store is down");
    assert!(err.is_unavailable());

    let summary = service.import_students_csv("10001,1,1,นาย,A,B,,0810000001\n");
    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 1);
}

#[test]
fn admin_sign_in() {
    let (service, _) = build_service();
    let admin = service
        .sign_in_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .expect("valid admin");
    assert_eq!(admin.email, ADMIN_EMAIL);

    let err = service
        .sign_in_admin(ADMIN_EMAIL, "guess")
        .expect_err("wrong password");
    assert!(matches!(err, PortalServiceError::InvalidCredentials));
}

#[test]
fn announcements_are_newest_first() {
    let (service, _) = build_service();
    for (offset, title) in [(0, "Opening day"), (2, "Results"), (1, "Reminder")] {
        service
            .post_announcement(
                NewAnnouncement {
                    category: AnnouncementCategory::Core,
                    title: title.to_string(),
                    link: None,
                    content: None,
                },
                now() + Duration::days(offset),
            )
            .expect("posted");
    }
    service
        .post_announcement(
            NewAnnouncement {
                category: AnnouncementCategory::Project,
                title: "Project rules".to_string(),
                link: Some("  ".to_string()),
                content: None,
            },
            now(),
        )
        .expect("posted");

    let titles: Vec<String> = service
        .announcements(AnnouncementCategory::Core)
        .expect("announcements")
        .into_iter()
        .map(|announcement| announcement.title)
        .collect();
    assert_eq!(titles, vec!["Results", "Reminder", "Opening day"]);

    let project = service
        .announcements(AnnouncementCategory::Project)
        .expect("announcements");
    assert_eq!(project.len(), 1);
    assert_eq!(project[0].link, None);
}

#[test]
fn deleting_a_missing_student_is_not_found() {
    let (service, _) = build_service();
    let err = service
        .delete_student(&RecordId("stu-404".to_string()))
        .expect_err("missing");
    assert!(matches!(err, PortalServiceError::NotFound(_)));
}
