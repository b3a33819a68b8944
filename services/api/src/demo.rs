use crate::infra::Portal;
use activity_portal::error::AppError;
use activity_portal::portal::{
    ActivityConfigPatch, ActivityKind, AdminAccount, ApplicationOutcome, ApplicationTrack,
    GradeLevel, InMemoryPortalStore, PortalService, StaticIdentityProvider, Student,
};
use chrono::{Duration, FixedOffset, Offset, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Core-leader seats per classroom for the walkthrough
    #[arg(long, default_value_t = 1)]
    pub(crate) quota: u32,
    /// Print the applicant CSV export at the end
    #[arg(long)]
    pub(crate) show_csv: bool,
}

/// Walk through a registration round against a throwaway in-memory store.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let offset = FixedOffset::east_opt(7 * 3600).unwrap_or_else(|| Utc.fix());
    let identity = StaticIdentityProvider::new(vec![AdminAccount {
        email: "admin@demo.school".to_string(),
        password_sha256: StaticIdentityProvider::digest("demo"),
    }]);
    let portal: Portal = PortalService::new(
        Arc::new(InMemoryPortalStore::default()),
        Arc::new(identity),
        offset,
    );
    let now = Utc::now();

    println!("Activity portal demo");
    let admin = portal.sign_in_admin("admin@demo.school", "demo")?;
    println!("- Administrator signed in as {}", admin.email);

    portal.save_activity_config(
        ActivityKind::CoreLeader,
        ActivityConfigPatch {
            is_open: Some(true),
            open_date: Some(Some(now - Duration::days(1))),
            close_date: Some(Some(now + Duration::days(7))),
            quota_per_room: Some(Some(args.quota.max(1))),
            ..ActivityConfigPatch::default()
        },
    )?;
    portal.save_activity_config(
        ActivityKind::Committee,
        ActivityConfigPatch {
            is_open: Some(true),
            allowed_grades: Some(Some(BTreeSet::from([GradeLevel::M4, GradeLevel::M5]))),
            ..ActivityConfigPatch::default()
        },
    )?;
    println!(
        "- Core leader open for a week with {} seat(s) per room; committee open to ม.4 and ม.5",
        args.quota.max(1)
    );

    let summary = portal.import_students_csv(
        "10001,1,1,เด็กชาย,Anan,Srisuk,Nan,0810000001\n\
         10002,1,1,เด็กหญิง,Busaba,Chaiyo,Bee,0810000002\n\
         10003,1,2,เด็กชาย,Chai,Dee,,0810000003\n\
         10004,ม.4,1,นาย,Decha,Kaew,Dech,0810000004\n\
         10001,1,1,เด็กชาย,Duplicate,Row,,0810000009\n",
    );
    println!(
        "- Roster import: {} created, {} failed",
        summary.created, summary.failed
    );

    for student in portal.students()? {
        let outcome = portal.apply(&student.id, ApplicationTrack::CoreLeader, now)?;
        print_outcome(&student, ApplicationTrack::CoreLeader, &outcome);
    }

    for student in portal.students()? {
        let outcome = portal.apply(&student.id, ApplicationTrack::Committee, now)?;
        print_outcome(&student, ApplicationTrack::Committee, &outcome);
    }

    let totals = portal.dashboard()?;
    println!(
        "\nDashboard: {} students | {} core leaders | {} committee",
        totals.total_students, totals.core_leaders, totals.committee_members
    );
    print!(
        "\n{}",
        portal
            .room_statistics(ApplicationTrack::CoreLeader)?
            .render_table()
    );

    if args.show_csv {
        let bytes = portal.export_applicants_csv(ApplicationTrack::CoreLeader)?;
        println!("\nCore leader export:");
        print!("{}", String::from_utf8_lossy(&bytes).trim_start_matches('\u{feff}'));
    }

    Ok(())
}

fn print_outcome(student: &Student, track: ApplicationTrack, outcome: &ApplicationOutcome) {
    let verdict = match outcome {
        ApplicationOutcome::Applied { .. } => "applied".to_string(),
        ApplicationOutcome::Withdrawn { .. } => "withdrawn".to_string(),
        ApplicationOutcome::Blocked { reason } => format!("blocked ({})", reason.summary()),
    };
    println!(
        "- {} {} [{}] -> {}: {}",
        student.first_name,
        student.last_name,
        student.classroom(),
        track.label(),
        verdict
    );
}
