use crate::infra::{build_portal, load_store, parse_track, persist_store, Portal};
use activity_portal::config::AppConfig;
use activity_portal::error::AppError;
use activity_portal::portal::{
    ApplicationOutcome, ApplicationTrack, InMemoryPortalStore, Session, SessionContext,
};
use activity_portal::telemetry;
use chrono::Utc;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_SESSION_FILE: &str = ".activity-portal-session.json";

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Header-less roster CSV: studentId,grade,room,prefix,firstName,lastName,nickname,phone
    pub(crate) path: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Activity to export (core-leader or committee)
    #[arg(value_parser = parse_track)]
    pub(crate) track: ApplicationTrack,
    /// Write to this file instead of stdout
    #[arg(long, short)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct StatsArgs {
    /// Activity to summarise (core-leader or committee)
    #[arg(value_parser = parse_track)]
    pub(crate) track: ApplicationTrack,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SessionArgs {
    /// Where the signed-in student is remembered between runs
    #[arg(long)]
    pub(crate) session_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    pub(crate) student_id: String,
    pub(crate) phone: String,
    #[command(flatten)]
    pub(crate) session: SessionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct TrackArgs {
    /// Activity to act on (core-leader or committee)
    #[arg(value_parser = parse_track)]
    pub(crate) track: ApplicationTrack,
    #[command(flatten)]
    pub(crate) session: SessionArgs,
}

/// Portal backed by the configured data file, for one command.
struct OfflinePortal {
    config: AppConfig,
    store: Arc<InMemoryPortalStore>,
    portal: Arc<Portal>,
}

impl OfflinePortal {
    fn open() -> Result<Self, AppError> {
        let config = AppConfig::load()?;
        telemetry::init(&config.telemetry)?;
        let store = load_store(&config.portal)?;
        let portal = build_portal(store.clone(), &config.portal);
        Ok(Self {
            config,
            store,
            portal,
        })
    }

    fn save(&self) -> Result<(), AppError> {
        if self.config.portal.data_file.is_none() {
            println!("Note: APP_DATA_FILE is not set, changes are not kept after this command.");
        }
        persist_store(&self.store, &self.config.portal)
    }

    fn session_context(&self, args: SessionArgs) -> Result<SessionContext, AppError> {
        let path = args
            .session_file
            .or_else(|| self.config.portal.student_session_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        Ok(SessionContext::init(Some(path))?)
    }
}

pub(crate) fn import_students(args: ImportArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let text = std::fs::read_to_string(&args.path)?;
    let summary = offline.portal.import_students_csv(&text);

    println!(
        "Imported {} students, {} rows failed",
        summary.created, summary.failed
    );
    for failure in &summary.failures {
        println!("  line {}: {}", failure.line, failure.message);
    }

    offline.save()
}

pub(crate) fn export(args: ExportArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let bytes = offline.portal.export_applicants_csv(args.track)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &bytes)?;
            println!(
                "Wrote {} applicants to {}",
                args.track.label(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub(crate) fn stats(args: StatsArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let totals = offline.portal.dashboard()?;
    println!(
        "Students: {} | core leaders: {} | committee: {}",
        totals.total_students, totals.core_leaders, totals.committee_members
    );
    println!();
    print!("{}", offline.portal.room_statistics(args.track)?.render_table());
    Ok(())
}

pub(crate) fn login(args: LoginArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let mut context = offline.session_context(args.session)?;

    let student = offline
        .portal
        .login_student(&args.student_id, &args.phone)?;
    println!(
        "Signed in as {} ({})",
        student.full_name(),
        student.classroom()
    );
    context.login_student(student)?;
    Ok(())
}

pub(crate) fn logout(args: SessionArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let mut context = offline.session_context(args)?;
    context.clear()?;
    println!("Signed out");
    Ok(())
}

pub(crate) fn whoami(args: SessionArgs) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let mut context = offline.session_context(args)?;

    let Session::Student(student) = context.session().clone() else {
        println!("Not signed in");
        return Ok(());
    };

    let profile = offline.portal.profile(&student.id)?;
    context.refresh_student(profile.student.clone())?;

    let student = &profile.student;
    println!("{} ({})", student.full_name(), student.classroom());
    println!("Student id: {}", student.student_id);
    println!(
        "Core leader: {} | committee: {}",
        yes_no(student.is_core_leader),
        yes_no(student.is_committee)
    );
    if profile.stale {
        println!(
            "Profile needs confirming for academic year {}",
            profile.current_academic_year.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub(crate) fn apply(args: TrackArgs) -> Result<(), AppError> {
    act_on_track(args, Action::Apply)
}

pub(crate) fn cancel(args: TrackArgs) -> Result<(), AppError> {
    act_on_track(args, Action::Cancel)
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Apply,
    Cancel,
}

fn act_on_track(args: TrackArgs, action: Action) -> Result<(), AppError> {
    let offline = OfflinePortal::open()?;
    let mut context = offline.session_context(args.session)?;

    let Some(student) = context.session().student().cloned() else {
        println!("Not signed in; run `login` first");
        return Ok(());
    };

    let outcome = match action {
        Action::Apply => offline.portal.apply(&student.id, args.track, Utc::now())?,
        Action::Cancel => offline.portal.cancel(&student.id, args.track, Utc::now())?,
    };

    match &outcome {
        ApplicationOutcome::Applied { .. } => println!("Applied for {}", args.track.label()),
        ApplicationOutcome::Withdrawn { .. } => {
            println!("Withdrawn from {}", args.track.label())
        }
        ApplicationOutcome::Blocked { reason } => println!("Not allowed: {}", reason.summary()),
    }

    if let Some(student) = outcome.student() {
        context.refresh_student(student.clone())?;
        offline.save()?;
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
