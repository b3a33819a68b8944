use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    ActivityConfig, ActivityConfigPatch, ActivityKind, Announcement, AnnouncementCategory,
    ApplicationTrack, GradeLevel, NewAnnouncement, Project, ProjectDraft, ProjectPatch,
    ProjectSubmission, RecordId, SettingsPatch, Student, StudentPatch, StudentRegistration,
    SystemSettings, ValidationError, normalize_phone,
};
use super::eligibility::{
    self, room_count, BlockReason, EligibilityContext, EligibilityDecision, RoomKey,
};
use super::identity::{AdminPrincipal, IdentityError, IdentityProvider};
use super::repository::{
    ActivityConfigStore, AnnouncementStore, ApplicationCondition, PortalRepository, ProjectStore,
    RepositoryError, RoomChangeCondition, SettingsStore, StudentStore,
};
use super::roster::{parse_roster, write_applicants_csv, ExportError, ImportSummary};
use super::stats::{dashboard_totals, room_statistics, DashboardTotals, RoomStatistics};

/// Result of an apply or cancel request. `Blocked` is an expected answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplicationOutcome {
    Applied { student: Student },
    Withdrawn { student: Student },
    Blocked { reason: BlockReason },
}

impl ApplicationOutcome {
    pub fn student(&self) -> Option<&Student> {
        match self {
            ApplicationOutcome::Applied { student } | ApplicationOutcome::Withdrawn { student } => {
                Some(student)
            }
            ApplicationOutcome::Blocked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProjectOutcome {
    Submitted { project: Project },
    Updated { project: Project },
    Blocked { reason: BlockReason },
}

/// Everything a student page needs for one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityOverview {
    pub kind: ActivityKind,
    pub config: ActivityConfig,
    pub announcements: Vec<Announcement>,
    pub system_open: bool,
    /// Present when the overview was requested for a signed-in student.
    pub decision: Option<EligibilityDecision>,
    pub failing_reasons: Vec<BlockReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    pub student: Student,
    pub stale: bool,
    pub current_academic_year: Option<String>,
}

/// Error raised by the portal service.
#[derive(Debug, thiserror::Error)]
pub enum PortalServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("student id {0} is already registered")]
    DuplicateStudentId(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl PortalServiceError {
    /// True for failures the caller may simply retry later.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            PortalServiceError::Repository(RepositoryError::Unavailable(_))
                | PortalServiceError::IdentityUnavailable(_)
        )
    }
}

impl From<RepositoryError> for PortalServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::DuplicateStudentId(student_id) => {
                PortalServiceError::DuplicateStudentId(student_id)
            }
            RepositoryError::NotFound => PortalServiceError::NotFound("record"),
            RepositoryError::Conflict => PortalServiceError::Conflict("record"),
            other => PortalServiceError::Repository(other),
        }
    }
}

impl From<IdentityError> for PortalServiceError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidCredentials => PortalServiceError::InvalidCredentials,
            IdentityError::Unavailable(message) => PortalServiceError::IdentityUnavailable(message),
        }
    }
}

/// Service composing the eligibility rules, the document store and the identity provider.
pub struct PortalService<R, I> {
    repository: Arc<R>,
    identity: Arc<I>,
    offset: FixedOffset,
}

impl<R, I> PortalService<R, I>
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(repository: Arc<R>, identity: Arc<I>, offset: FixedOffset) -> Self {
        Self {
            repository,
            identity,
            offset,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Offset used for form timestamps and export dates.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn student_store(&self) -> &dyn StudentStore {
        self.repository.as_ref()
    }

    fn config_store(&self) -> &dyn ActivityConfigStore {
        self.repository.as_ref()
    }

    fn announcement_store(&self) -> &dyn AnnouncementStore {
        self.repository.as_ref()
    }

    fn project_store(&self) -> &dyn ProjectStore {
        self.repository.as_ref()
    }

    fn settings_store(&self) -> &dyn SettingsStore {
        self.repository.as_ref()
    }

    fn load_student(&self, id: &RecordId) -> Result<Student, PortalServiceError> {
        self.student_store()
            .find_by_id(id)?
            .ok_or(PortalServiceError::NotFound("student"))
    }

    fn load_config(&self, kind: ActivityKind) -> Result<ActivityConfig, PortalServiceError> {
        Ok(self
            .config_store()
            .get(kind)?
            .unwrap_or_else(|| ActivityConfig::closed(kind)))
    }

    fn current_room_count(
        &self,
        student: &Student,
        track: ApplicationTrack,
        config: &ActivityConfig,
    ) -> Result<usize, PortalServiceError> {
        if !track.has_room_quota() || config.quota_per_room.is_none() {
            return Ok(0);
        }
        let students = self.student_store().list_all()?;
        Ok(room_count(&students, track, RoomKey::of(student)))
    }

    /// Seat limits a classroom move has to respect. Empty when the patch keeps the classroom.
    fn room_change_condition(
        &self,
        patch: &StudentPatch,
    ) -> Result<RoomChangeCondition, PortalServiceError> {
        if patch.grade.is_none() && patch.room.is_none() {
            return Ok(RoomChangeCondition::default());
        }
        let mut room_quotas = Vec::new();
        for track in ApplicationTrack::ordered() {
            if !track.has_room_quota() {
                continue;
            }
            if let Some(quota) = self.load_config(track.activity())?.quota_per_room {
                room_quotas.push((track, quota));
            }
        }
        Ok(RoomChangeCondition { room_quotas })
    }

    fn write_student_patch(
        &self,
        id: &RecordId,
        patch: &StudentPatch,
    ) -> Result<Student, PortalServiceError> {
        let condition = self.room_change_condition(patch)?;
        self.student_store()
            .update(id, patch, &condition)
            .map_err(|err| {
                if let RepositoryError::ConditionFailed(reason) = &err {
                    warn!(record_id = %id, reason = reason.code(), "classroom change rejected");
                }
                err.into()
            })
    }

    // Student-facing operations.

    pub fn register(&self, registration: StudentRegistration) -> Result<Student, PortalServiceError> {
        let registration = registration.validate()?;
        let student = self.student_store().create(registration)?;
        info!(
            student_id = %student.student_id,
            classroom = %student.classroom(),
            "student registered"
        );
        Ok(student)
    }

    /// Never reveals which of the two fields was wrong.
    pub fn login_student(&self, student_id: &str, phone: &str) -> Result<Student, PortalServiceError> {
        let student_id = student_id.trim();
        let Ok(phone) = normalize_phone(phone) else {
            return Err(PortalServiceError::InvalidCredentials);
        };
        if student_id.is_empty() {
            return Err(PortalServiceError::InvalidCredentials);
        }

        match self.student_store().find_by_credentials(student_id, &phone)? {
            Some(student) => {
                debug!(student_id = %student.student_id, "student signed in");
                Ok(student)
            }
            None => {
                warn!("student sign-in rejected");
                Err(PortalServiceError::InvalidCredentials)
            }
        }
    }

    pub fn profile(&self, id: &RecordId) -> Result<StudentProfile, PortalServiceError> {
        let student = self.load_student(id)?;
        let settings = self.settings_store().get()?;
        Ok(StudentProfile {
            stale: student.is_stale(&settings),
            current_academic_year: settings.current_academic_year,
            student,
        })
    }

    /// Student edits their own profile. Saving confirms it for the current academic year.
    pub fn update_profile(
        &self,
        id: &RecordId,
        patch: StudentPatch,
    ) -> Result<StudentProfile, PortalServiceError> {
        let settings = self.settings_store().get()?;
        let mut patch = patch.validate()?;
        patch.academic_year = settings.current_academic_year.clone();

        let student = self.write_student_patch(id, &patch)?;
        info!(student_id = %student.student_id, "profile updated");
        Ok(StudentProfile {
            stale: student.is_stale(&settings),
            current_academic_year: settings.current_academic_year,
            student,
        })
    }

    pub fn activity_overview(
        &self,
        kind: ActivityKind,
        student: Option<&RecordId>,
        now: DateTime<Utc>,
    ) -> Result<ActivityOverview, PortalServiceError> {
        let config = self.load_config(kind)?;
        let mut announcements = self.announcement_store().list_by_category(kind.category())?;
        announcements.sort_by(|a, b| b.date.cmp(&a.date));

        let system_open = match kind.track() {
            Some(_) => eligibility::system_open(&config, now),
            None => eligibility::project_gate(&config).is_allowed(),
        };

        let (decision, failing_reasons) = match (kind.track(), student) {
            (Some(track), Some(id)) => {
                let student = self.load_student(id)?;
                let room_count = self.current_room_count(&student, track, &config)?;
                let ctx = EligibilityContext {
                    student: &student,
                    config: &config,
                    now,
                    room_count,
                };
                (
                    Some(eligibility::evaluate(track, &ctx)),
                    eligibility::failing_reasons(track, &ctx),
                )
            }
            (None, Some(_)) => {
                let decision = eligibility::project_gate(&config);
                (Some(decision), decision.blocked_reason().into_iter().collect())
            }
            (_, None) => (None, Vec::new()),
        };

        Ok(ActivityOverview {
            kind,
            config,
            announcements,
            system_open,
            decision,
            failing_reasons,
        })
    }

    /// Evaluate the rules, then commit through the store's conditional write so the room quota
    /// holds even when several students apply at once.
    pub fn apply(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
        now: DateTime<Utc>,
    ) -> Result<ApplicationOutcome, PortalServiceError> {
        let student = self.load_student(id)?;
        let config = self.load_config(track.activity())?;
        let room_count = self.current_room_count(&student, track, &config)?;

        let decision = eligibility::evaluate(
            track,
            &EligibilityContext {
                student: &student,
                config: &config,
                now,
                room_count,
            },
        );
        if let EligibilityDecision::Blocked(reason) = decision {
            info!(
                student_id = %student.student_id,
                track = track.label(),
                reason = reason.code(),
                "application blocked"
            );
            return Ok(ApplicationOutcome::Blocked { reason });
        }

        let condition = ApplicationCondition {
            room_quota: config.quota_per_room.filter(|_| track.has_room_quota()),
        };
        match self
            .student_store()
            .commit_application(id, track, now, &condition)
        {
            Ok(student) => {
                info!(
                    student_id = %student.student_id,
                    classroom = %student.classroom(),
                    track = track.label(),
                    "application committed"
                );
                Ok(ApplicationOutcome::Applied { student })
            }
            Err(RepositoryError::ConditionFailed(reason)) => {
                warn!(
                    student_id = %student.student_id,
                    track = track.label(),
                    reason = reason.code(),
                    "application lost the conditional write"
                );
                Ok(ApplicationOutcome::Blocked { reason })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Withdraw while the activity is open. Withdrawing without an application is a no-op.
    pub fn cancel(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
        now: DateTime<Utc>,
    ) -> Result<ApplicationOutcome, PortalServiceError> {
        let student = self.load_student(id)?;
        let config = self.load_config(track.activity())?;

        if let EligibilityDecision::Blocked(reason) = eligibility::evaluate_cancellation(&config, now)
        {
            return Ok(ApplicationOutcome::Blocked { reason });
        }
        if !student.has_applied(track) {
            return Ok(ApplicationOutcome::Withdrawn { student });
        }

        let student = self.student_store().withdraw_application(id, track)?;
        info!(
            student_id = %student.student_id,
            track = track.label(),
            "application withdrawn"
        );
        Ok(ApplicationOutcome::Withdrawn { student })
    }

    /// The project for the student's classroom in the current academic year, if any.
    pub fn room_project(&self, id: &RecordId) -> Result<Option<Project>, PortalServiceError> {
        let student = self.load_student(id)?;
        let Some(year) = self.settings_store().get()?.current_academic_year else {
            return Ok(None);
        };
        Ok(self
            .project_store()
            .find_by_room(&year, student.grade, student.room)?)
    }

    /// Create or replace the classroom's project. Only the manual switch gates submissions.
    pub fn submit_project(
        &self,
        id: &RecordId,
        submission: ProjectSubmission,
        now: DateTime<Utc>,
    ) -> Result<ProjectOutcome, PortalServiceError> {
        let submission = submission.validate()?;
        let student = self.load_student(id)?;
        let config = self.load_config(ActivityKind::Project)?;

        if let EligibilityDecision::Blocked(reason) = eligibility::project_gate(&config) {
            return Ok(ProjectOutcome::Blocked { reason });
        }

        let year = self
            .settings_store()
            .get()?
            .current_academic_year
            .ok_or(ValidationError::AcademicYearNotConfigured)?;

        let existing = self
            .project_store()
            .find_by_room(&year, student.grade, student.room)?;
        if let Some(project) = existing {
            return self.replace_project(&project.id, submission, now);
        }

        let draft = ProjectDraft {
            academic_year: year.clone(),
            grade: student.grade,
            room: student.room,
            submission: submission.clone(),
            submitted_by: student.student_id.clone(),
            submitted_at: now,
        };
        match self.project_store().create(draft) {
            Ok(project) => {
                info!(
                    classroom = %student.classroom(),
                    academic_year = %year,
                    "project submitted"
                );
                Ok(ProjectOutcome::Submitted { project })
            }
            Err(RepositoryError::Conflict) => {
                // Another student in the room submitted first.
                let project = self
                    .project_store()
                    .find_by_room(&year, student.grade, student.room)?
                    .ok_or(PortalServiceError::NotFound("project"))?;
                self.replace_project(&project.id, submission, now)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn replace_project(
        &self,
        id: &RecordId,
        submission: ProjectSubmission,
        now: DateTime<Utc>,
    ) -> Result<ProjectOutcome, PortalServiceError> {
        let project = self
            .project_store()
            .update(id, &submission.into_patch(), now)?;
        info!(project_id = %project.id, "project updated");
        Ok(ProjectOutcome::Updated { project })
    }

    // Admin operations. Callers are expected to hold an admin session.

    pub fn sign_in_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AdminPrincipal, PortalServiceError> {
        match self.identity.sign_in(email, password) {
            Ok(principal) => {
                info!(admin = %principal.email, "administrator signed in");
                Ok(principal)
            }
            Err(err) => {
                warn!(error = %err, "administrator sign-in rejected");
                Err(err.into())
            }
        }
    }

    pub fn activity_config(&self, kind: ActivityKind) -> Result<ActivityConfig, PortalServiceError> {
        self.load_config(kind)
    }

    /// Merge a patch into the activity's configuration, creating it on first save.
    pub fn save_activity_config(
        &self,
        kind: ActivityKind,
        patch: ActivityConfigPatch,
    ) -> Result<ActivityConfig, PortalServiceError> {
        let patch = patch.validate_for(kind)?;
        let mut merged = self.load_config(kind)?;
        merged.apply_patch(&patch);
        merged.validate()?;

        let saved = self.config_store().save(kind, &patch)?;
        info!(
            activity = kind.key(),
            is_open = saved.is_open,
            quota_per_room = ?saved.quota_per_room,
            "activity configuration saved"
        );
        Ok(saved)
    }

    /// Students holding the track's flag, ordered by grade, room, then student id.
    pub fn applicants(
        &self,
        track: ApplicationTrack,
        grade: Option<GradeLevel>,
    ) -> Result<Vec<Student>, PortalServiceError> {
        let mut applicants: Vec<Student> = self
            .student_store()
            .list_all()?
            .into_iter()
            .filter(|student| student.has_applied(track))
            .filter(|student| grade.map_or(true, |grade| student.grade == grade))
            .collect();
        sort_students(&mut applicants);
        Ok(applicants)
    }

    /// Admin removal ignores the window.
    pub fn remove_application(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
    ) -> Result<Student, PortalServiceError> {
        let student = self.student_store().withdraw_application(id, track)?;
        info!(
            student_id = %student.student_id,
            track = track.label(),
            "application removed by administrator"
        );
        Ok(student)
    }

    pub fn clear_applications(&self, track: ApplicationTrack) -> Result<usize, PortalServiceError> {
        let cleared = self.student_store().clear_track(track)?;
        warn!(track = track.label(), cleared, "applications cleared");
        Ok(cleared)
    }

    pub fn room_statistics(
        &self,
        track: ApplicationTrack,
    ) -> Result<RoomStatistics, PortalServiceError> {
        let config = self.load_config(track.activity())?;
        let students = self.student_store().list_all()?;
        let quota = config.quota_per_room.filter(|_| track.has_room_quota());
        Ok(room_statistics(&students, track, quota))
    }

    pub fn dashboard(&self) -> Result<DashboardTotals, PortalServiceError> {
        let students = self.student_store().list_all()?;
        Ok(dashboard_totals(&students))
    }

    pub fn export_applicants_csv(
        &self,
        track: ApplicationTrack,
    ) -> Result<Vec<u8>, PortalServiceError> {
        let applicants = self.applicants(track, None)?;
        let bytes = write_applicants_csv(&applicants, track, self.offset)?;
        info!(track = track.label(), rows = applicants.len(), "applicants exported");
        Ok(bytes)
    }

    /// Each roster row is created independently; failures are counted, never fatal.
    pub fn import_students_csv(&self, text: &str) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for row in parse_roster(text.as_bytes()) {
            let registration = match row.registration {
                Ok(registration) => registration,
                Err(err) => {
                    summary.record_failure(row.line, err.to_string());
                    continue;
                }
            };
            match self.student_store().create(registration) {
                Ok(_) => summary.record_created(),
                Err(err) => summary.record_failure(row.line, err.to_string()),
            }
        }

        info!(
            created = summary.created,
            failed = summary.failed,
            "roster import finished"
        );
        summary
    }

    pub fn students(&self) -> Result<Vec<Student>, PortalServiceError> {
        let mut students = self.student_store().list_all()?;
        sort_students(&mut students);
        Ok(students)
    }

    pub fn create_student(
        &self,
        registration: StudentRegistration,
    ) -> Result<Student, PortalServiceError> {
        self.register(registration)
    }

    pub fn update_student(
        &self,
        id: &RecordId,
        patch: StudentPatch,
    ) -> Result<Student, PortalServiceError> {
        let patch = patch.validate()?;
        let student = self.write_student_patch(id, &patch)?;
        info!(student_id = %student.student_id, "student updated by administrator");
        Ok(student)
    }

    pub fn delete_student(&self, id: &RecordId) -> Result<(), PortalServiceError> {
        self.student_store().delete(id)?;
        info!(record_id = %id, "student deleted");
        Ok(())
    }

    /// Newest first.
    pub fn announcements(
        &self,
        category: AnnouncementCategory,
    ) -> Result<Vec<Announcement>, PortalServiceError> {
        let mut announcements = self.announcement_store().list_by_category(category)?;
        announcements.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(announcements)
    }

    pub fn post_announcement(
        &self,
        announcement: NewAnnouncement,
        now: DateTime<Utc>,
    ) -> Result<Announcement, PortalServiceError> {
        let announcement = announcement.validate()?;
        let stored = self.announcement_store().create(announcement, now)?;
        info!(announcement_id = %stored.id, category = ?stored.category, "announcement posted");
        Ok(stored)
    }

    pub fn delete_announcement(&self, id: &RecordId) -> Result<(), PortalServiceError> {
        self.announcement_store().delete(id)?;
        Ok(())
    }

    pub fn projects(&self, year: Option<&str>) -> Result<Vec<Project>, PortalServiceError> {
        let mut projects = self.project_store().list_by_year(year)?;
        projects.sort_by(|a, b| {
            (&a.academic_year, a.grade, a.room).cmp(&(&b.academic_year, b.grade, b.room))
        });
        Ok(projects)
    }

    pub fn update_project(
        &self,
        id: &RecordId,
        patch: ProjectPatch,
        now: DateTime<Utc>,
    ) -> Result<Project, PortalServiceError> {
        let patch = patch.validate()?;
        Ok(self.project_store().update(id, &patch, now)?)
    }

    pub fn delete_project(&self, id: &RecordId) -> Result<(), PortalServiceError> {
        self.project_store().delete(id)?;
        Ok(())
    }

    pub fn settings(&self) -> Result<SystemSettings, PortalServiceError> {
        Ok(self.settings_store().get()?)
    }

    pub fn save_settings(&self, patch: SettingsPatch) -> Result<SystemSettings, PortalServiceError> {
        let patch = patch.validate()?;
        let settings = self.settings_store().save(&patch)?;
        info!(
            academic_year = ?settings.current_academic_year,
            "system settings saved"
        );
        Ok(settings)
    }
}

fn sort_students(students: &mut [Student]) {
    students.sort_by(|a, b| {
        (a.grade, a.room, &a.student_id).cmp(&(b.grade, b.room, &b.student_id))
    });
}
