use chrono::{DateTime, Utc};

use super::domain::{
    ActivityConfig, ActivityConfigPatch, ActivityKind, Announcement, AnnouncementCategory,
    ApplicationTrack, GradeLevel, NewAnnouncement, Project, ProjectDraft, ProjectPatch, RecordId,
    Room, SettingsPatch, Student, StudentPatch, StudentRegistration, SystemSettings,
};
use super::eligibility::BlockReason;

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("student id {0} is already registered")]
    DuplicateStudentId(String),
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("conditional write rejected: {}", .0.summary())]
    ConditionFailed(BlockReason),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Guard re-checked by the store inside the same atomic step that sets an application flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplicationCondition {
    /// Reject when this many students in the applicant's grade and room already hold the flag.
    pub room_quota: Option<u32>,
}

/// Guard re-checked by the store when an update moves a student to another classroom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomChangeCondition {
    /// Seat limit per track, applied to the destination room for each flag the student holds.
    pub room_quotas: Vec<(ApplicationTrack, u32)>,
}

/// Student documents.
///
/// `create`, `update` and `commit_application` are conditional writes: the uniqueness and quota
/// checks they perform must be atomic with the write itself.
pub trait StudentStore: Send + Sync {
    fn find_by_credentials(
        &self,
        student_id: &str,
        phone: &str,
    ) -> Result<Option<Student>, RepositoryError>;
    fn find_by_id(&self, id: &RecordId) -> Result<Option<Student>, RepositoryError>;
    fn find_by_student_id(&self, student_id: &str) -> Result<Option<Student>, RepositoryError>;
    fn list_all(&self) -> Result<Vec<Student>, RepositoryError>;
    /// Fails with [`RepositoryError::DuplicateStudentId`] when the student id is taken.
    fn create(&self, registration: StudentRegistration) -> Result<Student, RepositoryError>;
    /// Fails with [`RepositoryError::ConditionFailed`] when the patch moves a flagged student
    /// into a classroom whose quota in `condition` is already reached.
    fn update(
        &self,
        id: &RecordId,
        patch: &StudentPatch,
        condition: &RoomChangeCondition,
    ) -> Result<Student, RepositoryError>;
    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError>;
    /// Set the track's flag. Fails with [`RepositoryError::ConditionFailed`] when the flag is
    /// already set or the room quota in `condition` is already reached.
    fn commit_application(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
        applied_at: DateTime<Utc>,
        condition: &ApplicationCondition,
    ) -> Result<Student, RepositoryError>;
    /// Clear the track's flag and timestamp.
    fn withdraw_application(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
    ) -> Result<Student, RepositoryError>;
    /// Clear the track's flag on every student, returning how many were cleared.
    fn clear_track(&self, track: ApplicationTrack) -> Result<usize, RepositoryError>;
}

/// One configuration document per activity, upserted with merge semantics.
pub trait ActivityConfigStore: Send + Sync {
    fn get(&self, kind: ActivityKind) -> Result<Option<ActivityConfig>, RepositoryError>;
    fn save(
        &self,
        kind: ActivityKind,
        patch: &ActivityConfigPatch,
    ) -> Result<ActivityConfig, RepositoryError>;
}

pub trait AnnouncementStore: Send + Sync {
    fn list_by_category(
        &self,
        category: AnnouncementCategory,
    ) -> Result<Vec<Announcement>, RepositoryError>;
    fn create(
        &self,
        announcement: NewAnnouncement,
        date: DateTime<Utc>,
    ) -> Result<Announcement, RepositoryError>;
    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError>;
}

/// Classroom projects. `create` fails with [`RepositoryError::Conflict`] when the classroom
/// already has a project for the year.
pub trait ProjectStore: Send + Sync {
    fn list_by_year(&self, year: Option<&str>) -> Result<Vec<Project>, RepositoryError>;
    fn find_by_room(
        &self,
        year: &str,
        grade: GradeLevel,
        room: Room,
    ) -> Result<Option<Project>, RepositoryError>;
    fn create(&self, draft: ProjectDraft) -> Result<Project, RepositoryError>;
    fn update(
        &self,
        id: &RecordId,
        patch: &ProjectPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Project, RepositoryError>;
    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError>;
}

pub trait SettingsStore: Send + Sync {
    fn get(&self) -> Result<SystemSettings, RepositoryError>;
    fn save(&self, patch: &SettingsPatch) -> Result<SystemSettings, RepositoryError>;
}

/// Everything the portal service needs from its backing store.
pub trait PortalRepository:
    StudentStore + ActivityConfigStore + AnnouncementStore + ProjectStore + SettingsStore
{
}

impl<T> PortalRepository for T where
    T: StudentStore + ActivityConfigStore + AnnouncementStore + ProjectStore + SettingsStore
{
}
