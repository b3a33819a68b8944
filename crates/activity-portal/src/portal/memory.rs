use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActivityConfig, ActivityConfigPatch, ActivityKind, Announcement, AnnouncementCategory,
    ApplicationTrack, GradeLevel, NewAnnouncement, Project, ProjectDraft, ProjectPatch, RecordId,
    Room, SettingsPatch, Student, StudentPatch, StudentRegistration, SystemSettings,
};
use super::eligibility::{BlockReason, RoomKey};
use super::repository::{
    ActivityConfigStore, AnnouncementStore, ApplicationCondition, ProjectStore, RepositoryError,
    RoomChangeCondition, SettingsStore, StudentStore,
};

/// Serializable image of the whole store, used for the optional data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub configs: Vec<ActivityConfig>,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub settings: SystemSettings,
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to access data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("data file is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Default)]
struct MemoryState {
    students: BTreeMap<RecordId, Student>,
    configs: BTreeMap<ActivityKind, ActivityConfig>,
    announcements: BTreeMap<RecordId, Announcement>,
    projects: BTreeMap<RecordId, Project>,
    settings: SystemSettings,
    sequence: u64,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> RecordId {
        self.sequence += 1;
        RecordId(format!("{prefix}-{:06}", self.sequence))
    }

    fn student_mut(&mut self, id: &RecordId) -> Result<&mut Student, RepositoryError> {
        self.students.get_mut(id).ok_or(RepositoryError::NotFound)
    }

    fn seats_taken(&self, track: ApplicationTrack, key: RoomKey) -> usize {
        self.students
            .values()
            .filter(|student| student.has_applied(track) && RoomKey::of(student) == key)
            .count()
    }
}

/// Document store kept behind a single mutex, so every conditional write is atomic.
#[derive(Debug, Default)]
pub struct InMemoryPortalStore {
    state: Mutex<MemoryState>,
}

impl InMemoryPortalStore {
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let state = MemoryState {
            students: snapshot
                .students
                .into_iter()
                .map(|student| (student.id.clone(), student))
                .collect(),
            configs: snapshot
                .configs
                .into_iter()
                .map(|config| (config.kind, config))
                .collect(),
            announcements: snapshot
                .announcements
                .into_iter()
                .map(|announcement| (announcement.id.clone(), announcement))
                .collect(),
            projects: snapshot
                .projects
                .into_iter()
                .map(|project| (project.id.clone(), project))
                .collect(),
            settings: snapshot.settings,
            sequence: snapshot.sequence,
        };

        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        let state = self.state()?;
        Ok(StoreSnapshot {
            students: state.students.values().cloned().collect(),
            configs: state.configs.values().cloned().collect(),
            announcements: state.announcements.values().cloned().collect(),
            projects: state.projects.values().cloned().collect(),
            settings: state.settings.clone(),
            sequence: state.sequence,
        })
    }

    /// Load a data file, starting empty when it does not exist yet.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let snapshot = self.snapshot()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl StudentStore for InMemoryPortalStore {
    fn find_by_credentials(
        &self,
        student_id: &str,
        phone: &str,
    ) -> Result<Option<Student>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .students
            .values()
            .find(|student| student.student_id == student_id && student.phone == phone)
            .cloned())
    }

    fn find_by_id(&self, id: &RecordId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.state()?.students.get(id).cloned())
    }

    fn find_by_student_id(&self, student_id: &str) -> Result<Option<Student>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .students
            .values()
            .find(|student| student.student_id == student_id)
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<Student>, RepositoryError> {
        Ok(self.state()?.students.values().cloned().collect())
    }

    fn create(&self, registration: StudentRegistration) -> Result<Student, RepositoryError> {
        let mut state = self.state()?;
        if state
            .students
            .values()
            .any(|student| student.student_id == registration.student_id)
        {
            return Err(RepositoryError::DuplicateStudentId(registration.student_id));
        }

        let id = state.next_id("stu");
        let academic_year = state.settings.current_academic_year.clone();
        let student = Student::from_registration(id.clone(), registration, academic_year);
        state.students.insert(id, student.clone());
        Ok(student)
    }

    fn update(
        &self,
        id: &RecordId,
        patch: &StudentPatch,
        condition: &RoomChangeCondition,
    ) -> Result<Student, RepositoryError> {
        let mut state = self.state()?;

        let current = state.students.get(id).ok_or(RepositoryError::NotFound)?;
        let mut updated = current.clone();
        updated.apply_patch(patch);
        let target = RoomKey::of(&updated);

        if target != RoomKey::of(current) {
            for &(track, quota) in &condition.room_quotas {
                if !updated.has_applied(track) {
                    continue;
                }
                if state.seats_taken(track, target) >= quota as usize {
                    return Err(RepositoryError::ConditionFailed(BlockReason::RoomQuotaFull));
                }
            }
        }

        state.students.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError> {
        self.state()?
            .students
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn commit_application(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
        applied_at: DateTime<Utc>,
        condition: &ApplicationCondition,
    ) -> Result<Student, RepositoryError> {
        let mut state = self.state()?;

        let key = {
            let student = state.students.get(id).ok_or(RepositoryError::NotFound)?;
            if student.has_applied(track) {
                return Err(RepositoryError::ConditionFailed(
                    BlockReason::AlreadyApplied,
                ));
            }
            RoomKey::of(student)
        };

        if let Some(quota) = condition.room_quota {
            if state.seats_taken(track, key) >= quota as usize {
                return Err(RepositoryError::ConditionFailed(BlockReason::RoomQuotaFull));
            }
        }

        let student = state.student_mut(id)?;
        student.set_application(track, Some(applied_at));
        Ok(student.clone())
    }

    fn withdraw_application(
        &self,
        id: &RecordId,
        track: ApplicationTrack,
    ) -> Result<Student, RepositoryError> {
        let mut state = self.state()?;
        let student = state.student_mut(id)?;
        student.set_application(track, None);
        Ok(student.clone())
    }

    fn clear_track(&self, track: ApplicationTrack) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let mut cleared = 0;
        for student in state.students.values_mut() {
            if student.has_applied(track) {
                student.set_application(track, None);
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

impl ActivityConfigStore for InMemoryPortalStore {
    fn get(&self, kind: ActivityKind) -> Result<Option<ActivityConfig>, RepositoryError> {
        Ok(self.state()?.configs.get(&kind).cloned())
    }

    fn save(
        &self,
        kind: ActivityKind,
        patch: &ActivityConfigPatch,
    ) -> Result<ActivityConfig, RepositoryError> {
        let mut state = self.state()?;
        let config = state
            .configs
            .entry(kind)
            .or_insert_with(|| ActivityConfig::closed(kind));
        config.apply_patch(patch);
        Ok(config.clone())
    }
}

impl AnnouncementStore for InMemoryPortalStore {
    fn list_by_category(
        &self,
        category: AnnouncementCategory,
    ) -> Result<Vec<Announcement>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .announcements
            .values()
            .filter(|announcement| announcement.category == category)
            .cloned()
            .collect())
    }

    fn create(
        &self,
        announcement: NewAnnouncement,
        date: DateTime<Utc>,
    ) -> Result<Announcement, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_id("ann");
        let stored = Announcement {
            id: id.clone(),
            category: announcement.category,
            title: announcement.title,
            link: announcement.link,
            content: announcement.content,
            date,
        };
        state.announcements.insert(id, stored.clone());
        Ok(stored)
    }

    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError> {
        self.state()?
            .announcements
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl ProjectStore for InMemoryPortalStore {
    fn list_by_year(&self, year: Option<&str>) -> Result<Vec<Project>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .projects
            .values()
            .filter(|project| year.map_or(true, |year| project.academic_year == year))
            .cloned()
            .collect())
    }

    fn find_by_room(
        &self,
        year: &str,
        grade: GradeLevel,
        room: Room,
    ) -> Result<Option<Project>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .projects
            .values()
            .find(|project| {
                project.academic_year == year && project.grade == grade && project.room == room
            })
            .cloned())
    }

    fn create(&self, draft: ProjectDraft) -> Result<Project, RepositoryError> {
        let mut state = self.state()?;
        if state.projects.values().any(|project| {
            project.academic_year == draft.academic_year
                && project.grade == draft.grade
                && project.room == draft.room
        }) {
            return Err(RepositoryError::Conflict);
        }

        let id = state.next_id("prj");
        let project = Project {
            id: id.clone(),
            academic_year: draft.academic_year,
            grade: draft.grade,
            room: draft.room,
            title: draft.submission.title,
            description: draft.submission.description,
            link: draft.submission.link,
            submitted_by: draft.submitted_by,
            submitted_at: draft.submitted_at,
            updated_at: draft.submitted_at,
        };
        state.projects.insert(id, project.clone());
        Ok(project)
    }

    fn update(
        &self,
        id: &RecordId,
        patch: &ProjectPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Project, RepositoryError> {
        let mut state = self.state()?;
        let project = state
            .projects
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        project.apply_patch(patch, updated_at);
        Ok(project.clone())
    }

    fn delete(&self, id: &RecordId) -> Result<(), RepositoryError> {
        self.state()?
            .projects
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl SettingsStore for InMemoryPortalStore {
    fn get(&self) -> Result<SystemSettings, RepositoryError> {
        Ok(self.state()?.settings.clone())
    }

    fn save(&self, patch: &SettingsPatch) -> Result<SystemSettings, RepositoryError> {
        let mut state = self.state()?;
        state.settings.apply_patch(patch);
        Ok(state.settings.clone())
    }
}
