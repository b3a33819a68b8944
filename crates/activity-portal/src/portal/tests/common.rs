use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::Value;

use crate::portal::domain::{
    ActivityConfig, ActivityConfigPatch, ActivityKind, Announcement, AnnouncementCategory,
    ApplicationTrack, GradeLevel, NewAnnouncement, Project, ProjectDraft, ProjectPatch, RecordId,
    Room, SettingsPatch, Student, StudentPatch, StudentRegistration, SystemSettings,
};
use crate::portal::identity::{AdminAccount, StaticIdentityProvider};
use crate::portal::memory::InMemoryPortalStore;
use crate::portal::repository::{
    ActivityConfigStore, AnnouncementStore, ApplicationCondition, ProjectStore, RepositoryError,
    RoomChangeCondition, SettingsStore, StudentStore,
};
use crate::portal::service::PortalService;

pub(super) const ADMIN_EMAIL: &str = "admin@school.ac.th";
pub(super) const ADMIN_PASSWORD: &str = "open sesame";

pub(super) type TestService = PortalService<InMemoryPortalStore, StaticIdentityProvider>;

pub(super) fn bangkok() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).expect("valid offset")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn room(number: u8) -> Room {
    Room::new(number).expect("valid room")
}

pub(super) fn registration(student_id: &str, grade: GradeLevel, room_number: u8) -> StudentRegistration {
    StudentRegistration {
        student_id: student_id.to_string(),
        prefix: "นาย".to_string(),
        first_name: format!("First{student_id}"),
        last_name: format!("Last{student_id}"),
        nickname: None,
        grade,
        room: room(room_number),
        phone: format!("08{:0>8}", student_id),
    }
}

/// Unsaved student record for pure rule checks.
pub(super) fn student(grade: GradeLevel, room_number: u8) -> Student {
    Student::from_registration(
        RecordId("stu-test".to_string()),
        registration("10001", grade, room_number),
        None,
    )
}

pub(super) fn open_config(kind: ActivityKind) -> ActivityConfig {
    ActivityConfig {
        is_open: true,
        ..ActivityConfig::closed(kind)
    }
}

pub(super) fn identity() -> StaticIdentityProvider {
    StaticIdentityProvider::new(vec![AdminAccount {
        email: ADMIN_EMAIL.to_string(),
        password_sha256: StaticIdentityProvider::digest(ADMIN_PASSWORD),
    }])
}

pub(super) fn build_service() -> (Arc<TestService>, Arc<InMemoryPortalStore>) {
    let store = Arc::new(InMemoryPortalStore::default());
    let service = Arc::new(PortalService::new(
        store.clone(),
        Arc::new(identity()),
        bangkok(),
    ));
    (service, store)
}

/// Open the core-leader activity with no window and the given room quota.
pub(super) fn open_core_leader(service: &TestService, quota: Option<u32>) {
    service
        .save_activity_config(
            ActivityKind::CoreLeader,
            ActivityConfigPatch {
                is_open: Some(true),
                quota_per_room: Some(quota),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("core leader config saves");
}

pub(super) fn open_committee(service: &TestService, grades: &[GradeLevel]) {
    let allowed = (!grades.is_empty()).then(|| grades.iter().copied().collect());
    service
        .save_activity_config(
            ActivityKind::Committee,
            ActivityConfigPatch {
                is_open: Some(true),
                allowed_grades: Some(allowed),
                ..ActivityConfigPatch::default()
            },
        )
        .expect("committee config saves");
}

pub(super) fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("json body")))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = read_body(response).await;
    serde_json::from_slice(&body).expect("json payload")
}

/// Store whose backend is down.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("document store offline".to_string()))
}

impl StudentStore for UnavailableStore {
    fn find_by_credentials(&self, _: &str, _: &str) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn find_by_id(&self, _: &RecordId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn find_by_student_id(&self, _: &str) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn list_all(&self) -> Result<Vec<Student>, RepositoryError> {
        offline()
    }

    fn create(&self, _: StudentRegistration) -> Result<Student, RepositoryError> {
        offline()
    }

    fn update(
        &self,
        _: &RecordId,
        _: &StudentPatch,
        _: &RoomChangeCondition,
    ) -> Result<Student, RepositoryError> {
        offline()
    }

    fn delete(&self, _: &RecordId) -> Result<(), RepositoryError> {
        offline()
    }

    fn commit_application(
        &self,
        _: &RecordId,
        _: ApplicationTrack,
        _: DateTime<Utc>,
        _: &ApplicationCondition,
    ) -> Result<Student, RepositoryError> {
        offline()
    }

    fn withdraw_application(
        &self,
        _: &RecordId,
        _: ApplicationTrack,
    ) -> Result<Student, RepositoryError> {
        offline()
    }

    fn clear_track(&self, _: ApplicationTrack) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl ActivityConfigStore for UnavailableStore {
    fn get(&self, _: ActivityKind) -> Result<Option<ActivityConfig>, RepositoryError> {
        offline()
    }

    fn save(
        &self,
        _: ActivityKind,
        _: &ActivityConfigPatch,
    ) -> Result<ActivityConfig, RepositoryError> {
        offline()
    }
}

impl AnnouncementStore for UnavailableStore {
    fn list_by_category(
        &self,
        _: AnnouncementCategory,
    ) -> Result<Vec<Announcement>, RepositoryError> {
        offline()
    }

    fn create(&self, _: NewAnnouncement, _: DateTime<Utc>) -> Result<Announcement, RepositoryError> {
        offline()
    }

    fn delete(&self, _: &RecordId) -> Result<(), RepositoryError> {
        offline()
    }
}

impl ProjectStore for UnavailableStore {
    fn list_by_year(&self, _: Option<&str>) -> Result<Vec<Project>, RepositoryError> {
        offline()
    }

    fn find_by_room(
        &self,
        _: &str,
        _: GradeLevel,
        _: Room,
    ) -> Result<Option<Project>, RepositoryError> {
        offline()
    }

    fn create(&self, _: ProjectDraft) -> Result<Project, RepositoryError> {
        offline()
    }

    fn update(
        &self,
        _: &RecordId,
        _: &ProjectPatch,
        _: DateTime<Utc>,
    ) -> Result<Project, RepositoryError> {
        offline()
    }

    fn delete(&self, _: &RecordId) -> Result<(), RepositoryError> {
        offline()
    }
}

impl SettingsStore for UnavailableStore {
    fn get(&self) -> Result<SystemSettings, RepositoryError> {
        offline()
    }

    fn save(&self, _: &SettingsPatch) -> Result<SystemSettings, RepositoryError> {
        offline()
    }
}
