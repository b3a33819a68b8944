use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    double_option, ActivityConfigPatch, ActivityKind, AnnouncementCategory, ApplicationTrack,
    GradeLevel, NewAnnouncement, ProjectPatch, ProjectSubmission, RecordId, SettingsPatch,
    Student, StudentPatch, StudentRegistration, ValidationError,
};
use super::eligibility::BlockReason;
use super::identity::{AdminPrincipal, IdentityProvider};
use super::repository::{PortalRepository, RepositoryError};
use super::service::{ApplicationOutcome, PortalService, PortalServiceError, ProjectOutcome};
use super::session::{Session, SessionRegistry};
use super::time::{parse_instant, WindowEdge};

/// Shared handler state: the service plus the bearer-token registry.
pub struct PortalState<R, I> {
    pub service: Arc<PortalService<R, I>>,
    pub sessions: Arc<SessionRegistry>,
}

impl<R, I> Clone for PortalState<R, I> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Router exposing the student and admin JSON API under `/api/v1`.
pub fn portal_router<R, I>(
    service: Arc<PortalService<R, I>>,
    sessions: Arc<SessionRegistry>,
) -> Router
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let state = PortalState { service, sessions };

    Router::new()
        .route("/api/v1/students", post(register_handler::<R, I>))
        .route("/api/v1/sessions/student", post(student_login_handler::<R, I>))
        .route("/api/v1/sessions/admin", post(admin_login_handler::<R, I>))
        .route("/api/v1/sessions", delete(logout_handler::<R, I>))
        .route(
            "/api/v1/me",
            get(profile_handler::<R, I>).patch(update_profile_handler::<R, I>),
        )
        .route("/api/v1/activities/:kind", get(overview_handler::<R, I>))
        .route(
            "/api/v1/activities/:kind/application",
            post(apply_handler::<R, I>).delete(cancel_handler::<R, I>),
        )
        .route(
            "/api/v1/projects/mine",
            get(room_project_handler::<R, I>).put(submit_project_handler::<R, I>),
        )
        .route(
            "/api/v1/announcements/:category",
            get(announcements_handler::<R, I>),
        )
        .route("/api/v1/admin/dashboard", get(dashboard_handler::<R, I>))
        .route(
            "/api/v1/admin/activities/:kind/config",
            get(config_handler::<R, I>).put(save_config_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/activities/:kind/applicants",
            get(applicants_handler::<R, I>).delete(clear_applicants_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/activities/:kind/applicants/:id",
            delete(remove_applicant_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/activities/:kind/statistics",
            get(statistics_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/activities/:kind/export",
            get(export_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/students",
            get(students_handler::<R, I>).post(create_student_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/students/import",
            post(import_students_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/students/:id",
            put(update_student_handler::<R, I>).delete(delete_student_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/announcements",
            post(post_announcement_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/announcements/:id",
            delete(delete_announcement_handler::<R, I>),
        )
        .route("/api/v1/admin/projects", get(projects_handler::<R, I>))
        .route(
            "/api/v1/admin/projects/:id",
            put(update_project_handler::<R, I>).delete(delete_project_handler::<R, I>),
        )
        .route(
            "/api/v1/admin/settings",
            get(settings_handler::<R, I>).put(save_settings_handler::<R, I>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StudentCredentials {
    pub student_id: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicantsQuery {
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectsQuery {
    #[serde(default)]
    pub year: Option<String>,
}

/// Admin form for an activity. Dates arrive as text and are read in the portal's offset; an
/// empty string clears the date.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityConfigRequest {
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub open_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub close_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub quota_per_room: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub allowed_grades: Option<Option<BTreeSet<GradeLevel>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub external_link: Option<Option<String>>,
}

impl ActivityConfigRequest {
    pub fn into_patch(self, offset: FixedOffset) -> Result<ActivityConfigPatch, ValidationError> {
        let parse_date = |raw: Option<Option<String>>, edge: WindowEdge| match raw {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(text)) if text.trim().is_empty() => Ok(Some(None)),
            Some(Some(text)) => {
                parse_instant(&text, offset, edge).map(|instant| Some(Some(instant)))
            }
        };

        Ok(ActivityConfigPatch {
            is_open: self.is_open,
            open_date: parse_date(self.open_date, WindowEdge::Open)?,
            close_date: parse_date(self.close_date, WindowEdge::Close)?,
            quota_per_room: self.quota_per_room,
            allowed_grades: self.allowed_grades,
            external_link: self.external_link,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn session_for(sessions: &SessionRegistry, headers: &HeaderMap) -> Session {
    bearer_token(headers)
        .map(|token| sessions.resolve(token))
        .unwrap_or_default()
}

fn require_student(sessions: &SessionRegistry, headers: &HeaderMap) -> Result<Student, Response> {
    match session_for(sessions, headers) {
        Session::Student(student) => Ok(student),
        Session::Admin(_) => Err(forbidden("a student session is required")),
        Session::Anonymous => Err(unauthorized()),
    }
}

fn require_admin(
    sessions: &SessionRegistry,
    headers: &HeaderMap,
) -> Result<AdminPrincipal, Response> {
    match session_for(sessions, headers) {
        Session::Admin(principal) => Ok(principal),
        Session::Student(_) => Err(forbidden("an administrator session is required")),
        Session::Anonymous => Err(unauthorized()),
    }
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "sign in required" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn forbidden(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::FORBIDDEN, Json(payload)).into_response()
}

fn unprocessable(error: ValidationError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

fn blocked(reason: BlockReason) -> Response {
    let payload = json!({
        "outcome": "blocked",
        "reason": reason.code(),
        "message": reason.summary(),
    });
    (StatusCode::CONFLICT, Json(payload)).into_response()
}

fn parse_kind(raw: &str) -> Result<ActivityKind, Response> {
    raw.parse::<ActivityKind>().map_err(|err| {
        let payload = json!({ "error": err.to_string() });
        (StatusCode::NOT_FOUND, Json(payload)).into_response()
    })
}

fn parse_track(raw: &str) -> Result<ApplicationTrack, Response> {
    let kind = parse_kind(raw)?;
    kind.track().ok_or_else(|| {
        let payload = json!({
            "error": format!("the {} activity does not take individual applications", kind.label()),
        });
        (StatusCode::NOT_FOUND, Json(payload)).into_response()
    })
}

/// Map a service failure onto a status code and a JSON body.
pub(crate) fn error_response(error: PortalServiceError) -> Response {
    let (status, payload) = match &error {
        PortalServiceError::Validation(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": err.to_string() }),
        ),
        PortalServiceError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            json!({ "error": "invalid credentials" }),
        ),
        PortalServiceError::DuplicateStudentId(student_id) => (
            StatusCode::CONFLICT,
            json!({
                "error": error.to_string(),
                "code": "duplicate_student_id",
                "student_id": student_id,
            }),
        ),
        PortalServiceError::NotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": error.to_string() }))
        }
        PortalServiceError::Conflict(_) => {
            (StatusCode::CONFLICT, json!({ "error": error.to_string() }))
        }
        PortalServiceError::Repository(RepositoryError::ConditionFailed(reason)) => {
            return blocked(*reason);
        }
        _ if error.is_unavailable() => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "the service is temporarily unavailable, please try again shortly" }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": error.to_string() }),
        ),
    };
    (status, Json(payload)).into_response()
}

fn application_response<R, I>(state: &PortalState<R, I>, outcome: ApplicationOutcome) -> Response {
    match outcome {
        ApplicationOutcome::Blocked { reason } => blocked(reason),
        outcome => {
            if let Some(student) = outcome.student() {
                state.sessions.refresh_student(student);
            }
            (StatusCode::OK, Json(outcome)).into_response()
        }
    }
}

pub(crate) async fn register_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Json(registration): Json<StudentRegistration>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    match state.service.register(registration) {
        Ok(student) => {
            let token = state.sessions.issue(Session::Student(student.clone()));
            let payload = json!({ "token": token, "student": student });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn student_login_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Json(credentials): Json<StudentCredentials>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    match state
        .service
        .login_student(&credentials.student_id, &credentials.phone)
    {
        Ok(student) => {
            let token = state.sessions.issue(Session::Student(student.clone()));
            let payload = json!({ "token": token, "student": student });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn admin_login_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Json(credentials): Json<AdminCredentials>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    match state
        .service
        .sign_in_admin(&credentials.email, &credentials.password)
    {
        Ok(principal) => {
            let token = state.sessions.issue(Session::Admin(principal.clone()));
            let payload = json!({ "token": token, "admin": principal });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn logout_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Some(token) = bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn profile_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state.service.profile(&student.id) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_profile_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    Json(patch): Json<StudentPatch>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state.service.update_profile(&student.id, patch) {
        Ok(profile) => {
            state.sessions.refresh_student(&profile.student);
            (StatusCode::OK, Json(profile)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn overview_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let session = session_for(&state.sessions, &headers);
    let student_id = session.student().map(|student| student.id.clone());

    match state
        .service
        .activity_overview(kind, student_id.as_ref(), Utc::now())
    {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };

    match state.service.apply(&student.id, track, Utc::now()) {
        Ok(outcome) => application_response(&state, outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };

    match state.service.cancel(&student.id, track, Utc::now()) {
        Ok(outcome) => application_response(&state, outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn room_project_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state.service.room_project(&student.id) {
        Ok(project) => (StatusCode::OK, Json(json!({ "project": project }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_project_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    Json(submission): Json<ProjectSubmission>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let student = match require_student(&state.sessions, &headers) {
        Ok(student) => student,
        Err(response) => return response,
    };
    match state
        .service
        .submit_project(&student.id, submission, Utc::now())
    {
        Ok(ProjectOutcome::Blocked { reason }) => blocked(reason),
        Ok(outcome @ ProjectOutcome::Submitted { .. }) => {
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn announcements_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(category): Path<String>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    let Some(category) = AnnouncementCategory::parse(&category) else {
        let payload = json!({ "error": format!("unknown announcement category '{category}'") });
        return (StatusCode::NOT_FOUND, Json(payload)).into_response();
    };
    match state.service.announcements(category) {
        Ok(announcements) => (StatusCode::OK, Json(announcements)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dashboard_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.dashboard() {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn config_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match state.service.activity_config(kind) {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_config_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ActivityConfigRequest>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let patch = match request.into_patch(state.service.offset()) {
        Ok(patch) => patch,
        Err(err) => return unprocessable(err),
    };
    match state.service.save_activity_config(kind, patch) {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn applicants_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    Query(query): Query<ApplicantsQuery>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    let grade = match query.grade.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => match raw.parse::<GradeLevel>() {
            Ok(grade) => Some(grade),
            Err(err) => return unprocessable(err),
        },
        None => None,
    };
    match state.service.applicants(track, grade) {
        Ok(applicants) => (StatusCode::OK, Json(applicants)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn clear_applicants_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    match state.service.clear_applications(track) {
        Ok(cleared) => (StatusCode::OK, Json(json!({ "cleared": cleared }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn remove_applicant_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    match state.service.remove_application(&RecordId(id), track) {
        Ok(student) => {
            state.sessions.refresh_student(&student);
            (StatusCode::OK, Json(student)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn statistics_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    match state.service.room_statistics(track) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let track = match parse_track(&kind) {
        Ok(track) => track,
        Err(response) => return response,
    };
    match state.service.export_applicants_csv(track) {
        Ok(bytes) => {
            let filename = format!(
                "attachment; filename=\"{}-applicants-{}.csv\"",
                track.activity().key(),
                Utc::now().with_timezone(&state.service.offset()).format("%Y-%m-%d"),
            );
            let headers = [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, filename),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn students_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.students() {
        Ok(students) => (StatusCode::OK, Json(students)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_student_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    Json(registration): Json<StudentRegistration>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.create_student(registration) {
        Ok(student) => (StatusCode::CREATED, Json(student)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn import_students_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    body: String,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let summary = state.service.import_students_csv(&body);
    (StatusCode::OK, Json(summary)).into_response()
}

pub(crate) async fn update_student_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<StudentPatch>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.update_student(&RecordId(id), patch) {
        Ok(student) => {
            state.sessions.refresh_student(&student);
            (StatusCode::OK, Json(student)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_student_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let id = RecordId(id);
    match state.service.delete_student(&id) {
        Ok(()) => {
            state.sessions.revoke_student(&id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn post_announcement_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    Json(announcement): Json<NewAnnouncement>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.post_announcement(announcement, Utc::now()) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_announcement_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.delete_announcement(&RecordId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn projects_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Query(query): Query<ProjectsQuery>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    let year = query.year.as_deref().filter(|year| !year.trim().is_empty());
    match state.service.projects(year) {
        Ok(projects) => (StatusCode::OK, Json(projects)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_project_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<ProjectPatch>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.update_project(&RecordId(id), patch, Utc::now()) {
        Ok(project) => (StatusCode::OK, Json(project)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_project_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.delete_project(&RecordId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn settings_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.settings() {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_settings_handler<R, I>(
    State(state): State<PortalState<R, I>>,
    headers: HeaderMap,
    Json(patch): Json<SettingsPatch>,
) -> Response
where
    R: PortalRepository + 'static,
    I: IdentityProvider + 'static,
{
    if let Err(response) = require_admin(&state.sessions, &headers) {
        return response;
    }
    match state.service.save_settings(patch) {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(err) => error_response(err),
    }
}
