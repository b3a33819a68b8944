use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::domain::{RecordId, Student};
use super::identity::AdminPrincipal;

/// Who is acting. Student and admin sessions come from independent sources and never mix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "principal", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Anonymous,
    Student(Student),
    Admin(AdminPrincipal),
}

impl Session {
    pub fn student(&self) -> Option<&Student> {
        match self {
            Session::Student(student) => Some(student),
            _ => None,
        }
    }

    pub fn admin(&self) -> Option<&AdminPrincipal> {
        match self {
            Session::Admin(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        match self {
            Session::Anonymous => None,
            Session::Student(_) => Some("student"),
            Session::Admin(_) => Some("admin"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Explicit session holder for a single client.
///
/// Lifecycle: [`SessionContext::init`] reads any persisted student session, the login methods
/// and [`SessionContext::refresh_student`] update it, [`SessionContext::clear`] ends it. Only
/// student sessions are written to disk; admin sessions live as long as the context.
#[derive(Debug)]
pub struct SessionContext {
    path: Option<PathBuf>,
    session: Session,
}

impl SessionContext {
    pub fn init(path: Option<PathBuf>) -> Result<Self, SessionError> {
        let mut context = Self {
            path,
            session: Session::Anonymous,
        };

        let Some(path) = context.path.clone() else {
            return Ok(context);
        };
        if !path.exists() {
            return Ok(context);
        }

        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Student>(&contents) {
            Ok(student) => {
                debug!(student_id = %student.student_id, "restored persisted student session");
                context.session = Session::Student(student);
            }
            Err(err) => {
                warn!(error = %err, "discarding unreadable student session");
                std::fs::remove_file(&path)?;
            }
        }

        Ok(context)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn login_student(&mut self, student: Student) -> Result<(), SessionError> {
        self.persist(&student)?;
        self.session = Session::Student(student);
        Ok(())
    }

    pub fn login_admin(&mut self, principal: AdminPrincipal) -> Result<(), SessionError> {
        self.remove_persisted()?;
        self.session = Session::Admin(principal);
        Ok(())
    }

    /// Replace the cached student after a profile change or application. Ignored unless the
    /// same student is signed in.
    pub fn refresh_student(&mut self, student: Student) -> Result<bool, SessionError> {
        let same = self
            .session
            .student()
            .is_some_and(|current| current.id == student.id);
        if !same {
            return Ok(false);
        }
        self.login_student(student)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.session = Session::Anonymous;
        self.remove_persisted()
    }

    fn persist(&self, student: &Student) -> Result<(), SessionError> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(student)?)?;
        }
        Ok(())
    }

    fn remove_persisted(&self) -> Result<(), SessionError> {
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Lifetime of a bearer token when the registry is built with [`SessionRegistry::default`].
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 12 * 60;

#[derive(Debug, Clone)]
struct IssuedSession {
    session: Session,
    issued_at: DateTime<Utc>,
}

/// Bearer-token sessions for the HTTP surface.
///
/// Tokens expire a fixed time after they are issued. Expired entries are dropped when they are
/// resolved and swept whenever a new token is issued.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, IssuedSession>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionRegistry {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn issue(&self, session: Session) -> String {
        self.issue_at(session, Utc::now())
    }

    pub fn issue_at(&self, session: Session, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, issued| !self.is_expired(issued, now));
        let swept = before - sessions.len();
        if swept > 0 {
            debug!(swept, "expired sessions swept");
        }
        sessions.insert(
            token.clone(),
            IssuedSession {
                session,
                issued_at: now,
            },
        );
        token
    }

    /// Unknown and expired tokens resolve to [`Session::Anonymous`].
    pub fn resolve(&self, token: &str) -> Session {
        self.resolve_at(token, Utc::now())
    }

    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Session {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(issued) = sessions.get(token) else {
            return Session::Anonymous;
        };
        if !self.is_expired(issued, now) {
            return issued.session.clone();
        }
        sessions.remove(token);
        debug!("expired session token presented");
        Session::Anonymous
    }

    /// Tokens currently held, expired or not.
    pub fn held(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Refresh the cached record in every session held by this student.
    pub fn refresh_student(&self, student: &Student) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        for issued in sessions.values_mut() {
            if let Session::Student(current) = &mut issued.session {
                if current.id == student.id {
                    *current = student.clone();
                }
            }
        }
    }

    /// Drop every session held by a student, e.g. after their record is deleted.
    pub fn revoke_student(&self, student_id: &RecordId) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, issued| {
            !matches!(&issued.session, Session::Student(current) if &current.id == student_id)
        });
        before - sessions.len()
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    fn is_expired(&self, issued: &IssuedSession, now: DateTime<Utc>) -> bool {
        now - issued.issued_at >= self.ttl
    }
}
