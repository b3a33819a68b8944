//! Student registration, activity applications and the admin back office.

pub mod domain;
pub mod eligibility;
pub mod identity;
pub mod memory;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod session;
pub mod stats;
pub mod time;

#[cfg(test)]
mod tests;

pub use domain::{
    ActivityConfig, ActivityConfigPatch, ActivityKind, Announcement, AnnouncementCategory,
    ApplicationTrack, GradeLevel, NewAnnouncement, Project, ProjectPatch, ProjectSubmission,
    RecordId, Room, SettingsPatch, Student, StudentPatch, StudentRegistration, SystemSettings,
    ValidationError,
};
pub use eligibility::{BlockReason, EligibilityContext, EligibilityDecision};
pub use identity::{AdminAccount, AdminPrincipal, IdentityError, IdentityProvider, StaticIdentityProvider};
pub use memory::{InMemoryPortalStore, SnapshotError, StoreSnapshot};
pub use repository::{PortalRepository, RepositoryError};
pub use roster::{ExportError, ImportSummary};
pub use router::{portal_router, PortalState};
pub use service::{
    ActivityOverview, ApplicationOutcome, PortalService, PortalServiceError, ProjectOutcome,
    StudentProfile,
};
pub use session::{Session, SessionContext, SessionError, SessionRegistry};
pub use stats::{DashboardTotals, RoomStatistics};
