use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier assigned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input rejected before it reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("unknown grade level '{0}'")]
    UnknownGrade(String),
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
    #[error("unsupported name prefix '{0}'")]
    UnknownPrefix(String),
    #[error("phone number must contain 9 or 10 digits")]
    InvalidPhone,
    #[error("unknown activity '{0}'")]
    UnknownActivity(String),
    #[error("{field} does not apply to the {activity} activity")]
    FieldNotApplicable {
        field: &'static str,
        activity: &'static str,
    },
    #[error("quota per room must be at least 1")]
    ZeroQuota,
    #[error("open date must not be after close date")]
    InvertedWindow,
    #[error("could not read '{0}' as a date and time")]
    InvalidTimestamp(String),
    #[error("the current academic year has not been configured")]
    AcademicYearNotConfigured,
}

/// Secondary-school grade levels (มัธยมศึกษาปีที่ 1-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GradeLevel {
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
}

impl GradeLevel {
    pub const fn ordered() -> [GradeLevel; 6] {
        [
            GradeLevel::M1,
            GradeLevel::M2,
            GradeLevel::M3,
            GradeLevel::M4,
            GradeLevel::M5,
            GradeLevel::M6,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            GradeLevel::M1 => "ม.1",
            GradeLevel::M2 => "ม.2",
            GradeLevel::M3 => "ม.3",
            GradeLevel::M4 => "ม.4",
            GradeLevel::M5 => "ม.5",
            GradeLevel::M6 => "ม.6",
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            GradeLevel::M1 => 1,
            GradeLevel::M2 => 2,
            GradeLevel::M3 => 3,
            GradeLevel::M4 => 4,
            GradeLevel::M5 => 5,
            GradeLevel::M6 => 6,
        }
    }

    /// Accepts both the bare number (`"4"`) and the labelled form (`"ม.4"`).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("ม.").unwrap_or(trimmed).trim();
        match digits.parse::<u8>().ok()? {
            1 => Some(GradeLevel::M1),
            2 => Some(GradeLevel::M2),
            3 => Some(GradeLevel::M3),
            4 => Some(GradeLevel::M4),
            5 => Some(GradeLevel::M5),
            6 => Some(GradeLevel::M6),
            _ => None,
        }
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GradeLevel {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| ValidationError::UnknownGrade(raw.to_string()))
    }
}

impl Serialize for GradeLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for GradeLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Classroom number within a grade, `1` through `12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Room(u8);

impl Room {
    pub const COUNT: u8 = 12;

    pub fn new(number: u8) -> Option<Self> {
        (1..=Self::COUNT).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Room> {
        (1..=Self::COUNT).map(Room)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::new)
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Room {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| ValidationError::UnknownRoom(raw.to_string()))
    }
}

impl Serialize for Room {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Room {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRoom {
            Text(String),
            Number(u8),
        }

        match RawRoom::deserialize(deserializer)? {
            RawRoom::Text(raw) => raw.parse().map_err(serde::de::Error::custom),
            RawRoom::Number(number) => Room::new(number)
                .ok_or_else(|| serde::de::Error::custom(ValidationError::UnknownRoom(number.to_string()))),
        }
    }
}

/// Activities the portal manages. Each has exactly one configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    CoreLeader,
    Committee,
    Project,
}

impl ActivityKind {
    pub const fn ordered() -> [ActivityKind; 3] {
        [
            ActivityKind::CoreLeader,
            ActivityKind::Committee,
            ActivityKind::Project,
        ]
    }

    /// Configuration key, also used in URLs.
    pub const fn key(self) -> &'static str {
        match self {
            ActivityKind::CoreLeader => "core_leader",
            ActivityKind::Committee => "committee",
            ActivityKind::Project => "project",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ActivityKind::CoreLeader => "core leader",
            ActivityKind::Committee => "committee",
            ActivityKind::Project => "project",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "core_leader" | "core" => Some(ActivityKind::CoreLeader),
            "committee" => Some(ActivityKind::Committee),
            "project" => Some(ActivityKind::Project),
            _ => None,
        }
    }

    pub const fn category(self) -> AnnouncementCategory {
        match self {
            ActivityKind::CoreLeader => AnnouncementCategory::Core,
            ActivityKind::Committee => AnnouncementCategory::Committee,
            ActivityKind::Project => AnnouncementCategory::Project,
        }
    }

    /// The application flag this activity sets, if students apply to it individually.
    pub const fn track(self) -> Option<ApplicationTrack> {
        match self {
            ActivityKind::CoreLeader => Some(ApplicationTrack::CoreLeader),
            ActivityKind::Committee => Some(ApplicationTrack::Committee),
            ActivityKind::Project => None,
        }
    }
}

impl FromStr for ActivityKind {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::from_key(raw).ok_or_else(|| ValidationError::UnknownActivity(raw.to_string()))
    }
}

/// Roles a student applies for individually; each maps to a flag on the student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationTrack {
    CoreLeader,
    Committee,
}

impl ApplicationTrack {
    pub const fn ordered() -> [ApplicationTrack; 2] {
        [ApplicationTrack::CoreLeader, ApplicationTrack::Committee]
    }

    pub const fn activity(self) -> ActivityKind {
        match self {
            ApplicationTrack::CoreLeader => ActivityKind::CoreLeader,
            ApplicationTrack::Committee => ActivityKind::Committee,
        }
    }

    pub const fn label(self) -> &'static str {
        self.activity().label()
    }

    /// Role the student must already hold before applying.
    pub const fn prerequisite(self) -> Option<ApplicationTrack> {
        match self {
            ApplicationTrack::CoreLeader => None,
            ApplicationTrack::Committee => Some(ApplicationTrack::CoreLeader),
        }
    }

    pub const fn has_room_quota(self) -> bool {
        matches!(self, ApplicationTrack::CoreLeader)
    }

    pub const fn has_grade_allowlist(self) -> bool {
        matches!(self, ApplicationTrack::Committee)
    }
}

/// Name prefixes offered on the registration form.
pub const NAME_PREFIXES: [&str; 4] = ["เด็กชาย", "เด็กหญิง", "นาย", "นางสาว"];

/// Persisted student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: RecordId,
    pub student_id: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub grade: GradeLevel,
    pub room: Room,
    pub phone: String,
    #[serde(default)]
    pub is_core_leader: bool,
    #[serde(default)]
    pub core_leader_applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_committee: bool,
    #[serde(default)]
    pub committee_applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub academic_year: Option<String>,
}

impl Student {
    pub fn from_registration(
        id: RecordId,
        registration: StudentRegistration,
        academic_year: Option<String>,
    ) -> Self {
        Self {
            id,
            student_id: registration.student_id,
            prefix: registration.prefix,
            first_name: registration.first_name,
            last_name: registration.last_name,
            nickname: registration.nickname,
            grade: registration.grade,
            room: registration.room,
            phone: registration.phone,
            is_core_leader: false,
            core_leader_applied_at: None,
            is_committee: false,
            committee_applied_at: None,
            academic_year,
        }
    }

    pub fn has_applied(&self, track: ApplicationTrack) -> bool {
        match track {
            ApplicationTrack::CoreLeader => self.is_core_leader,
            ApplicationTrack::Committee => self.is_committee,
        }
    }

    pub fn applied_at(&self, track: ApplicationTrack) -> Option<DateTime<Utc>> {
        match track {
            ApplicationTrack::CoreLeader => self.core_leader_applied_at,
            ApplicationTrack::Committee => self.committee_applied_at,
        }
    }

    /// `Some` sets the flag and stamps it; `None` clears both.
    pub fn set_application(&mut self, track: ApplicationTrack, applied_at: Option<DateTime<Utc>>) {
        let applied = applied_at.is_some();
        match track {
            ApplicationTrack::CoreLeader => {
                self.is_core_leader = applied;
                self.core_leader_applied_at = applied_at;
            }
            ApplicationTrack::Committee => {
                self.is_committee = applied;
                self.committee_applied_at = applied_at;
            }
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.prefix, self.first_name, self.last_name)
    }

    pub fn classroom(&self) -> String {
        format!("{}/{}", self.grade, self.room)
    }

    /// A profile is stale when the school has moved to a new academic year since it was confirmed.
    pub fn is_stale(&self, settings: &SystemSettings) -> bool {
        match settings.current_academic_year.as_deref() {
            Some(current) => self.academic_year.as_deref() != Some(current),
            None => false,
        }
    }

    pub fn apply_patch(&mut self, patch: &StudentPatch) {
        if let Some(prefix) = &patch.prefix {
            self.prefix = prefix.clone();
        }
        if let Some(first_name) = &patch.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(nickname) = &patch.nickname {
            self.nickname = nickname.clone();
        }
        if let Some(grade) = patch.grade {
            self.grade = grade;
        }
        if let Some(room) = patch.room {
            self.room = room;
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(year) = &patch.academic_year {
            self.academic_year = Some(year.clone());
        }
    }
}

/// Registration form, also produced by each row of a roster import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRegistration {
    pub student_id: String,
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub grade: GradeLevel,
    pub room: Room,
    pub phone: String,
}

impl StudentRegistration {
    /// Trim every field, normalize the phone number and reject incomplete forms.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            student_id: required("student_id", &self.student_id)?,
            prefix: validate_prefix(&self.prefix)?,
            first_name: required("first_name", &self.first_name)?,
            last_name: required("last_name", &self.last_name)?,
            nickname: optional_text(self.nickname.as_deref()),
            grade: self.grade,
            room: self.room,
            phone: normalize_phone(&self.phone)?,
        })
    }
}

/// Mutable student fields. Application flags are deliberately absent: they change only through
/// apply, cancel and admin removal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,
    #[serde(default)]
    pub grade: Option<GradeLevel>,
    #[serde(default)]
    pub room: Option<Room>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Stamped by the service when a student confirms their profile.
    #[serde(skip_deserializing)]
    pub academic_year: Option<String>,
}

impl StudentPatch {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            prefix: self.prefix.as_deref().map(validate_prefix).transpose()?,
            first_name: self
                .first_name
                .as_deref()
                .map(|value| required("first_name", value))
                .transpose()?,
            last_name: self
                .last_name
                .as_deref()
                .map(|value| required("last_name", value))
                .transpose()?,
            nickname: self.nickname.map(|value| optional_text(value.as_deref())),
            grade: self.grade,
            room: self.room,
            phone: self.phone.as_deref().map(normalize_phone).transpose()?,
            academic_year: self.academic_year,
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Per-activity switches and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub kind: ActivityKind,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub open_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub quota_per_room: Option<u32>,
    #[serde(default)]
    pub allowed_grades: Option<BTreeSet<GradeLevel>>,
    #[serde(default)]
    pub external_link: Option<String>,
}

impl ActivityConfig {
    /// Default record used until an administrator saves one.
    pub fn closed(kind: ActivityKind) -> Self {
        Self {
            kind,
            is_open: false,
            open_date: None,
            close_date: None,
            quota_per_room: None,
            allowed_grades: None,
            external_link: None,
        }
    }

    /// Merge a patch; absent fields keep their value, explicit nulls clear it.
    pub fn apply_patch(&mut self, patch: &ActivityConfigPatch) {
        if let Some(is_open) = patch.is_open {
            self.is_open = is_open;
        }
        if let Some(open_date) = patch.open_date {
            self.open_date = open_date;
        }
        if let Some(close_date) = patch.close_date {
            self.close_date = close_date;
        }
        if let Some(quota) = patch.quota_per_room {
            self.quota_per_room = quota;
        }
        if let Some(grades) = &patch.allowed_grades {
            self.allowed_grades = grades.clone();
        }
        if let Some(link) = &patch.external_link {
            self.external_link = link.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(open), Some(close)) = (self.open_date, self.close_date) {
            if open > close {
                return Err(ValidationError::InvertedWindow);
            }
        }
        if self.quota_per_room == Some(0) {
            return Err(ValidationError::ZeroQuota);
        }
        Ok(())
    }
}

/// Admin edit of an [`ActivityConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfigPatch {
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub open_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub close_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub quota_per_room: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub allowed_grades: Option<Option<BTreeSet<GradeLevel>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub external_link: Option<Option<String>>,
}

impl ActivityConfigPatch {
    /// Reject fields that only make sense for another activity. Clearing them is always allowed.
    pub fn validate_for(self, kind: ActivityKind) -> Result<Self, ValidationError> {
        let not_applicable = |field| ValidationError::FieldNotApplicable {
            field,
            activity: kind.label(),
        };

        if matches!(self.quota_per_room, Some(Some(_))) && kind != ActivityKind::CoreLeader {
            return Err(not_applicable("quota_per_room"));
        }
        if matches!(self.allowed_grades, Some(Some(_))) && kind != ActivityKind::Committee {
            return Err(not_applicable("allowed_grades"));
        }
        if matches!(self.external_link, Some(Some(_))) && kind != ActivityKind::Project {
            return Err(not_applicable("external_link"));
        }

        Ok(Self {
            external_link: self
                .external_link
                .map(|link| optional_text(link.as_deref())),
            ..self
        })
    }
}

/// Announcement feed a post belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnouncementCategory {
    Core,
    Committee,
    Project,
}

impl AnnouncementCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CORE" | "CORE_LEADER" => Some(AnnouncementCategory::Core),
            "COMMITTEE" => Some(AnnouncementCategory::Committee),
            "PROJECT" => Some(AnnouncementCategory::Project),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: RecordId,
    pub category: AnnouncementCategory,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnouncement {
    pub category: AnnouncementCategory,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl NewAnnouncement {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            category: self.category,
            title: required("title", &self.title)?,
            link: optional_text(self.link.as_deref()),
            content: optional_text(self.content.as_deref()),
        })
    }
}

/// A classroom's moral project for one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub academic_year: String,
    pub grade: GradeLevel,
    pub room: Room,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn apply_patch(&mut self, patch: &ProjectPatch, updated_at: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(link) = &patch.link {
            self.link = link.clone();
        }
        self.updated_at = updated_at;
    }
}

/// Student-facing project form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSubmission {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl ProjectSubmission {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", &self.title)?,
            description: optional_text(self.description.as_deref()),
            link: optional_text(self.link.as_deref()),
        })
    }

    pub fn into_patch(self) -> ProjectPatch {
        ProjectPatch {
            title: Some(self.title),
            description: Some(self.description),
            link: Some(self.link),
        }
    }
}

/// Everything a store needs to create a project record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub academic_year: String,
    pub grade: GradeLevel,
    pub room: Room,
    pub submission: ProjectSubmission,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: self
                .title
                .as_deref()
                .map(|value| required("title", value))
                .transpose()?,
            description: self
                .description
                .map(|value| optional_text(value.as_deref())),
            link: self.link.map(|value| optional_text(value.as_deref())),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub current_academic_year: Option<String>,
}

impl SystemSettings {
    pub fn apply_patch(&mut self, patch: &SettingsPatch) {
        if let Some(year) = &patch.current_academic_year {
            self.current_academic_year = year.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub current_academic_year: Option<Option<String>>,
}

impl SettingsPatch {
    pub fn validate(self) -> Result<Self, ValidationError> {
        let current_academic_year = match self.current_academic_year {
            Some(Some(year)) => Some(Some(required("current_academic_year", &year)?)),
            other => other,
        };
        Ok(Self {
            current_academic_year,
        })
    }
}

/// Strip separators a student might type and require a 9 or 10 digit number.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if digits.is_empty() {
        return Err(ValidationError::MissingField { field: "phone" });
    }
    if !(9..=10).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(digits)
}

fn validate_prefix(raw: &str) -> Result<String, ValidationError> {
    let prefix = required("prefix", raw)?;
    if NAME_PREFIXES.contains(&prefix.as_str()) {
        Ok(prefix)
    } else {
        Err(ValidationError::UnknownPrefix(prefix))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
