use std::io::Read;

use chrono::FixedOffset;
use serde::Serialize;

use super::domain::{
    ApplicationTrack, GradeLevel, Room, Student, StudentRegistration, ValidationError,
};
use super::time::local_date;

const BOM: &str = "\u{feff}";
const ROSTER_COLUMNS: usize = 8;

/// Header written at the top of every applicant export.
pub const EXPORT_HEADER: [&str; 7] = [
    "studentId",
    "prefix",
    "firstName",
    "lastName",
    "grade",
    "room",
    "appliedDate",
];

/// One roster line that could not be turned into a registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterRowError {
    #[error("unreadable row: {0}")]
    Malformed(String),
    #[error("expected {expected} columns, found {found}")]
    MissingColumns { expected: usize, found: usize },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A parsed roster line, numbered from 1 as the file shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub line: u64,
    pub registration: Result<StudentRegistration, RosterRowError>,
}

/// Per-row failure reported back to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportSummary {
    pub fn record_created(&mut self) {
        self.created += 1;
    }

    pub fn record_failure(&mut self, line: u64, message: impl Into<String>) {
        self.failed += 1;
        self.failures.push(ImportFailure {
            line,
            message: message.into(),
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV buffer: {0}")]
    Flush(String),
}

/// Parse a header-less roster: `studentId,grade,room,prefix,firstName,lastName,nickname,phone`.
///
/// Rows are independent; a bad row never stops the rest from being read. Blank lines and a
/// leading byte-order mark are skipped. The nickname column is not imported.
pub fn parse_roster<R: Read>(reader: R) -> Vec<RosterRow> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let fallback_line = index as u64 + 1;
        let row = match record {
            Ok(record) => {
                if record.iter().all(|field| field.trim_start_matches(BOM).is_empty()) {
                    continue;
                }
                RosterRow {
                    line: record
                        .position()
                        .map_or(fallback_line, |position| position.line()),
                    registration: registration_from_record(&record),
                }
            }
            Err(err) => RosterRow {
                line: err
                    .position()
                    .map_or(fallback_line, |position| position.line()),
                registration: Err(RosterRowError::Malformed(err.to_string())),
            },
        };
        rows.push(row);
    }

    rows
}

fn registration_from_record(
    record: &csv::StringRecord,
) -> Result<StudentRegistration, RosterRowError> {
    if record.len() < ROSTER_COLUMNS {
        return Err(RosterRowError::MissingColumns {
            expected: ROSTER_COLUMNS,
            found: record.len(),
        });
    }

    let field = |index: usize| record.get(index).unwrap_or_default();
    let student_id = field(0).trim_start_matches(BOM).trim();

    let registration = StudentRegistration {
        student_id: student_id.to_string(),
        grade: field(1).parse::<GradeLevel>()?,
        room: field(2).parse::<Room>()?,
        prefix: field(3).to_string(),
        first_name: field(4).to_string(),
        last_name: field(5).to_string(),
        nickname: None,
        phone: field(7).to_string(),
    };

    Ok(registration.validate()?)
}

/// Render applicants as a spreadsheet-friendly CSV: UTF-8 with a byte-order mark, the fixed
/// header, then one row per student in the order given.
pub fn write_applicants_csv(
    students: &[Student],
    track: ApplicationTrack,
    offset: FixedOffset,
) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::from(BOM.as_bytes());
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(EXPORT_HEADER)?;

        for student in students {
            let applied = student
                .applied_at(track)
                .map(|instant| local_date(instant, offset).format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let grade = student.grade.label();
            let room = student.room.to_string();
            writer.write_record([
                student.student_id.as_str(),
                student.prefix.as_str(),
                student.first_name.as_str(),
                student.last_name.as_str(),
                grade,
                room.as_str(),
                applied.as_str(),
            ])?;
        }

        writer
            .flush()
            .map_err(|err| ExportError::Flush(err.to_string()))?;
    }

    Ok(buffer)
}
