use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::domain::ValidationError;

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Which end of an application window a parsed value bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEdge {
    Open,
    Close,
}

impl WindowEdge {
    /// Wall-clock time a bare date stands for: the first second of the day when opening, the
    /// last one when closing.
    fn bare_date_hms(self) -> (u32, u32, u32) {
        match self {
            WindowEdge::Open => (0, 0, 0),
            WindowEdge::Close => (23, 59, 59),
        }
    }
}

/// Parse an admin-supplied instant.
///
/// RFC 3339 values carry their own offset. Form values such as `2025-06-01T08:00` (the shape a
/// `datetime-local` input produces) and bare dates are read as wall-clock time in `offset`. A
/// bare date covers the whole day, so its time depends on `edge`.
pub fn parse_instant(
    raw: &str,
    offset: FixedOffset,
    edge: WindowEdge,
) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidTimestamp(raw.to_string()));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            let (hour, minute, second) = edge.bare_date_hms();
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(hour, minute, second))
        })
        .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))
}

/// Parse `+07:00`, `-0530`, `Z` or `UTC` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Calendar date of `instant` as seen in `offset`.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}
