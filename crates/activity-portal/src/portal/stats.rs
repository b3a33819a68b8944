use std::fmt::Write as _;

use serde::Serialize;

use super::domain::{ApplicationTrack, GradeLevel, Room, Student};
use super::eligibility::{room_tally, RoomKey};

/// Headline numbers shown on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardTotals {
    pub total_students: usize,
    pub core_leaders: usize,
    pub committee_members: usize,
}

pub fn dashboard_totals(students: &[Student]) -> DashboardTotals {
    DashboardTotals {
        total_students: students.len(),
        core_leaders: students
            .iter()
            .filter(|student| student.is_core_leader)
            .count(),
        committee_members: students
            .iter()
            .filter(|student| student.is_committee)
            .count(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomCell {
    pub room: Room,
    pub count: usize,
    /// Seats still open against the quota; `None` when no quota is set.
    pub shortfall: Option<usize>,
    pub filled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeRoomRow {
    pub grade: GradeLevel,
    pub rooms: Vec<RoomCell>,
    pub total: usize,
}

/// Grade × room matrix for one track. Every grade and every room appears, including empty ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatistics {
    pub track: ApplicationTrack,
    pub quota_per_room: Option<u32>,
    pub grades: Vec<GradeRoomRow>,
    pub total: usize,
}

pub fn room_statistics(
    students: &[Student],
    track: ApplicationTrack,
    quota_per_room: Option<u32>,
) -> RoomStatistics {
    let tally = room_tally(students, track);
    let quota = quota_per_room.map(|quota| quota as usize);

    let grades: Vec<GradeRoomRow> = GradeLevel::ordered()
        .into_iter()
        .map(|grade| {
            let rooms: Vec<RoomCell> = Room::all()
                .map(|room| {
                    let count = tally.get(&RoomKey { grade, room }).copied().unwrap_or(0);
                    RoomCell {
                        room,
                        count,
                        shortfall: quota.map(|quota| quota.saturating_sub(count)),
                        filled: quota.is_some_and(|quota| count >= quota),
                    }
                })
                .collect();
            let total = rooms.iter().map(|cell| cell.count).sum();
            GradeRoomRow {
                grade,
                rooms,
                total,
            }
        })
        .collect();

    let total = grades.iter().map(|row| row.total).sum();
    RoomStatistics {
        track,
        quota_per_room,
        grades,
        total,
    }
}

impl RoomStatistics {
    /// Plain-text table for terminals: one line per grade, one column per room.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let quota = self
            .quota_per_room
            .map_or_else(|| "none".to_string(), |quota| quota.to_string());
        let _ = writeln!(
            out,
            "{} applicants (quota per room: {quota})",
            self.track.label()
        );

        let _ = write!(out, "{:<6}", "grade");
        for room in Room::all() {
            let _ = write!(out, "{:>5}", room);
        }
        let _ = writeln!(out, "{:>7}", "total");

        for row in &self.grades {
            let _ = write!(out, "{:<6}", row.grade.label());
            for cell in &row.rooms {
                let marker = if cell.filled { "*" } else { "" };
                let _ = write!(out, "{:>5}", format!("{}{marker}", cell.count));
            }
            let _ = writeln!(out, "{:>7}", row.total);
        }

        let _ = writeln!(out, "total {}", self.total);
        out
    }
}
