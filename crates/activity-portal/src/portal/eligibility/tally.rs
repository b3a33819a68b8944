use std::collections::BTreeMap;

use serde::Serialize;

use super::super::domain::{ApplicationTrack, GradeLevel, Room, Student};

/// Quota bucket: one classroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoomKey {
    pub grade: GradeLevel,
    pub room: Room,
}

impl RoomKey {
    pub fn of(student: &Student) -> Self {
        Self {
            grade: student.grade,
            room: student.room,
        }
    }
}

/// Count flagged students per classroom, ordered by grade then room.
pub fn room_tally<'a, I>(students: I, track: ApplicationTrack) -> BTreeMap<RoomKey, usize>
where
    I: IntoIterator<Item = &'a Student>,
{
    let mut tally = BTreeMap::new();
    for student in students {
        if student.has_applied(track) {
            *tally.entry(RoomKey::of(student)).or_insert(0) += 1;
        }
    }
    tally
}

/// Flagged students in a single classroom.
pub fn room_count<'a, I>(students: I, track: ApplicationTrack, key: RoomKey) -> usize
where
    I: IntoIterator<Item = &'a Student>,
{
    students
        .into_iter()
        .filter(|student| student.has_applied(track) && RoomKey::of(student) == key)
        .count()
}
