use std::path::{Path, PathBuf};

use log::info;

use crate::field;
use crate::models::{AcademicScheduleEntry, RoutineInfo, ScheduleKind, ScheduleUpdate};

use super::error::StoreResult;
use super::layout::Slot;
use super::record_file::{FixedRecord, Located, RecordFile};
use super::rewrite::ReplaceMode;

/// Most entries a single listing returns; later matches are dropped.
pub const LIST_CAPACITY: usize = 200;

const INTAKE: Slot = Slot::for_field(field::SCHEDULE_INTAKE, 0);
const SECTION: Slot = Slot::for_field(field::SCHEDULE_SECTION, INTAKE.end());
const KIND: Slot = Slot::for_field(field::SCHEDULE_TYPE, SECTION.end());
const DAY: Slot = Slot::for_field(field::DAY, KIND.end());
const DATE: Slot = Slot::for_field(field::DATE, DAY.end());
const TIME: Slot = Slot::for_field(field::TIME, DATE.end());
const ROOM: Slot = Slot::for_field(field::ROOM, TIME.end());
const FACULTY: Slot = Slot::for_field(field::FACULTY, ROOM.end());
const DETAILS: Slot = Slot::for_field(field::DETAILS, FACULTY.end());

impl FixedRecord for AcademicScheduleEntry {
    const SIZE: usize = DETAILS.end();

    fn encode(&self, buf: &mut [u8]) {
        INTAKE.put(buf, &self.intake);
        SECTION.put(buf, &self.section);
        KIND.put(buf, self.kind.as_str());
        DAY.put(buf, &self.routine.day);
        DATE.put(buf, &self.routine.date);
        TIME.put(buf, &self.routine.time);
        ROOM.put(buf, &self.routine.room);
        FACULTY.put(buf, &self.routine.faculty);
        DETAILS.put(buf, &self.details);
    }

    fn decode(buf: &[u8]) -> StoreResult<Self> {
        Ok(Self {
            intake: INTAKE.get(buf)?,
            section: SECTION.get(buf)?,
            kind: ScheduleKind::from_stored(&KIND.get(buf)?),
            routine: RoutineInfo {
                day: DAY.get(buf)?,
                date: DATE.get(buf)?,
                time: TIME.get(buf)?,
                room: ROOM.get(buf)?,
                faculty: FACULTY.get(buf)?,
            },
            details: DETAILS.get(buf)?,
        })
    }
}

/// Academic calendar entries keyed by `(intake, section, kind)`.
#[derive(Debug)]
pub struct ScheduleStore {
    records: RecordFile<AcademicScheduleEntry>,
}

impl ScheduleStore {
    /// Open the schedule file at `path`, creating it when missing.
    pub fn open(path: impl Into<PathBuf>, mode: ReplaceMode) -> StoreResult<Self> {
        Ok(Self {
            records: RecordFile::open(path, mode)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.records.path()
    }

    /// Append a validated entry and return its offset.
    pub fn add(&mut self, entry: &AcademicScheduleEntry) -> StoreResult<u64> {
        let offset = self.records.append(entry)?;
        info!(
            "added {} for intake {} section {}",
            entry.kind, entry.intake, entry.section
        );
        Ok(offset)
    }

    /// Entries for one intake/section in storage order, at most
    /// [`LIST_CAPACITY`] of them.
    pub fn list(&mut self, intake: &str, section: &str) -> StoreResult<Vec<AcademicScheduleEntry>> {
        let intake = field::key("intake", intake)?;
        let section = field::key("section", section)?;
        self.records.collect(
            |entry| entry.intake == intake && entry.section == section,
            Some(LIST_CAPACITY),
        )
    }

    /// First entry with this key, together with its offset.
    pub fn find(
        &mut self,
        intake: &str,
        section: &str,
        kind: &ScheduleKind,
    ) -> StoreResult<Option<Located<AcademicScheduleEntry>>> {
        let matches = key_matcher(intake, section, kind)?;
        self.records.find_first(matches)
    }

    /// Merge `update` into the first entry with this key. Later duplicates
    /// are left alone.
    pub fn update(
        &mut self,
        intake: &str,
        section: &str,
        kind: &ScheduleKind,
        update: &ScheduleUpdate,
    ) -> StoreResult<Option<AcademicScheduleEntry>> {
        let matches = key_matcher(intake, section, kind)?;
        self.records
            .update_first(matches, |current| current.merged(update))
    }

    /// Remove every entry with this key.
    pub fn delete(&mut self, intake: &str, section: &str, kind: &ScheduleKind) -> StoreResult<usize> {
        let matches = key_matcher(intake, section, kind)?;
        self.records.delete_all(matches)
    }
}

fn key_matcher(
    intake: &str,
    section: &str,
    kind: &ScheduleKind,
) -> StoreResult<impl Fn(&AcademicScheduleEntry) -> bool> {
    let intake = field::key("intake", intake)?;
    let section = field::key("section", section)?;
    let kind = kind.clone();
    Ok(move |entry: &AcademicScheduleEntry| {
        entry.intake == intake && entry.section == section && entry.kind == kind
    })
}

/// Group entries for display: the known kinds in their fixed order, then any
/// other kinds in the order they were first seen. Empty groups are omitted.
pub fn group_by_kind(
    entries: Vec<AcademicScheduleEntry>,
) -> Vec<(ScheduleKind, Vec<AcademicScheduleEntry>)> {
    let mut groups: Vec<(ScheduleKind, Vec<AcademicScheduleEntry>)> = ScheduleKind::DISPLAY_ORDER
        .iter()
        .map(|kind| (kind.clone(), Vec::new()))
        .collect();
    for entry in entries {
        match groups.iter_mut().find(|(kind, _)| *kind == entry.kind) {
            Some((_, members)) => members.push(entry),
            None => groups.push((entry.kind.clone(), vec![entry])),
        }
    }
    groups.retain(|(_, members)| !members.is_empty());
    groups
}
