//! Domain records for the three stores. Every constructor and merge helper
//! here funnels caller input through the width limits in [`crate::field`], so
//! a record that exists in memory can always be written without clipping.
//! Derived values (the full name, the letter grade) are computed from their
//! sources rather than stored independently.

use std::fmt;
use std::str::FromStr;

use crate::db::{StoreError, StoreResult};
use crate::field::{self, keep_or_replace};
use crate::grade::Grade;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// One admission record from the text store. `(student_id, department)` is
/// the lookup key, but nothing stops two blocks from sharing it.
pub struct StudentRecord {
    /// First token of the `Student Name` line.
    pub first_name: String,
    /// Second token of the `Student Name` line.
    pub last_name: String,
    /// Father's full name, free text.
    pub father_name: String,
    /// Mother's full name, free text.
    pub mother_name: String,
    /// Registration number; half of the lookup key.
    pub student_id: String,
    /// Department code such as `CSE`; the other half of the lookup key.
    pub department: String,
    /// Admission batch.
    pub intake: String,
    /// Section within the intake.
    pub section: String,
    /// Current mailing address.
    pub present_address: String,
    /// Home address.
    pub permanent_address: String,
    /// Blood group such as `O+`.
    pub blood_group: String,
    /// Primary phone number.
    pub mobile: String,
    /// Secondary phone number.
    pub backup_mobile: String,
    /// Contact email, free text.
    pub email: String,
}

impl StudentRecord {
    /// Validate a freshly entered record. ID, both name parts and the
    /// department are mandatory; everything else may be blank.
    pub fn validated(self) -> StoreResult<Self> {
        Ok(Self {
            first_name: field::FIRST_NAME.require(&self.first_name)?,
            last_name: field::LAST_NAME.require(&self.last_name)?,
            father_name: field::FATHER_NAME.accept(&self.father_name)?,
            mother_name: field::MOTHER_NAME.accept(&self.mother_name)?,
            student_id: field::STUDENT_ID.require(&self.student_id)?,
            department: field::DEPARTMENT.require(&self.department)?,
            intake: field::INTAKE.accept(&self.intake)?,
            section: field::SECTION.accept(&self.section)?,
            present_address: field::PRESENT_ADDRESS.accept(&self.present_address)?,
            permanent_address: field::PERMANENT_ADDRESS.accept(&self.permanent_address)?,
            blood_group: field::BLOOD_GROUP.accept(&self.blood_group)?,
            mobile: field::MOBILE.accept(&self.mobile)?,
            backup_mobile: field::BACKUP_MOBILE.accept(&self.backup_mobile)?,
            email: field::EMAIL.accept(&self.email)?,
        })
    }

    /// `First Last`, or an empty string when no name was parsed.
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }

    /// Apply an update on top of this record. Blank fields in `update` keep
    /// the current value; the ID and department never change.
    pub fn merged(&self, update: &StudentUpdate) -> StoreResult<Self> {
        let update = update.validated()?;
        Ok(Self {
            first_name: keep_or_replace(&self.first_name, &update.first_name),
            last_name: keep_or_replace(&self.last_name, &update.last_name),
            father_name: keep_or_replace(&self.father_name, &update.father_name),
            mother_name: keep_or_replace(&self.mother_name, &update.mother_name),
            student_id: self.student_id.clone(),
            department: self.department.clone(),
            intake: keep_or_replace(&self.intake, &update.intake),
            section: keep_or_replace(&self.section, &update.section),
            present_address: keep_or_replace(&self.present_address, &update.present_address),
            permanent_address: keep_or_replace(
                &self.permanent_address,
                &update.permanent_address,
            ),
            blood_group: keep_or_replace(&self.blood_group, &update.blood_group),
            mobile: keep_or_replace(&self.mobile, &update.mobile),
            backup_mobile: keep_or_replace(&self.backup_mobile, &update.backup_mobile),
            email: keep_or_replace(&self.email, &update.email),
        })
    }
}

impl fmt::Display for StudentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.full_name())?;
        writeln!(f, "Father's Name: {}", self.father_name)?;
        writeln!(f, "Mother's Name: {}", self.mother_name)?;
        writeln!(f, "Student ID: {}", self.student_id)?;
        writeln!(f, "Department: {}", self.department)?;
        writeln!(f, "Intake: {}", self.intake)?;
        writeln!(f, "Section: {}", self.section)?;
        writeln!(f, "Present Address: {}", self.present_address)?;
        writeln!(f, "Permanent Address: {}", self.permanent_address)?;
        writeln!(f, "Blood Group: {}", self.blood_group)?;
        writeln!(f, "Mobile Number: {}", self.mobile)?;
        writeln!(f, "Backup Mobile: {}", self.backup_mobile)?;
        write!(f, "Email: {}", self.email)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Replacement values for a student update. Leave a field empty to keep it.
pub struct StudentUpdate {
    pub first_name: String,
    pub last_name: String,
    pub father_name: String,
    pub mother_name: String,
    pub intake: String,
    pub section: String,
    pub present_address: String,
    pub permanent_address: String,
    pub blood_group: String,
    pub mobile: String,
    pub backup_mobile: String,
    pub email: String,
}

impl StudentUpdate {
    pub(crate) fn validated(&self) -> StoreResult<Self> {
        Ok(Self {
            first_name: field::FIRST_NAME.accept(&self.first_name)?,
            last_name: field::LAST_NAME.accept(&self.last_name)?,
            father_name: field::FATHER_NAME.accept(&self.father_name)?,
            mother_name: field::MOTHER_NAME.accept(&self.mother_name)?,
            intake: field::INTAKE.accept(&self.intake)?,
            section: field::SECTION.accept(&self.section)?,
            present_address: field::PRESENT_ADDRESS.accept(&self.present_address)?,
            permanent_address: field::PERMANENT_ADDRESS.accept(&self.permanent_address)?,
            blood_group: field::BLOOD_GROUP.accept(&self.blood_group)?,
            mobile: field::MOBILE.accept(&self.mobile)?,
            backup_mobile: field::BACKUP_MOBILE.accept(&self.backup_mobile)?,
            email: field::EMAIL.accept(&self.email)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Kind of a schedule entry. The first three are routine kinds and carry a
/// [`RoutineInfo`]; the others carry free-text details. Types written by
/// other tools survive as `Unrecognized`.
pub enum ScheduleKind {
    ClassRoutine,
    MidExamRoutine,
    FinalExamRoutine,
    ResultPublicationDate,
    OtherEvent,
    Unrecognized(String),
}

impl ScheduleKind {
    /// Order in which listings present the known kinds.
    pub const DISPLAY_ORDER: [ScheduleKind; 5] = [
        ScheduleKind::ClassRoutine,
        ScheduleKind::MidExamRoutine,
        ScheduleKind::FinalExamRoutine,
        ScheduleKind::ResultPublicationDate,
        ScheduleKind::OtherEvent,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ScheduleKind::ClassRoutine => "Class Routine",
            ScheduleKind::MidExamRoutine => "Mid Exam Routine",
            ScheduleKind::FinalExamRoutine => "Final Exam Routine",
            ScheduleKind::ResultPublicationDate => "Result Publication Date",
            ScheduleKind::OtherEvent => "Other Event",
            ScheduleKind::Unrecognized(raw) => raw,
        }
    }

    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            ScheduleKind::ClassRoutine
                | ScheduleKind::MidExamRoutine
                | ScheduleKind::FinalExamRoutine
        )
    }

    /// Exact decoding of a stored type string.
    pub(crate) fn from_stored(raw: &str) -> Self {
        Self::DISPLAY_ORDER
            .iter()
            .find(|kind| kind.as_str() == raw)
            .cloned()
            .unwrap_or_else(|| ScheduleKind::Unrecognized(raw.to_string()))
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = StoreError;

    /// Parse user input, ignoring case and surrounding whitespace. Only the
    /// five canonical kinds are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::DISPLAY_ORDER
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| {
                StoreError::invalid(
                    field::SCHEDULE_TYPE.name,
                    format!("unknown schedule type {wanted:?}"),
                )
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// When and where a routine happens.
pub struct RoutineInfo {
    pub day: String,
    pub date: String,
    pub time: String,
    pub room: String,
    pub faculty: String,
}

impl RoutineInfo {
    fn validated(&self) -> StoreResult<Self> {
        Ok(Self {
            day: field::DAY.accept(&self.day)?,
            date: field::DATE.accept(&self.date)?,
            time: field::TIME.accept(&self.time)?,
            room: field::ROOM.accept(&self.room)?,
            faculty: field::FACULTY.accept(&self.faculty)?,
        })
    }

    fn merged(&self, update: &RoutineInfo) -> Self {
        Self {
            day: keep_or_replace(&self.day, &update.day),
            date: keep_or_replace(&self.date, &update.date),
            time: keep_or_replace(&self.time, &update.time),
            room: keep_or_replace(&self.room, &update.room),
            faculty: keep_or_replace(&self.faculty, &update.faculty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One row of the academic calendar for an intake/section.
pub struct AcademicScheduleEntry {
    pub intake: String,
    pub section: String,
    pub kind: ScheduleKind,
    /// Populated for routine kinds only.
    pub routine: RoutineInfo,
    /// Populated for non-routine kinds only.
    pub details: String,
}

impl AcademicScheduleEntry {
    /// Build a validated entry. Routine kinds need a day, time and room and
    /// drop `details`; other kinds need details and drop the routine.
    pub fn new(
        intake: &str,
        section: &str,
        kind: ScheduleKind,
        routine: RoutineInfo,
        details: &str,
    ) -> StoreResult<Self> {
        let intake = field::SCHEDULE_INTAKE.require(intake)?;
        let section = field::SCHEDULE_SECTION.require(section)?;
        field::SCHEDULE_TYPE.require(kind.as_str())?;

        if kind.is_routine() {
            let routine = routine.validated()?;
            for (value, spec) in [
                (&routine.day, field::DAY),
                (&routine.time, field::TIME),
                (&routine.room, field::ROOM),
            ] {
                if value.is_empty() {
                    return Err(StoreError::invalid(spec.name, "is required for routines"));
                }
            }
            Ok(Self {
                intake,
                section,
                kind,
                routine,
                details: String::new(),
            })
        } else {
            Ok(Self {
                intake,
                section,
                kind,
                routine: RoutineInfo::default(),
                details: field::DETAILS.require(details)?,
            })
        }
    }

    /// Merge the fields relevant to this entry's kind; the key never changes.
    pub fn merged(&self, update: &ScheduleUpdate) -> StoreResult<Self> {
        let mut next = self.clone();
        if self.kind.is_routine() {
            next.routine = self.routine.merged(&update.routine.validated()?);
        } else {
            next.details = keep_or_replace(&self.details, &field::DETAILS.accept(&update.details)?);
        }
        Ok(next)
    }
}

impl fmt::Display for AcademicScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_routine() {
            writeln!(f, "Day: {}", self.routine.day)?;
            writeln!(f, "Date: {}", self.routine.date)?;
            writeln!(f, "Time: {}", self.routine.time)?;
            writeln!(f, "Room: {}", self.routine.room)?;
            write!(f, "Faculty: {}", self.routine.faculty)
        } else {
            write!(f, "Details: {}", self.details)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Replacement values for a schedule update. Only the half that matches the
/// entry's kind is consulted.
pub struct ScheduleUpdate {
    pub routine: RoutineInfo,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq)]
/// A published result. The grade is always derived from the GPA.
pub struct ResultEntry {
    /// Registration number of the student the result belongs to.
    pub student_id: String,
    /// Student name as printed on the result sheet.
    pub name: String,
    /// Admission batch; part of the lookup key.
    pub intake: String,
    /// Section within the intake; part of the lookup key.
    pub section: String,
    /// GPA on the 4.0 scale, always within `[0.0, 4.0]` for new entries.
    gpa: f32,
    /// Letter grade derived from `gpa`.
    grade: Grade,
}

impl ResultEntry {
    /// Build a validated entry. Every text field is required and the GPA
    /// must lie in `[0.0, 4.0]`.
    pub fn new(
        student_id: &str,
        name: &str,
        intake: &str,
        section: &str,
        gpa: f32,
    ) -> StoreResult<Self> {
        let gpa = check_gpa(gpa)?;
        Ok(Self {
            student_id: field::RESULT_STUDENT_ID.require(student_id)?,
            name: field::RESULT_NAME.require(name)?,
            intake: field::RESULT_INTAKE.require(intake)?,
            section: field::RESULT_SECTION.require(section)?,
            gpa,
            grade: Grade::from_gpa(gpa),
        })
    }

    /// Rebuild an entry from stored values without input validation; the
    /// grade is recomputed from the stored GPA.
    pub(crate) fn from_stored(
        student_id: String,
        name: String,
        intake: String,
        section: String,
        gpa: f32,
    ) -> Self {
        Self {
            student_id,
            name,
            intake,
            section,
            gpa,
            grade: Grade::from_gpa(gpa),
        }
    }

    /// Stored GPA.
    pub fn gpa(&self) -> f32 {
        self.gpa
    }

    /// Letter grade derived from [`ResultEntry::gpa`].
    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Apply a name or GPA change; the key fields never change and the grade
    /// is recomputed.
    pub fn merged(&self, update: &ResultUpdate) -> StoreResult<Self> {
        let gpa = match update.gpa {
            Some(gpa) => check_gpa(gpa)?,
            None => self.gpa,
        };
        Ok(Self {
            student_id: self.student_id.clone(),
            name: keep_or_replace(&self.name, &field::RESULT_NAME.accept(&update.name)?),
            intake: self.intake.clone(),
            section: self.section.clone(),
            gpa,
            grade: Grade::from_gpa(gpa),
        })
    }
}

impl fmt::Display for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<30} {:<10} {:<10} {:>4.2} {}",
            self.student_id, self.name, self.intake, self.section, self.gpa, self.grade
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Replacement values for a result update.
pub struct ResultUpdate {
    pub name: String,
    pub gpa: Option<f32>,
}

fn check_gpa(gpa: f32) -> StoreResult<f32> {
    if gpa.is_finite() && (0.0..=4.0).contains(&gpa) {
        Ok(gpa)
    } else {
        Err(StoreError::invalid("GPA", format!("{gpa} is outside 0.0-4.0")))
    }
}
