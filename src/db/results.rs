use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::field;
use crate::grade::Grade;
use crate::models::{ResultEntry, ResultUpdate};

use super::error::{StoreError, StoreResult};
use super::layout::Slot;
use super::record_file::{FixedRecord, Located, RecordFile};
use super::rewrite::ReplaceMode;

const STUDENT_ID: Slot = Slot::for_field(field::RESULT_STUDENT_ID, 0);
const NAME: Slot = Slot::for_field(field::RESULT_NAME, STUDENT_ID.end());
const INTAKE: Slot = Slot::for_field(field::RESULT_INTAKE, NAME.end());
const SECTION: Slot = Slot::for_field(field::RESULT_SECTION, INTAKE.end());
const GPA_AT: usize = SECTION.end();
const GRADE: Slot = Slot::for_field(field::GRADE, GPA_AT + 4);

impl FixedRecord for ResultEntry {
    // Three bytes of alignment padding follow the grade.
    const SIZE: usize = GRADE.end() + 3;

    fn encode(&self, buf: &mut [u8]) {
        STUDENT_ID.put(buf, &self.student_id);
        NAME.put(buf, &self.name);
        INTAKE.put(buf, &self.intake);
        SECTION.put(buf, &self.section);
        buf[GPA_AT..GPA_AT + 4].copy_from_slice(&self.gpa().to_le_bytes());
        GRADE.put(buf, self.grade().as_str());
        buf[GRADE.end()..].fill(0);
    }

    fn decode(buf: &[u8]) -> StoreResult<Self> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[GPA_AT..GPA_AT + 4]);
        let gpa = f32::from_le_bytes(raw);
        if gpa.is_nan() {
            return Err(StoreError::Corrupt("GPA is not a number".into()));
        }
        let entry = ResultEntry::from_stored(
            STUDENT_ID.get(buf)?,
            NAME.get(buf)?,
            INTAKE.get(buf)?,
            SECTION.get(buf)?,
            gpa,
        );
        match GRADE.get(buf)?.parse::<Grade>() {
            Ok(stored) if stored == entry.grade() => {}
            Ok(stored) => debug!(
                "result for {} stored grade {stored}, recomputed {}",
                entry.student_id,
                entry.grade()
            ),
            Err(err) => debug!("result for {}: {err}", entry.student_id),
        }
        Ok(entry)
    }
}

/// Published results keyed by `(student_id, intake, section)`.
#[derive(Debug)]
pub struct ResultStore {
    records: RecordFile<ResultEntry>,
}

impl ResultStore {
    /// Open the result file at `path`, creating it when missing.
    pub fn open(path: impl Into<PathBuf>, mode: ReplaceMode) -> StoreResult<Self> {
        Ok(Self {
            records: RecordFile::open(path, mode)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.records.path()
    }

    /// Append a validated result and return its offset.
    pub fn add(&mut self, entry: &ResultEntry) -> StoreResult<u64> {
        let offset = self.records.append(entry)?;
        info!(
            "added result {} ({}) for {} in intake {} section {}",
            entry.gpa(),
            entry.grade(),
            entry.student_id,
            entry.intake,
            entry.section
        );
        Ok(offset)
    }

    /// First result for `(student_id, intake, section)` with its offset.
    pub fn find(
        &mut self,
        student_id: &str,
        intake: &str,
        section: &str,
    ) -> StoreResult<Option<Located<ResultEntry>>> {
        let matches = key_matcher(student_id, intake, section)?;
        self.records.find_first(matches)
    }

    /// Every result for one intake/section in insertion order.
    pub fn list(&mut self, intake: &str, section: &str) -> StoreResult<Vec<ResultEntry>> {
        let intake = field::key("intake", intake)?;
        let section = field::key("section", section)?;
        self.records.collect(
            |entry| entry.intake == intake && entry.section == section,
            None,
        )
    }

    /// Rewrite the first matching result in place with a recomputed grade.
    pub fn update(
        &mut self,
        student_id: &str,
        intake: &str,
        section: &str,
        update: &ResultUpdate,
    ) -> StoreResult<Option<ResultEntry>> {
        let matches = key_matcher(student_id, intake, section)?;
        self.records
            .update_first(matches, |current| current.merged(update))
    }

    /// Remove every result with this key and return how many went.
    pub fn delete(&mut self, student_id: &str, intake: &str, section: &str) -> StoreResult<usize> {
        let matches = key_matcher(student_id, intake, section)?;
        self.records.delete_all(matches)
    }
}

fn key_matcher(
    student_id: &str,
    intake: &str,
    section: &str,
) -> StoreResult<impl Fn(&ResultEntry) -> bool> {
    let student_id = field::key("student ID", student_id)?;
    let intake = field::key("intake", intake)?;
    let section = field::key("section", section)?;
    Ok(move |entry: &ResultEntry| {
        entry.student_id == student_id && entry.intake == intake && entry.section == section
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn result(id: &str, gpa: f32) -> ResultEntry {
        ResultEntry::new(id, "Rahim Uddin", "50", "1", gpa).unwrap()
    }

    fn open(dir: &Path) -> ResultStore {
        ResultStore::open(dir.join("results.dat"), ReplaceMode::default()).unwrap()
    }

    #[test]
    fn layout_matches_the_fixed_offsets() {
        assert_eq!(ResultEntry::SIZE, 172);
        let bytes = result("S1", 3.5).to_bytes();
        assert_eq!(&bytes[160..164], &3.5f32.to_le_bytes());
        assert_eq!(&bytes[164..167], b"A-\0");
        assert_eq!(&bytes[169..], &[0, 0, 0]);
        assert_eq!(ResultEntry::decode(&bytes).unwrap(), result("S1", 3.5));
    }

    #[test]
    fn stale_stored_grade_is_recomputed() {
        let mut bytes = result("S1", 3.0).to_bytes();
        bytes[164..169].copy_from_slice(b"F\0\0\0\0");
        assert_eq!(ResultEntry::decode(&bytes).unwrap().grade(), Grade::B);
        bytes[164..169].copy_from_slice(b"Z+\0\0\0");
        assert_eq!(ResultEntry::decode(&bytes).unwrap().grade(), Grade::B);
    }

    #[test]
    fn nan_gpa_is_corrupt() {
        let mut bytes = result("S1", 3.0).to_bytes();
        bytes[160..164].copy_from_slice(&f32::NAN.to_le_bytes());
        assert!(matches!(
            ResultEntry::decode(&bytes),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn results_list_in_insertion_order_with_grades() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(&result("S2", 2.0)).unwrap();
        store.add(&result("S1", 3.6)).unwrap();
        store
            .add(&ResultEntry::new("S3", "Other", "51", "1", 4.0).unwrap())
            .unwrap();

        let listed = store.list("50", "1").unwrap();
        let summary: Vec<(&str, Grade)> = listed
            .iter()
            .map(|entry| (entry.student_id.as_str(), entry.grade()))
            .collect();
        assert_eq!(summary, vec![("S2", Grade::D), ("S1", Grade::AMinus)]);
    }

    #[test]
    fn update_regrades_first_match_and_delete_removes_all() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(&result("S1", 2.0)).unwrap();
        store.add(&result("S1", 2.0)).unwrap();

        let update = ResultUpdate {
            gpa: Some(3.8),
            ..Default::default()
        };
        let updated = store.update("S1", "50", "1", &update).unwrap().unwrap();
        assert_eq!(updated.grade(), Grade::A);

        let grades: Vec<Grade> = store
            .list("50", "1")
            .unwrap()
            .iter()
            .map(ResultEntry::grade)
            .collect();
        assert_eq!(grades, vec![Grade::A, Grade::D]);

        assert_eq!(store.delete("S1", "50", "1").unwrap(), 2);
        assert!(store.find("S1", "50", "1").unwrap().is_none());
    }

    #[test]
    fn invalid_update_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(&result("S1", 2.0)).unwrap();
        let before = fs::read(store.path()).unwrap();
        let update = ResultUpdate {
            gpa: Some(7.0),
            ..Default::default()
        };
        assert!(store.update("S1", "50", "1", &update).is_err());
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(store.delete("S9", "50", "1").unwrap(), 0);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn find_reports_the_offset() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(&result("S1", 2.0)).unwrap();
        store.add(&result("S2", 2.0)).unwrap();
        let located = store.find("S2", "50", "1").unwrap().unwrap();
        assert_eq!(located.offset, ResultEntry::SIZE as u64);
        assert!(store.find("", "50", "1").is_err());
    }
}
