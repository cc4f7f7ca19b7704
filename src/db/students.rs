use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::field;
use crate::models::{StudentRecord, StudentUpdate};

use super::error::{StoreError, StoreResult};
use super::handle::{Access, StoreFile};
use super::rewrite::ReplaceMode;
use super::student_text::{decode_strict, encode_block, BlockReader, RawBlock};

/// Filters over parsed student records. Build one with the constructors
/// below (which reject empty keys) and combine them with [`StudentQuery::and`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentQuery {
    Department(String),
    IdInDepartment { student_id: String, department: String },
    NameInDepartment { fragment: String, department: String },
    Cohort {
        department: String,
        intake: String,
        section: String,
    },
    All(Vec<StudentQuery>),
}

impl StudentQuery {
    pub fn department(department: &str) -> StoreResult<Self> {
        Ok(Self::Department(field::key("department", department)?))
    }

    pub fn id_in_department(student_id: &str, department: &str) -> StoreResult<Self> {
        Ok(Self::IdInDepartment {
            student_id: field::key("student ID", student_id)?,
            department: field::key("department", department)?,
        })
    }

    pub fn name_in_department(fragment: &str, department: &str) -> StoreResult<Self> {
        Ok(Self::NameInDepartment {
            fragment: field::key("name", fragment)?,
            department: field::key("department", department)?,
        })
    }

    pub fn cohort(department: &str, intake: &str, section: &str) -> StoreResult<Self> {
        Ok(Self::Cohort {
            department: field::key("department", department)?,
            intake: field::key("intake", intake)?,
            section: field::key("section", section)?,
        })
    }

    /// Both this query and `other` must match.
    pub fn and(self, other: StudentQuery) -> Self {
        match self {
            Self::All(mut parts) => {
                parts.push(other);
                Self::All(parts)
            }
            first => Self::All(vec![first, other]),
        }
    }

    pub fn matches(&self, record: &StudentRecord) -> bool {
        match self {
            Self::Department(department) => record.department == *department,
            Self::IdInDepartment {
                student_id,
                department,
            } => record.student_id == *student_id && record.department == *department,
            Self::NameInDepartment {
                fragment,
                department,
            } => {
                let full_name = record.full_name();
                !full_name.is_empty()
                    && full_name.contains(fragment.as_str())
                    && record.department == *department
            }
            Self::Cohort {
                department,
                intake,
                section,
            } => {
                record.department == *department
                    && record.intake == *intake
                    && record.section == *section
            }
            Self::All(parts) => parts.iter().all(|part| part.matches(record)),
        }
    }
}

/// Student admission records kept as labeled text blocks.
#[derive(Debug)]
pub struct StudentStore {
    file: StoreFile,
    mode: ReplaceMode,
}

impl StudentStore {
    /// Open the text file at `path`, creating it when missing.
    pub fn open(path: impl Into<PathBuf>, mode: ReplaceMode) -> StoreResult<Self> {
        Ok(Self {
            file: StoreFile::open(path, Access::ReadAppend)?,
            mode,
        })
    }

    /// Location of the backing text file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Validate and append a record. If the file does not already end in a
    /// blank line, one is written first so the new block stays separate.
    pub fn add(&mut self, record: StudentRecord) -> StoreResult<StudentRecord> {
        let record = record.validated()?;
        let separator = self.missing_separator()?;
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        let mut payload = String::from(separator);
        payload.push_str(&encode_block(&record));
        file.write_all(payload.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|err| StoreError::io("append", &path, err))?;
        info!(
            "added student {} ({}) to {}",
            record.student_id,
            record.department,
            path.display()
        );
        Ok(record)
    }

    /// Every record the query matches, in file order.
    pub fn select(&mut self, query: &StudentQuery) -> StoreResult<Vec<StudentRecord>> {
        let mut out = Vec::new();
        self.scan(|_, record| {
            if query.matches(&record) {
                out.push(record);
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// First record in file order the query matches.
    pub fn select_first(&mut self, query: &StudentQuery) -> StoreResult<Option<StudentRecord>> {
        let mut found = None;
        self.scan(|_, record| {
            if query.matches(&record) {
                found = Some(record);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Every student of `department`, in file order.
    pub fn list_department(&mut self, department: &str) -> StoreResult<Vec<StudentRecord>> {
        self.select(&StudentQuery::department(department)?)
    }

    /// First student with this ID in `department`; later duplicates are not
    /// consulted.
    pub fn find_by_id(
        &mut self,
        student_id: &str,
        department: &str,
    ) -> StoreResult<Option<StudentRecord>> {
        self.select_first(&StudentQuery::id_in_department(student_id, department)?)
    }

    /// Case-sensitive substring match on `First Last`.
    pub fn search_by_name(
        &mut self,
        fragment: &str,
        department: &str,
    ) -> StoreResult<Vec<StudentRecord>> {
        self.select(&StudentQuery::name_in_department(fragment, department)?)
    }

    /// Students of one intake and section within a department.
    pub fn list_cohort(
        &mut self,
        department: &str,
        intake: &str,
        section: &str,
    ) -> StoreResult<Vec<StudentRecord>> {
        self.select(&StudentQuery::cohort(department, intake, section)?)
    }

    /// Replace the first block keyed by `(student_id, department)` with the
    /// old record merged with `update`. Every other block, including lines
    /// that never parsed, is copied through as-is.
    pub fn update_by_id(
        &mut self,
        student_id: &str,
        department: &str,
        update: &StudentUpdate,
    ) -> StoreResult<Option<StudentRecord>> {
        let query = StudentQuery::id_in_department(student_id, department)?;
        // Bad input must fail before the file is touched.
        update.validated()?;

        let path = self.path().to_path_buf();
        let mut updated = None;
        self.file.rewrite(self.mode, |reader, writer| {
            let mut blocks = BlockReader::new(reader);
            while let Some(block) = next_block(&mut blocks, &path)? {
                let current = block.parse();
                let replacement = if updated.is_none() && query.matches(&current) {
                    Some(current.merged(update)?)
                } else {
                    None
                };
                let written = match &replacement {
                    Some(merged) => writer.write_all(encode_block(merged).as_bytes()),
                    None => block.write_to(writer),
                };
                written.map_err(|err| StoreError::io("write", &path, err))?;
                if replacement.is_some() {
                    updated = replacement;
                }
            }
            Ok(usize::from(updated.is_some()))
        })?;

        if let Some(record) = &updated {
            info!(
                "updated student {} ({}) in {}",
                record.student_id,
                record.department,
                path.display()
            );
        }
        Ok(updated)
    }

    /// Drop every block keyed by `(student_id, department)`. Returns how many
    /// went; zero leaves the file byte-for-byte unchanged.
    pub fn delete_by_id(&mut self, student_id: &str, department: &str) -> StoreResult<usize> {
        let query = StudentQuery::id_in_department(student_id, department)?;
        let path = self.path().to_path_buf();
        let removed = self.file.rewrite(self.mode, |reader, writer| {
            let mut blocks = BlockReader::new(reader);
            let mut removed = 0;
            while let Some(block) = next_block(&mut blocks, &path)? {
                if query.matches(&block.parse()) {
                    removed += 1;
                    continue;
                }
                block
                    .write_to(writer)
                    .map_err(|err| StoreError::io("write", &path, err))?;
            }
            Ok(removed)
        })?;
        if removed > 0 {
            info!("deleted {removed} student block(s) from {}", path.display());
        }
        Ok(removed)
    }

    /// Re-read the whole file with the strict decoder and return one
    /// [`StoreError::Malformed`] per block that does not follow the layout.
    pub fn check(&mut self) -> StoreResult<Vec<StoreError>> {
        let mut problems = Vec::new();
        self.scan(|block, _| {
            if let Err(err) = decode_strict(block) {
                problems.push(err);
            }
            ControlFlow::Continue(())
        })?;
        Ok(problems)
    }

    fn scan<F>(&mut self, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(&RawBlock, StudentRecord) -> ControlFlow<()>,
    {
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| StoreError::io("seek", &path, err))?;
        let mut blocks = BlockReader::new(BufReader::new(file));
        let mut seen = 0usize;
        while let Some(block) = next_block(&mut blocks, &path)? {
            seen += 1;
            let record = block.parse();
            if visit(&block, record).is_break() {
                break;
            }
        }
        debug!("scanned {seen} block(s) in {}", path.display());
        Ok(())
    }

    /// The bytes needed so that the next append starts a fresh block.
    fn missing_separator(&mut self) -> StoreResult<&'static str> {
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        let len = file
            .metadata()
            .map_err(|err| StoreError::io("stat", &path, err))?
            .len();
        if len == 0 {
            return Ok("");
        }
        let tail_len = len.min(2);
        file.seek(SeekFrom::End(-(tail_len as i64)))
            .map_err(|err| StoreError::io("seek", &path, err))?;
        let mut tail = Vec::with_capacity(2);
        file.take(tail_len)
            .read_to_end(&mut tail)
            .map_err(|err| StoreError::io("read", &path, err))?;
        Ok(match tail.as_slice() {
            [.., b'\n', b'\n'] => "",
            [.., b'\n'] => "\n",
            _ => "\n\n",
        })
    }
}

fn next_block<R: std::io::BufRead>(
    blocks: &mut BlockReader<R>,
    path: &Path,
) -> StoreResult<Option<RawBlock>> {
    blocks
        .next_block()
        .map_err(|err| StoreError::io("read", path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn student(id: &str, department: &str, first: &str, last: &str) -> StudentRecord {
        StudentRecord {
            first_name: first.into(),
            last_name: last.into(),
            student_id: id.into(),
            department: department.into(),
            intake: "50".into(),
            section: "1".into(),
            mobile: "0171".into(),
            ..Default::default()
        }
    }

    fn open(dir: &Path) -> StudentStore {
        StudentStore::open(dir.join("students.txt"), ReplaceMode::default()).unwrap()
    }

    #[test]
    fn queries_respect_department_and_file_order() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();
        store.add(student("S2", "EEE", "Karim", "Uddin")).unwrap();
        store.add(student("S3", "CSE", "Salma", "Uddin")).unwrap();

        let cse = store.list_department("CSE").unwrap();
        let ids: Vec<&str> = cse.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S3"]);

        let named = store.search_by_name("Uddin", "CSE").unwrap();
        assert_eq!(named.len(), 2);
        assert!(store.search_by_name("uddin", "CSE").unwrap().is_empty());

        assert!(store.find_by_id("S2", "CSE").unwrap().is_none());
        assert_eq!(store.list_cohort("CSE", "50", "1").unwrap().len(), 2);
    }

    #[test]
    fn queries_compose() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();
        let query = StudentQuery::department("CSE")
            .unwrap()
            .and(StudentQuery::name_in_department("Rah", "CSE").unwrap());
        assert_eq!(store.select(&query).unwrap().len(), 1);
    }

    #[test]
    fn empty_keys_fail_before_any_io() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        assert!(matches!(
            store.find_by_id(" ", "CSE"),
            Err(StoreError::EmptyKey("student ID"))
        ));
        assert!(matches!(
            store.delete_by_id("S1", ""),
            Err(StoreError::EmptyKey("department"))
        ));
    }

    #[test]
    fn find_returns_the_first_duplicate() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "First", "Copy")).unwrap();
        store.add(student("S1", "CSE", "Second", "Copy")).unwrap();
        let found = store.find_by_id("S1", "CSE").unwrap().unwrap();
        assert_eq!(found.first_name, "First");
    }

    #[test]
    fn update_preserves_noise_in_other_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.txt");
        fs::write(&path, "# registrar copy\nStudent ID: X9\nDepartment: BBA\n").unwrap();
        let mut store = StudentStore::open(&path, ReplaceMode::default()).unwrap();
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();

        let update = StudentUpdate {
            email: "r@example.com".into(),
            ..Default::default()
        };
        let updated = store.update_by_id("S1", "CSE", &update).unwrap().unwrap();
        assert_eq!(updated.email, "r@example.com");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# registrar copy\nStudent ID: X9\nDepartment: BBA\n\n"));
        assert!(text.contains("Email: r@example.com\n"));
    }

    #[test]
    fn update_rejects_bad_values_without_touching_the_file() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();
        let before = fs::read(store.path()).unwrap();
        let update = StudentUpdate {
            mobile: "1".repeat(40),
            ..Default::default()
        };
        assert!(store.update_by_id("S1", "CSE", &update).is_err());
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn update_replaces_only_the_first_duplicate_and_delete_drops_all() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "First", "Copy")).unwrap();
        store.add(student("S1", "CSE", "Second", "Copy")).unwrap();

        let update = StudentUpdate {
            section: "9".into(),
            ..Default::default()
        };
        store.update_by_id("S1", "CSE", &update).unwrap();
        let all = store.list_department("CSE").unwrap();
        assert_eq!(all[0].section, "9");
        assert_eq!(all[1].section, "1");

        assert_eq!(store.delete_by_id("S1", "CSE").unwrap(), 2);
        assert!(store.list_department("CSE").unwrap().is_empty());
    }

    #[test]
    fn deleting_a_missing_key_keeps_bytes_identical() {
        let dir = tempdir().unwrap();
        let mut store = open(dir.path());
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();
        let before = fs::read(store.path()).unwrap();
        assert_eq!(store.delete_by_id("S404", "CSE").unwrap(), 0);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn non_utf8_block_does_not_hide_its_neighbours() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.txt");
        let latin1: &[u8] = b"Student Name: Jos\xe9 Rahman\nStudent ID: S7\nDepartment: CSE\n\n";
        fs::write(&path, latin1).unwrap();
        let mut store = StudentStore::open(&path, ReplaceMode::default()).unwrap();
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();

        assert_eq!(store.list_department("CSE").unwrap().len(), 2);
        assert!(store.find_by_id("S1", "CSE").unwrap().is_some());
        assert_eq!(store.delete_by_id("S1", "CSE").unwrap(), 1);
        assert_eq!(fs::read(&path).unwrap(), latin1);
    }

    #[test]
    fn append_after_unterminated_block_adds_separator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.txt");
        fs::write(&path, "Student ID: X9\nDepartment: BBA").unwrap();
        let mut store = StudentStore::open(&path, ReplaceMode::default()).unwrap();
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();

        assert_eq!(store.find_by_id("X9", "BBA").unwrap().unwrap().student_id, "X9");
        assert!(store.find_by_id("S1", "CSE").unwrap().is_some());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Student ID: X9\nDepartment: BBA\n\nStudent Name: Rahim Uddin\n"));
    }

    #[test]
    fn check_reports_malformed_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.txt");
        fs::write(&path, "Student ID: X9\n").unwrap();
        let mut store = StudentStore::open(&path, ReplaceMode::default()).unwrap();
        store.add(student("S1", "CSE", "Rahim", "Uddin")).unwrap();

        let problems = store.check().unwrap();
        assert_eq!(problems.len(), 1);
        assert!(matches!(
            problems[0],
            StoreError::Malformed {
                line: 1,
                expected: "Student Name",
                ..
            }
        ));
    }
}
