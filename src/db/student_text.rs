//! Labeled-line encoding of student records.
//!
//! A record is thirteen `Label: value` lines in a fixed order followed by one
//! blank line. Reading is lenient: each line is matched against the known
//! labels, unknown lines are ignored, and a block ends at a blank line or at
//! end of file. [`decode_strict`] enforces the exact layout for validation.

use std::io::{self, BufRead, Write};

use log::warn;

use crate::field::{self, FieldSpec, Shape};
use crate::models::StudentRecord;

use super::error::{StoreError, StoreResult};

/// The fields of a student block, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StudentField {
    Name,
    FatherName,
    MotherName,
    StudentId,
    Department,
    Intake,
    Section,
    PresentAddress,
    PermanentAddress,
    BloodGroup,
    Mobile,
    BackupMobile,
    Email,
}

impl StudentField {
    pub(crate) const ALL: [StudentField; 13] = [
        StudentField::Name,
        StudentField::FatherName,
        StudentField::MotherName,
        StudentField::StudentId,
        StudentField::Department,
        StudentField::Intake,
        StudentField::Section,
        StudentField::PresentAddress,
        StudentField::PermanentAddress,
        StudentField::BloodGroup,
        StudentField::Mobile,
        StudentField::BackupMobile,
        StudentField::Email,
    ];

    pub(crate) fn label(&self) -> &'static str {
        match self {
            StudentField::Name => "Student Name",
            StudentField::FatherName => "Father's name",
            StudentField::MotherName => "Mother's name",
            StudentField::StudentId => "Student ID",
            StudentField::Department => "Department",
            StudentField::Intake => "Intake",
            StudentField::Section => "Section",
            StudentField::PresentAddress => "Present Address",
            StudentField::PermanentAddress => "Permanent Address",
            StudentField::BloodGroup => "Blood Group",
            StudentField::Mobile => "Mobile number",
            StudentField::BackupMobile => "Backup Mobile Number",
            StudentField::Email => "Email",
        }
    }

    /// Width and shape of the captured value. The name line is handled
    /// separately because it carries two tokens.
    fn spec(&self) -> FieldSpec {
        match self {
            StudentField::Name => field::FIRST_NAME,
            StudentField::FatherName => field::FATHER_NAME,
            StudentField::MotherName => field::MOTHER_NAME,
            StudentField::StudentId => field::STUDENT_ID,
            StudentField::Department => field::DEPARTMENT,
            StudentField::Intake => field::INTAKE,
            StudentField::Section => field::SECTION,
            StudentField::PresentAddress => field::PRESENT_ADDRESS,
            StudentField::PermanentAddress => field::PERMANENT_ADDRESS,
            StudentField::BloodGroup => field::BLOOD_GROUP,
            StudentField::Mobile => field::MOBILE,
            StudentField::BackupMobile => field::BACKUP_MOBILE,
            StudentField::Email => field::EMAIL,
        }
    }

    fn value(&self, record: &StudentRecord) -> String {
        match self {
            // Always "first last", even when one half is blank.
            StudentField::Name => format!("{} {}", record.first_name, record.last_name),
            StudentField::FatherName => record.father_name.clone(),
            StudentField::MotherName => record.mother_name.clone(),
            StudentField::StudentId => record.student_id.clone(),
            StudentField::Department => record.department.clone(),
            StudentField::Intake => record.intake.clone(),
            StudentField::Section => record.section.clone(),
            StudentField::PresentAddress => record.present_address.clone(),
            StudentField::PermanentAddress => record.permanent_address.clone(),
            StudentField::BloodGroup => record.blood_group.clone(),
            StudentField::Mobile => record.mobile.clone(),
            StudentField::BackupMobile => record.backup_mobile.clone(),
            StudentField::Email => record.email.clone(),
        }
    }

    fn slot<'r>(&self, record: &'r mut StudentRecord) -> &'r mut String {
        match self {
            StudentField::Name => &mut record.first_name,
            StudentField::FatherName => &mut record.father_name,
            StudentField::MotherName => &mut record.mother_name,
            StudentField::StudentId => &mut record.student_id,
            StudentField::Department => &mut record.department,
            StudentField::Intake => &mut record.intake,
            StudentField::Section => &mut record.section,
            StudentField::PresentAddress => &mut record.present_address,
            StudentField::PermanentAddress => &mut record.permanent_address,
            StudentField::BloodGroup => &mut record.blood_group,
            StudentField::Mobile => &mut record.mobile,
            StudentField::BackupMobile => &mut record.backup_mobile,
            StudentField::Email => &mut record.email,
        }
    }

    /// The text after `Label:` when `line` carries this field.
    fn strip<'l>(&self, line: &'l str) -> Option<&'l str> {
        line.strip_prefix(self.label())?
            .strip_prefix(':')
            .map(str::trim_start)
    }

    /// Store the value portion of a line into `record`.
    ///
    /// The name line keeps only its first two tokens, so `John Middle Smith`
    /// reads back as first `John`, last `Middle`.
    fn capture(&self, rest: &str, record: &mut StudentRecord) {
        if *self == StudentField::Name {
            let mut tokens = rest.split_whitespace();
            record.first_name = field::FIRST_NAME.truncate(tokens.next().unwrap_or_default());
            record.last_name = field::LAST_NAME.truncate(tokens.next().unwrap_or_default());
            return;
        }
        let spec = self.spec();
        let value = match spec.shape {
            Shape::Token => rest.split_whitespace().next().unwrap_or_default(),
            Shape::Text => rest.trim_end(),
        };
        *self.slot(record) = spec.truncate(value);
    }
}

/// Serialize one record followed by its blank separator line.
pub(crate) fn encode_block(record: &StudentRecord) -> String {
    let mut out = String::new();
    for field in StudentField::ALL {
        out.push_str(field.label());
        out.push_str(": ");
        out.push_str(&field.value(record));
        out.push('\n');
    }
    out.push('\n');
    out
}

/// The raw non-blank lines of one block, byte-for-byte as read (terminators
/// included), plus the 1-based line number of the first one. Lines are kept
/// as bytes so that text which is not valid UTF-8 survives a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawBlock {
    pub first_line: usize,
    pub lines: Vec<Vec<u8>>,
}

impl RawBlock {
    /// Lenient decode: first matching label wins per line, unknown lines are
    /// ignored, missing fields stay empty. Invalid UTF-8 is replaced with
    /// U+FFFD.
    pub(crate) fn parse(&self) -> StudentRecord {
        let mut record = StudentRecord::default();
        for raw in &self.lines {
            let line = String::from_utf8_lossy(raw);
            let line = line.trim();
            for field in StudentField::ALL {
                if let Some(rest) = field.strip(line) {
                    field.capture(rest, &mut record);
                    break;
                }
            }
        }
        record
    }

    /// Copy the block through unchanged, then one blank separator.
    pub(crate) fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.lines {
            out.write_all(line)?;
            if !line.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
        }
        out.write_all(b"\n")
    }
}

/// Strict decode: exactly thirteen lines, each carrying the expected label.
pub(crate) fn decode_strict(block: &RawBlock) -> StoreResult<StudentRecord> {
    let mut record = StudentRecord::default();
    for (index, field) in StudentField::ALL.iter().enumerate() {
        let line_no = block.first_line + index;
        let Some(raw) = block.lines.get(index) else {
            return Err(StoreError::Malformed {
                line: line_no,
                expected: field.label(),
                found: String::from("end of record"),
            });
        };
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        let rest = field.strip(line).ok_or_else(|| StoreError::Malformed {
            line: line_no,
            expected: field.label(),
            found: line.to_string(),
        })?;
        field.capture(rest, &mut record);
    }
    if let Some(extra) = block.lines.get(StudentField::ALL.len()) {
        return Err(StoreError::Malformed {
            line: block.first_line + StudentField::ALL.len(),
            expected: "blank line",
            found: String::from_utf8_lossy(extra).trim().to_string(),
        });
    }
    Ok(record)
}

/// Splits a text store into blocks separated by blank lines.
pub(crate) struct BlockReader<R> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> BlockReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }

    /// Next block, or `None` at end of file.
    pub(crate) fn next_block(&mut self) -> io::Result<Option<RawBlock>> {
        let mut block = RawBlock {
            first_line: 0,
            lines: Vec::new(),
        };
        loop {
            let mut line = Vec::new();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            self.line_no += 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                if block.lines.is_empty() {
                    continue;
                }
                break;
            }
            if std::str::from_utf8(&line).is_err() {
                warn!("line {} is not valid UTF-8; reading it lossily", self.line_no);
            }
            if block.lines.is_empty() {
                block.first_line = self.line_no;
            }
            block.lines.push(line);
        }
        Ok((!block.lines.is_empty()).then_some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> StudentRecord {
        StudentRecord {
            first_name: "Rahim".into(),
            last_name: "Uddin".into(),
            father_name: "Abdul Karim".into(),
            mother_name: "Amena Begum".into(),
            student_id: "S1".into(),
            department: "CSE".into(),
            intake: "50".into(),
            section: "2".into(),
            present_address: "House 4, Road 7, Mirpur".into(),
            permanent_address: "Village Pakundia, Kishoreganj".into(),
            blood_group: "O+".into(),
            mobile: "01710000000".into(),
            backup_mobile: "01810000000".into(),
            email: "rahim@example.com".into(),
        }
    }

    fn blocks(text: impl AsRef<[u8]>) -> Vec<RawBlock> {
        let mut reader = BlockReader::new(Cursor::new(text.as_ref().to_vec()));
        let mut out = Vec::new();
        while let Some(block) = reader.next_block().unwrap() {
            out.push(block);
        }
        out
    }

    #[test]
    fn encoded_block_reads_back_field_for_field() {
        let text = encode_block(&sample());
        assert!(text.starts_with("Student Name: Rahim Uddin\nFather's name: Abdul Karim\n"));
        assert!(text.ends_with("Email: rahim@example.com\n\n"));

        let parsed = blocks(&text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].parse(), sample());
        assert_eq!(decode_strict(&parsed[0]).unwrap(), sample());
    }

    #[test]
    fn name_line_keeps_two_tokens() {
        let parsed = blocks("Student Name: John Middle Smith\n");
        let record = parsed[0].parse();
        assert_eq!(record.first_name, "John");
        assert_eq!(record.last_name, "Middle");
    }

    #[test]
    fn token_fields_take_first_word_and_text_fields_keep_spaces() {
        let parsed = blocks("Student ID: S9 trailing\nPresent Address:   12  Lake Road  \n");
        let record = parsed[0].parse();
        assert_eq!(record.student_id, "S9");
        assert_eq!(record.present_address, "12  Lake Road");
    }

    #[test]
    fn unknown_lines_are_ignored_and_last_block_needs_no_separator() {
        let text = "# note\nStudent ID: A\nDepartment: EEE\n\n\n\nStudent ID: B\nDepartment: BBA";
        let parsed = blocks(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].first_line, 1);
        assert_eq!(parsed[1].first_line, 7);
        assert_eq!(parsed[0].parse().department, "EEE");
        assert_eq!(parsed[1].parse().student_id, "B");
    }

    #[test]
    fn over_wide_values_are_clipped_on_read() {
        let text = format!("Mobile number: {}\n", "9".repeat(30));
        let record = blocks(&text)[0].parse();
        assert_eq!(record.mobile.len(), 19);
    }

    #[test]
    fn raw_blocks_copy_through_unchanged() {
        let parsed = blocks("# keep me\nStudent ID: A");
        let mut out = Vec::new();
        parsed[0].write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# keep me\nStudent ID: A\n\n");
    }

    #[test]
    fn latin1_bytes_are_read_lossily_and_copied_verbatim() {
        let text = b"Student Name: Jos\xe9 Rahman\nStudent ID: S7\n\nStudent ID: S1\n";
        let parsed = blocks(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].parse().first_name, "Jos\u{FFFD}");
        assert_eq!(parsed[0].parse().student_id, "S7");
        assert_eq!(parsed[1].parse().student_id, "S1");

        let mut out = Vec::new();
        parsed[0].write_to(&mut out).unwrap();
        assert_eq!(out, b"Student Name: Jos\xe9 Rahman\nStudent ID: S7\n\n");
    }

    #[test]
    fn strict_decode_points_at_the_bad_line() {
        let mut text = encode_block(&sample());
        text = text.replace("Section: 2", "Sektion: 2");
        let err = decode_strict(&blocks(&text)[0]).unwrap_err();
        match err {
            StoreError::Malformed {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 7);
                assert_eq!(expected, "Section");
                assert_eq!(found, "Sektion: 2");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn strict_decode_rejects_short_blocks() {
        let err = decode_strict(&blocks("Student Name: A B\n")[0]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Malformed {
                line: 2,
                expected: "Father's name",
                ..
            }
        ));
    }
}
