//! Width limits for every persisted string field.
//!
//! Values coming from callers pass through [`FieldSpec::accept`], which trims
//! them and rejects anything that would not survive a write/read cycle (too
//! wide, embedded line breaks, whitespace inside single-token fields). Values
//! coming back from disk go through [`FieldSpec::truncate`] instead, so an
//! over-long line in a hand-edited file is clipped rather than refused.

use crate::db::{StoreError, StoreResult};

/// Whether a field holds a single whitespace-free token or free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Token,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Maximum length in bytes.
    pub max: usize,
    pub shape: Shape,
}

impl FieldSpec {
    pub const fn token(name: &'static str, max: usize) -> Self {
        Self {
            name,
            max,
            shape: Shape::Token,
        }
    }

    pub const fn text(name: &'static str, max: usize) -> Self {
        Self {
            name,
            max,
            shape: Shape::Text,
        }
    }

    /// Trim and validate a caller-supplied value. An empty result is allowed;
    /// use [`FieldSpec::require`] when the field is mandatory.
    pub fn accept(&self, raw: &str) -> StoreResult<String> {
        let value = raw.trim();
        if value.len() > self.max {
            return Err(StoreError::invalid(
                self.name,
                format!("{} bytes exceeds the {}-byte limit", value.len(), self.max),
            ));
        }
        if value.contains(['\n', '\r', '\0']) {
            return Err(StoreError::invalid(self.name, "contains a line break"));
        }
        if self.shape == Shape::Token && value.contains(char::is_whitespace) {
            return Err(StoreError::invalid(self.name, "must be a single word"));
        }
        Ok(value.to_string())
    }

    pub fn require(&self, raw: &str) -> StoreResult<String> {
        let value = self.accept(raw)?;
        if value.is_empty() {
            return Err(StoreError::invalid(self.name, "is required"));
        }
        Ok(value)
    }

    /// Clip a value read from disk to this field's width, backing off to the
    /// nearest character boundary.
    pub fn truncate(&self, value: &str) -> String {
        if value.len() <= self.max {
            return value.to_string();
        }
        let mut end = self.max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value[..end].to_string()
    }
}

/// Trim a lookup key and reject it when empty, before any file is touched.
pub fn key(name: &'static str, raw: &str) -> StoreResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(StoreError::EmptyKey(name));
    }
    Ok(value.to_string())
}

/// Pick the replacement when one was supplied, otherwise keep the old value.
pub(crate) fn keep_or_replace(old: &str, new: &str) -> String {
    if new.is_empty() {
        old.to_string()
    } else {
        new.to_string()
    }
}

// Student records (text store).
pub const FIRST_NAME: FieldSpec = FieldSpec::token("first name", 99);
pub const LAST_NAME: FieldSpec = FieldSpec::token("last name", 99);
pub const FATHER_NAME: FieldSpec = FieldSpec::text("father's name", 99);
pub const MOTHER_NAME: FieldSpec = FieldSpec::text("mother's name", 99);
pub const STUDENT_ID: FieldSpec = FieldSpec::token("student ID", 99);
pub const DEPARTMENT: FieldSpec = FieldSpec::token("department", 99);
pub const INTAKE: FieldSpec = FieldSpec::token("intake", 99);
pub const SECTION: FieldSpec = FieldSpec::token("section", 99);
pub const PRESENT_ADDRESS: FieldSpec = FieldSpec::text("present address", 199);
pub const PERMANENT_ADDRESS: FieldSpec = FieldSpec::text("permanent address", 199);
pub const BLOOD_GROUP: FieldSpec = FieldSpec::token("blood group", 19);
pub const MOBILE: FieldSpec = FieldSpec::token("mobile", 19);
pub const BACKUP_MOBILE: FieldSpec = FieldSpec::token("backup mobile", 19);
pub const EMAIL: FieldSpec = FieldSpec::text("email", 99);

// Schedule entries (binary store).
pub const SCHEDULE_INTAKE: FieldSpec = FieldSpec::text("intake", 19);
pub const SCHEDULE_SECTION: FieldSpec = FieldSpec::text("section", 19);
pub const SCHEDULE_TYPE: FieldSpec = FieldSpec::text("schedule type", 49);
pub const DAY: FieldSpec = FieldSpec::text("day", 29);
pub const DATE: FieldSpec = FieldSpec::text("date", 29);
pub const TIME: FieldSpec = FieldSpec::text("time", 29);
pub const ROOM: FieldSpec = FieldSpec::text("room", 19);
pub const FACULTY: FieldSpec = FieldSpec::text("faculty", 99);
pub const DETAILS: FieldSpec = FieldSpec::text("details", 499);

// Result entries (binary store).
pub const RESULT_STUDENT_ID: FieldSpec = FieldSpec::text("student ID", 19);
pub const RESULT_NAME: FieldSpec = FieldSpec::text("name", 99);
pub const RESULT_INTAKE: FieldSpec = FieldSpec::text("intake", 19);
pub const RESULT_SECTION: FieldSpec = FieldSpec::text("section", 19);
pub const GRADE: FieldSpec = FieldSpec::text("grade", 4);
