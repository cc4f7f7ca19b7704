//! Helpers for fixed-width, NUL-padded fields inside binary records.
//!
//! A field of `width` bytes stores at most `width - 1` bytes of text followed
//! by at least one NUL, the same shape as a C `char[width]`.

use crate::field::FieldSpec;

use super::error::{StoreError, StoreResult};

/// Byte range of one field inside a record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub name: &'static str,
    pub at: usize,
    pub width: usize,
}

impl Slot {
    pub(crate) const fn new(name: &'static str, at: usize, width: usize) -> Self {
        Self { name, at, width }
    }

    /// Slot wide enough for `spec.max` bytes plus the terminator.
    pub(crate) const fn for_field(spec: FieldSpec, at: usize) -> Self {
        Self::new(spec.name, at, spec.max + 1)
    }

    pub(crate) const fn end(&self) -> usize {
        self.at + self.width
    }

    /// Write `value`, clipped to `width - 1` bytes, and NUL-fill the rest.
    pub(crate) fn put(&self, buf: &mut [u8], value: &str) {
        let field = &mut buf[self.at..self.end()];
        let len = value.len().min(self.width - 1);
        field[..len].copy_from_slice(&value.as_bytes()[..len]);
        field[len..].fill(0);
    }

    pub(crate) fn get(&self, buf: &[u8]) -> StoreResult<String> {
        let field = &buf[self.at..self.end()];
        let len = field.iter().position(|b| *b == 0).ok_or_else(|| {
            StoreError::Corrupt(format!("{} is not NUL-terminated", self.name))
        })?;
        String::from_utf8(field[..len].to_vec())
            .map_err(|_| StoreError::Corrupt(format!("{} is not valid UTF-8", self.name)))
    }
}
