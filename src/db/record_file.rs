//! Generic file of fixed-size binary records.
//!
//! The file is a bare sequence of `R::SIZE`-byte records with no header, so
//! the record count is simply `len / R::SIZE` and record `n` lives at offset
//! `n * R::SIZE`. Updates overwrite the first match in place; deletes remove
//! every match through a rewrite. Callers rely on that asymmetry.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::handle::{Access, StoreFile};
use super::rewrite::ReplaceMode;

/// A record with one serialized size.
pub trait FixedRecord: Sized {
    const SIZE: usize;

    /// Serialize into `buf`, which is exactly `SIZE` bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Parse one record from exactly `SIZE` bytes. Failure marks the record
    /// corrupt; callers skip it rather than abort.
    fn decode(buf: &[u8]) -> StoreResult<Self>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

/// A record together with the offset it was read from. The offset is only
/// meaningful until the file length changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<R> {
    pub offset: u64,
    pub record: R,
}

/// A file holding nothing but `R` records back to back, with a long-lived
/// handle and the replace mode used by deletes.
#[derive(Debug)]
pub struct RecordFile<R> {
    file: StoreFile,
    mode: ReplaceMode,
    _record: PhantomData<R>,
}

impl<R: FixedRecord> RecordFile<R> {
    pub fn open(path: impl Into<PathBuf>, mode: ReplaceMode) -> StoreResult<Self> {
        Ok(Self {
            file: StoreFile::open(path, Access::ReadWrite)?,
            mode,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of whole records currently stored.
    pub fn count(&mut self) -> StoreResult<u64> {
        Ok(self.file.len()? / R::SIZE as u64)
    }

    /// Append one record at the end of the file and return its offset.
    /// Refuses to write behind a partial trailing record.
    pub fn append(&mut self, record: &R) -> StoreResult<u64> {
        let len = self.file.len()?;
        if len % R::SIZE as u64 != 0 {
            return Err(StoreError::Misaligned {
                path: self.path().to_path_buf(),
                len,
                record_size: R::SIZE,
            });
        }
        let bytes = record.to_bytes();
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|err| StoreError::io("seek", &path, err))?;
        write_durably(file, &bytes).map_err(|err| StoreError::io("append", &path, err))?;
        debug!("appended record at offset {offset} of {}", path.display());
        Ok(offset)
    }

    /// Visit every decodable record in storage order. Corrupt records and a
    /// partial trailing record are logged and skipped.
    pub fn scan<F>(&mut self, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(u64, R) -> ControlFlow<()>,
    {
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| StoreError::io("seek", &path, err))?;
        let mut reader = BufReader::new(file);
        let mut buf = vec![0u8; R::SIZE];
        let mut offset = 0u64;
        loop {
            let read = read_record(&mut reader, &mut buf)
                .map_err(|err| StoreError::io("read", &path, err))?;
            if read == 0 {
                break;
            }
            if read < R::SIZE {
                warn!(
                    "ignoring {read}-byte partial record at offset {offset} of {}",
                    path.display()
                );
                break;
            }
            match R::decode(&buf) {
                Ok(record) => {
                    if visit(offset, record).is_break() {
                        break;
                    }
                }
                Err(err) => warn!(
                    "skipping record at offset {offset} of {}: {err}",
                    path.display()
                ),
            }
            offset += R::SIZE as u64;
        }
        Ok(())
    }

    /// First record in storage order that satisfies `matches`.
    pub fn find_first<P>(&mut self, matches: P) -> StoreResult<Option<Located<R>>>
    where
        P: Fn(&R) -> bool,
    {
        let mut found = None;
        self.scan(|offset, record| {
            if matches(&record) {
                found = Some(Located { offset, record });
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }

    /// Every matching record in storage order, stopping once `limit` is hit.
    pub fn collect<P>(&mut self, matches: P, limit: Option<usize>) -> StoreResult<Vec<R>>
    where
        P: Fn(&R) -> bool,
    {
        let mut out = Vec::new();
        if limit == Some(0) {
            return Ok(out);
        }
        self.scan(|_, record| {
            if matches(&record) {
                out.push(record);
                if limit.is_some_and(|limit| out.len() >= limit) {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Overwrite the record at `offset` with one of identical size.
    pub fn overwrite(&mut self, offset: u64, record: &R) -> StoreResult<()> {
        let size = R::SIZE as u64;
        let len = self.file.len()?;
        if offset % size != 0 || offset + size > len {
            return Err(StoreError::StaleOffset {
                path: self.path().to_path_buf(),
                offset,
            });
        }
        let bytes = record.to_bytes();
        let path = self.path().to_path_buf();
        let file = self.file.handle()?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|err| StoreError::io("seek", &path, err))?;
        write_durably(file, &bytes).map_err(|err| StoreError::io("overwrite", &path, err))
    }

    /// Merge into the first matching record and write it back in place.
    /// Returns the stored record, or `None` when nothing matched. An update
    /// that changes no bytes skips the write.
    pub fn update_first<P, M>(&mut self, matches: P, merge: M) -> StoreResult<Option<R>>
    where
        P: Fn(&R) -> bool,
        M: FnOnce(&R) -> StoreResult<R>,
    {
        let Some(located) = self.find_first(matches)? else {
            return Ok(None);
        };
        let merged = merge(&located.record)?;
        if merged.to_bytes() == located.record.to_bytes() {
            debug!("update at offset {} changed nothing", located.offset);
            return Ok(Some(merged));
        }
        self.overwrite(located.offset, &merged)?;
        info!(
            "updated record at offset {} of {}",
            located.offset,
            self.path().display()
        );
        Ok(Some(merged))
    }

    /// Remove every matching record in one rewrite and return how many went.
    /// Records that fail to decode are carried over untouched.
    pub fn delete_all<P>(&mut self, matches: P) -> StoreResult<usize>
    where
        P: Fn(&R) -> bool,
    {
        let path = self.path().to_path_buf();
        let removed = self.file.rewrite(self.mode, |reader, writer| {
            let mut buf = vec![0u8; R::SIZE];
            let mut removed = 0;
            loop {
                let read = read_record(reader, &mut buf)
                    .map_err(|err| StoreError::io("read", &path, err))?;
                if read == 0 {
                    break;
                }
                if read < R::SIZE {
                    warn!(
                        "dropping {read}-byte partial record from the end of {}",
                        path.display()
                    );
                    break;
                }
                match R::decode(&buf) {
                    Ok(record) if matches(&record) => removed += 1,
                    _ => writer
                        .write_all(&buf)
                        .map_err(|err| StoreError::io("write", &path, err))?,
                }
            }
            Ok(removed)
        })?;
        if removed > 0 {
            info!("deleted {removed} record(s) from {}", path.display());
        }
        Ok(removed)
    }
}

/// Fill `buf` from `reader`, returning fewer bytes only at end of file.
fn read_record<T: Read>(reader: &mut T, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn write_durably(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}
