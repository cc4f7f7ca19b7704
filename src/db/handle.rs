use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{error, warn};

use super::error::{StoreError, StoreResult};
use super::rewrite::{self, ReplaceMode};

/// How a store's long-lived handle is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Text store: reads anywhere, writes always land at the end.
    ReadAppend,
    /// Binary stores: reads and positioned overwrites.
    ReadWrite,
}

/// A store's backing file together with the handle it keeps open between
/// operations. The handle is only ever dropped around a rewrite.
#[derive(Debug)]
pub(crate) struct StoreFile {
    path: PathBuf,
    access: Access,
    file: Option<File>,
}

impl StoreFile {
    /// Open (creating if needed) the backing file. Failure here is fatal.
    pub(crate) fn open(path: impl Into<PathBuf>, access: Access) -> StoreResult<Self> {
        let path = path.into();
        let file = open_file(&path, access)?;
        Ok(Self {
            path,
            access,
            file: Some(file),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the open handle, reopening it first if a previous rewrite lost it.
    pub(crate) fn handle(&mut self) -> StoreResult<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                warn!("{} had no open handle; reopening", self.path.display());
                open_file(&self.path, self.access)?
            }
        };
        Ok(self.file.insert(file))
    }

    pub(crate) fn len(&mut self) -> StoreResult<u64> {
        let path = self.path.clone();
        let meta = self
            .handle()?
            .metadata()
            .map_err(|err| StoreError::io("stat", path, err))?;
        Ok(meta.len())
    }

    /// Release the handle, rewrite the file, then reopen it. A reopen failure
    /// wins over whatever the rewrite itself returned.
    pub(crate) fn rewrite<F>(&mut self, mode: ReplaceMode, transfer: F) -> StoreResult<usize>
    where
        F: FnOnce(&mut BufReader<File>, &mut BufWriter<File>) -> StoreResult<usize>,
    {
        self.file = None;
        let outcome = rewrite::rewrite(&self.path, mode, transfer);
        match open_file(&self.path, self.access) {
            Ok(file) => self.file = Some(file),
            Err(err) => {
                if let Err(rewrite_err) = &outcome {
                    error!("rewrite of {} failed before reopen: {rewrite_err}", self.path.display());
                }
                return Err(err);
            }
        }
        outcome
    }
}

fn open_file(path: &Path, access: Access) -> StoreResult<File> {
    let mut options = OpenOptions::new();
    options.read(true).create(true);
    match access {
        Access::ReadAppend => options.append(true),
        Access::ReadWrite => options.write(true),
    };
    options.open(path).map_err(|source| StoreError::Reopen {
        path: path.to_path_buf(),
        source,
    })
}
