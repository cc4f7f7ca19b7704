//! Copy-filter-replace rewrites.
//!
//! Records are streamed from the original file into a sibling `.tmp` file,
//! with the caller deciding which ones to keep, drop or replace. Nothing on
//! disk changes unless the transfer reports at least one dropped or replaced
//! record; otherwise the temp file is discarded.
//!
//! The default [`ReplaceMode::RemoveThenRename`] deletes the original before
//! renaming the temp file into place. A crash or failure between those two
//! steps leaves only the temp file, which is reported as
//! [`StoreError::ReplaceFailed`]. [`ReplaceMode::RenameOver`] closes that gap
//! with a single rename over the original.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, error};

use super::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Remove the original, then rename the temp file to its name.
    #[default]
    RemoveThenRename,
    /// Rename the synced temp file directly over the original.
    RenameOver,
}

/// Where the rewrite of `original` stages its output.
pub fn temp_path(original: &Path) -> PathBuf {
    original.with_extension("tmp")
}

/// Run one rewrite of `original`. The caller must have released its own
/// handle first. `transfer` copies records from the reader to the writer and
/// returns how many it dropped or replaced.
pub(crate) fn rewrite<F>(original: &Path, mode: ReplaceMode, transfer: F) -> StoreResult<usize>
where
    F: FnOnce(&mut BufReader<File>, &mut BufWriter<File>) -> StoreResult<usize>,
{
    let temp = temp_path(original);
    let source =
        File::open(original).map_err(|err| StoreError::io("open for rewrite", original, err))?;
    let sink = File::create(&temp).map_err(|err| StoreError::io("create", &temp, err))?;

    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(sink);
    let changed = match transfer(&mut reader, &mut writer) {
        Ok(changed) => changed,
        Err(err) => {
            drop(writer);
            discard(&temp);
            return Err(err);
        }
    };
    drop(reader);

    if changed == 0 {
        drop(writer);
        discard(&temp);
        debug!("rewrite of {} matched nothing", original.display());
        return Ok(0);
    }

    if let Err(err) = finish(writer, &temp) {
        discard(&temp);
        return Err(err);
    }
    replace(original, &temp, mode)?;
    Ok(changed)
}

/// Flush and sync the temp file so the replace never exposes a short file.
fn finish(writer: BufWriter<File>, temp: &Path) -> StoreResult<()> {
    let file = writer
        .into_inner()
        .map_err(|err| StoreError::io("flush", temp, err.into_error()))?;
    file.sync_all()
        .map_err(|err| StoreError::io("sync", temp, err))
}

fn replace(original: &Path, temp: &Path, mode: ReplaceMode) -> StoreResult<()> {
    match mode {
        ReplaceMode::RemoveThenRename => {
            if let Err(source) = fs::remove_file(original) {
                // The original is still intact, so the staged copy can go.
                discard(temp);
                return Err(critical(original, temp, false, source));
            }
            fs::rename(temp, original).map_err(|source| critical(original, temp, true, source))
        }
        ReplaceMode::RenameOver => fs::rename(temp, original).map_err(|source| {
            discard(temp);
            critical(original, temp, false, source)
        }),
    }
}

fn critical(original: &Path, temp: &Path, original_removed: bool, source: std::io::Error) -> StoreError {
    let err = StoreError::ReplaceFailed {
        original: original.to_path_buf(),
        temp: temp.to_path_buf(),
        original_removed,
        source,
    };
    error!("{err}");
    err
}

fn discard(temp: &Path) {
    if let Err(err) = fs::remove_file(temp) {
        debug!("could not remove {}: {err}", temp.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Write};
    use tempfile::tempdir;

    fn drop_lines_containing(needle: &'static str) -> impl FnOnce(
        &mut BufReader<File>,
        &mut BufWriter<File>,
    ) -> StoreResult<usize> {
        move |reader: &mut BufReader<File>, writer: &mut BufWriter<File>| {
            let mut dropped = 0;
            for line in reader.lines() {
                let line = line.unwrap();
                if line.contains(needle) {
                    dropped += 1;
                } else {
                    writeln!(writer, "{line}").unwrap();
                }
            }
            Ok(dropped)
        }
    }

    #[test]
    fn nothing_matched_leaves_original_and_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a\nb\n").unwrap();

        let changed = rewrite(&path, ReplaceMode::default(), drop_lines_containing("z")).unwrap();
        assert_eq!(changed, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn both_modes_replace_the_original() {
        for mode in [ReplaceMode::RemoveThenRename, ReplaceMode::RenameOver] {
            let dir = tempdir().unwrap();
            let path = dir.path().join("data.txt");
            fs::write(&path, "a\nb\na\n").unwrap();

            let changed = rewrite(&path, mode, drop_lines_containing("a")).unwrap();
            assert_eq!(changed, 2);
            assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
            assert!(!temp_path(&path).exists());
        }
    }

    #[test]
    fn failed_transfer_discards_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a\n").unwrap();

        let result = rewrite(&path, ReplaceMode::default(), |_, _| {
            Err(StoreError::Corrupt("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn missing_original_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.dat");
        let err = rewrite(&path, ReplaceMode::default(), |_, _| Ok(1)).unwrap_err();
        assert!(matches!(err, StoreError::Io { op: "open for rewrite", .. }));
    }

    #[test]
    fn rename_failure_after_remove_is_critical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a\n").unwrap();
        let missing_temp = dir.path().join("never-written.tmp");

        let err = replace(&path, &missing_temp, ReplaceMode::RemoveThenRename).unwrap_err();
        assert!(err.is_critical());
        assert!(matches!(
            err,
            StoreError::ReplaceFailed {
                original_removed: true,
                ..
            }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn failed_rename_over_keeps_the_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a\n").unwrap();
        let missing_temp = dir.path().join("never-written.tmp");

        let err = replace(&path, &missing_temp, ReplaceMode::RenameOver).unwrap_err();
        assert!(err.is_critical());
        assert!(matches!(
            err,
            StoreError::ReplaceFailed {
                original_removed: false,
                ..
            }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn failed_remove_discards_the_staged_copy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let temp = temp_path(&path);
        fs::write(&temp, "staged\n").unwrap();

        let err = replace(&path, &temp, ReplaceMode::RemoveThenRename).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ReplaceFailed {
                original_removed: false,
                ..
            }
        ));
        assert!(!temp.exists());
    }
}
