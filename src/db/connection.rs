use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use log::debug;

use super::error::StoreResult;
use super::results::ResultStore;
use super::rewrite::ReplaceMode;
use super::schedules::ScheduleStore;
use super::students::StudentStore;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".campus-records";
/// Overrides the home-directory default when set and non-empty.
pub const DATA_DIR_ENV: &str = "CAMPUS_RECORDS_DIR";

pub const STUDENTS_FILE: &str = "students.txt";
pub const SCHEDULES_FILE: &str = "schedules.dat";
pub const RESULTS_FILE: &str = "results.dat";

/// Where the stores live and how rewrites replace their files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub replace_mode: ReplaceMode,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            replace_mode: ReplaceMode::default(),
        }
    }

    /// Pick the data directory (explicit path, then the environment, then the
    /// home directory) and make sure it exists.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let data_dir = match explicit {
            Some(dir) => dir,
            None => match env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => default_data_dir()?,
            },
        };
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        debug!("using data directory {}", data_dir.display());
        Ok(Self::new(data_dir))
    }

    pub fn with_replace_mode(mut self, replace_mode: ReplaceMode) -> Self {
        self.replace_mode = replace_mode;
        self
    }

    pub fn students_path(&self) -> PathBuf {
        self.data_dir.join(STUDENTS_FILE)
    }

    pub fn schedules_path(&self) -> PathBuf {
        self.data_dir.join(SCHEDULES_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir.join(RESULTS_FILE)
    }
}

/// The three stores opened against one data directory.
#[derive(Debug)]
pub struct Stores {
    pub students: StudentStore,
    pub schedules: ScheduleStore,
    pub results: ResultStore,
}

impl Stores {
    /// Open (creating if needed) every backing file. Any failure here is
    /// fatal.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let mode = config.replace_mode;
        Ok(Self {
            students: StudentStore::open(config.students_path(), mode)?,
            schedules: ScheduleStore::open(config.schedules_path(), mode)?,
            results: ResultStore::open(config.results_path(), mode)?,
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.students.path().parent()
    }
}

/// Resolve the default data directory inside the user's home.
fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_directory_wins_and_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let config = StoreConfig::resolve(Some(nested.clone())).unwrap();
        assert_eq!(config.data_dir, nested);
        assert!(nested.is_dir());
        assert_eq!(config.replace_mode, ReplaceMode::RemoveThenRename);
    }

    #[test]
    fn open_creates_all_three_files() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new(dir.path()).with_replace_mode(ReplaceMode::RenameOver);
        let stores = Stores::open(&config).unwrap();
        assert!(config.students_path().exists());
        assert!(config.schedules_path().exists());
        assert!(config.results_path().exists());
        assert_eq!(stores.data_dir(), Some(dir.path()));
    }
}
