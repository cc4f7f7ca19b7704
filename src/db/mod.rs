//! File-backed persistence split across logical submodules.

mod connection;
mod error;
mod handle;
mod layout;
mod record_file;
mod results;
mod rewrite;
mod schedules;
mod student_text;
mod students;

pub use connection::{StoreConfig, Stores, DATA_DIR_ENV, RESULTS_FILE, SCHEDULES_FILE, STUDENTS_FILE};
pub use error::{StoreError, StoreResult};
pub use record_file::{FixedRecord, Located, RecordFile};
pub use results::ResultStore;
pub use rewrite::{temp_path, ReplaceMode};
pub use schedules::{group_by_kind, ScheduleStore, LIST_CAPACITY};
pub use students::{StudentQuery, StudentStore};
