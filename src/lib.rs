//! Core library surface for the campus records stores.
//!
//! Student admission records live in a labeled-line text file; schedule
//! entries and published results live in files of fixed-size binary records.
//! Deletes and whole-file updates on either kind go through the same
//! copy-filter-replace rewrite, so a store is only ever replaced by a fully
//! written and synced copy.
pub mod db;
pub mod field;
pub mod grade;
pub mod models;

/// Store handles and their configuration, as opened by `main.rs`.
pub use db::{ReplaceMode, ResultStore, ScheduleStore, StoreConfig, StoreError, StoreResult, Stores, StudentStore};

/// The domain types the stores read and write.
pub use grade::Grade;
pub use models::{
    AcademicScheduleEntry, ResultEntry, ResultUpdate, RoutineInfo, ScheduleKind, ScheduleUpdate,
    StudentRecord, StudentUpdate,
};
