use std::io::Write;
use std::path::PathBuf;

use campus_records::models::{RoutineInfo, ScheduleKind, ScheduleUpdate, StudentRecord, StudentUpdate};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

#[derive(Parser, Debug)]
#[command(name = "campus-records", version, about = "Student, schedule and result records kept in plain files")]
pub struct Cli {
    /// Directory holding students.txt, schedules.dat and results.dat
    /// (defaults to $CAMPUS_RECORDS_DIR, then ~/.campus-records)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Replace rewritten files with a single rename instead of remove + rename
    #[arg(long, global = true)]
    pub atomic_replace: bool,

    /// env_logger-style filter string (e.g. "debug"); overrides RUST_LOG/defaults
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Admission records
    #[command(subcommand)]
    Student(StudentCommand),
    /// Academic calendar entries
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Published results
    #[command(subcommand)]
    Result(ResultCommand),
}

#[derive(Subcommand, Debug)]
pub enum StudentCommand {
    Add(StudentFields),
    /// Every student in a department
    List {
        #[arg(long)]
        department: String,
    },
    /// First student with this ID in a department
    Show(StudentKey),
    /// Students whose full name contains a fragment (case-sensitive)
    Search {
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: String,
    },
    /// Students of one intake and section
    Cohort {
        #[arg(long)]
        department: String,
        #[arg(long)]
        intake: String,
        #[arg(long)]
        section: String,
    },
    /// Change the first matching student; omitted fields keep their value
    Update {
        #[command(flatten)]
        key: StudentKey,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[command(flatten)]
        fields: StudentUpdateFields,
    },
    /// Remove every student with this key
    Delete(StudentKey),
    /// Report blocks that do not follow the expected layout
    Check,
}

#[derive(Args, Debug)]
pub struct StudentKey {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub department: String,
}

#[derive(Args, Debug)]
pub struct StudentFields {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub department: String,
    #[command(flatten)]
    pub details: StudentUpdateFields,
}

/// Optional student fields shared by `add` and `update`.
#[derive(Args, Debug, Default)]
pub struct StudentUpdateFields {
    #[arg(long, default_value = "")]
    pub father_name: String,
    #[arg(long, default_value = "")]
    pub mother_name: String,
    #[arg(long, default_value = "")]
    pub intake: String,
    #[arg(long, default_value = "")]
    pub section: String,
    #[arg(long, default_value = "")]
    pub present_address: String,
    #[arg(long, default_value = "")]
    pub permanent_address: String,
    #[arg(long, default_value = "")]
    pub blood_group: String,
    #[arg(long, default_value = "")]
    pub mobile: String,
    #[arg(long, default_value = "")]
    pub backup_mobile: String,
    #[arg(long, default_value = "")]
    pub email: String,
}

impl StudentFields {
    pub fn into_record(self) -> StudentRecord {
        let details = self.details;
        StudentRecord {
            first_name: self.first_name,
            last_name: self.last_name,
            father_name: details.father_name,
            mother_name: details.mother_name,
            student_id: self.id,
            department: self.department,
            intake: details.intake,
            section: details.section,
            present_address: details.present_address,
            permanent_address: details.permanent_address,
            blood_group: details.blood_group,
            mobile: details.mobile,
            backup_mobile: details.backup_mobile,
            email: details.email,
        }
    }
}

impl StudentUpdateFields {
    pub fn into_update(self, first_name: String, last_name: String) -> StudentUpdate {
        StudentUpdate {
            first_name,
            last_name,
            father_name: self.father_name,
            mother_name: self.mother_name,
            intake: self.intake,
            section: self.section,
            present_address: self.present_address,
            permanent_address: self.permanent_address,
            blood_group: self.blood_group,
            mobile: self.mobile,
            backup_mobile: self.backup_mobile,
            email: self.email,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Add an entry; routine types need --day, --time and --room, others --details
    Add {
        #[command(flatten)]
        key: ScheduleKey,
        #[command(flatten)]
        fields: ScheduleFields,
    },
    /// Entries for one intake and section, grouped by type
    List {
        #[arg(long)]
        intake: String,
        #[arg(long)]
        section: String,
    },
    /// Change the first matching entry; omitted fields keep their value
    Update {
        #[command(flatten)]
        key: ScheduleKey,
        #[command(flatten)]
        fields: ScheduleFields,
    },
    /// Remove every entry with this key
    Delete(ScheduleKey),
}

#[derive(Args, Debug)]
pub struct ScheduleKey {
    #[arg(long)]
    pub intake: String,
    #[arg(long)]
    pub section: String,
    /// One of: Class Routine, Mid Exam Routine, Final Exam Routine,
    /// Result Publication Date, Other Event (case-insensitive)
    #[arg(long = "type")]
    pub kind: ScheduleKind,
}

#[derive(Args, Debug, Default)]
pub struct ScheduleFields {
    #[arg(long, default_value = "")]
    pub day: String,
    #[arg(long, default_value = "")]
    pub date: String,
    #[arg(long, default_value = "")]
    pub time: String,
    #[arg(long, default_value = "")]
    pub room: String,
    #[arg(long, default_value = "")]
    pub faculty: String,
    #[arg(long, default_value = "")]
    pub details: String,
}

impl ScheduleFields {
    pub fn routine(&self) -> RoutineInfo {
        RoutineInfo {
            day: self.day.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            room: self.room.clone(),
            faculty: self.faculty.clone(),
        }
    }

    pub fn into_update(self) -> ScheduleUpdate {
        ScheduleUpdate {
            routine: self.routine(),
            details: self.details,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ResultCommand {
    Add {
        #[command(flatten)]
        key: ResultKey,
        #[arg(long)]
        name: String,
        #[arg(long)]
        gpa: f32,
    },
    /// First result with this key
    Show(ResultKey),
    /// Every result for one intake and section
    List {
        #[arg(long)]
        intake: String,
        #[arg(long)]
        section: String,
    },
    /// Change the name or GPA of the first matching result
    Update {
        #[command(flatten)]
        key: ResultKey,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        gpa: Option<f32>,
    },
    /// Remove every result with this key
    Delete(ResultKey),
}

#[derive(Args, Debug)]
pub struct ResultKey {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub intake: String,
    #[arg(long)]
    pub section: String,
}

pub const DEFAULT_LOG_FILTER: &str = "warn,campus_records=info";

pub fn init_logging(cli_filter: Option<&str>) {
    let env = Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = cli_filter {
        builder.parse_filters(filter);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.init();
}
