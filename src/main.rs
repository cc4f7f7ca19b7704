//! Command-line front end: resolve the data directory, open the three stores
//! and run exactly one store operation per invocation.
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use campus_records::db::{group_by_kind, ReplaceMode, StoreConfig, Stores};
use campus_records::models::{AcademicScheduleEntry, ResultEntry, ResultUpdate, StudentRecord};

use crate::cli::{init_logging, Cli, Command, ResultCommand, ScheduleCommand, StudentCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());

    let replace_mode = if cli.atomic_replace {
        ReplaceMode::RenameOver
    } else {
        ReplaceMode::RemoveThenRename
    };
    let config = StoreConfig::resolve(cli.data_dir)?.with_replace_mode(replace_mode);
    let mut stores = Stores::open(&config)
        .with_context(|| format!("cannot open stores in {}", config.data_dir.display()))?;

    let outcome = match cli.command {
        Command::Student(command) => run_student(&mut stores, command),
        Command::Schedule(command) => run_schedule(&mut stores, command),
        Command::Result(command) => run_result(&mut stores, command),
    };
    if let Err(err) = &outcome {
        if let Some(store_err) = err.downcast_ref::<campus_records::StoreError>() {
            if store_err.is_fatal() || store_err.is_critical() {
                error!("store may need manual attention: {store_err}");
            }
        }
    }
    outcome
}

fn run_student(stores: &mut Stores, command: StudentCommand) -> Result<()> {
    let store = &mut stores.students;
    match command {
        StudentCommand::Add(fields) => {
            let record = store.add(fields.into_record())?;
            println!("Added student {} ({})", record.student_id, record.department);
        }
        StudentCommand::List { department } => {
            print_students(&store.list_department(&department)?);
        }
        StudentCommand::Show(key) => match store.find_by_id(&key.id, &key.department)? {
            Some(record) => println!("{record}"),
            None => println!("No student {} in {}", key.id, key.department),
        },
        StudentCommand::Search { name, department } => {
            print_students(&store.search_by_name(&name, &department)?);
        }
        StudentCommand::Cohort {
            department,
            intake,
            section,
        } => {
            print_students(&store.list_cohort(&department, &intake, &section)?);
        }
        StudentCommand::Update {
            key,
            first_name,
            last_name,
            fields,
        } => {
            let update = fields.into_update(first_name, last_name);
            match store.update_by_id(&key.id, &key.department, &update)? {
                Some(record) => println!("Updated student:\n{record}"),
                None => println!("No student {} in {}", key.id, key.department),
            }
        }
        StudentCommand::Delete(key) => {
            let removed = store
                .delete_by_id(&key.id, &key.department)
                .context("failed to delete student")?;
            report_removed(removed, "student record", "student records");
        }
        StudentCommand::Check => {
            let problems = store.check()?;
            if problems.is_empty() {
                println!("{} is well formed", store.path().display());
            }
            for problem in &problems {
                println!("{problem}");
            }
        }
    }
    Ok(())
}

fn run_schedule(stores: &mut Stores, command: ScheduleCommand) -> Result<()> {
    let store = &mut stores.schedules;
    match command {
        ScheduleCommand::Add { key, fields } => {
            let entry = AcademicScheduleEntry::new(
                &key.intake,
                &key.section,
                key.kind,
                fields.routine(),
                &fields.details,
            )?;
            store.add(&entry)?;
            println!("Added {} for intake {} section {}", entry.kind, entry.intake, entry.section);
        }
        ScheduleCommand::List { intake, section } => {
            let groups = group_by_kind(store.list(&intake, &section)?);
            if groups.is_empty() {
                println!("No schedule for intake {intake} section {section}");
            }
            for (kind, entries) in groups {
                println!("== {kind} ==");
                for entry in entries {
                    println!("{entry}\n");
                }
            }
        }
        ScheduleCommand::Update { key, fields } => {
            match store.update(&key.intake, &key.section, &key.kind, &fields.into_update())? {
                Some(entry) => println!("Updated {}:\n{entry}", entry.kind),
                None => println!("No {} for intake {} section {}", key.kind, key.intake, key.section),
            }
        }
        ScheduleCommand::Delete(key) => {
            let removed = store
                .delete(&key.intake, &key.section, &key.kind)
                .context("failed to delete schedule entries")?;
            report_removed(removed, "schedule entry", "schedule entries");
        }
    }
    Ok(())
}

fn run_result(stores: &mut Stores, command: ResultCommand) -> Result<()> {
    let store = &mut stores.results;
    match command {
        ResultCommand::Add { key, name, gpa } => {
            let entry = ResultEntry::new(&key.id, &name, &key.intake, &key.section, gpa)?;
            store.add(&entry)?;
            println!("Added result {entry}");
        }
        ResultCommand::Show(key) => match store.find(&key.id, &key.intake, &key.section)? {
            Some(located) => println!("{}", located.record),
            None => println!("No result for {}", key.id),
        },
        ResultCommand::List { intake, section } => {
            let results = store.list(&intake, &section)?;
            if results.is_empty() {
                println!("No results for intake {intake} section {section}");
            }
            for entry in results {
                println!("{entry}");
            }
        }
        ResultCommand::Update { key, name, gpa } => {
            let update = ResultUpdate { name, gpa };
            match store.update(&key.id, &key.intake, &key.section, &update)? {
                Some(entry) => println!("Updated result {entry}"),
                None => println!("No result for {}", key.id),
            }
        }
        ResultCommand::Delete(key) => {
            let removed = store
                .delete(&key.id, &key.intake, &key.section)
                .context("failed to delete results")?;
            report_removed(removed, "result", "results");
        }
    }
    Ok(())
}

fn print_students(records: &[StudentRecord]) {
    if records.is_empty() {
        println!("No matching students");
    }
    for record in records {
        println!("{record}\n");
    }
}

fn report_removed(removed: usize, one: &str, many: &str) {
    match removed {
        0 => println!("No matching {one} found"),
        1 => println!("Removed 1 {one}"),
        n => println!("Removed {n} {many}"),
    }
}
