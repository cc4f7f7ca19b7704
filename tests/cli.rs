use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn run(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_campus-records"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run campus-records")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn student_commands_round_trip_through_the_files() {
    let dir = tempdir().unwrap();
    let added = run(
        dir.path(),
        &[
            "student", "add", "--first-name", "Rahim", "--last-name", "Uddin", "--id", "S1",
            "--department", "CSE", "--mobile", "0171",
        ],
    );
    assert!(added.status.success(), "{added:?}");

    let shown = run(dir.path(), &["student", "show", "--id", "S1", "--department", "CSE"]);
    assert!(stdout(&shown).contains("Mobile Number: 0171"));

    let deleted = run(dir.path(), &["student", "delete", "--id", "S1", "--department", "CSE"]);
    assert!(stdout(&deleted).contains("Removed 1 student record"));

    let missing = run(dir.path(), &["student", "show", "--id", "S1", "--department", "CSE"]);
    assert!(missing.status.success());
    assert!(stdout(&missing).contains("No student S1 in CSE"));
}

#[test]
fn invalid_input_fails_without_writing() {
    let dir = tempdir().unwrap();
    let output = run(
        dir.path(),
        &[
            "result", "add", "--id", "S1", "--name", "Rahim", "--intake", "50", "--section", "2",
            "--gpa", "4.5",
        ],
    );
    assert!(!output.status.success());
    assert_eq!(std::fs::metadata(dir.path().join("results.dat")).unwrap().len(), 0);
}

#[test]
fn schedule_listing_groups_by_type() {
    let dir = tempdir().unwrap();
    for args in [
        &[
            "schedule", "add", "--intake", "50", "--section", "2", "--type", "other event",
            "--details", "Sports day",
        ][..],
        &[
            "schedule", "add", "--intake", "50", "--section", "2", "--type", "Class Routine",
            "--day", "Sunday", "--time", "10:00", "--room", "R501",
        ][..],
    ] {
        assert!(run(dir.path(), args).status.success());
    }

    let listed = stdout(&run(dir.path(), &["schedule", "list", "--intake", "50", "--section", "2"]));
    let class = listed.find("== Class Routine ==").unwrap();
    let other = listed.find("== Other Event ==").unwrap();
    assert!(class < other);
    assert!(listed.contains("Details: Sports day"));
}
