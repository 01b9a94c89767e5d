/// Integration tests for the CLI interface
use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn ecard_cmd() -> Command {
    Command::cargo_bin("ecard-reader").expect("Failed to find ecard-reader binary")
}

#[test]
fn test_help_command() {
    let mut cmd = ecard_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Austrian e-card"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("dump"));
}

#[test]
fn test_version_command() {
    let mut cmd = ecard_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecard-reader"));
}

#[test]
#[serial]
fn test_list_command_runs() {
    // Succeeds with a listing, or fails cleanly when no PC/SC service exists;
    // either way it must not panic
    let mut cmd = ecard_cmd();
    cmd.arg("list").assert().code(predicate::in_iter([0, 1]));
}

#[test]
#[serial]
fn test_list_command_detailed_runs() {
    let mut cmd = ecard_cmd();
    cmd.arg("list")
        .arg("--detailed")
        .assert()
        .code(predicate::in_iter([0, 1]));
}

#[test]
fn test_invalid_command() {
    let mut cmd = ecard_cmd();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
#[serial]
fn test_read_unknown_reader_fails() {
    let mut cmd = ecard_cmd();
    cmd.arg("read")
        .arg("No Such Reader 0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read identity").or(
            predicate::str::contains("Failed to initialize PC/SC"),
        ));
}

#[test]
#[serial]
fn test_read_out_of_range_index_fails() {
    let mut cmd = ecard_cmd();
    cmd.arg("read").arg("999").assert().failure();
}

#[test]
fn test_read_with_missing_profile_file() {
    let mut cmd = ecard_cmd();
    cmd.arg("read")
        .arg("--profile")
        .arg("/nonexistent/profile.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("profile"));
}

#[test]
fn test_read_with_invalid_profile_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not json at all").unwrap();

    let mut cmd = ecard_cmd();
    cmd.arg("read")
        .arg("--profile")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse"));
}

#[test]
fn test_read_with_invalid_profile_ef_id() {
    // Structurally valid JSON, semantically invalid profile
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"{
            "name": "broken",
            "aid": "D040000017010101",
            "ef_id": "EF",
            "read_chunk": 224,
            "max_file_size": 4096,
            "tags": {
                "last_name": 130,
                "first_name": 129,
                "birth_date": 131,
                "sex": 132,
                "svnr": [128]
            }
        }"#,
    )
    .unwrap();

    let mut cmd = ecard_cmd();
    cmd.arg("read")
        .arg("--profile")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("EF id"));
}

#[test]
#[serial]
fn test_dump_unknown_reader_fails() {
    let mut cmd = ecard_cmd();
    cmd.arg("dump")
        .arg("No Such Reader 0")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("Failed to connect")
                .or(predicate::str::contains("Failed to initialize PC/SC")),
        );
}

#[test]
fn test_read_rejects_invalid_aid_override() {
    // Profile handling runs before any PC/SC access, so no hardware needed
    let mut cmd = ecard_cmd();
    cmd.arg("read")
        .arg("--aid")
        .arg("not-hex")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--aid"));
}

#[test]
fn test_dump_rejects_empty_aid_override() {
    let mut cmd = ecard_cmd();
    cmd.arg("dump")
        .arg("--aid")
        .arg("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AID"));
}

#[test]
fn test_dump_rejects_unknown_format() {
    let mut cmd = ecard_cmd();
    cmd.arg("dump")
        .arg("--format")
        .arg("binary")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
