//! End-to-end tests of the command-line binary.

mod common;

use common::{base_command, create_fixture_notebook, snapshot};
use notebook_archiver::notebook::FsNotebook;
use notebook_archiver::Notebook;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Writes `files` pages of `size` pseudo-random bytes each, so that
/// compressing the notebook takes a noticeable while.
fn create_bulky_notebook(path: &Path, files: usize, size: usize) {
    let mut notebook = FsNotebook::create(path, "Bulky").unwrap();
    let root_id = notebook.root().id().to_string();
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for i in 0..files {
        let name = format!("Page {}", i);
        notebook
            .add_page(&root_id, &name, &name, "<html><body/></html>")
            .unwrap();
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            data.extend_from_slice(&state.to_le_bytes());
        }
        fs::write(path.join(&name).join("blob.bin"), data).unwrap();
    }
}

#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = base_command(temp_dir.path());

    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("archive"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("export"));
}

#[test]
#[serial]
fn test_cli_archive_and_restore() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    create_fixture_notebook(&notebook_dir);
    let archive_path = temp_dir.path().join("work.zip");

    base_command(temp_dir.path())
        .arg("archive")
        .arg(&notebook_dir)
        .arg(&archive_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Notebook archived"));
    assert!(archive_path.is_file());

    let restored = temp_dir.path().join("Restored");
    base_command(temp_dir.path())
        .arg("restore")
        .arg(&archive_path)
        .arg(&restored)
        .assert()
        .success()
        .stdout(predicate::str::contains("Notebook restored"));

    assert_eq!(snapshot(&restored), snapshot(&notebook_dir));
}

#[test]
#[serial]
fn test_cli_archive_defaults_to_archive_dir() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    create_fixture_notebook(&notebook_dir);
    let archive_dir = temp_dir.path().join("backups");

    base_command(&archive_dir)
        .env("NBARCHIVE_FORMAT", "zip")
        .arg("archive")
        .arg(&notebook_dir)
        .assert()
        .success();

    let names: Vec<String> = fs::read_dir(&archive_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("Work-"));
    assert!(names[0].ends_with(".zip"));
}

#[test]
#[serial]
fn test_cli_archive_appends_missing_extension() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    create_fixture_notebook(&notebook_dir);

    base_command(temp_dir.path())
        .arg("archive")
        .arg(&notebook_dir)
        .arg(temp_dir.path().join("work"))
        .assert()
        .success();

    assert!(temp_dir.path().join("work.tar.gz").is_file());
}

#[test]
#[serial]
fn test_cli_archive_existing_output_fails() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    create_fixture_notebook(&notebook_dir);
    let archive_path = temp_dir.path().join("work.tar.gz");
    fs::write(&archive_path, "taken").unwrap();

    base_command(temp_dir.path())
        .arg("archive")
        .arg(&notebook_dir)
        .arg(&archive_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error while archiving notebook"))
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&archive_path).unwrap(), "taken");
}

#[test]
#[serial]
fn test_cli_export() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    create_fixture_notebook(&notebook_dir);
    let destination = temp_dir.path().join("html");

    base_command(temp_dir.path())
        .arg("export")
        .arg(&notebook_dir)
        .arg(&destination)
        .assert()
        .success()
        .stdout(predicate::str::contains("Notebook exported"));

    assert!(destination.join("index.html").is_file());
    assert!(destination.join("Alpha").join("page.html").is_file());
}

#[test]
#[serial]
fn test_cli_missing_notebook_fails() {
    let temp_dir = TempDir::new().unwrap();

    base_command(temp_dir.path())
        .arg("export")
        .arg(temp_dir.path().join("nothing-here"))
        .arg(temp_dir.path().join("html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Notebook not found"));
}

#[cfg(unix)]
#[test]
#[serial]
fn test_cli_interrupt_removes_partial_archive() {
    use std::process::{Command, Stdio};
    use std::thread;
    use std::time::{Duration, Instant};

    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Bulky");
    create_bulky_notebook(&notebook_dir, 24, 4 * 1024 * 1024);
    let archive_path = temp_dir.path().join("bulky.tar.gz");

    let mut child = Command::new(assert_cmd::cargo::cargo_bin("notebook-archiver"))
        .env_clear()
        .env("HOME", "/tmp")
        .env("NBARCHIVE_DIR", temp_dir.path())
        .arg("--quiet")
        .arg("archive")
        .arg(&notebook_dir)
        .arg(&archive_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Interrupt once the archive file exists, i.e. mid-write.
    let started = Instant::now();
    while !archive_path.exists() {
        assert!(
            started.elapsed() < Duration::from_secs(60),
            "archive was never started"
        );
        thread::sleep(Duration::from_millis(10));
    }
    let sent = Command::new("kill")
        .arg("-INT")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(sent.success());

    let status = child.wait().unwrap();
    assert!(status.success(), "a canceled archive exits cleanly: {:?}", status);
    assert!(!archive_path.exists(), "partial archive left behind");
}
