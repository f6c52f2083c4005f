//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use assert_cmd::Command;
use notebook_archiver::notebook::{node_url, FsNotebook};
use notebook_archiver::Notebook;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ids of the pages in the fixture notebook.
pub struct Fixture {
    pub notebook: FsNotebook,
    pub alpha: String,
    pub beta: String,
    pub gamma: String,
}

/// Builds a small notebook at `path`:
///
/// ```text
/// Work/
///   node.json
///   files/data.txt
///   Alpha/  (page linking to Beta, with image.png)
///   Beta/   (page)
///     Gamma/ (page linking to Alpha)
/// ```
pub fn create_fixture_notebook(path: &Path) -> Fixture {
    let mut notebook = FsNotebook::create(path, "Work").expect("create notebook");
    let root_id = notebook.root().id().to_string();

    let beta = notebook
        .add_page(
            &root_id,
            "Beta",
            "Beta",
            "<html><body><p>Second page</p></body></html>",
        )
        .expect("add beta");
    let alpha = notebook
        .add_page(
            &root_id,
            "Alpha",
            "Alpha",
            &format!(
                "<?xml version=\"1.0\"?>\n<html><body><p>See <a href=\"{}\">Beta</a> \
                 and <a href=\"https://example.com/\">the web</a>.</p></body></html>",
                node_url(&beta)
            ),
        )
        .expect("add alpha");
    let gamma = notebook
        .add_page(
            &beta,
            "Gamma",
            "Gamma",
            &format!(
                "<html><body><a href=\"{}\">back</a></body></html>",
                node_url(&alpha)
            ),
        )
        .expect("add gamma");

    fs::write(path.join("Alpha").join("image.png"), [0x89u8, b'P', b'N', b'G', 0, 1, 2])
        .expect("write attachment");
    fs::create_dir(path.join("files")).expect("create files dir");
    fs::write(path.join("files").join("data.txt"), "attached data\n").expect("write data");

    let notebook = FsNotebook::open(path).expect("reopen notebook");
    Fixture {
        notebook,
        alpha,
        beta,
        gamma,
    }
}

/// Every entry below `root` keyed by relative path; files map to their bytes,
/// directories to `None`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("walk entry");
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("strip prefix")
                .to_path_buf();
            let contents = if entry.file_type().is_file() {
                Some(fs::read(entry.path()).expect("read file"))
            } else {
                None
            };
            (relative, contents)
        })
        .collect()
}

/// Creates a command for the binary with a clean, non-interactive environment.
pub fn base_command(archive_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("notebook-archiver").expect("binary not built");
    cmd.env_clear()
        .env("HOME", "/tmp")
        .env("NBARCHIVE_DIR", archive_dir)
        .arg("--quiet");
    if let Ok(path) = std::env::var("PATH") {
        cmd.env("PATH", path);
    }
    if let Ok(tmpdir) = std::env::var("TMPDIR") {
        cmd.env("TMPDIR", tmpdir);
    }
    cmd
}
