//! Integration tests for HTML export.

mod common;

use common::create_fixture_notebook;
use notebook_archiver::errors::{BackupError, NotebookError};
use notebook_archiver::notebook::{FsNotebook, Node};
use notebook_archiver::ops;
use notebook_archiver::task::{TaskState, TaskUpdate};
use notebook_archiver::{Notebook, Task};
use std::fs;
use tempfile::TempDir;

/// A notebook that aborts the task the first time a link target is looked
/// up, i.e. while the exporter is in the middle of the tree.
struct AbortOnLookup<'t> {
    inner: FsNotebook,
    task: &'t Task,
}

impl Notebook for AbortOnLookup<'_> {
    fn root(&self) -> &Node {
        self.inner.root()
    }

    fn save(&self) -> Result<(), NotebookError> {
        self.inner.save()
    }

    fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.task.abort();
        self.inner.node_by_id(id)
    }
}

#[test]
fn test_export_layout_mirrors_notebook() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    let task = Task::new();
    let report = ops::export_notebook(&fixture.notebook, &destination, &task).unwrap();

    assert_eq!(report.export_path, destination);
    assert_eq!(report.nodes_exported, 4);
    assert_eq!(report.pages_rewritten, 3);
    assert_eq!(report.pages_copied, 0);
    assert_eq!(task.state(), TaskState::Finished);

    for file in [
        "index.html",
        "tree.html",
        "Alpha/page.html",
        "Alpha/image.png",
        "Beta/page.html",
        "Beta/Gamma/page.html",
        "files/data.txt",
    ] {
        assert!(destination.join(file).is_file(), "missing {}", file);
    }
    assert_eq!(
        fs::read(destination.join("Alpha").join("image.png")).unwrap(),
        fs::read(temp_dir.path().join("Work").join("Alpha").join("image.png")).unwrap()
    );
}

#[test]
fn test_export_rewrites_internal_links() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    ops::export_notebook(&fixture.notebook, &destination, &Task::new()).unwrap();

    let alpha = fs::read_to_string(destination.join("Alpha").join("page.html")).unwrap();
    assert!(alpha.contains("href=\"../Beta/page.html\""), "{}", alpha);
    assert!(alpha.contains("href=\"https://example.com/\""));
    assert!(!alpha.contains("nbk://"));
    assert!(!alpha.contains("<?xml"));

    let gamma =
        fs::read_to_string(destination.join("Beta").join("Gamma").join("page.html")).unwrap();
    assert!(gamma.contains("href=\"../../Alpha/page.html\""), "{}", gamma);
}

#[test]
fn test_export_index_and_tree() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    ops::export_notebook(&fixture.notebook, &destination, &Task::new()).unwrap();

    let index = fs::read_to_string(destination.join("index.html")).unwrap();
    assert!(index.contains("<title>Work</title>"));
    assert!(index.contains("src=\"tree.html\""));

    let tree = fs::read_to_string(destination.join("tree.html")).unwrap();
    assert!(tree.contains("<a href=\"Alpha/page.html\" target=\"viewer\">Alpha</a>"));
    assert!(tree.contains("<a href=\"Beta/Gamma/page.html\" target=\"viewer\">Gamma</a>"));
    let alpha_at = tree.find("Alpha/page.html").unwrap();
    let beta_at = tree.find("Beta/page.html").unwrap();
    assert!(beta_at < alpha_at, "children keep notebook order");
}

#[test]
fn test_unparseable_page_is_copied_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Broken");
    let mut notebook = FsNotebook::create(&notebook_dir, "Broken").unwrap();
    let root_id = notebook.root().id().to_string();
    let markup = "<p>unclosed <b>bold</p> &nbsp; <br>";
    notebook.add_page(&root_id, "Bad", "Bad", markup).unwrap();
    let destination = temp_dir.path().join("html");

    let report = ops::export_notebook(&notebook, &destination, &Task::new()).unwrap();

    assert_eq!(report.pages_copied, 1);
    assert_eq!(report.pages_rewritten, 0);
    assert_eq!(
        fs::read_to_string(destination.join("Bad").join("page.html")).unwrap(),
        markup
    );
}

#[test]
fn test_export_refuses_existing_destination() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");
    fs::create_dir(&destination).unwrap();

    let result = ops::export_notebook(&fixture.notebook, &destination, &Task::new());

    assert!(matches!(result, Err(BackupError::AlreadyExists { .. })));
    assert!(fs::read_dir(&destination).unwrap().next().is_none());
}

#[test]
fn test_aborted_export() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    let task = Task::new();
    task.abort();
    let result = ops::export_notebook(&fixture.notebook, &destination, &task);

    assert!(matches!(result, Err(BackupError::Canceled)));
}

#[test]
fn test_export_progress_counts_nodes() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    let task = Task::new();
    let updates = task.subscribe();
    ops::export_notebook(&fixture.notebook, &destination, &task).unwrap();

    let mut percents: Vec<f64> = updates
        .try_iter()
        .filter_map(|update| match update {
            TaskUpdate::Percent(p) => Some(p),
            _ => None,
        })
        .collect();
    percents.dedup();

    assert_eq!(percents, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(task.text(), "Closing export...");
}

#[test]
fn test_abort_between_files_stops_export() {
    let temp_dir = TempDir::new().unwrap();
    let fixture = create_fixture_notebook(&temp_dir.path().join("Work"));
    let destination = temp_dir.path().join("html");

    let task = Task::new();
    let notebook = AbortOnLookup {
        inner: fixture.notebook,
        task: &task,
    };
    let result = ops::export_notebook(&notebook, &destination, &task);

    assert!(matches!(result, Err(BackupError::Canceled)));
    // Beta comes first; Gamma's page links to Alpha, so the abort lands
    // after Gamma's page and before the rest of its folder is copied.
    let gamma = destination.join("Beta").join("Gamma");
    assert!(destination.join("Beta").join("page.html").is_file());
    assert!(gamma.join("page.html").is_file());
    assert!(!gamma.join("node.json").exists());
    assert!(!destination.join("Alpha").exists());
    assert!(!destination.join("tree.html").exists());
}

#[cfg(unix)]
#[test]
fn test_export_skips_symlinks() {
    use std::os::unix::fs::symlink;

    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Work");
    let fixture = create_fixture_notebook(&notebook_dir);
    let outside = temp_dir.path().join("outside.txt");
    fs::write(&outside, "secret").unwrap();
    symlink(&outside, notebook_dir.join("Alpha").join("link.txt")).unwrap();
    symlink(&outside, notebook_dir.join("files").join("link.txt")).unwrap();
    let destination = temp_dir.path().join("html");

    ops::export_notebook(&fixture.notebook, &destination, &Task::new()).unwrap();

    assert!(fs::symlink_metadata(destination.join("Alpha").join("link.txt")).is_err());
    assert!(fs::symlink_metadata(destination.join("files").join("link.txt")).is_err());
    assert!(destination.join("files").join("data.txt").is_file());
}

#[cfg(target_os = "linux")]
#[test]
fn test_export_non_utf8_child_folder() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = TempDir::new().unwrap();
    let notebook_dir = temp_dir.path().join("Latin");
    FsNotebook::create(&notebook_dir, "Latin").unwrap();
    let name = OsStr::from_bytes(b"caf\xe9");
    let child = notebook_dir.join(name);
    fs::create_dir(&child).unwrap();
    fs::write(
        child.join("node.json"),
        r#"{"id":"cafe-id","title":"Cafe","content_type":"text/xhtml+xml"}"#,
    )
    .unwrap();
    fs::write(child.join("page.html"), "<html><body><p>menu</p></body></html>").unwrap();
    fs::write(child.join("photo.jpg"), "jpeg").unwrap();

    let notebook = FsNotebook::open(&notebook_dir).unwrap();
    assert_eq!(notebook.root().children()[0].basename(), name);
    let destination = temp_dir.path().join("html");

    let report = ops::export_notebook(&notebook, &destination, &Task::new()).unwrap();

    assert_eq!(report.nodes_exported, 2);
    assert_eq!(report.pages_rewritten, 1);
    assert!(destination.join(name).join("page.html").is_file());
    assert!(destination.join(name).join("photo.jpg").is_file());
    assert!(!destination.join(name).join(name).exists());
}
