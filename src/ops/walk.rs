//! Recursive directory traversal shared by archiving and export.
//!
//! The walker runs in two passes: `count_files` totals the regular files under
//! a root so progress has a denominator, then `walk_tree` visits every entry
//! in file-name order. Symbolic links are never followed and never visited.

use crate::errors::BackupError;
use crate::task::Task;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::{DirEntry, WalkDir};

/// Receives the entries found by `walk_tree`.
///
/// `relative` is the entry's path below the walk root, joined onto the base
/// passed to `walk_tree`.
pub trait TreeVisitor {
    fn visit_dir(&mut self, source: &Path, relative: &Path) -> Result<(), BackupError>;
    fn visit_file(&mut self, source: &Path, relative: &Path) -> Result<(), BackupError>;
}

/// State threaded through one traversal: the task and the file counters.
pub struct WalkContext<'t> {
    task: &'t Task,
    total: usize,
    done: usize,
    report_files: bool,
}

impl<'t> WalkContext<'t> {
    /// A context that reports `done / total` per file, counting `root` first.
    pub fn counted(task: &'t Task, root: &Path) -> Result<Self, BackupError> {
        let total = count_files(root)?;
        Ok(WalkContext {
            task,
            total,
            done: 0,
            report_files: true,
        })
    }

    /// A context that only checks for cancellation and reports nothing.
    pub fn silent(task: &'t Task) -> Self {
        WalkContext {
            task,
            total: 0,
            done: 0,
            report_files: false,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn done(&self) -> usize {
        self.done
    }

    fn file_done(&mut self, source: &Path) {
        self.done += 1;
        if self.report_files {
            self.task.set_detail(&source.to_string_lossy());
            if self.total > 0 {
                self.task.set_percent(self.done as f64 / self.total as f64);
            }
        }
    }
}

fn walker(root: &Path) -> WalkDir {
    WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
}

fn walk_error(root: &Path, err: walkdir::Error) -> BackupError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    BackupError::io(path, err.into())
}

/// Counts the regular files under `root`, ignoring symbolic links.
pub fn count_files(root: &Path) -> Result<usize, BackupError> {
    let mut count = 0;
    for entry in walker(root) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Returns true if `path` itself is a symbolic link.
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Visits `root` and everything below it in deterministic order.
///
/// The abort flag is checked before each entry; an aborted task stops the
/// walk with `BackupError::Canceled` before the entry is visited. `root` may
/// be a file, in which case it is the only entry visited.
pub fn walk_tree<V: TreeVisitor>(
    root: &Path,
    base: &Path,
    ctx: &mut WalkContext<'_>,
    visitor: &mut V,
) -> Result<(), BackupError> {
    for entry in walker(root) {
        ctx.task.check_aborted()?;

        let entry = entry.map_err(|e| walk_error(root, e))?;
        let relative = relative_to(root, base, &entry);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            trace!("Skipping symbolic link {:?}", entry.path());
        } else if file_type.is_dir() {
            visitor.visit_dir(entry.path(), &relative)?;
        } else if file_type.is_file() {
            visitor.visit_file(entry.path(), &relative)?;
            ctx.file_done(entry.path());
        }
    }
    Ok(())
}

fn relative_to(root: &Path, base: &Path, entry: &DirEntry) -> PathBuf {
    match entry.path().strip_prefix(root) {
        Ok(rest) if !rest.as_os_str().is_empty() => base.join(rest),
        _ => base.to_path_buf(),
    }
}

/// Copies a file or directory tree, skipping symbolic links.
pub struct CopyVisitor {
    destination: PathBuf,
}

impl CopyVisitor {
    /// Copies entries into paths relative to `destination`.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        CopyVisitor {
            destination: destination.into(),
        }
    }

    fn target(&self, relative: &Path) -> PathBuf {
        if relative.as_os_str().is_empty() {
            self.destination.clone()
        } else {
            self.destination.join(relative)
        }
    }
}

impl TreeVisitor for CopyVisitor {
    fn visit_dir(&mut self, _source: &Path, relative: &Path) -> Result<(), BackupError> {
        let target = self.target(relative);
        fs::create_dir_all(&target).map_err(|e| BackupError::io(&target, e))
    }

    fn visit_file(&mut self, source: &Path, relative: &Path) -> Result<(), BackupError> {
        let target = self.target(relative);
        fs::copy(source, &target)
            .map(|_| ())
            .map_err(|e| BackupError::io(source, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        dirs: Vec<PathBuf>,
        files: Vec<PathBuf>,
    }

    impl TreeVisitor for Recorder {
        fn visit_dir(&mut self, _source: &Path, relative: &Path) -> Result<(), BackupError> {
            self.dirs.push(relative.to_path_buf());
            Ok(())
        }

        fn visit_file(&mut self, _source: &Path, relative: &Path) -> Result<(), BackupError> {
            self.files.push(relative.to_path_buf());
            Ok(())
        }
    }

    fn sample_tree() -> TempDir {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().join("root");
        fs::create_dir_all(root.join("b/inner")).expect("create dirs");
        fs::write(root.join("a.txt"), "a").expect("write a");
        fs::write(root.join("b/c.txt"), "c").expect("write c");
        fs::write(root.join("b/inner/d.txt"), "d").expect("write d");
        temp_dir
    }

    #[test]
    fn test_count_files() {
        let temp_dir = sample_tree();
        assert_eq!(count_files(&temp_dir.path().join("root")).unwrap(), 3);
    }

    #[test]
    fn test_walk_visits_in_sorted_order_under_base() {
        let temp_dir = sample_tree();
        let root = temp_dir.path().join("root");
        let task = Task::new();
        let mut ctx = WalkContext::counted(&task, &root).unwrap();
        let mut recorder = Recorder::default();

        walk_tree(&root, Path::new("Notes"), &mut ctx, &mut recorder).unwrap();

        assert_eq!(
            recorder.dirs,
            vec![
                PathBuf::from("Notes"),
                PathBuf::from("Notes/b"),
                PathBuf::from("Notes/b/inner"),
            ]
        );
        assert_eq!(
            recorder.files,
            vec![
                PathBuf::from("Notes/a.txt"),
                PathBuf::from("Notes/b/c.txt"),
                PathBuf::from("Notes/b/inner/d.txt"),
            ]
        );
        assert_eq!(ctx.done(), 3);
        assert_eq!(task.percent(), 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let temp_dir = sample_tree();
        let root = temp_dir.path().join("root");
        let outside = temp_dir.path().join("outside.txt");
        fs::write(&outside, "secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), root.join("loop")).unwrap();

        let task = Task::new();
        let mut ctx = WalkContext::counted(&task, &root).unwrap();
        let mut recorder = Recorder::default();
        walk_tree(&root, Path::new(""), &mut ctx, &mut recorder).unwrap();

        assert_eq!(ctx.total(), 3, "links are not counted");
        assert!(!recorder.files.iter().any(|f| f.ends_with("link.txt")));
        assert!(!recorder.dirs.iter().any(|d| d.ends_with("loop")));
    }

    #[test]
    fn test_walk_stops_when_aborted() {
        let temp_dir = sample_tree();
        let root = temp_dir.path().join("root");
        let task = Task::new();
        task.abort();
        let mut ctx = WalkContext::silent(&task);
        let mut recorder = Recorder::default();

        let result = walk_tree(&root, Path::new(""), &mut ctx, &mut recorder);

        assert!(matches!(result, Err(BackupError::Canceled)));
        assert!(recorder.dirs.is_empty() && recorder.files.is_empty());
    }

    #[test]
    fn test_copy_visitor_copies_tree() {
        let temp_dir = sample_tree();
        let root = temp_dir.path().join("root");
        let target = temp_dir.path().join("copy");
        let task = Task::new();
        let mut ctx = WalkContext::silent(&task);

        walk_tree(&root, Path::new(""), &mut ctx, &mut CopyVisitor::new(&target)).unwrap();

        assert_eq!(fs::read_to_string(target.join("b/inner/d.txt")).unwrap(), "d");
        assert_eq!(task.percent(), 0.0, "silent walks do not report progress");
    }
}
