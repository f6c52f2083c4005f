//! Restoring notebooks from archives.
//!
//! In rename mode the archive is unpacked into a staging directory next to the
//! destination and its single top-level folder is renamed into place at the
//! end, so the destination only appears once extraction has fully succeeded.
//! Into mode extracts directly into an existing base directory.

use crate::constants::STAGING_SUFFIX;
use crate::errors::BackupError;
use crate::ops::archive::ArchiveFormat;
use crate::task::{Task, TaskMessage};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Message shown to the user when writing the restored notebook fails.
pub const RESTORE_WRITE_ERROR: &str = "File writing error while extracting notebook";

/// Unix file-type bits of a symbolic link, as stored in zip external attributes.
const UNIX_SYMLINK_MODE: u32 = 0o120000;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;

/// How the destination path of a restore is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// The destination is the full path of the new notebook. It must not
    /// exist, and extraction goes through a staging directory.
    Rename,
    /// The destination is a base directory; the archive's notebook folder is
    /// extracted directly inside it, without staging.
    Into,
}

/// Report of a completed restore operation.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// The restored notebook (rename mode) or the base directory (into mode)
    pub restored_path: PathBuf,
    /// Number of archive members extracted, directories included
    pub members_extracted: usize,
    /// Duration taken by the restore
    pub duration: Duration,
}

/// Reader over either archive format.
enum ArchiveReader {
    Tar(PathBuf),
    Zip(ZipArchive<File>),
}

impl ArchiveReader {
    fn open(path: &Path) -> Result<Self, BackupError> {
        let format = ArchiveFormat::detect(path)
            .map_err(|e| BackupError::io(path, e))?
            .ok_or_else(|| BackupError::UnsupportedArchive {
                path: path.to_path_buf(),
            })?;
        debug!("Opening {} archive {:?}", format, path);

        match format {
            ArchiveFormat::TarGz => Ok(ArchiveReader::Tar(path.to_path_buf())),
            ArchiveFormat::Zip => {
                let file = File::open(path).map_err(|e| BackupError::io(path, e))?;
                let zip = ZipArchive::new(file).map_err(|e| BackupError::io(path, e.into()))?;
                Ok(ArchiveReader::Zip(zip))
            }
        }
    }

    fn tar_archive(path: &Path) -> Result<tar::Archive<GzDecoder<File>>, BackupError> {
        let file = File::open(path).map_err(|e| BackupError::io(path, e))?;
        Ok(tar::Archive::new(GzDecoder::new(file)))
    }

    /// Number of members, read in full before any extraction starts.
    fn member_count(&mut self) -> Result<usize, BackupError> {
        match self {
            ArchiveReader::Tar(path) => {
                let mut archive = Self::tar_archive(path)?;
                let entries = archive.entries().map_err(|e| BackupError::io(&*path, e))?;
                let mut count = 0;
                for entry in entries {
                    entry.map_err(|e| BackupError::io(&*path, e))?;
                    count += 1;
                }
                Ok(count)
            }
            ArchiveReader::Zip(zip) => Ok(zip.len()),
        }
    }

    /// Extracts every member below `target`, checking for abort before each.
    fn extract_into(&mut self, target: &Path, task: &Task) -> Result<usize, BackupError> {
        let total = self.member_count()?;
        task.set_message(TaskMessage::Text(format!("Restoring {} files...", total)));

        let report = |index: usize, name: &str| {
            task.set_detail(name);
            task.set_percent((index + 1) as f64 / total as f64);
        };

        match self {
            ArchiveReader::Tar(path) => {
                let mut archive = Self::tar_archive(path)?;
                let entries = archive.entries().map_err(|e| BackupError::io(&*path, e))?;
                for (index, entry) in entries.enumerate() {
                    task.check_aborted()?;
                    let mut entry = entry.map_err(|e| BackupError::io(&*path, e))?;
                    let name = entry
                        .path()
                        .map(|p| p.to_string_lossy().into_owned())
                        .map_err(|e| BackupError::io(&*path, e))?;

                    let entry_type = entry.header().entry_type();
                    if entry_type.is_symlink() || entry_type.is_hard_link() {
                        warn!("Skipping link member {}", name);
                    } else if !entry
                        .unpack_in(target)
                        .map_err(|e| BackupError::io(target.join(&name), e))?
                    {
                        warn!("Skipping member outside the extraction root: {}", name);
                    }
                    report(index, &name);
                }
                Ok(total)
            }
            ArchiveReader::Zip(zip) => {
                for index in 0..total {
                    task.check_aborted()?;
                    let mut member = zip
                        .by_index(index)
                        .map_err(|e| BackupError::io(target, e.into()))?;
                    let name = member.name().to_string();

                    let is_link = member
                        .unix_mode()
                        .is_some_and(|mode| mode & UNIX_FILE_TYPE_MASK == UNIX_SYMLINK_MODE);
                    match member.enclosed_name() {
                        _ if is_link => warn!("Skipping link member {}", name),
                        None => warn!("Skipping member outside the extraction root: {}", name),
                        Some(relative) => {
                            let out_path = target.join(relative);
                            if member.is_dir() {
                                fs::create_dir_all(&out_path)
                                    .map_err(|e| BackupError::io(&out_path, e))?;
                            } else {
                                if let Some(parent) = out_path.parent() {
                                    fs::create_dir_all(parent)
                                        .map_err(|e| BackupError::io(parent, e))?;
                                }
                                let mut out = File::create(&out_path)
                                    .map_err(|e| BackupError::io(&out_path, e))?;
                                io::copy(&mut member, &mut out)
                                    .map_err(|e| BackupError::io(&out_path, e))?;
                            }
                        }
                    }
                    report(index, &name);
                }
                Ok(total)
            }
        }
    }
}

/// Turns raw I/O failures into the user-facing restore error.
fn restore_error(err: BackupError) -> BackupError {
    match err {
        BackupError::Io { path, source } => {
            warn!("Restore failed at {:?}: {}", path, source);
            BackupError::Restore {
                message: RESTORE_WRITE_ERROR.to_string(),
                source,
            }
        }
        other => other,
    }
}

/// Drops trailing separators, so `notes/` names the same notebook as `notes`.
fn normalize_destination(destination: &Path) -> PathBuf {
    destination.components().collect()
}

/// Restores a notebook archive.
///
/// # Arguments
///
/// * `archive` - Path of a `.tar.gz` or `.zip` notebook archive
/// * `destination` - New notebook path (rename mode) or base directory (into mode)
/// * `mode` - How `destination` is interpreted
/// * `task` - Progress and cancellation handle
///
/// # Errors
///
/// Returns an error if:
/// - `destination` is empty (`InvalidArgument`)
/// - The archive cannot be opened or has an unknown format
/// - In rename mode, `destination` already exists (`AlreadyExists`)
/// - In rename mode, the archive does not hold exactly one top-level folder
///   (`MalformedArchive`)
/// - The task is aborted (`Canceled`)
/// - Writing the extracted files fails (`Restore`)
///
/// In rename mode the staging directory, and any parent directories the
/// restore had to create, are removed whenever the restore does not succeed;
/// `destination` is never created.
pub fn restore_notebook(
    archive: &Path,
    destination: &Path,
    mode: RestoreMode,
    task: &Task,
) -> Result<RestoreReport, BackupError> {
    let start_time = Instant::now();

    if destination.as_os_str().is_empty() {
        return Err(BackupError::InvalidArgument(
            "Must specify a path for restoring notebook".to_string(),
        ));
    }
    let destination = normalize_destination(destination);
    info!(
        "Restoring {:?} to {:?} ({:?} mode)",
        archive, destination, mode
    );

    let mut reader = ArchiveReader::open(archive)?;

    let members_extracted = match mode {
        RestoreMode::Rename => restore_staged(&mut reader, &destination, task)?,
        RestoreMode::Into => {
            fs::create_dir_all(&destination)
                .map_err(|e| restore_error(BackupError::io(&destination, e)))?;
            reader
                .extract_into(&destination, task)
                .map_err(restore_error)?
        }
    };

    task.finish();
    let duration = start_time.elapsed();
    info!(
        "Restore completed: {} members in {} ms",
        members_extracted,
        duration.as_millis()
    );

    Ok(RestoreReport {
        restored_path: destination,
        members_extracted,
        duration,
    })
}

fn restore_staged(
    reader: &mut ArchiveReader,
    destination: &Path,
    task: &Task,
) -> Result<usize, BackupError> {
    if fs::symlink_metadata(destination).is_ok() {
        return Err(BackupError::AlreadyExists {
            path: destination.to_path_buf(),
        });
    }

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BackupError::InvalidArgument(format!(
                "restore destination {:?} has no folder name",
                destination
            ))
        })?;

    let created = create_missing_dirs(&parent)
        .map_err(|e| restore_error(BackupError::io(&parent, e)))?;
    let result = extract_staged(reader, &parent, &name, destination, task);
    if result.is_err() {
        for dir in &created {
            if let Err(err) = fs::remove_dir(dir) {
                warn!("Could not remove {:?} after failed restore: {}", dir, err);
            }
        }
    }
    result
}

fn extract_staged(
    reader: &mut ArchiveReader,
    parent: &Path,
    name: &str,
    destination: &Path,
    task: &Task,
) -> Result<usize, BackupError> {
    let staging = tempfile::Builder::new()
        .prefix(&format!("{}{}", name, STAGING_SUFFIX))
        .tempdir_in(parent)
        .map_err(|e| restore_error(BackupError::io(parent, e)))?;
    debug!("Staging restore in {:?}", staging.path());

    // Dropping `staging` on any early return removes it with its contents.
    let count = reader
        .extract_into(staging.path(), task)
        .map_err(restore_error)?;

    let extracted = single_top_level_entry(staging.path())?;

    task.set_message(TaskMessage::Text("Finishing restore...".to_string()));
    fs::rename(&extracted, destination)
        .map_err(|e| restore_error(BackupError::io(&extracted, e)))?;
    staging
        .close()
        .map_err(|e| restore_error(BackupError::io(parent, e)))?;

    Ok(count)
}

/// Creates `dir` and any missing ancestors, returning the directories that
/// did not exist before, deepest first.
fn create_missing_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|ancestor| {
            !ancestor.as_os_str().is_empty() && fs::symlink_metadata(ancestor).is_err()
        })
        .map(Path::to_path_buf)
        .collect();
    if let Err(err) = fs::create_dir_all(dir) {
        for created in missing.iter().filter(|d| d.is_dir()) {
            let _ = fs::remove_dir(created);
        }
        return Err(err);
    }
    Ok(missing)
}

fn single_top_level_entry(staging: &Path) -> Result<PathBuf, BackupError> {
    let entries = fs::read_dir(staging)
        .map_err(|e| restore_error(BackupError::io(staging, e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| restore_error(BackupError::io(staging, e)))?;

    match entries.as_slice() {
        [entry] => Ok(entry.path()),
        _ => Err(BackupError::MalformedArchive(format!(
            "expected a single notebook folder, found {} top-level entries",
            entries.len()
        ))),
    }
}
