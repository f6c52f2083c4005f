//! Archive creation for notebooks.
//!
//! This module writes a notebook directory into a single compressed archive,
//! either a gzip tar (the default) or a deflate zip. The archive's top-level
//! entry is the notebook folder itself, so the archive can be restored under
//! any new notebook name.

use crate::constants::{TAR_GZ_EXTENSION, UNIQUE_NAME_SEPARATOR, ZIP_EXTENSION};
use crate::errors::BackupError;
use crate::notebook::Notebook;
use crate::ops::walk::{walk_tree, TreeVisitor, WalkContext};
use crate::task::{Task, TaskMessage};
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Container format of a notebook archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar stream (`.tar.gz`).
    #[default]
    TarGz,
    /// Deflate-compressed zip archive (`.zip`).
    Zip,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => TAR_GZ_EXTENSION,
            ArchiveFormat::Zip => ZIP_EXTENSION,
        }
    }

    /// Identifies an archive by its leading magic bytes.
    ///
    /// Returns `Ok(None)` when the file is neither gzip nor zip.
    pub fn detect(path: &Path) -> io::Result<Option<Self>> {
        let mut magic = [0u8; 4];
        let mut file = File::open(path)?;
        let mut read = 0;
        while read < magic.len() {
            let n = file.read(&mut magic[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }

        let format = match &magic[..read] {
            [0x1f, 0x8b, ..] => Some(ArchiveFormat::TarGz),
            [b'P', b'K', 0x03, 0x04] | [b'P', b'K', 0x05, 0x06] => Some(ArchiveFormat::Zip),
            _ => None,
        };
        Ok(format)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" | "tar-gz" | "targz" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(format!(
                "unknown archive format '{}' (expected 'tar.gz' or 'zip')",
                other
            )),
        }
    }
}

/// Report of a completed archive operation.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    /// Path of the archive that was written
    pub archive_path: PathBuf,
    /// Container format of the archive
    pub format: ArchiveFormat,
    /// Number of regular files added to the archive
    pub files_archived: usize,
    /// Size of the archive in bytes
    pub archive_size: u64,
    /// BLAKE3 checksum of the archive file
    pub checksum: String,
    /// Duration taken to create the archive
    pub duration: Duration,
}

/// Archive writer for either container format.
enum ArchiveWriter {
    Tar(tar::Builder<GzEncoder<File>>),
    Zip(ZipWriter<File>),
}

impl ArchiveWriter {
    fn new(file: File, format: ArchiveFormat) -> Self {
        match format {
            ArchiveFormat::TarGz => {
                ArchiveWriter::Tar(tar::Builder::new(GzEncoder::new(file, Compression::default())))
            }
            ArchiveFormat::Zip => ArchiveWriter::Zip(ZipWriter::new(file)),
        }
    }

    fn zip_options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Writes the trailing records and returns the underlying file.
    fn finish(self) -> io::Result<File> {
        match self {
            ArchiveWriter::Tar(builder) => builder.into_inner()?.finish(),
            ArchiveWriter::Zip(zip) => zip.finish().map_err(io::Error::from),
        }
    }
}

/// Zip entry names always use `/`, whatever the host separator.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl TreeVisitor for ArchiveWriter {
    fn visit_dir(&mut self, source: &Path, relative: &Path) -> Result<(), BackupError> {
        debug!("Adding directory to archive: {:?}", relative);
        match self {
            ArchiveWriter::Tar(builder) => builder
                .append_dir(relative, source)
                .map_err(|e| BackupError::io(source, e)),
            ArchiveWriter::Zip(zip) => zip
                .add_directory(format!("{}/", zip_entry_name(relative)), Self::zip_options())
                .map_err(|e| BackupError::io(source, e.into())),
        }
    }

    fn visit_file(&mut self, source: &Path, relative: &Path) -> Result<(), BackupError> {
        debug!("Adding to archive: {:?}", relative);
        match self {
            ArchiveWriter::Tar(builder) => builder
                .append_path_with_name(source, relative)
                .map_err(|e| BackupError::io(source, e)),
            ArchiveWriter::Zip(zip) => {
                zip.start_file(zip_entry_name(relative), Self::zip_options())
                    .map_err(|e| BackupError::io(source, e.into()))?;
                let mut input = File::open(source).map_err(|e| BackupError::io(source, e))?;
                io::copy(&mut input, zip)
                    .map(|_| ())
                    .map_err(|e| BackupError::io(source, e))
            }
        }
    }
}

/// Archives a notebook into a new compressed file.
///
/// # Flow
///
/// 1. Refuse to overwrite an existing destination or to write the archive
///    inside the notebook it is archiving
/// 2. Save the notebook so pending edits are included
/// 3. Count the files under the notebook directory
/// 4. Walk the directory, adding each entry under `<notebook name>/...`
/// 5. Finalize the archive and checksum it
///
/// # Arguments
///
/// * `notebook` - The notebook to archive
/// * `destination` - Path of the archive file to create
/// * `format` - Container format to write
/// * `task` - Progress and cancellation handle
///
/// # Errors
///
/// Returns an error if:
/// - `destination` already exists (`AlreadyExists`)
/// - `destination` lies inside the notebook directory (`InvalidArgument`)
/// - The notebook cannot be saved (`SaveFailed`)
/// - The task is aborted (`Canceled`)
/// - Reading the notebook or writing the archive fails (`Io`)
///
/// On cancellation or failure after the archive file was created, the partial
/// archive is deleted before the error is returned.
pub fn archive_notebook<N: Notebook + ?Sized>(
    notebook: &N,
    destination: &Path,
    format: ArchiveFormat,
    task: &Task,
) -> Result<ArchiveReport, BackupError> {
    let start_time = Instant::now();
    let root = notebook.path();
    info!("Archiving notebook {:?} to {:?}", root, destination);

    if fs::symlink_metadata(destination).is_ok() {
        return Err(BackupError::AlreadyExists {
            path: destination.to_path_buf(),
        });
    }

    if is_inside(destination, root) {
        return Err(BackupError::InvalidArgument(format!(
            "cannot archive notebook {:?} into itself ({:?})",
            root, destination
        )));
    }

    notebook.save().map_err(BackupError::SaveFailed)?;

    let archive_root = root.file_name().map(PathBuf::from).ok_or_else(|| {
        BackupError::InvalidArgument(format!("notebook path {:?} has no folder name", root))
    })?;

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => BackupError::AlreadyExists {
                path: destination.to_path_buf(),
            },
            _ => BackupError::io(destination, e),
        })?;

    let files_archived = match write_archive(file, root, &archive_root, destination, format, task)
    {
        Ok(count) => count,
        Err(err) => {
            if err.is_canceled() {
                info!("Archiving canceled, removing {:?}", destination);
            } else {
                warn!("Archiving failed, removing {:?}: {}", destination, err);
            }
            if let Err(remove_err) = fs::remove_file(destination) {
                warn!(
                    "Could not remove partial archive {:?}: {}",
                    destination, remove_err
                );
            }
            return Err(err);
        }
    };

    let (archive_size, checksum) = checksum_file(destination)?;
    task.finish();

    let duration = start_time.elapsed();
    info!(
        "Archive completed: {} files, {} bytes, {} ms",
        files_archived,
        archive_size,
        duration.as_millis()
    );

    Ok(ArchiveReport {
        archive_path: destination.to_path_buf(),
        format,
        files_archived,
        archive_size,
        checksum,
        duration,
    })
}

/// Whether the not-yet-existing file `path` would land under directory `dir`.
///
/// Both sides are resolved through the filesystem, so relative paths and
/// symlinked parents compare correctly. Unresolvable paths are not inside.
fn is_inside(path: &Path, dir: &Path) -> bool {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), fs::canonicalize(dir), path.file_name()) {
        (Ok(parent), Ok(dir), Some(name)) => parent.join(name).starts_with(dir),
        _ => false,
    }
}

fn write_archive(
    file: File,
    root: &Path,
    archive_root: &Path,
    destination: &Path,
    format: ArchiveFormat,
    task: &Task,
) -> Result<usize, BackupError> {
    let mut writer = ArchiveWriter::new(file, format);

    let mut ctx = WalkContext::counted(task, root)?;
    debug!("Found {} files to archive", ctx.total());
    task.set_message(TaskMessage::Text(format!(
        "Archiving {} files...",
        ctx.total()
    )));

    walk_tree(root, archive_root, &mut ctx, &mut writer)?;

    task.set_message(TaskMessage::Text("Closing archive...".to_string()));
    task.set_message(TaskMessage::Detail(String::new()));

    let file = writer
        .finish()
        .map_err(|e| BackupError::io(destination, e))?;
    file.sync_all()
        .map_err(|e| BackupError::io(destination, e))?;

    Ok(ctx.done())
}

fn checksum_file(path: &Path) -> Result<(u64, String), BackupError> {
    let mut file = File::open(path).map_err(|e| BackupError::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let size = io::copy(&mut file, &mut hasher).map_err(|e| BackupError::io(path, e))?;
    Ok((size, hasher.finalize().to_hex().to_string()))
}

/// Default archive stem for a notebook: `<name>-YYYY-MM-DD`.
pub fn default_archive_stem(notebook_name: &str, date: NaiveDate) -> String {
    format!("{}-{}", notebook_name, date.format("%Y-%m-%d"))
}

/// Returns `dir/stem.<ext>`, or the first free `dir/stem.N.<ext>` from N = 2.
///
/// # Examples
///
/// ```
/// use notebook_archiver::ops::{unique_archive_path, ArchiveFormat};
/// use std::path::Path;
///
/// let dir = tempfile::tempdir().unwrap();
/// let first = unique_archive_path(dir.path(), "notes", ArchiveFormat::TarGz);
/// assert_eq!(first, dir.path().join("notes.tar.gz"));
///
/// std::fs::write(&first, b"").unwrap();
/// let second = unique_archive_path(dir.path(), "notes", ArchiveFormat::TarGz);
/// assert_eq!(second, dir.path().join("notes.2.tar.gz"));
/// ```
pub fn unique_archive_path(dir: &Path, stem: &str, format: ArchiveFormat) -> PathBuf {
    let ext = format.extension();
    let candidate = dir.join(format!("{}.{}", stem, ext));
    if fs::symlink_metadata(&candidate).is_err() {
        return candidate;
    }
    (2u32..)
        .map(|n| dir.join(format!("{}{}{}.{}", stem, UNIQUE_NAME_SEPARATOR, n, ext)))
        .find(|path| fs::symlink_metadata(path).is_err())
        .unwrap_or(candidate)
}
