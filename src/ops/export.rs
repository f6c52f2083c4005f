//! Export of a notebook to a standalone HTML tree.
//!
//! The exporter walks the notebook's logical node tree alongside its
//! directories. Rich pages are rewritten so internal `nbk://` links point at
//! the exported copy of the target page; everything else is copied as is.

use crate::constants::{EXPORT_INDEX_FILE, EXPORT_TREE_FILE, PAGE_FILE};
use crate::errors::BackupError;
use crate::notebook::{parse_node_url, Node, NodeKind, Notebook};
use crate::ops::walk::{is_symlink, walk_tree, CopyVisitor, WalkContext};
use crate::task::{Task, TaskMessage};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::escape::escape;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Characters left unescaped in rewritten links.
const LINK_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Report of a completed export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Root directory of the export
    pub export_path: std::path::PathBuf,
    /// Number of notebook nodes exported
    pub nodes_exported: usize,
    /// Pages whose markup was parsed and rewritten
    pub pages_rewritten: usize,
    /// Pages copied unchanged because they could not be parsed
    pub pages_copied: usize,
    /// Duration taken by the export
    pub duration: Duration,
}

/// Why a page could not be rewritten; the page is then copied verbatim.
#[derive(Debug, Error)]
enum PageError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("page is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("attribute error: {0}")]
    Attr(#[from] AttrError),
    #[error("{0}")]
    IllFormed(&'static str),
}

/// Relative link from directory `from` to directory `to`, `/`-separated.
///
/// Works on path components only; neither path has to exist.
///
/// # Examples
///
/// ```
/// use notebook_archiver::ops::relative_path;
/// use std::path::Path;
///
/// assert_eq!(relative_path(Path::new("/a/b/c"), Path::new("/a/b/d/e")), "../d/e");
/// assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/b/c")), "c");
/// assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/b")), "");
/// ```
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = normal_components(from);
    let to = normal_components(to);
    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec!["..".to_string(); from.len() - common];
    parts.extend(to[common..].iter().cloned());
    parts.join("/")
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn page_link(relative: &str) -> String {
    let path = if relative.is_empty() {
        PAGE_FILE.to_string()
    } else {
        format!("{}/{}", relative, PAGE_FILE)
    };
    utf8_percent_encode(&path, LINK_ENCODE_SET).to_string()
}

/// Export state threaded through the node recursion.
struct HtmlExporter<'a, N: Notebook + ?Sized> {
    notebook: &'a N,
    task: &'a Task,
    total: usize,
    done: usize,
    pages_rewritten: usize,
    pages_copied: usize,
}

impl<'a, N: Notebook + ?Sized> HtmlExporter<'a, N> {
    fn export_node(&mut self, node: &Node, target: &Path, is_root: bool) -> Result<(), BackupError> {
        self.task.check_aborted()?;

        self.done += 1;
        self.task.set_detail(&node.path().to_string_lossy());
        self.task.set_percent(self.done as f64 / self.total as f64);

        let mut skip: HashSet<&OsStr> = node.children().iter().map(Node::basename).collect();

        if is_root {
            fs::create_dir_all(target).map_err(|e| BackupError::io(target, e))?;
            self.write_index(node, target)?;
        } else {
            fs::create_dir(target).map_err(|e| BackupError::io(target, e))?;
        }

        match node.kind() {
            NodeKind::Page => {
                skip.insert(OsStr::new(PAGE_FILE));
                self.export_page(node, target)?;
            }
            NodeKind::Directory | NodeKind::Other(_) => {}
        }

        self.export_files(node.path(), target, &skip)?;

        for child in node.children() {
            self.export_node(child, &target.join(child.basename()), false)?;
        }
        Ok(())
    }

    /// Copies the node's own files and folders, leaving out child node folders.
    fn export_files(
        &self,
        source: &Path,
        target: &Path,
        skip: &HashSet<&OsStr>,
    ) -> Result<(), BackupError> {
        let mut entries = fs::read_dir(source)
            .map_err(|e| BackupError::io(source, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackupError::io(source, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name();
            if skip.contains(name.as_os_str()) {
                continue;
            }
            let path = entry.path();
            if is_symlink(&path) {
                debug!("Skipping symbolic link {:?}", path);
                continue;
            }
            let mut ctx = WalkContext::silent(self.task);
            walk_tree(&path, Path::new(&name), &mut ctx, &mut CopyVisitor::new(target))?;
        }
        Ok(())
    }

    fn export_page(&mut self, node: &Node, target: &Path) -> Result<(), BackupError> {
        let source = node.path().join(PAGE_FILE);
        let output = target.join(PAGE_FILE);
        if !source.is_file() {
            warn!("Page {:?} has no {}", node.path(), PAGE_FILE);
            return Ok(());
        }

        match self.rewrite_page(&source, node.path()) {
            Ok(html) => {
                fs::write(&output, html).map_err(|e| BackupError::io(&output, e))?;
                self.pages_rewritten += 1;
            }
            Err(err) => {
                warn!("Could not parse {:?} ({}), copying it unchanged", source, err);
                fs::copy(&source, &output).map_err(|e| BackupError::io(&source, e))?;
                self.pages_copied += 1;
            }
        }
        Ok(())
    }

    /// Parses the page as XML and rewrites internal node links.
    ///
    /// The `<?xml ...?>` declaration is dropped so browsers render the page
    /// as HTML.
    fn rewrite_page(&self, source: &Path, page_dir: &Path) -> Result<Vec<u8>, PageError> {
        let markup = String::from_utf8(fs::read(source)?)?;
        let mut reader = Reader::from_str(&markup);
        let mut writer = Writer::new(Vec::new());
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Decl(_) => {}
                Event::Start(element) => {
                    depth += 1;
                    seen_root = true;
                    let element = self.rewrite_anchor(element, page_dir)?;
                    writer.write_event(Event::Start(element))?;
                }
                Event::Empty(element) => {
                    seen_root = true;
                    let element = self.rewrite_anchor(element, page_dir)?;
                    writer.write_event(Event::Empty(element))?;
                }
                Event::End(element) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(PageError::IllFormed("unexpected closing tag"))?;
                    writer.write_event(Event::End(element))?;
                }
                other => writer.write_event(other)?,
            }
        }

        if !seen_root {
            return Err(PageError::IllFormed("no root element"));
        }
        if depth != 0 {
            return Err(PageError::IllFormed("unclosed element"));
        }
        Ok(writer.into_inner())
    }

    fn rewrite_anchor(
        &self,
        element: BytesStart<'_>,
        page_dir: &Path,
    ) -> Result<BytesStart<'static>, PageError> {
        if !element.name().as_ref().eq_ignore_ascii_case(b"a") {
            return Ok(element.into_owned());
        }

        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let mut rewritten = BytesStart::new(name);
        for attr in element.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == b"href" {
                let href = attr.unescape_value()?;
                if let Some(link) = self.link_for(&href, page_dir) {
                    rewritten.push_attribute(("href", link.as_str()));
                    continue;
                }
            }
            rewritten.push_attribute(attr);
        }
        Ok(rewritten)
    }

    /// Exported location of the node an `nbk://` URL points at, if it exists.
    fn link_for(&self, href: &str, page_dir: &Path) -> Option<String> {
        let (_, node_id) = parse_node_url(href)?;
        let target = self.notebook.node_by_id(node_id)?;
        Some(page_link(&relative_path(page_dir, target.path())))
    }

    fn write_index(&self, root: &Node, target: &Path) -> Result<(), BackupError> {
        let path = target.join(EXPORT_INDEX_FILE);
        let html = format!(
            "<html>\n<head><title>{}</title></head>\n\
             <frameset cols=\"30%, *\">\n  \
             <frame src=\"{}\" name=\"tree\">\n  \
             <frame src=\"\" name=\"viewer\">\n\
             </frameset>\n</html>\n",
            escape(root.title()),
            EXPORT_TREE_FILE
        );
        fs::write(&path, html).map_err(|e| BackupError::io(&path, e))
    }

    fn write_tree(&self, target: &Path) -> Result<(), BackupError> {
        let root = self.notebook.root();
        let mut html = format!(
            "<html>\n<head><title>{}</title></head>\n<body>\n",
            escape(root.title())
        );
        tree_entries(&mut html, root, root.path());
        html.push_str("</body>\n</html>\n");

        let path = target.join(EXPORT_TREE_FILE);
        fs::write(&path, html).map_err(|e| BackupError::io(&path, e))
    }
}

fn tree_entries(html: &mut String, node: &Node, root: &Path) {
    html.push_str("<ul>\n<li>");
    match node.kind() {
        NodeKind::Page => {
            let _ = write!(
                html,
                "<a href=\"{}\" target=\"viewer\">{}</a>",
                page_link(&relative_path(root, node.path())),
                escape(node.title())
            );
        }
        NodeKind::Directory | NodeKind::Other(_) => html.push_str(&escape(node.title())),
    }
    html.push('\n');
    for child in node.children() {
        tree_entries(html, child, root);
    }
    html.push_str("</li>\n</ul>\n");
}

/// Exports a notebook as a browsable HTML directory tree.
///
/// # Arguments
///
/// * `notebook` - The notebook to export
/// * `destination` - Directory to create for the export
/// * `task` - Progress and cancellation handle
///
/// # Errors
///
/// Returns an error if:
/// - `destination` already exists (`AlreadyExists`)
/// - The notebook cannot be saved (`SaveFailed`)
/// - The task is aborted (`Canceled`); the partial export is left in place
/// - Reading the notebook or writing the export fails (`Io`)
///
/// Pages that cannot be parsed are not an error: they are copied unchanged.
pub fn export_notebook<N: Notebook + ?Sized>(
    notebook: &N,
    destination: &Path,
    task: &Task,
) -> Result<ExportReport, BackupError> {
    let start_time = Instant::now();
    info!("Exporting notebook {:?} to {:?}", notebook.path(), destination);

    if fs::symlink_metadata(destination).is_ok() {
        return Err(BackupError::AlreadyExists {
            path: destination.to_path_buf(),
        });
    }

    notebook.save().map_err(BackupError::SaveFailed)?;

    let total = notebook.root().count();
    task.set_message(TaskMessage::Text(format!("Exporting {} notes...", total)));

    let mut exporter = HtmlExporter {
        notebook,
        task,
        total,
        done: 0,
        pages_rewritten: 0,
        pages_copied: 0,
    };
    exporter.export_node(notebook.root(), destination, true)?;
    exporter.write_tree(destination)?;

    task.set_message(TaskMessage::Text("Closing export...".to_string()));
    task.set_message(TaskMessage::Detail(String::new()));
    task.finish();

    let duration = start_time.elapsed();
    info!(
        "Export completed: {} notes ({} rewritten, {} copied) in {} ms",
        exporter.done,
        exporter.pages_rewritten,
        exporter.pages_copied,
        duration.as_millis()
    );

    Ok(ExportReport {
        export_path: destination.to_path_buf(),
        nodes_exported: exporter.done,
        pages_rewritten: exporter.pages_rewritten,
        pages_copied: exporter.pages_copied,
        duration,
    })
}
