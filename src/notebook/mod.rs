//! Notebook model consumed by the archive and export operations.
//!
//! The engine treats a notebook as a tree of `Node`s, each backed by a
//! directory on disk, behind the `Notebook` trait. `FsNotebook` is the
//! filesystem-backed implementation: every node directory carries a
//! `node.json` metadata file, and child nodes are the sub-directories that
//! carry one too.

use crate::constants::{
    CONTENT_TYPE_DIR, CONTENT_TYPE_PAGE, NODE_METADATA_FILE, NODE_URL_PREFIX, PAGE_FILE,
};
use crate::errors::NotebookError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// What a node holds, decided from its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A rich page stored as XHTML in `page.html`.
    Page,
    /// A plain folder of other nodes.
    Directory,
    /// Any other content type, kept verbatim.
    Other(String),
}

impl NodeKind {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            CONTENT_TYPE_PAGE => NodeKind::Page,
            CONTENT_TYPE_DIR => NodeKind::Directory,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            NodeKind::Page => CONTENT_TYPE_PAGE,
            NodeKind::Directory => CONTENT_TYPE_DIR,
            NodeKind::Other(content_type) => content_type,
        }
    }
}

/// On-disk contents of `node.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub id: String,
    pub title: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

/// One element of the notebook tree: the root or a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: String,
    title: String,
    path: PathBuf,
    kind: NodeKind,
    order: Option<u32>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        path: impl Into<PathBuf>,
        kind: NodeKind,
    ) -> Self {
        Node {
            id: id.into(),
            title: title.into(),
            path: path.into(),
            kind,
            order: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last component of the node's path; the child's folder name in its parent.
    pub fn basename(&self) -> &OsStr {
        self.path.file_name().unwrap_or_default()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_by_id_mut(id))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            content_type: self.kind.content_type().to_string(),
            order: self.order,
        }
    }
}

/// A notebook the engine can archive or export.
///
/// Implementations own the node tree; the engine only reads it, apart from
/// asking it to persist pending edits with `save` before starting.
pub trait Notebook {
    /// The root node, whose path is the notebook directory.
    fn root(&self) -> &Node;

    /// Persists any in-memory edits to disk.
    fn save(&self) -> Result<(), NotebookError>;

    fn path(&self) -> &Path {
        self.root().path()
    }

    fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.root().find_by_id(id)
    }
}

/// A notebook stored as nested directories with `node.json` metadata files.
#[derive(Debug, Clone)]
pub struct FsNotebook {
    root: Node,
}

impl FsNotebook {
    /// Loads the notebook rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotebookError::NotFound` if `path` has no `node.json`, and
    /// `Io` or `Metadata` errors if a node cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, NotebookError> {
        debug!("Opening notebook at {:?}", path);
        let root = load_node(path)?;
        Ok(FsNotebook { root })
    }

    /// Creates a new, empty notebook directory at `path`.
    pub fn create(path: &Path, title: &str) -> Result<Self, NotebookError> {
        fs::create_dir_all(path).map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = Node::new(new_node_id(), title, path, NodeKind::Directory);
        write_metadata(&root)?;
        Ok(FsNotebook { root })
    }

    /// Adds a page under the node `parent_id`, writing its folder, metadata
    /// and `page.html`. Returns the new node's id.
    pub fn add_page(
        &mut self,
        parent_id: &str,
        basename: &str,
        title: &str,
        html: &str,
    ) -> Result<String, NotebookError> {
        let parent = self
            .root
            .find_by_id_mut(parent_id)
            .ok_or_else(|| NotebookError::NotFound {
                path: PathBuf::from(parent_id),
            })?;

        let path = parent.path.join(basename);
        fs::create_dir(&path).map_err(|source| NotebookError::Io {
            path: path.clone(),
            source,
        })?;

        let mut page = Node::new(new_node_id(), title, &path, NodeKind::Page);
        page.order = Some(parent.children.len() as u32);
        write_metadata(&page)?;

        let page_path = path.join(PAGE_FILE);
        fs::write(&page_path, html).map_err(|source| NotebookError::Io {
            path: page_path,
            source,
        })?;

        let id = page.id.clone();
        parent.children.push(page);
        Ok(id)
    }

    /// Mutable access to a node, for edits that `save` will persist.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.root.find_by_id_mut(id)
    }
}

impl Notebook for FsNotebook {
    fn root(&self) -> &Node {
        &self.root
    }

    fn save(&self) -> Result<(), NotebookError> {
        debug!("Saving notebook {:?}", self.root.path());
        save_node(&self.root)
    }
}

fn new_node_id() -> String {
    Uuid::new_v4().to_string()
}

fn save_node(node: &Node) -> Result<(), NotebookError> {
    write_metadata(node)?;
    node.children.iter().try_for_each(save_node)
}

fn write_metadata(node: &Node) -> Result<(), NotebookError> {
    let path = node.path.join(NODE_METADATA_FILE);
    let json =
        serde_json::to_string_pretty(&node.metadata()).map_err(|source| NotebookError::Metadata {
            path: path.clone(),
            source,
        })?;
    fs::write(&path, json).map_err(|source| NotebookError::Io { path, source })
}

fn load_node(path: &Path) -> Result<Node, NotebookError> {
    let metadata_path = path.join(NODE_METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(NotebookError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = fs::read_to_string(&metadata_path).map_err(|source| NotebookError::Io {
        path: metadata_path.clone(),
        source,
    })?;
    let metadata: NodeMetadata =
        serde_json::from_str(&raw).map_err(|source| NotebookError::Metadata {
            path: metadata_path,
            source,
        })?;

    let mut children = Vec::new();
    let entries = fs::read_dir(path).map_err(|source| NotebookError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let child_path = entry.path();
        // file_type() does not follow symlinks, so linked folders are not children
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && child_path.join(NODE_METADATA_FILE).is_file() {
            children.push(load_node(&child_path)?);
        }
    }
    children.sort_by(|a, b| {
        (a.order.unwrap_or(u32::MAX), a.basename()).cmp(&(b.order.unwrap_or(u32::MAX), b.basename()))
    });

    let mut node = Node::new(
        metadata.id,
        metadata.title,
        path,
        NodeKind::from_content_type(&metadata.content_type),
    );
    node.order = metadata.order;
    node.children = children;
    Ok(node)
}

/// Builds the internal link URL for a node id.
pub fn node_url(id: &str) -> String {
    format!("{}/{}", NODE_URL_PREFIX, id)
}

/// Splits an internal node link into `(host, node_id)`.
///
/// # Examples
///
/// ```
/// use notebook_archiver::notebook::parse_node_url;
///
/// assert_eq!(parse_node_url("nbk:///abc-123"), Some(("", "abc-123")));
/// assert_eq!(parse_node_url("nbk://local/abc"), Some(("local", "abc")));
/// assert_eq!(parse_node_url("https://example.com/abc"), None);
/// ```
pub fn parse_node_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix(NODE_URL_PREFIX)?;
    let (host, id) = rest.split_once('/')?;
    if id.is_empty() {
        None
    } else {
        Some((host, id))
    }
}
