//! Node model: folders and snippets.
//!
//! On disk a node is a JSON object tagged by `"type"` with camelCase fields.
//! `parentId` is `null` for top-level nodes.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use sklad_common::NodeId;

/// Current time at the precision kept on disk.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Kind of node, used when creating new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Snippet,
}

impl NodeKind {
    /// Label given to freshly created nodes.
    pub fn default_label(&self) -> &'static str {
        match self {
            NodeKind::Folder => "New Folder",
            NodeKind::Snippet => "New Snippet",
        }
    }
}

/// A folder and its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: NodeId,
    pub label: String,
    pub parent_id: Option<NodeId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Display order is insertion/drag order.
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A piece of stored text, optionally gated behind the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: NodeId,
    pub label: String,
    pub parent_id: Option<NodeId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Plaintext. Empty for a secret snippet while the vault is locked.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Opaque ciphertext owned by the storage backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
}

impl Snippet {
    /// Create an empty, non-secret snippet.
    pub fn new(label: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id: NodeId::generate(),
            label: label.into(),
            parent_id,
            created_at: now_millis(),
            value: String::new(),
            encrypted_value: None,
            is_secret: false,
        }
    }

    /// Set the plaintext value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Mark the snippet as secret.
    pub fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }
}

impl Folder {
    /// Create an empty folder.
    pub fn new(label: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id: NodeId::generate(),
            label: label.into(),
            parent_id,
            created_at: now_millis(),
            children: Vec::new(),
        }
    }

    /// Replace the children.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

/// A node in the snippet tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Folder(Folder),
    Snippet(Snippet),
}

impl Node {
    /// Create a new folder node.
    pub fn folder(label: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Node::Folder(Folder::new(label, parent_id))
    }

    /// Create a new, empty snippet node.
    pub fn snippet(label: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Node::Snippet(Snippet::new(label, parent_id))
    }

    /// Create a new node of the given kind with its default label.
    pub fn new_of_kind(kind: NodeKind, parent_id: Option<NodeId>) -> Self {
        match kind {
            NodeKind::Folder => Node::folder(kind.default_label(), parent_id),
            NodeKind::Snippet => Node::snippet(kind.default_label(), parent_id),
        }
    }

    pub fn id(&self) -> &NodeId {
        match self {
            Node::Folder(folder) => &folder.id,
            Node::Snippet(snippet) => &snippet.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Node::Folder(folder) => &folder.label,
            Node::Snippet(snippet) => &snippet.label,
        }
    }

    /// Id of the containing folder, `None` at the root.
    pub fn parent_id(&self) -> Option<&NodeId> {
        match self {
            Node::Folder(folder) => folder.parent_id.as_ref(),
            Node::Snippet(snippet) => snippet.parent_id.as_ref(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Node::Folder(folder) => folder.created_at,
            Node::Snippet(snippet) => snippet.created_at,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Folder(_) => NodeKind::Folder,
            Node::Snippet(_) => NodeKind::Snippet,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    /// True only for snippets flagged secret.
    pub fn is_secret(&self) -> bool {
        matches!(self, Node::Snippet(snippet) if snippet.is_secret)
    }

    /// Children of a folder; empty for snippets.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Folder(folder) => &folder.children,
            Node::Snippet(_) => &[],
        }
    }

    pub fn as_snippet(&self) -> Option<&Snippet> {
        match self {
            Node::Snippet(snippet) => Some(snippet),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(folder) => Some(folder),
            Node::Snippet(_) => None,
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        match self {
            Node::Folder(folder) => folder.label = label.into(),
            Node::Snippet(snippet) => snippet.label = label.into(),
        }
    }

    pub fn set_parent_id(&mut self, parent_id: Option<NodeId>) {
        match self {
            Node::Folder(folder) => folder.parent_id = parent_id,
            Node::Snippet(snippet) => snippet.parent_id = parent_id,
        }
    }
}

impl From<Folder> for Node {
    fn from(folder: Folder) -> Self {
        Node::Folder(folder)
    }
}

impl From<Snippet> for Node {
    fn from(snippet: Snippet) -> Self {
        Node::Snippet(snippet)
    }
}
