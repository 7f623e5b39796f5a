//! Arena-backed trie storage.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. The parent link is
//! a plain index, so the tree has no ownership cycles and the search cursor can climb
//! back up without holding references into the arena.

use std::collections::HashMap;

use tracing::debug;

use super::RouteError;

/// Index of a node inside a [`Trie`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every trie.
    pub const ROOT: NodeId = NodeId(0);
}

/// A single trie node.
///
/// A node may carry a value and children at the same time: a path can be both a
/// complete route and a prefix of longer routes.
#[derive(Debug)]
pub struct Node<T> {
    parent: Option<NodeId>,
    // Created on first insert below this node, then only ever grown.
    children: Option<HashMap<String, NodeId>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: None,
            value: None,
        }
    }

    /// The node this one hangs from, or `None` at the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Looks up the child stored under `key`, literal or wildcard token alike.
    pub fn child(&self, key: &str) -> Option<NodeId> {
        self.children.as_ref()?.get(key).copied()
    }

    /// Iterates `(key, child)` pairs in no particular order.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children
            .iter()
            .flatten()
            .map(|(key, id)| (key.as_str(), *id))
    }

    /// The leaf payload, if a route ends here.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// The trie itself: an arena of [`Node`]s rooted at [`NodeId::ROOT`].
#[derive(Debug)]
pub struct Trie<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Trie<T> {
    /// Creates a trie holding only an empty root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(None)],
        }
    }

    /// Borrows the node at `id`.
    ///
    /// Ids are only ever minted by this trie, so they always index into the arena.
    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.0]
    }

    /// Stores `value` at the end of `path`, creating missing nodes along the way.
    ///
    /// Segments are taken verbatim: wildcard positions must already be spelled as
    /// their reserved tokens. Nodes created before a failure stay in place; they carry
    /// no value and are never matched on their own.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::AlreadyRegistered`] if a value already sits at `path`.
    /// The existing value is left untouched.
    pub fn insert(&mut self, path: &[&str], value: T) -> Result<NodeId, RouteError> {
        let mut current = NodeId::ROOT;
        for segment in path {
            current = self.child_or_insert(current, segment);
        }

        let slot = &mut self.nodes[current.0].value;
        if slot.is_some() {
            return Err(RouteError::AlreadyRegistered {
                path: display_path(path),
            });
        }
        *slot = Some(value);

        debug!(path = %display_path(path), nodes = self.nodes.len(), "route inserted");
        Ok(current)
    }

    /// Number of nodes in the arena, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn child_or_insert(&mut self, parent: NodeId, key: &str) -> NodeId {
        if let Some(existing) = self.nodes[parent.0].child(key) {
            return existing;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(Some(parent)));
        self.nodes[parent.0]
            .children
            .get_or_insert_with(HashMap::new)
            .insert(key.to_owned(), id);
        id
    }
}

/// Renders segments the way they would appear in a URL, e.g. `/a/{digits}`.
pub(crate) fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    let mut out = String::new();
    for segment in path {
        out.push('/');
        out.push_str(segment.as_ref());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
