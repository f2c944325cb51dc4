//! Arena document tree.
//!
//! The documents this crate rewrites are trees with parent back-references,
//! which Rust ownership cannot express directly; nodes therefore live in an
//! arena and everything addresses them through stable opaque handles.
//! Detaching a node removes it from its parent but keeps the slot, so
//! handles held by a pass never dangle.

mod read;
mod write;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::errors::DocumentError;

/// Stable opaque handle to a node in a [`Document`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable vector-graphics document.
///
/// Exposes exactly what the normalization passes need: tag names, ordered
/// string attributes, parent/child links, depth-first enumeration,
/// attribute get/set/remove, subtree clone, and subtree removal.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    /// Namespace declarations carried by the document element, `(prefix, uri)`.
    namespaces: Vec<(Option<String>, String)>,
}

impl Document {
    /// Parse XML text into a document. Fatal on malformed input: no pass
    /// runs against a tree we could not read.
    pub fn parse(source: &str) -> Result<Document, DocumentError> {
        read::parse_document(source)
    }

    /// Serialize the tree back to text.
    pub fn serialize(&self) -> String {
        write::serialize(self)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    /// Tag name, or `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Text content, or `None` for elements.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The node's children, copied out so the caller may mutate the tree
    /// while iterating.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children.clone()
    }

    /// `id` and every node below it, in depth-first document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = &self.node(node).children;
            stack.extend(children.iter().rev().copied());
        }
        out
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Set an attribute; an existing attribute keeps its position, a new
    /// one is appended.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element { attrs, .. } => attrs.shift_remove(name),
            NodeKind::Text(_) => None,
        }
    }

    /// Attribute names in document order, copied out for mutation-safe
    /// iteration.
    pub fn attr_names(&self, id: NodeId) -> Vec<String> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs.keys().cloned().collect(),
            NodeKind::Text(_) => Vec::new(),
        }
    }

    /// All attributes as owned pairs, in document order.
    pub fn attrs(&self, id: NodeId) -> Vec<(String, String)> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => {
                attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            NodeKind::Text(_) => Vec::new(),
        }
    }

    /// The element's `id` attribute.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "id")
    }

    /// Map every `id` attribute reachable from the root to its node.
    /// Built once per pass, not per lookup; the first occurrence of a
    /// duplicated id wins, like a renderer resolving references.
    pub fn id_index(&self) -> HashMap<String, NodeId> {
        let mut index = HashMap::new();
        for node in self.descendants(self.root) {
            if let Some(id) = self.element_id(node) {
                index.entry(id.to_string()).or_insert(node);
            }
        }
        index
    }

    /// Remove `id` from its parent's child list. The subtree stays in the
    /// arena (handles remain valid) but is no longer reachable from the
    /// root. Detaching the root is a no-op.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        self.node_mut(parent).children.retain(|&c| c != id);
        self.node_mut(id).parent = None;
    }

    /// Splice `replacement` into `old`'s position under `old`'s parent,
    /// then detach `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) {
        let Some(parent) = self.node(old).parent else {
            return;
        };
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == old)
            .unwrap_or(0);
        self.detach(old);
        self.detach(replacement);
        self.node_mut(parent).children.insert(position, replacement);
        self.node_mut(replacement).parent = Some(parent);
    }

    /// Deep-clone the subtree rooted at `id`. The clone is detached; use
    /// [`Document::replace`] to splice it in.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.node(id).kind.clone();
        let clone = self.push_node(kind, None);
        for child in self.children(id) {
            let child_clone = self.clone_subtree(child);
            self.node_mut(child_clone).parent = Some(clone);
            self.node_mut(clone).children.push(child_clone);
        }
        clone
    }

    /// True when `id` or one of its ancestors is a `<{tag}>` element.
    pub fn is_within(&self, id: NodeId, tag: &str) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if self.tag(node) == Some(tag) {
                return true;
            }
            cursor = self.node(node).parent;
        }
        false
    }

    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r##"<svg xmlns="http://www.w3.org/2000/svg"><defs><rect id="r" width="4" height="4"/></defs><g id="g"><use href="#r"/></g></svg>"##,
        )
        .unwrap()
    }

    #[test]
    fn parse_builds_tree() {
        let doc = doc();
        let root = doc.root();
        assert_eq!(doc.tag(root), Some("svg"));
        let children = doc.children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag(children[0]), Some("defs"));
        assert_eq!(doc.tag(children[1]), Some("g"));
    }

    #[test]
    fn id_index_finds_nested_elements() {
        let doc = doc();
        let index = doc.id_index();
        assert_eq!(index.len(), 2);
        assert_eq!(doc.tag(index["r"]), Some("rect"));
        assert_eq!(doc.tag(index["g"]), Some("g"));
    }

    #[test]
    fn detach_removes_from_parent_only() {
        let mut doc = doc();
        let index = doc.id_index();
        let g = index["g"];
        doc.detach(g);
        assert_eq!(doc.children(doc.root()).len(), 1);
        // the handle still resolves
        assert_eq!(doc.tag(g), Some("g"));
        assert!(doc.parent(g).is_none());
    }

    #[test]
    fn clone_subtree_is_deep_and_detached() {
        let mut doc = doc();
        let defs = doc.children(doc.root())[0];
        let clone = doc.clone_subtree(defs);
        assert!(doc.parent(clone).is_none());
        assert_eq!(doc.descendants(clone).len(), doc.descendants(defs).len());
        // mutating the clone leaves the original alone
        let cloned_rect = doc.children(clone)[0];
        doc.set_attr(cloned_rect, "width", "9");
        let original_rect = doc.children(defs)[0];
        assert_eq!(doc.attr(original_rect, "width"), Some("4"));
    }

    #[test]
    fn replace_keeps_sibling_position() {
        let mut doc = doc();
        let index = doc.id_index();
        let g = index["g"];
        let clone = doc.clone_subtree(index["r"]);
        doc.replace(g, clone);
        let children = doc.children(doc.root());
        assert_eq!(doc.tag(children[1]), Some("rect"));
        assert!(doc.parent(g).is_none());
    }

    #[test]
    fn is_within_walks_ancestors() {
        let doc = doc();
        let index = doc.id_index();
        assert!(doc.is_within(index["r"], "defs"));
        assert!(!doc.is_within(index["g"], "defs"));
    }

    #[test]
    fn attribute_order_is_preserved() {
        let mut doc = doc();
        let index = doc.id_index();
        let r = index["r"];
        doc.set_attr(r, "width", "5");
        doc.set_attr(r, "x", "1");
        let names = doc.attr_names(r);
        assert_eq!(names, ["id", "width", "height", "x"]);
    }
}
