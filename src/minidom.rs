//! Lightweight tree mirroring the declarative element tree.
//!
//! Every node wraps at most one scene-graph object. Children are owned,
//! parents are weak back-references, so dropping a detached subtree frees
//! it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::graph::ObjectHandle;
use crate::interactables::{event_key, EventHandler, InteractionEvent};
use crate::surface::Surface;

/// Identity of the singleton root node of every mounted app.
pub const ROOT_UUID: &str = "LUNCHBOX_ROOT";

/// What inserting a node under a parent means for the scene graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaType {
    /// Container bound to the output surface.
    Root,
    /// Added as a scene-graph child of the parent's object.
    Object,
    /// Assigned to a named slot of the parent's object.
    Attachment { slot: String },
    Text,
    Comment,
}

impl MetaType {
    pub fn label(&self) -> &str {
        match self {
            Self::Root => "root",
            Self::Object => "object",
            Self::Attachment { slot } => slot,
            Self::Text => "text",
            Self::Comment => "comment",
        }
    }
}

#[derive(Debug)]
struct NodeData {
    uuid: String,
    tag: String,
    meta_type: MetaType,
    name: String,
    text: String,
    parent: Option<Weak<RwLock<NodeData>>>,
    children: Vec<Node>,
    instance: Option<ObjectHandle>,
    surface: Option<Surface>,
    placeholder: bool,
    handlers: BTreeMap<String, EventHandler>,
    disposed: bool,
}

impl NodeData {
    fn new(tag: &str, meta_type: MetaType) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            tag: tag.to_string(),
            meta_type,
            name: String::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            instance: None,
            surface: None,
            placeholder: false,
            handlers: BTreeMap::new(),
            disposed: false,
        }
    }
}

/// Shared handle to one tree entry.
#[derive(Clone)]
pub struct Node(Arc<RwLock<NodeData>>);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        write!(f, "Node({} {})", data.tag, data.uuid)
    }
}

impl Node {
    fn from_data(data: NodeData) -> Self {
        Self(Arc::new(RwLock::new(data)))
    }

    /// Node wrapping a freshly constructed scene-graph object.
    pub fn element(tag: &str, meta_type: MetaType, instance: ObjectHandle) -> Self {
        let mut data = NodeData::new(tag, meta_type);
        data.instance = Some(instance);
        Self::from_data(data)
    }

    /// Stand-in for an unknown tag. Behaves like a group.
    pub fn placeholder(tag: &str, instance: ObjectHandle) -> Self {
        let mut data = NodeData::new(tag, MetaType::Object);
        data.instance = Some(instance);
        data.placeholder = true;
        Self::from_data(data)
    }

    /// Node without a scene-graph object.
    pub fn logical(tag: &str, meta_type: MetaType) -> Self {
        Self::from_data(NodeData::new(tag, meta_type))
    }

    pub fn text_node(text: &str) -> Self {
        let mut data = NodeData::new("text", MetaType::Text);
        data.text = text.to_string();
        Self::from_data(data)
    }

    pub fn comment(text: &str) -> Self {
        let mut data = NodeData::new("comment", MetaType::Comment);
        data.text = text.to_string();
        Self::from_data(data)
    }

    /// Root node bound to an output surface.
    pub fn root(surface: Surface) -> Self {
        let mut data = NodeData::new("root", MetaType::Root);
        data.uuid = ROOT_UUID.to_string();
        data.name = "root".to_string();
        data.surface = Some(surface);
        Self::from_data(data)
    }

    pub fn uuid(&self) -> String {
        self.0.read().uuid.clone()
    }

    pub fn tag(&self) -> String {
        self.0.read().tag.clone()
    }

    pub fn meta_type(&self) -> MetaType {
        self.0.read().meta_type.clone()
    }

    pub fn name(&self) -> String {
        self.0.read().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.0.write().name = name.to_string();
    }

    pub fn text(&self) -> String {
        self.0.read().text.clone()
    }

    pub fn set_text(&self, text: &str) {
        self.0.write().text = text.to_string();
    }

    pub fn instance(&self) -> Option<ObjectHandle> {
        self.0.read().instance.clone()
    }

    /// Output surface; only the root node carries one.
    pub fn surface(&self) -> Option<Surface> {
        self.0.read().surface.clone()
    }

    pub fn is_root(&self) -> bool {
        self.0.read().meta_type == MetaType::Root
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.read().placeholder
    }

    pub fn is_disposed(&self) -> bool {
        self.0.read().disposed
    }

    /// Whether this node may hold children at all.
    pub fn accepts_children(&self) -> bool {
        !matches!(self.0.read().meta_type, MetaType::Text | MetaType::Comment)
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent(&self) -> Option<Node> {
        self.0
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.read().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.read().children.len()
    }

    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let guard = parent.0.read();
        guard.children.iter().position(|c| c.ptr_eq(self))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let guard = parent.0.read();
        let index = guard.children.iter().position(|c| c.ptr_eq(self))?;
        guard.children.get(index + 1).cloned()
    }

    /// True when `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// This node followed by all descendants, depth first.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = vec![self.clone()];
        for child in self.children() {
            out.extend(child.descendants());
        }
        out
    }

    pub fn set_handler(&self, key: &str, handler: EventHandler) {
        self.0.write().handlers.insert(key.to_string(), handler);
    }

    pub fn remove_handler(&self, key: &str) -> bool {
        self.0.write().handlers.remove(key).is_some()
    }

    pub fn has_handlers(&self) -> bool {
        !self.0.read().handlers.is_empty()
    }

    pub fn handler_keys(&self) -> Vec<String> {
        self.0.read().handlers.keys().cloned().collect()
    }

    /// Runs the handler bound to `event`, if any.
    pub fn emit(&self, event: &InteractionEvent) -> bool {
        let handler = self.0.read().handlers.get(&event_key(&event.name)).cloned();
        match handler {
            Some(handler) => {
                handler.call(event);
                true
            }
            None => false,
        }
    }

    /// Links `child` into this node's children before `anchor`, or at the
    /// end when `anchor` is absent or not a child. The child must already
    /// be unlinked.
    pub(crate) fn link_child(&self, child: &Node, anchor: Option<&Node>) {
        {
            let mut guard = self.0.write();
            let index = anchor
                .and_then(|a| guard.children.iter().position(|c| c.ptr_eq(a)))
                .unwrap_or(guard.children.len());
            guard.children.insert(index, child.clone());
        }
        child.0.write().parent = Some(Arc::downgrade(&self.0));
    }

    /// Removes this node from its parent's children.
    pub(crate) fn unlink(&self) {
        if let Some(parent) = self.parent() {
            parent.0.write().children.retain(|c| !c.ptr_eq(self));
        }
        self.0.write().parent = None;
    }

    /// Releases everything this node holds. The node cannot be used again.
    pub(crate) fn dispose(&self) -> Option<ObjectHandle> {
        let mut guard = self.0.write();
        guard.disposed = true;
        guard.handlers.clear();
        guard.children.clear();
        guard.instance.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_node_has_fixed_identity() {
        let root = Node::root(Surface::new("app", 640, 480));
        assert_eq!(root.uuid(), ROOT_UUID);
        assert!(root.is_root());
        assert_eq!(root.surface().unwrap().id(), "app");
    }

    #[test]
    fn link_child_honours_anchor_and_siblings() {
        let parent = Node::logical("group", MetaType::Object);
        let a = Node::logical("mesh", MetaType::Object);
        let b = Node::logical("mesh", MetaType::Object);
        let c = Node::logical("mesh", MetaType::Object);
        parent.link_child(&a, None);
        parent.link_child(&c, None);
        parent.link_child(&b, Some(&c));
        assert!(a.next_sibling().unwrap().ptr_eq(&b));
        assert!(b.next_sibling().unwrap().ptr_eq(&c));
        assert!(c.next_sibling().is_none());
        assert_eq!(c.index_in_parent(), Some(2));
        assert!(b.parent().unwrap().ptr_eq(&parent));
    }

    #[test]
    fn contains_walks_ancestors() {
        let root = Node::logical("group", MetaType::Object);
        let child = Node::logical("group", MetaType::Object);
        let grandchild = Node::logical("mesh", MetaType::Object);
        root.link_child(&child, None);
        child.link_child(&grandchild, None);
        assert!(root.contains(&grandchild));
        assert!(!grandchild.contains(&root));
        assert_eq!(root.descendants().len(), 3);
        grandchild.unlink();
        assert!(!root.contains(&grandchild));
        assert_eq!(child.child_count(), 0);
    }
}
