use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::minidom::Node;

/// Pointer interaction delivered to a node's handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    /// Event name without the `on` prefix, e.g. `click` or `pointerEnter`.
    pub name: String,
    pub target: String,
    pub point: Option<Vec3>,
}

type HandlerFn = dyn Fn(&InteractionEvent) + Send + Sync;

/// Callback bound to an interaction event.
#[derive(Clone)]
pub struct EventHandler(Arc<HandlerFn>);

impl EventHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&InteractionEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn call(&self, event: &InteractionEvent) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// Returns true for prop keys that bind interaction handlers: `on`
/// followed by an uppercase letter.
pub fn is_event_key(key: &str) -> bool {
    key.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// Maps an event name (`click`) to its prop key (`onClick`).
pub fn event_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Ordered set of nodes holding at least one interaction handler.
///
/// Picking code outside this crate reads the set; `version` changes on
/// every membership change so observers can detect updates cheaply.
#[derive(Clone, Default)]
pub struct Interactables {
    nodes: Arc<RwLock<Vec<Node>>>,
    version: Arc<AtomicU64>,
}

impl fmt::Debug for Interactables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactables")
            .field("len", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

impl Interactables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` unless it is already present.
    pub fn add(&self, node: &Node) -> bool {
        let mut guard = self.nodes.write();
        if guard.iter().any(|n| n.ptr_eq(node)) {
            return false;
        }
        guard.push(node.clone());
        self.bump();
        true
    }

    pub fn remove(&self, node: &Node) -> bool {
        let mut guard = self.nodes.write();
        let before = guard.len();
        guard.retain(|n| !n.ptr_eq(node));
        let removed = guard.len() != before;
        if removed {
            self.bump();
        }
        removed
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.read().iter().any(|n| n.ptr_eq(node))
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.read().clone()
    }

    pub fn clear(&self) {
        let mut guard = self.nodes.write();
        if !guard.is_empty() {
            guard.clear();
            self.bump();
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Delivers `event` to `node` if it is interactable. Returns whether a
    /// handler ran.
    pub fn dispatch(&self, node: &Node, event: &InteractionEvent) -> bool {
        if !self.contains(node) {
            return false;
        }
        node.emit(event)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minidom::MetaType;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn event_keys_need_uppercase_after_on() {
        assert!(is_event_key("onClick"));
        assert!(is_event_key("onPointerEnter"));
        assert!(!is_event_key("one"));
        assert!(!is_event_key("on"));
        assert!(!is_event_key("position"));
        assert_eq!(event_key("pointerLeave"), "onPointerLeave");
    }

    #[test]
    fn add_is_idempotent_and_bumps_version() {
        let set = Interactables::new();
        let node = Node::logical("group", MetaType::Object);
        assert!(set.add(&node));
        assert!(!set.add(&node));
        assert_eq!(set.len(), 1);
        assert_eq!(set.version(), 1);
        assert!(set.remove(&node));
        assert!(!set.remove(&node));
        assert_eq!(set.version(), 2);
    }

    #[test]
    fn dispatch_runs_the_bound_handler() {
        let set = Interactables::new();
        let node = Node::logical("mesh", MetaType::Object);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        node.set_handler(
            "onClick",
            EventHandler::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let event = InteractionEvent {
            name: "click".into(),
            target: node.uuid(),
            point: None,
        };
        assert!(!set.dispatch(&node, &event));
        set.add(&node);
        assert!(set.dispatch(&node, &event));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
