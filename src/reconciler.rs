//! Positional reconciler driving any [`NodeOps`] implementation.
//!
//! Component elements are expanded through the app's component namespace
//! before anything reaches the node operations. Patching compares props by
//! key and children by position; a changed tag, kind or `args` prop
//! replaces the node.

use log::warn;

use crate::components::ComponentRegistry;
use crate::context::AppContext;
use crate::element::{Element, ElementKind};
use crate::error::NodeError;
use crate::minidom::Node;
use crate::node_ops::NodeOps;

const MAX_EXPANSION_DEPTH: usize = 64;

/// A mounted element together with the node it produced.
#[derive(Debug, Clone)]
pub struct VNode {
    element: Element,
    node: Node,
    children: Vec<VNode>,
}

impl VNode {
    /// Host element this node was built from, without its children.
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    /// Number of mounted nodes in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(VNode::count).sum::<usize>()
    }
}

pub struct Reconciler<O: NodeOps> {
    ops: O,
    components: ComponentRegistry,
    context: AppContext,
}

impl<O: NodeOps> Reconciler<O> {
    pub fn new(ops: O, components: ComponentRegistry, context: AppContext) -> Self {
        Self {
            ops,
            components,
            context,
        }
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Resolves component elements until a host, text or comment element
    /// remains. Tags without a component are treated as host tags.
    pub fn expand(&self, element: &Element) -> Element {
        let mut current = element.clone();
        for _ in 0..MAX_EXPANSION_DEPTH {
            if current.kind != ElementKind::Component {
                return current;
            }
            let Some(component) = self.components.lookup(&current.tag) else {
                current.kind = ElementKind::Host;
                return current;
            };
            let children = std::mem::take(&mut current.children);
            current = component.render(&self.context, &current.props, children);
        }
        warn!("component `{}` keeps expanding, using it as a host tag", element.tag);
        current.kind = ElementKind::Host;
        current
    }

    /// Builds `element` and inserts it under `parent` before `anchor`. On
    /// error nothing of the new subtree is left behind.
    pub fn mount(&self, element: &Element, parent: &Node, anchor: Option<&Node>) -> Result<VNode, NodeError> {
        let mut element = self.expand(element);
        let child_elements = std::mem::take(&mut element.children);
        let node = match &element.kind {
            ElementKind::Text(text) => self.ops.create_text(text),
            ElementKind::Comment(text) => self.ops.create_comment(text),
            ElementKind::Host | ElementKind::Component => {
                self.ops.create_element(&element.tag, &element.args())?
            }
        };

        let mut children = Vec::with_capacity(child_elements.len());
        for child in &child_elements {
            match self.mount(child, &node, None) {
                Ok(vnode) => children.push(vnode),
                Err(err) => return Err(self.discard(&node, err)),
            }
        }
        for (key, value) in &element.props {
            self.apply_prop(&node, key, None, Some(value));
        }
        if let Err(err) = self.ops.insert(&node, parent, anchor) {
            return Err(self.discard(&node, err));
        }
        Ok(VNode {
            element,
            node,
            children,
        })
    }

    /// Brings the mounted `old` tree in line with `next`. On error the
    /// whole `old` subtree has been unmounted.
    pub fn patch(&self, old: VNode, next: &Element, parent: &Node) -> Result<VNode, NodeError> {
        let mut next = self.expand(next);
        if !same_node(&old.element, &next) {
            let anchor = self.ops.next_sibling(&old.node);
            return match self.mount(&next, parent, anchor.as_ref()) {
                Ok(mounted) => {
                    self.unmount(old)?;
                    Ok(mounted)
                }
                Err(err) => Err(self.discard(&old.node, err)),
            };
        }

        let VNode {
            element: previous,
            node,
            children: old_children,
        } = old;
        let next_children = std::mem::take(&mut next.children);

        if let (ElementKind::Text(before), ElementKind::Text(after)) = (&previous.kind, &next.kind) {
            if before != after {
                self.ops.set_text(&node, after);
            }
        }

        let mut children = Vec::with_capacity(next_children.len());
        let mut old_children = old_children.into_iter();
        for child in &next_children {
            let patched = match old_children.next() {
                Some(old_child) => self.patch(old_child, child, &node),
                None => self.mount(child, &node, None),
            };
            match patched {
                Ok(vnode) => children.push(vnode),
                Err(err) => return Err(self.discard(&node, err)),
            }
        }
        for stale in old_children {
            if let Err(err) = self.unmount(stale) {
                return Err(self.discard(&node, err));
            }
        }

        for (key, value) in &previous.props {
            if !next.props.contains_key(key) {
                self.apply_prop(&node, key, Some(value), None);
            }
        }
        for (key, value) in &next.props {
            self.apply_prop(&node, key, previous.props.get(key), Some(value));
        }

        Ok(VNode {
            element: next,
            node,
            children,
        })
    }

    pub fn unmount(&self, vnode: VNode) -> Result<(), NodeError> {
        self.ops.remove(&vnode.node)
    }

    /// Removes a partially built or partially patched subtree and hands
    /// back the error that interrupted it.
    fn discard(&self, node: &Node, err: NodeError) -> NodeError {
        if !node.is_disposed() {
            if let Err(cleanup) = self.ops.remove(node) {
                warn!("failed to discard {} after error: {cleanup}", node.tag());
            }
        }
        err
    }

    fn apply_prop(
        &self,
        node: &Node,
        key: &str,
        prev: Option<&crate::element::PropValue>,
        next: Option<&crate::element::PropValue>,
    ) {
        if let Err(err) = self.ops.patch_prop(node, key, prev, next) {
            warn!("failed to set `{key}` on {}: {err}", node.tag());
        }
    }
}

fn same_node(old: &Element, next: &Element) -> bool {
    let kind_matches = matches!(
        (&old.kind, &next.kind),
        (ElementKind::Text(_), ElementKind::Text(_))
            | (ElementKind::Comment(_), ElementKind::Comment(_))
            | (ElementKind::Host, ElementKind::Host)
    );
    kind_matches && old.tag == next.tag && old.props.get("args") == next.props.get("args")
}
