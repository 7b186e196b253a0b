//! Node operations: the bridge between tree reconciliation and the scene
//! graph.
//!
//! The reconciler thinks in terms of a DOM-like tree. The scene graph does
//! not: a material is not a child of a mesh but a value in one of its
//! slots. Every insert and remove therefore looks at the child's
//! [`MetaType`] to decide whether it touches the parent's children or one
//! of its slots. The root node is a pure container; objects inserted under
//! it go into the active scene.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::element::PropValue;
use crate::error::NodeError;
use crate::extend::ClassRegistry;
use crate::globals::{Globals, GlobalsUpdate};
use crate::graph::{Category, ClassDescriptor, ObjectHandle, Value};
use crate::interactables::{is_event_key, Interactables};
use crate::minidom::{MetaType, Node};

/// Primitive operations a tree reconciler needs from its host.
pub trait NodeOps {
    /// Creates a node for `tag`. Unknown tags produce a placeholder group
    /// instead of failing; constructor errors propagate.
    fn create_element(&self, tag: &str, args: &[Value]) -> Result<Node, NodeError>;

    fn create_text(&self, text: &str) -> Node;

    fn create_comment(&self, text: &str) -> Node;

    /// Inserts `child` under `parent` before `anchor`, or appends when
    /// `anchor` is `None`. A child that already has a parent is moved.
    fn insert(&self, child: &Node, parent: &Node, anchor: Option<&Node>) -> Result<(), NodeError>;

    /// Detaches `node` and releases the whole subtree.
    fn remove(&self, node: &Node) -> Result<(), NodeError>;

    /// Applies a prop change. `None` as `next` clears the prop.
    fn patch_prop(
        &self,
        node: &Node,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> Result<(), NodeError>;

    fn set_text(&self, node: &Node, text: &str);

    /// Replaces every child of `node` with a single text node.
    fn set_element_text(&self, node: &Node, text: &str) -> Result<(), NodeError>;

    fn parent_node(&self, node: &Node) -> Option<Node>;

    fn next_sibling(&self, node: &Node) -> Option<Node>;
}

/// [`NodeOps`] backed by the scene graph of one app.
#[derive(Debug, Clone)]
pub struct SceneNodeOps {
    classes: ClassRegistry,
    interactables: Interactables,
    globals: Globals,
    placeholder: Arc<ClassDescriptor>,
    auto_scene: Arc<RwLock<Option<ObjectHandle>>>,
}

impl SceneNodeOps {
    pub fn new(classes: ClassRegistry, interactables: Interactables, globals: Globals) -> Self {
        Self {
            classes,
            interactables,
            globals,
            placeholder: Arc::new(ClassDescriptor::new("group", Category::Group)),
            auto_scene: Arc::new(RwLock::new(None)),
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn interactables(&self) -> &Interactables {
        &self.interactables
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Active scene, created on first use when none was mounted.
    pub fn ensure_scene(&self) -> Result<ObjectHandle, NodeError> {
        if let Some(scene) = self.globals.scene() {
            return Ok(scene);
        }
        let class = self
            .classes
            .lookup("scene")
            .filter(|class| class.category() == Category::Scene)
            .unwrap_or_else(|| Arc::new(ClassDescriptor::new("scene", Category::Scene)));
        let scene = class.construct(&[])?;
        debug!("created default scene {}", scene.uuid());
        *self.auto_scene.write() = Some(scene.clone());
        self.globals.update(GlobalsUpdate::new().scene(scene.clone()));
        Ok(scene)
    }

    fn check_alive(node: &Node) -> Result<(), NodeError> {
        if node.is_disposed() {
            return Err(NodeError::Disposed { uuid: node.uuid() });
        }
        Ok(())
    }

    /// First instance at or after `anchor` that already sits under
    /// `parent_instance`; scene-graph children must be ordered the same
    /// way as their nodes.
    fn resolve_anchor(parent_instance: &ObjectHandle, anchor: Option<&Node>) -> Option<ObjectHandle> {
        let mut current = anchor.cloned();
        while let Some(node) = current {
            if let Some(instance) = node.instance() {
                if parent_instance.contains(&instance) {
                    return Some(instance);
                }
            }
            current = node.next_sibling();
        }
        None
    }

    fn attach_instance(&self, child: &Node, parent: &Node, anchor: Option<&Node>) -> Result<(), NodeError> {
        let Some(instance) = child.instance() else {
            return Ok(());
        };
        match child.meta_type() {
            MetaType::Object => self.attach_object(&instance, parent, anchor),
            MetaType::Attachment { slot } => {
                match parent.instance() {
                    Some(target) if !parent.is_root() => {
                        if let Some(previous) = target.attach(&slot, &instance) {
                            if !previous.ptr_eq(&instance) {
                                debug!("{} replaced {slot} of {}", child.tag(), parent.tag());
                            }
                        }
                    }
                    _ => warn!(
                        "cannot attach {} to `{slot}` of {}: parent has no object",
                        child.tag(),
                        parent.tag()
                    ),
                }
                Ok(())
            }
            MetaType::Root | MetaType::Text | MetaType::Comment => Ok(()),
        }
    }

    fn attach_object(&self, instance: &ObjectHandle, parent: &Node, anchor: Option<&Node>) -> Result<(), NodeError> {
        let category = instance.category();
        if category == Category::Camera && self.globals.camera().is_none() {
            debug!("using {} as the active camera", instance.class_name());
            self.globals
                .update(GlobalsUpdate::new().camera(instance.clone()));
        }

        if parent.is_root() {
            if category == Category::Scene {
                self.adopt_scene(instance);
                return Ok(());
            }
            let scene = self.ensure_scene()?;
            let before = Self::resolve_anchor(&scene, anchor);
            scene.insert_before(instance, before.as_ref());
            return Ok(());
        }

        match parent.instance() {
            Some(target) if target.category().is_object() => {
                let before = Self::resolve_anchor(&target, anchor);
                target.insert_before(instance, before.as_ref());
            }
            Some(target) => warn!(
                "cannot add {} under {}: not a scene-graph object",
                instance.class_name(),
                target.class_name()
            ),
            None => warn!(
                "cannot add {} under {}: parent has no object",
                instance.class_name(),
                parent.tag()
            ),
        }
        Ok(())
    }

    /// Makes `scene` the active scene. Objects that were parked in an
    /// automatically created scene move over.
    fn adopt_scene(&self, scene: &ObjectHandle) {
        if let Some(current) = self.globals.scene() {
            if current.ptr_eq(scene) {
                return;
            }
            let auto = self.auto_scene.write().take();
            match auto {
                Some(auto) if auto.ptr_eq(&current) => {
                    for child in auto.children() {
                        scene.add(&child);
                    }
                }
                _ => warn!("replacing active scene {} with {}", current.uuid(), scene.uuid()),
            }
        }
        self.globals.update(GlobalsUpdate::new().scene(scene.clone()));
    }

    fn detach_instance(&self, node: &Node) {
        let Some(instance) = node.instance() else {
            return;
        };
        match node.meta_type() {
            MetaType::Object => {
                if let Some(parent) = instance.parent() {
                    parent.remove(&instance);
                }
            }
            MetaType::Attachment { slot } => {
                let target = node.parent().and_then(|parent| parent.instance());
                if let Some(target) = target {
                    if target.slot(&slot).is_some_and(|current| current.ptr_eq(&instance)) {
                        target.detach(&slot);
                    }
                }
            }
            MetaType::Root | MetaType::Text | MetaType::Comment => {}
        }
    }

    /// Drops globals that point at `instance`.
    fn forget_instance(&self, instance: &ObjectHandle) {
        let snapshot = self.globals.snapshot();
        let mut update = GlobalsUpdate::new();
        let mut changed = false;
        if snapshot.camera.as_ref().is_some_and(|c| c.ptr_eq(instance)) {
            update = update.clear_camera();
            changed = true;
        }
        if snapshot.scene.as_ref().is_some_and(|s| s.ptr_eq(instance)) {
            update = update.clear_scene();
            changed = true;
        }
        if changed {
            self.globals.update(update);
        }
    }

    /// Re-parents the objects left under `root` after the active scene
    /// went away: another scene under the root takes over, otherwise a
    /// fresh default scene does.
    fn rehome_root_objects(&self, root: &Node) -> Result<(), NodeError> {
        let objects: Vec<ObjectHandle> = root
            .children()
            .iter()
            .filter(|child| child.meta_type() == MetaType::Object)
            .filter_map(Node::instance)
            .collect();
        if objects.is_empty() {
            return Ok(());
        }
        if let Some(scene) = objects.iter().find(|i| i.category() == Category::Scene) {
            self.adopt_scene(scene);
        }
        let scene = self.ensure_scene()?;
        for instance in objects.iter().filter(|i| i.category() != Category::Scene) {
            scene.add(instance);
        }
        debug!("moved {} root object(s) into scene {}", objects.len(), scene.uuid());
        Ok(())
    }

    fn set_name(node: &Node, value: Option<&Value>) -> Result<(), NodeError> {
        let name = match value {
            Some(Value::Text(text)) => text.clone(),
            Some(Value::Number(number)) => number.to_string(),
            Some(other) => {
                return Err(crate::error::PropertyError::KindMismatch {
                    path: "name".to_string(),
                    expected: crate::graph::ValueKind::Text,
                    found: other.kind(),
                }
                .into())
            }
            None => String::new(),
        };
        node.set_name(&name);
        if let Some(instance) = node.instance() {
            instance.write().name = name;
        }
        Ok(())
    }
}

impl NodeOps for SceneNodeOps {
    fn create_element(&self, tag: &str, args: &[Value]) -> Result<Node, NodeError> {
        let Some(class) = self.classes.lookup(tag) else {
            warn!("unknown tag `{tag}`, substituting a group");
            let instance = self.placeholder.construct(&[])?;
            return Ok(Node::placeholder(tag, instance));
        };
        let instance = class.construct(args)?;
        debug!("created {tag} {}", instance.uuid());
        Ok(Node::element(tag, class.meta_type(), instance))
    }

    fn create_text(&self, text: &str) -> Node {
        Node::text_node(text)
    }

    fn create_comment(&self, text: &str) -> Node {
        Node::comment(text)
    }

    fn insert(&self, child: &Node, parent: &Node, anchor: Option<&Node>) -> Result<(), NodeError> {
        Self::check_alive(child)?;
        Self::check_alive(parent)?;
        if !parent.accepts_children() {
            return Err(NodeError::InvalidParent { tag: parent.tag() });
        }
        if child.is_root() || child.contains(parent) {
            return Err(NodeError::Cycle { child: child.uuid() });
        }
        if child.parent().is_some() {
            self.detach_instance(child);
            child.unlink();
        }
        parent.link_child(child, anchor);
        self.attach_instance(child, parent, anchor)
    }

    fn remove(&self, node: &Node) -> Result<(), NodeError> {
        Self::check_alive(node)?;
        let parent = node.parent();
        self.detach_instance(node);
        node.unlink();
        let had_scene = self.globals.scene().is_some();
        for entry in node.descendants() {
            self.interactables.remove(&entry);
            if let Some(instance) = entry.dispose() {
                self.forget_instance(&instance);
            }
        }
        if had_scene && self.globals.scene().is_none() {
            if let Some(root) = parent.filter(Node::is_root) {
                self.rehome_root_objects(&root)?;
            }
        }
        Ok(())
    }

    fn patch_prop(
        &self,
        node: &Node,
        key: &str,
        prev: Option<&PropValue>,
        next: Option<&PropValue>,
    ) -> Result<(), NodeError> {
        Self::check_alive(node)?;
        if prev.is_some() && prev == next {
            return Ok(());
        }

        if is_event_key(key) {
            match next {
                Some(PropValue::Handler(handler)) => {
                    node.set_handler(key, handler.clone());
                    self.interactables.add(node);
                }
                Some(PropValue::Value(_)) => {
                    return Err(NodeError::ExpectedHandler { key: key.to_string() })
                }
                None => {
                    node.remove_handler(key);
                    if !node.has_handlers() {
                        self.interactables.remove(node);
                    }
                }
            }
            return Ok(());
        }

        let value = match next {
            Some(PropValue::Handler(_)) => {
                return Err(NodeError::UnexpectedHandler { key: key.to_string() })
            }
            Some(PropValue::Value(value)) => Some(value),
            None => None,
        };

        match key {
            "args" => Ok(()),
            "name" => Self::set_name(node, value),
            _ => {
                let Some(instance) = node.instance() else {
                    debug!("ignoring `{key}` on {} node", node.meta_type().label());
                    return Ok(());
                };
                match value {
                    Some(value) => instance.set(key, value.clone())?,
                    None => instance.reset(key)?,
                }
                Ok(())
            }
        }
    }

    fn set_text(&self, node: &Node, text: &str) {
        node.set_text(text);
    }

    fn set_element_text(&self, node: &Node, text: &str) -> Result<(), NodeError> {
        for child in node.children() {
            self.remove(&child)?;
        }
        if text.is_empty() {
            return Ok(());
        }
        let text = self.create_text(text);
        self.insert(&text, node, None)
    }

    fn parent_node(&self, node: &Node) -> Option<Node> {
        node.parent()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PropertyError;
    use crate::interactables::EventHandler;
    use crate::surface::Surface;
    use glam::Vec3;

    fn ops() -> SceneNodeOps {
        SceneNodeOps::new(ClassRegistry::with_builtins(), Interactables::new(), Globals::new())
    }

    fn root() -> Node {
        Node::root(Surface::new("app", 320, 240))
    }

    fn value(v: impl Into<Value>) -> PropValue {
        PropValue::Value(v.into())
    }

    /// Logical links and scene-graph links agree for every object node.
    fn assert_consistent(ops: &SceneNodeOps, node: &Node) {
        for child in node.children() {
            let Some(instance) = child.instance() else {
                continue;
            };
            match child.meta_type() {
                MetaType::Object if node.is_root() => {
                    let scene = ops.globals().scene().unwrap();
                    if instance.category() != Category::Scene {
                        assert!(scene.contains(&instance));
                    }
                }
                MetaType::Object => {
                    assert!(node.instance().unwrap().contains(&instance));
                }
                MetaType::Attachment { slot } => {
                    let attached = node.instance().unwrap().slot(&slot).unwrap();
                    assert!(attached.ptr_eq(&instance));
                }
                _ => {}
            }
            assert_consistent(ops, &child);
        }
    }

    #[test]
    fn mesh_geometry_material_round_trip() {
        let ops = ops();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        let geometry = ops.create_element("boxGeometry", &[]).unwrap();
        let material = ops.create_element("meshBasicMaterial", &[]).unwrap();
        ops.insert(&geometry, &mesh, None).unwrap();
        ops.insert(&material, &mesh, None).unwrap();
        let instance = mesh.instance().unwrap();
        assert!(instance.slot("geometry").is_some());
        assert!(instance.slot("material").is_some());

        ops.remove(&material).unwrap();
        assert!(instance.slot("material").is_none());
        assert!(instance.slot("geometry").is_some());
        assert_eq!(mesh.child_count(), 1);
        assert!(material.is_disposed());
    }

    #[test]
    fn unknown_tags_become_placeholder_groups() {
        let ops = ops();
        let node = ops.create_element("fancyThing", &[]).unwrap();
        assert!(node.is_placeholder());
        assert_eq!(node.meta_type(), MetaType::Object);
        let child = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&child, &node, None).unwrap();
        assert!(node.instance().unwrap().contains(&child.instance().unwrap()));
    }

    #[test]
    fn constructor_errors_propagate() {
        let ops = ops();
        let err = ops
            .create_element("planeGeometry", &[1.0.into(), 1.0.into(), 1.0.into()])
            .unwrap_err();
        assert!(matches!(err, NodeError::Construct(_)));
    }

    #[test]
    fn objects_under_root_land_in_the_active_scene() {
        let ops = ops();
        let root = root();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&mesh, &root, None).unwrap();
        let scene = ops.globals().scene().unwrap();
        assert!(scene.contains(&mesh.instance().unwrap()));

        let explicit = ops.create_element("scene", &[]).unwrap();
        ops.insert(&explicit, &root, None).unwrap();
        let active = ops.globals().scene().unwrap();
        assert!(active.ptr_eq(&explicit.instance().unwrap()));
        assert!(active.contains(&mesh.instance().unwrap()));
        assert_consistent(&ops, &root);
    }

    #[test]
    fn removing_the_active_scene_rehomes_root_objects() {
        let ops = ops();
        let root = root();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&mesh, &root, None).unwrap();
        let explicit = ops.create_element("scene", &[]).unwrap();
        ops.insert(&explicit, &root, None).unwrap();

        ops.remove(&explicit).unwrap();
        assert!(mesh.parent().unwrap().ptr_eq(&root));
        let active = ops.globals().scene().unwrap();
        assert!(mesh.instance().unwrap().parent().unwrap().ptr_eq(&active));
        assert_consistent(&ops, &root);
    }

    #[test]
    fn removing_the_active_scene_prefers_a_remaining_scene() {
        let ops = ops();
        let root = root();
        let first = ops.create_element("scene", &[]).unwrap();
        let second = ops.create_element("scene", &[]).unwrap();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&first, &root, None).unwrap();
        ops.insert(&second, &root, None).unwrap();
        ops.insert(&mesh, &root, None).unwrap();
        let first_instance = first.instance().unwrap();

        ops.remove(&second).unwrap();
        let active = ops.globals().scene().unwrap();
        assert!(active.ptr_eq(&first_instance));
        assert!(first_instance.contains(&mesh.instance().unwrap()));
        assert_consistent(&ops, &root);
    }

    #[test]
    fn first_camera_becomes_active() {
        let ops = ops();
        let root = root();
        let scene = ops.create_element("scene", &[]).unwrap();
        let first = ops.create_element("perspectiveCamera", &[]).unwrap();
        let second = ops.create_element("orthographicCamera", &[]).unwrap();
        ops.insert(&first, &scene, None).unwrap();
        ops.insert(&second, &scene, None).unwrap();
        ops.insert(&scene, &root, None).unwrap();
        let camera = ops.globals().camera().unwrap();
        assert!(camera.ptr_eq(&first.instance().unwrap()));

        ops.remove(&first).unwrap();
        assert!(ops.globals().camera().is_none());
    }

    #[test]
    fn insert_respects_anchor_in_both_trees() {
        let ops = ops();
        let group = ops.create_element("group", &[]).unwrap();
        let a = ops.create_element("mesh", &[]).unwrap();
        let b = ops.create_element("mesh", &[]).unwrap();
        let c = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&a, &group, None).unwrap();
        ops.insert(&c, &group, None).unwrap();
        ops.insert(&b, &group, Some(&c)).unwrap();

        let order: Vec<_> = group.children().iter().map(Node::uuid).collect();
        assert_eq!(order, vec![a.uuid(), b.uuid(), c.uuid()]);
        let instances = group.instance().unwrap().children();
        assert!(instances[1].ptr_eq(&b.instance().unwrap()));
        assert!(ops.next_sibling(&b).unwrap().ptr_eq(&c));
        assert!(ops.parent_node(&b).unwrap().ptr_eq(&group));
    }

    #[test]
    fn reparenting_detaches_from_the_old_parent() {
        let ops = ops();
        let left = ops.create_element("group", &[]).unwrap();
        let right = ops.create_element("group", &[]).unwrap();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&mesh, &left, None).unwrap();
        ops.insert(&mesh, &right, None).unwrap();
        assert_eq!(left.child_count(), 0);
        assert!(left.instance().unwrap().children().is_empty());
        assert!(right.instance().unwrap().contains(&mesh.instance().unwrap()));
        assert_consistent(&ops, &right);
    }

    #[test]
    fn insert_rejects_cycles_and_text_parents() {
        let ops = ops();
        let outer = ops.create_element("group", &[]).unwrap();
        let inner = ops.create_element("group", &[]).unwrap();
        ops.insert(&inner, &outer, None).unwrap();
        assert!(matches!(
            ops.insert(&outer, &inner, None),
            Err(NodeError::Cycle { .. })
        ));
        let text = ops.create_text("hello");
        assert!(matches!(
            ops.insert(&inner, &text, None),
            Err(NodeError::InvalidParent { .. })
        ));
    }

    #[test]
    fn patch_prop_is_idempotent_and_resets() {
        let ops = ops();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        let next = value(Vec3::new(1.0, 2.0, 3.0));
        ops.patch_prop(&mesh, "position", None, Some(&next)).unwrap();
        ops.patch_prop(&mesh, "position", None, Some(&next)).unwrap();
        let instance = mesh.instance().unwrap();
        assert_eq!(instance.read().position, Vec3::new(1.0, 2.0, 3.0));

        ops.patch_prop(&mesh, "position-x", None, Some(&value(5.0))).unwrap();
        assert_eq!(instance.read().position.x, 5.0);

        ops.patch_prop(&mesh, "position", Some(&next), None).unwrap();
        assert_eq!(instance.read().position, Vec3::ZERO);
    }

    #[test]
    fn patch_prop_reaches_into_slots() {
        let ops = ops();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        let material = ops.create_element("meshStandardMaterial", &[]).unwrap();
        ops.insert(&material, &mesh, None).unwrap();
        ops.patch_prop(&mesh, "material.roughness", None, Some(&value(0.25)))
            .unwrap();
        assert_eq!(
            material.instance().unwrap().get("roughness"),
            Some(Value::Number(0.25))
        );
        let err = ops
            .patch_prop(&mesh, "material.shininess", None, Some(&value(1.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Property(PropertyError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn event_props_track_interactables() {
        let ops = ops();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        let handler = PropValue::Handler(EventHandler::new(|_| {}));
        ops.patch_prop(&mesh, "onClick", None, Some(&handler)).unwrap();
        ops.patch_prop(&mesh, "onPointerEnter", None, Some(&handler))
            .unwrap();
        assert!(ops.interactables().contains(&mesh));
        assert_eq!(ops.interactables().len(), 1);

        ops.patch_prop(&mesh, "onClick", Some(&handler), None).unwrap();
        assert!(ops.interactables().contains(&mesh));
        ops.patch_prop(&mesh, "onPointerEnter", Some(&handler), None)
            .unwrap();
        assert!(!ops.interactables().contains(&mesh));

        assert!(matches!(
            ops.patch_prop(&mesh, "onClick", None, Some(&value(1.0))),
            Err(NodeError::ExpectedHandler { .. })
        ));
    }

    #[test]
    fn removing_a_subtree_clears_interactables() {
        let ops = ops();
        let group = ops.create_element("group", &[]).unwrap();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&mesh, &group, None).unwrap();
        let handler = PropValue::Handler(EventHandler::new(|_| {}));
        ops.patch_prop(&mesh, "onClick", None, Some(&handler)).unwrap();
        ops.remove(&group).unwrap();
        assert!(ops.interactables().is_empty());
        assert!(mesh.is_disposed());
        assert!(matches!(
            ops.patch_prop(&mesh, "visible", None, Some(&value(false))),
            Err(NodeError::Disposed { .. })
        ));
    }

    #[test]
    fn name_sets_node_and_instance() {
        let ops = ops();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.patch_prop(&mesh, "name", None, Some(&value("hero"))).unwrap();
        assert_eq!(mesh.name(), "hero");
        assert_eq!(mesh.instance().unwrap().read().name, "hero");
        ops.patch_prop(&mesh, "args", None, Some(&value(1.0))).unwrap();
    }

    #[test]
    fn set_element_text_replaces_children() {
        let ops = ops();
        let group = ops.create_element("group", &[]).unwrap();
        let mesh = ops.create_element("mesh", &[]).unwrap();
        ops.insert(&mesh, &group, None).unwrap();
        ops.set_element_text(&group, "label").unwrap();
        assert_eq!(group.child_count(), 1);
        assert_eq!(group.children()[0].text(), "label");
        assert!(group.instance().unwrap().children().is_empty());

        let text = group.children()[0].clone();
        ops.set_text(&text, "renamed");
        assert_eq!(text.text(), "renamed");
    }

    #[test]
    fn attachments_under_root_stay_logical() {
        let ops = ops();
        let root = root();
        let geometry = ops.create_element("boxGeometry", &[]).unwrap();
        ops.insert(&geometry, &root, None).unwrap();
        assert_eq!(root.child_count(), 1);
        assert!(ops.globals().scene().is_none());
    }
}
