//! App factory: one app binds a node-operations adapter, an interactables
//! collection, a globals record and a render loop to a root component.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::callbacks::UpdateContext;
use crate::components::{catalogue, Component, ComponentRegistry, PassThrough, DEFAULT_CAMERA_POSITION};
use crate::context::{AppContext, InjectionKey};
use crate::element::{Element, Props};
use crate::error::MountError;
use crate::extend::ClassRegistry;
use crate::globals::{AppGlobals, Globals, GlobalsUpdate, WatchStopHandle};
use crate::graph::ClassDescriptor;
use crate::interactables::Interactables;
use crate::minidom::Node;
use crate::node_ops::{NodeOps, SceneNodeOps};
use crate::reconciler::{Reconciler, VNode};
use crate::render::{renderer_handle, HeadlessRenderer, RendererHandle};
use crate::render_loop::{FrameReport, RenderLoop};
use crate::surface::{MountTarget, Surface, SurfaceRegistry};

/// Knobs applied when an app is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Initial device pixel ratio.
    pub dpr: f32,
    /// Whether the `Lunchbox` wrapper adds a camera when none is given.
    pub default_camera: bool,
    pub camera_position: Vec3,
    pub camera_fov: f32,
    /// Clear color used when the wrapper gets no `background` prop.
    pub background: Option<Vec3>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dpr: 1.0,
            default_camera: true,
            camera_position: DEFAULT_CAMERA_POSITION,
            camera_fov: 50.0,
            background: None,
        }
    }
}

struct Mounted {
    root: Node,
    vnode: Option<VNode>,
    surface: Surface,
}

pub struct App {
    context: AppContext,
    classes: ClassRegistry,
    components: ComponentRegistry,
    reconciler: Reconciler<SceneNodeOps>,
    surfaces: SurfaceRegistry,
    config: AppConfig,
    root_component: Arc<dyn Component>,
    root_props: Props,
    mounted: Option<Mounted>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("components", &self.components)
            .field("mounted", &self.mounted.as_ref().map(|m| m.surface.id().to_string()))
            .finish()
    }
}

impl App {
    pub fn create<C: Component + 'static>(root: C) -> Self {
        Self::with_config(root, AppConfig::default())
    }

    pub fn with_config<C: Component + 'static>(root: C, config: AppConfig) -> Self {
        Self::from_component(Arc::new(root), config)
    }

    /// Builds an app around `root` and registers every catalogue
    /// component in its namespace.
    pub fn from_component(root: Arc<dyn Component>, config: AppConfig) -> Self {
        let globals = Globals::with_dpr(config.dpr);
        let interactables = Interactables::new();
        let context = AppContext::new(RenderLoop::new(globals.clone()), interactables.clone());

        let classes = ClassRegistry::with_builtins();
        let components = ComponentRegistry::new();
        for (name, component) in catalogue(&config) {
            components.register(name, component);
        }

        let ops = SceneNodeOps::new(classes.clone(), interactables, globals);
        let reconciler = Reconciler::new(ops, components.clone(), context.clone());
        Self {
            context,
            classes,
            components,
            reconciler,
            surfaces: SurfaceRegistry::new(),
            config,
            root_component: root,
            root_props: Props::new(),
            mounted: None,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn node_ops(&self) -> &SceneNodeOps {
        self.reconciler.ops()
    }

    /// Registers extra classes as tags of this app. Tags without a
    /// component of the same name also get a pass-through component.
    pub fn extend<I>(&self, classes: I) -> usize
    where
        I: IntoIterator<Item = ClassDescriptor>,
    {
        let classes: Vec<ClassDescriptor> = classes.into_iter().collect();
        for class in &classes {
            if !self.components.contains(class.name()) {
                self.components
                    .register(class.name(), Arc::new(PassThrough::new(class.name())));
            }
        }
        self.classes.register_namespace(classes)
    }

    pub fn component(&self, name: impl Into<String>, component: impl Component + 'static) {
        self.components.register(name, Arc::new(component));
    }

    pub fn provide<T: Any + Send + Sync>(&self, key: InjectionKey, value: T) {
        self.context.provide(key, value);
    }

    pub fn inject<T: Any + Clone>(&self, key: &InjectionKey) -> Option<T> {
        self.context.inject(key)
    }

    pub fn with_surfaces(mut self, surfaces: SurfaceRegistry) -> Self {
        self.surfaces = surfaces;
        self
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn globals(&self) -> &Globals {
        self.context.globals()
    }

    /// Binds `renderer` to this app and hands it the current pixel ratio.
    /// Without one, `mount` installs a headless renderer sized to the
    /// target surface.
    pub fn set_renderer(&self, renderer: RendererHandle) {
        self.context
            .update_globals(GlobalsUpdate::new().renderer(renderer));
    }

    pub fn root_props(&self) -> &Props {
        &self.root_props
    }

    /// Merges `props` into the props handed to the root component.
    pub fn merge_root_props(&mut self, props: Props) {
        self.root_props.extend(props);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn root_node(&self) -> Option<Node> {
        self.context.root_node()
    }

    /// Mounted tree below the root node.
    pub fn tree(&self) -> Option<&VNode> {
        self.mounted.as_ref().and_then(|m| m.vnode.as_ref())
    }

    pub fn mounted_surface(&self) -> Option<&Surface> {
        self.mounted.as_ref().map(|m| &m.surface)
    }

    fn render_root(&self) -> Element {
        self.root_component
            .render(&self.context, &self.root_props, Vec::new())
    }

    /// Resolves `target`, builds the tree under a fresh root node and
    /// starts the render loop.
    pub fn mount(&mut self, target: impl Into<MountTarget>) -> Result<Node, MountError> {
        if self.mounted.is_some() {
            return Err(MountError::AlreadyMounted);
        }
        let target = target.into();
        let surface = self.surfaces.resolve(&target).ok_or_else(|| match &target {
            MountTarget::Selector(selector) => MountError::TargetNotFound(selector.clone()),
            MountTarget::Surface(surface) => MountError::TargetNotFound(surface.id().to_string()),
        })?;

        let root = Node::root(surface.clone());
        self.context.set_root_node(Some(root.clone()));
        let element = self.render_root();
        let vnode = match self.reconciler.mount(&element, &root, None) {
            Ok(vnode) => vnode,
            Err(err) => {
                self.release(&root);
                return Err(err.into());
            }
        };

        let renderer = match self.globals().renderer() {
            Some(renderer) => renderer,
            None => {
                let (width, height) = surface.size();
                let renderer = renderer_handle(HeadlessRenderer::new(width, height));
                self.context
                    .update_globals(GlobalsUpdate::new().renderer(renderer.clone()));
                renderer
            }
        };
        let (width, height) = surface.size();
        renderer.lock().resize(width, height);

        self.context.render_loop().start();
        info!(
            "mounted app on `{}` with {} node(s)",
            surface.id(),
            vnode.count()
        );
        self.mounted = Some(Mounted {
            root: root.clone(),
            vnode: Some(vnode),
            surface,
        });
        Ok(root)
    }

    /// Re-renders the root component and patches the mounted tree. When the
    /// patch fails the old tree is gone and the next update mounts afresh.
    pub fn update(&mut self) -> Result<(), MountError> {
        let element = self.render_root();
        let mounted = self.mounted.as_mut().ok_or(MountError::NotMounted)?;
        let result = match mounted.vnode.take() {
            Some(old) => self.reconciler.patch(old, &element, &mounted.root),
            None => self.reconciler.mount(&element, &mounted.root, None),
        };
        match result {
            Ok(vnode) => {
                mounted.vnode = Some(vnode);
                Ok(())
            }
            Err(err) => {
                warn!("update of `{}` failed, tree unmounted: {err}", mounted.surface.id());
                Err(err.into())
            }
        }
    }

    /// Stops the loop and tears the tree down. The renderer and pixel
    /// ratio stay bound for a later mount.
    pub fn unmount(&mut self) -> Result<(), MountError> {
        let mounted = self.mounted.take().ok_or(MountError::NotMounted)?;
        self.context.render_loop().stop();
        self.release(&mounted.root);
        info!("unmounted app from `{}`", mounted.surface.id());
        Ok(())
    }

    fn release(&self, root: &Node) {
        let ops = self.reconciler.ops();
        for child in root.children() {
            if let Err(err) = ops.remove(&child) {
                warn!("failed to remove {} during unmount: {err}", child.tag());
            }
        }
        self.context.interactables().clear();
        self.globals().reset_mount_state();
        self.context.set_root_node(None);
    }

    /// Runs one frame of the render loop.
    pub fn tick(&self) -> Option<FrameReport> {
        self.context.render_loop().tick()
    }

    pub fn set_custom_render<F>(&self, render: F)
    where
        F: Fn(&UpdateContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.context.set_custom_render(render);
    }

    pub fn clear_custom_render(&self) {
        self.context.clear_custom_render();
    }

    /// Keeps the loop running only while `predicate` holds.
    pub fn set_watch<F>(&self, predicate: F) -> WatchStopHandle
    where
        F: Fn(&AppGlobals) -> bool + Send + Sync + 'static,
    {
        self.context.render_loop().set_watch(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::keys;
    use crate::context::GlobalsUpdater;
    use crate::element::PropValue;
    use crate::graph::{Category, Value};
    use crate::render::SceneRenderer;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scene_component(_: &AppContext, _: &Props, _: Vec<Element>) -> Element {
        Element::new("Lunchbox").child(
            Element::new("mesh")
                .prop("name", "cube")
                .child(Element::new("boxGeometry"))
                .child(Element::new("meshStandardMaterial").prop("color", "#ff0000")),
        )
    }

    fn app() -> App {
        let surfaces = SurfaceRegistry::new();
        surfaces.register(Surface::new("app", 640, 480).with_class("canvas"));
        App::create(scene_component).with_surfaces(surfaces)
    }

    #[test]
    fn create_registers_the_catalogue() {
        let app = app();
        assert!(app.components().contains("Lunchbox"));
        assert!(app.components().contains("perspectiveCamera"));
        assert!(!app.is_mounted());
    }

    #[test]
    fn mount_builds_scene_and_starts_loop() {
        let mut app = app();
        let root = app.mount("#app").unwrap();
        assert!(root.is_root());
        assert!(app.root_node().unwrap().ptr_eq(&root));
        assert!(app.context().render_loop().is_running());
        assert!(app.globals().scene().is_some());
        assert!(app.globals().camera().is_some());
        assert_eq!(app.tree().unwrap().count(), 5);

        let report = app.tick().unwrap();
        assert_eq!(report.frame_id, 0);
        assert!(report.rendered);
        assert_eq!(app.context().frame_id(), 0);
    }

    #[test]
    fn mount_fails_for_unknown_selector() {
        let mut app = app();
        assert_eq!(
            app.mount("#missing").unwrap_err(),
            MountError::TargetNotFound("#missing".to_string())
        );
        assert!(!app.is_mounted());
        assert!(app.root_node().is_none());
    }

    #[test]
    fn mount_twice_is_rejected() {
        let mut app = app();
        app.mount(".canvas").unwrap();
        assert_eq!(app.mount("#app").unwrap_err(), MountError::AlreadyMounted);
    }

    #[test]
    fn mount_accepts_a_surface_directly() {
        let mut app = App::create(scene_component);
        let root = app.mount(Surface::new("offscreen", 64, 64)).unwrap();
        assert_eq!(root.surface().unwrap().id(), "offscreen");
        let renderer = app.globals().renderer().unwrap();
        assert_eq!(renderer.lock().size(), (64, 64));
    }

    #[test]
    fn unmount_stops_callbacks() {
        let mut app = app();
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&before);
        app.context().on_before_render(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let a = Arc::clone(&after);
        app.context().on_after_render(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        app.mount("#app").unwrap();
        app.tick();
        app.unmount().unwrap();
        assert!(app.tick().is_none());
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);

        assert!(app.globals().scene().is_none());
        assert!(app.globals().camera().is_none());
        assert_eq!(app.globals().frame_id(), -1);
        assert!(app.globals().renderer().is_some());
        assert!(app.root_node().is_none());
        assert_eq!(app.unmount().unwrap_err(), MountError::NotMounted);
    }

    #[test]
    fn unmount_clears_interactables() {
        let mut app = App::create(|_: &AppContext, _: &Props, _: Vec<Element>| {
            Element::new("mesh").on("click", |_| {})
        });
        app.mount(Surface::new("app", 10, 10)).unwrap();
        assert_eq!(app.context().interactables().len(), 1);
        app.unmount().unwrap();
        assert!(app.context().interactables().is_empty());
    }

    #[test]
    fn globals_update_merges() {
        let app = app();
        let update: GlobalsUpdater = app.inject(&keys::UPDATE_GLOBALS).unwrap();
        update.apply(GlobalsUpdate::new().dpr(2.0));
        let globals = app.context().use_globals();
        assert_eq!(globals.dpr, 2.0);
        assert_eq!(globals.frame_id, -1);
        assert!(globals.camera.is_none());
    }

    #[test]
    fn custom_render_replaces_default_render() {
        let mut app = app();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        app.set_custom_render(move |cx| {
            assert!(cx.scene.is_some() && cx.camera.is_some());
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let headless = Arc::new(Mutex::new(HeadlessRenderer::new(640, 480)));
        let handle: RendererHandle = headless.clone();
        app.set_renderer(handle);
        app.mount("#app").unwrap();

        app.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(headless.lock().frames_rendered(), 0);

        app.clear_custom_render();
        app.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(headless.lock().frames_rendered(), 1);
        assert_eq!(headless.lock().last_draw().len(), 1);
    }

    #[test]
    fn set_renderer_applies_pixel_ratio() {
        let app = App::with_config(
            scene_component,
            AppConfig {
                dpr: 2.0,
                ..AppConfig::default()
            },
        );
        let headless = Arc::new(Mutex::new(HeadlessRenderer::default()));
        app.set_renderer(headless.clone());
        assert_eq!(headless.lock().pixel_ratio(), 2.0);

        let update: GlobalsUpdater = app.inject(&keys::UPDATE_GLOBALS).unwrap();
        update.apply(GlobalsUpdate::new().dpr(1.25));
        assert_eq!(headless.lock().pixel_ratio(), 1.25);
    }

    #[test]
    fn watch_halts_the_loop() {
        let mut app = app();
        app.mount("#app").unwrap();
        let handle = app.set_watch(|globals| globals.frame_id < 1);
        assert!(app.tick().is_some());
        assert!(app.tick().is_some());
        assert!(app.tick().is_none());
        assert!(!handle.is_active());
        assert!(!app.context().render_loop().is_running());
    }

    #[test]
    fn extend_adds_tags_and_components() {
        let mut app = App::create(|_: &AppContext, _: &Props, _: Vec<Element>| {
            Element::new("torusKnot").prop("tube", 0.5)
        });
        let added = app.extend([ClassDescriptor::new("torusKnot", Category::Mesh).property("tube", 0.4)]);
        assert_eq!(added, 1);
        assert!(app.components().contains("torusKnot"));

        app.mount(Surface::new("app", 10, 10)).unwrap();
        let node = app.tree().unwrap().node().clone();
        assert!(!node.is_placeholder());
        assert_eq!(node.instance().unwrap().get("tube"), Some(Value::Number(0.5)));
    }

    #[test]
    fn update_patches_with_new_root_props() {
        let mut app = App::create(|_: &AppContext, props: &Props, _: Vec<Element>| {
            let mut mesh = Element::new("mesh");
            if let Some(visible) = props.get("visible") {
                mesh = mesh.prop("visible", visible.clone());
            }
            mesh
        });
        app.mount(Surface::new("app", 10, 10)).unwrap();
        let instance = app.tree().unwrap().node().instance().unwrap();
        assert!(instance.read().visible);

        app.merge_root_props([("visible".to_string(), PropValue::from(false))].into());
        app.update().unwrap();
        assert!(!instance.read().visible);
    }

    #[test]
    fn update_recovers_after_a_failed_patch() {
        let mut app = App::create(|_: &AppContext, props: &Props, _: Vec<Element>| {
            let args = props.get("args").cloned().unwrap_or_else(|| PropValue::from("1 1"));
            Element::new("group").child(
                Element::new("mesh").child(Element::new("planeGeometry").prop("args", args)),
            )
        });
        let root = app.mount(Surface::new("app", 10, 10)).unwrap();

        app.merge_root_props([("args".to_string(), PropValue::from("1 1 1"))].into());
        assert!(matches!(
            app.update(),
            Err(MountError::Build(crate::error::NodeError::Construct(_)))
        ));
        assert!(app.tree().is_none());
        assert_eq!(root.child_count(), 0);

        app.merge_root_props([("args".to_string(), PropValue::from("1 1"))].into());
        app.update().unwrap();
        let scene = app.globals().scene().unwrap();
        assert_eq!(root.child_count(), 1);
        assert_eq!(scene.children().len(), 1);
        assert_eq!(app.tree().unwrap().count(), 3);
    }

    #[test]
    fn provide_and_inject_round_trip() {
        let app = app();
        let key = InjectionKey::new("answer");
        app.provide(key.clone(), 42_u32);
        assert_eq!(app.inject::<u32>(&key), Some(42));
        assert!(app.inject::<String>(&key).is_none());
        let interactables: Option<Interactables> = app.inject(&keys::INTERACTABLES);
        assert!(interactables.is_some());
    }

    #[test]
    fn config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.dpr, 1.0);
        assert!(config.default_camera);
        assert_eq!(config.camera_position, Vec3::new(0.0, 0.0, 10.0));
    }

    struct Failing;

    impl SceneRenderer for Failing {
        fn render(
            &mut self,
            _scene: &crate::graph::ObjectHandle,
            _camera: &crate::graph::ObjectHandle,
        ) -> Result<(), crate::error::RenderError> {
            Err(crate::error::RenderError::OutOfMemory)
        }

        fn resize(&mut self, _width: u32, _height: u32) {}

        fn set_pixel_ratio(&mut self, _ratio: f32) {}

        fn size(&self) -> (u32, u32) {
            (1, 1)
        }
    }

    #[test]
    fn render_failure_does_not_stop_the_loop() {
        let mut app = app();
        app.set_renderer(renderer_handle(Failing));
        app.mount("#app").unwrap();
        let first = app.tick().unwrap();
        assert!(!first.rendered);
        assert_eq!(first.failures, 1);
        assert_eq!(app.tick().unwrap().frame_id, 1);
    }
}
