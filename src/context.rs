//! Explicit context threaded through an app: a typed provide/inject map
//! plus [`AppContext`], the bundle handed to components and setup code.

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use anyhow::Result;
use parking_lot::{Mutex, RwLock};

use crate::callbacks::{CallbackRegistry, UpdateCallback, UpdateContext};
use crate::globals::{AppGlobals, Globals, GlobalsUpdate, WatchStopHandle};
use crate::graph::ObjectHandle;
use crate::interactables::Interactables;
use crate::minidom::Node;
use crate::render::RendererHandle;
use crate::render_loop::{CustomRender, RenderLoop};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InjectionKey(Cow<'static, str>);

impl InjectionKey {
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys every app provides.
pub mod keys {
    use super::InjectionKey;

    /// [`WeakAppContext`](super::WeakAppContext)
    pub const APP: InjectionKey = InjectionKey::new("lunchbox.app");
    /// `Computed<Option<ObjectHandle>>`
    pub const CAMERA: InjectionKey = InjectionKey::new("lunchbox.camera");
    /// `Computed<Option<ObjectHandle>>`
    pub const SCENE: InjectionKey = InjectionKey::new("lunchbox.scene");
    /// `Computed<Option<RendererHandle>>`
    pub const RENDERER: InjectionKey = InjectionKey::new("lunchbox.renderer");
    /// `Computed<Option<Node>>`
    pub const ROOT_NODE: InjectionKey = InjectionKey::new("lunchbox.rootNode");
    /// [`Globals`](crate::globals::Globals)
    pub const GLOBALS: InjectionKey = InjectionKey::new("lunchbox.globals");
    /// [`GlobalsUpdater`](super::GlobalsUpdater)
    pub const UPDATE_GLOBALS: InjectionKey = InjectionKey::new("lunchbox.updateGlobals");
    /// [`Interactables`](crate::interactables::Interactables)
    pub const INTERACTABLES: InjectionKey = InjectionKey::new("lunchbox.interactables");
    /// [`CallbackRegistry`](crate::callbacks::CallbackRegistry)
    pub const START_CALLBACKS: InjectionKey = InjectionKey::new("lunchbox.startCallbacks");
    pub const BEFORE_RENDER: InjectionKey = InjectionKey::new("lunchbox.beforeRender");
    pub const AFTER_RENDER: InjectionKey = InjectionKey::new("lunchbox.afterRender");
    /// `Computed<i64>`
    pub const FRAME_ID: InjectionKey = InjectionKey::new("lunchbox.frameId");
    /// `Computed<Option<WatchStopHandle>>`
    pub const WATCH_STOP_HANDLE: InjectionKey = InjectionKey::new("lunchbox.watchStopHandle");
    /// [`CustomRender`](crate::render_loop::CustomRender)
    pub const CUSTOM_RENDER: InjectionKey = InjectionKey::new("lunchbox.customRender");
}

/// Read-only value recomputed on every access.
pub struct Computed<T>(Arc<dyn Fn() -> T + Send + Sync>);

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Computed")
    }
}

impl<T> Computed<T> {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self(Arc::new(compute))
    }

    pub fn get(&self) -> T {
        (self.0)()
    }
}

/// Write side of the globals, as provided under [`keys::UPDATE_GLOBALS`].
#[derive(Clone)]
pub struct GlobalsUpdater(Arc<dyn Fn(GlobalsUpdate) + Send + Sync>);

impl GlobalsUpdater {
    pub fn new(globals: Globals) -> Self {
        Self(Arc::new(move |update| globals.update(update)))
    }

    pub fn apply(&self, update: GlobalsUpdate) {
        (self.0)(update)
    }
}

impl fmt::Debug for GlobalsUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalsUpdater")
    }
}

type Provided = Arc<dyn Any + Send + Sync>;

/// Typed key/value context map. Clones share the same map.
#[derive(Clone, Default)]
pub struct Provides(Arc<RwLock<BTreeMap<InjectionKey, Provided>>>);

impl fmt::Debug for Provides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl Provides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide<T: Any + Send + Sync>(&self, key: InjectionKey, value: T) {
        self.0.write().insert(key, Arc::new(value));
    }

    /// Returns a clone of the value under `key` if it has type `T`.
    pub fn inject<T: Any + Clone>(&self, key: &InjectionKey) -> Option<T> {
        self.0.read().get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn contains(&self, key: &InjectionKey) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<InjectionKey> {
        self.0.read().keys().cloned().collect()
    }

    /// Copies every entry of `other` whose key is not provided here yet.
    /// Later changes to `other` are not followed. Returns the number of
    /// entries copied.
    pub fn extend_missing(&self, other: &Provides) -> usize {
        if Arc::ptr_eq(&self.0, &other.0) {
            return 0;
        }
        let source = other.0.read().clone();
        let mut target = self.0.write();
        let mut copied = 0;
        for (key, value) in source {
            if !target.contains_key(&key) {
                target.insert(key, value);
                copied += 1;
            }
        }
        copied
    }
}

/// Slot holding the root node while an app is mounted.
pub(crate) type RootSlot = Arc<RwLock<Option<Node>>>;

struct ContextInner {
    provides: Provides,
    render_loop: RenderLoop,
    interactables: Interactables,
    root: RootSlot,
}

/// Everything user code may reach inside one app.
#[derive(Clone)]
pub struct AppContext(Arc<ContextInner>);

/// Non-owning reference to an [`AppContext`].
#[derive(Clone)]
pub struct WeakAppContext(Weak<ContextInner>);

impl WeakAppContext {
    pub fn upgrade(&self) -> Option<AppContext> {
        self.0.upgrade().map(AppContext)
    }
}

impl fmt::Debug for WeakAppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakAppContext")
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("provides", &self.0.provides)
            .field("render_loop", &self.0.render_loop)
            .finish()
    }
}

impl AppContext {
    pub(crate) fn new(render_loop: RenderLoop, interactables: Interactables) -> Self {
        let context = Self(Arc::new(ContextInner {
            provides: Provides::new(),
            render_loop,
            interactables,
            root: Arc::new(RwLock::new(None)),
        }));
        context.provide_defaults();
        context
    }

    fn provide_defaults(&self) {
        let provides = &self.0.provides;
        let globals = self.globals().clone();

        provides.provide(keys::APP, self.downgrade());
        let g = globals.clone();
        provides.provide(keys::CAMERA, Computed::new(move || g.camera()));
        let g = globals.clone();
        provides.provide(keys::SCENE, Computed::new(move || g.scene()));
        let g = globals.clone();
        provides.provide(keys::RENDERER, Computed::new(move || g.renderer()));
        let g = globals.clone();
        provides.provide(keys::FRAME_ID, Computed::new(move || g.frame_id()));
        let g = globals.clone();
        provides.provide(
            keys::WATCH_STOP_HANDLE,
            Computed::new(move || g.read().watch_stop_handle.clone()),
        );
        let root = Arc::clone(&self.0.root);
        provides.provide(keys::ROOT_NODE, Computed::new(move || root.read().clone()));
        provides.provide(keys::GLOBALS, globals.clone());
        provides.provide(keys::UPDATE_GLOBALS, GlobalsUpdater::new(globals));
        provides.provide(keys::INTERACTABLES, self.0.interactables.clone());

        let render_loop = &self.0.render_loop;
        provides.provide(keys::START_CALLBACKS, render_loop.start_callbacks().clone());
        provides.provide(keys::BEFORE_RENDER, render_loop.before_render().clone());
        provides.provide(keys::AFTER_RENDER, render_loop.after_render().clone());
        provides.provide(keys::CUSTOM_RENDER, render_loop.custom_render().clone());
    }

    pub fn downgrade(&self) -> WeakAppContext {
        WeakAppContext(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &AppContext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn provides(&self) -> &Provides {
        &self.0.provides
    }

    pub fn provide<T: Any + Send + Sync>(&self, key: InjectionKey, value: T) {
        self.0.provides.provide(key, value);
    }

    pub fn inject<T: Any + Clone>(&self, key: &InjectionKey) -> Option<T> {
        self.0.provides.inject(key)
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.0.render_loop
    }

    pub fn globals(&self) -> &Globals {
        self.0.render_loop.globals()
    }

    pub fn use_camera(&self) -> Option<ObjectHandle> {
        self.globals().camera()
    }

    pub fn use_scene(&self) -> Option<ObjectHandle> {
        self.globals().scene()
    }

    pub fn use_renderer(&self) -> Option<RendererHandle> {
        self.globals().renderer()
    }

    pub fn use_globals(&self) -> AppGlobals {
        self.globals().snapshot()
    }

    /// Merges a partial record into the globals.
    pub fn update_globals(&self, update: GlobalsUpdate) {
        self.globals().update(update);
    }

    pub fn frame_id(&self) -> i64 {
        self.globals().frame_id()
    }

    pub fn watch_stop_handle(&self) -> Option<WatchStopHandle> {
        self.globals().read().watch_stop_handle.clone()
    }

    pub fn start_callbacks(&self) -> &CallbackRegistry {
        self.0.render_loop.start_callbacks()
    }

    pub fn before_render(&self) -> &CallbackRegistry {
        self.0.render_loop.before_render()
    }

    pub fn after_render(&self) -> &CallbackRegistry {
        self.0.render_loop.after_render()
    }

    /// Registers a callback run once on the first frame after mount. The
    /// returned value can be passed to [`CallbackRegistry::remove`].
    pub fn on_start<F>(&self, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.start_callbacks(), None, callback)
    }

    pub fn on_start_at<F>(&self, index: usize, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.start_callbacks(), Some(index), callback)
    }

    /// Calls `callback` with the active scene right away when there is
    /// one, otherwise on the first frame that has one. It is called again
    /// each time a different scene becomes active. Remove it with
    /// [`Self::off_before_render`].
    pub fn on_scene<F>(&self, callback: F) -> UpdateCallback
    where
        F: Fn(&ObjectHandle) + Send + Sync + 'static,
    {
        let current = self.use_scene();
        if let Some(scene) = &current {
            callback(scene);
        }
        let seen = Mutex::new(current);
        push(self.before_render(), Some(0), move |cx| {
            let Some(scene) = cx.scene else {
                return Ok(());
            };
            {
                let mut seen = seen.lock();
                if seen.as_ref().is_some_and(|s| s.ptr_eq(scene)) {
                    return Ok(());
                }
                *seen = Some(scene.clone());
            }
            callback(scene);
            Ok(())
        })
    }

    pub fn on_before_render<F>(&self, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.before_render(), None, callback)
    }

    /// Like [`Self::on_before_render`] but inserted at `index`.
    pub fn on_before_render_at<F>(&self, index: usize, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.before_render(), Some(index), callback)
    }

    pub fn off_before_render(&self, callback: &UpdateCallback) -> bool {
        self.before_render().remove(callback)
    }

    pub fn on_after_render<F>(&self, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.after_render(), None, callback)
    }

    pub fn on_after_render_at<F>(&self, index: usize, callback: F) -> UpdateCallback
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        push(self.after_render(), Some(index), callback)
    }

    pub fn off_after_render(&self, callback: &UpdateCallback) -> bool {
        self.after_render().remove(callback)
    }

    pub fn custom_render(&self) -> &CustomRender {
        self.0.render_loop.custom_render()
    }

    /// Replaces the default render call. Callbacks still run around it.
    pub fn set_custom_render<F>(&self, render: F)
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.custom_render().set(render);
    }

    pub fn clear_custom_render(&self) {
        self.custom_render().clear();
    }

    pub fn root_node(&self) -> Option<Node> {
        self.0.root.read().clone()
    }

    pub(crate) fn set_root_node(&self, root: Option<Node>) {
        *self.0.root.write() = root;
    }

    pub fn interactables(&self) -> &Interactables {
        &self.0.interactables
    }
}

fn push<F>(registry: &CallbackRegistry, index: Option<usize>, callback: F) -> UpdateCallback
where
    F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
{
    let callback = UpdateCallback::new(callback);
    match index {
        Some(index) => registry.insert(index, callback.clone()),
        None => registry.add(callback.clone()),
    }
    callback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extend::ClassRegistry;

    fn context() -> AppContext {
        AppContext::new(RenderLoop::new(Globals::new()), Interactables::new())
    }

    #[test]
    fn standard_keys_are_provided() {
        let cx = context();
        for key in [
            keys::APP,
            keys::CAMERA,
            keys::SCENE,
            keys::RENDERER,
            keys::ROOT_NODE,
            keys::GLOBALS,
            keys::UPDATE_GLOBALS,
            keys::INTERACTABLES,
            keys::START_CALLBACKS,
            keys::BEFORE_RENDER,
            keys::AFTER_RENDER,
            keys::FRAME_ID,
            keys::WATCH_STOP_HANDLE,
            keys::CUSTOM_RENDER,
        ] {
            assert!(cx.provides().contains(&key), "{key}");
        }
        let app: WeakAppContext = cx.inject(&keys::APP).unwrap();
        assert!(app.upgrade().unwrap().ptr_eq(&cx));
    }

    #[test]
    fn computed_values_follow_globals() {
        let cx = context();
        let frame: Computed<i64> = cx.inject(&keys::FRAME_ID).unwrap();
        assert_eq!(frame.get(), -1);
        let update: GlobalsUpdater = cx.inject(&keys::UPDATE_GLOBALS).unwrap();
        update.apply(GlobalsUpdate::new().frame_id(7).dpr(2.0));
        assert_eq!(frame.get(), 7);
        assert_eq!(cx.use_globals().dpr, 2.0);
    }

    #[test]
    fn inject_checks_the_type() {
        let cx = context();
        assert!(cx.inject::<Globals>(&keys::FRAME_ID).is_none());
        assert!(cx.inject::<Globals>(&InjectionKey::new("missing")).is_none());
    }

    #[test]
    fn extend_missing_keeps_existing_entries() {
        let host = Provides::new();
        host.provide(InjectionKey::new("theme"), "dark".to_string());
        host.provide(InjectionKey::new("shared"), 1_u32);
        let child = Provides::new();
        child.provide(InjectionKey::new("shared"), 2_u32);
        assert_eq!(child.extend_missing(&host), 1);
        assert_eq!(child.inject::<u32>(&InjectionKey::new("shared")), Some(2));
        assert_eq!(
            child.inject::<String>(&InjectionKey::owned("theme")),
            Some("dark".to_string())
        );
    }

    fn scene() -> ObjectHandle {
        ClassRegistry::with_builtins()
            .lookup("scene")
            .unwrap()
            .construct(&[])
            .unwrap()
    }

    #[test]
    fn start_callbacks_honour_the_index() {
        let cx = context();
        let a = cx.on_start(|_| Ok(()));
        let b = cx.on_start_at(0, |_| Ok(()));
        let c = cx.on_start_at(10, |_| Ok(()));
        assert_eq!(cx.start_callbacks().snapshot(), vec![b, a, c]);
    }

    #[test]
    fn on_scene_waits_for_a_scene_and_follows_changes() {
        let cx = context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        cx.on_scene(move |scene| log.lock().push(scene.uuid()));
        cx.render_loop().start();
        cx.render_loop().tick();
        assert!(seen.lock().is_empty());

        let first = scene();
        cx.update_globals(GlobalsUpdate::new().scene(first.clone()));
        cx.render_loop().tick();
        cx.render_loop().tick();
        assert_eq!(*seen.lock(), vec![first.uuid()]);

        let second = scene();
        cx.update_globals(GlobalsUpdate::new().scene(second.clone()));
        cx.render_loop().tick();
        assert_eq!(*seen.lock(), vec![first.uuid(), second.uuid()]);
    }

    #[test]
    fn on_scene_runs_immediately_when_a_scene_exists() {
        let cx = context();
        let current = scene();
        cx.update_globals(GlobalsUpdate::new().scene(current.clone()));
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let callback = cx.on_scene(move |_| *counter.lock() += 1);
        assert_eq!(*calls.lock(), 1);
        cx.render_loop().start();
        cx.render_loop().tick();
        assert_eq!(*calls.lock(), 1);
        assert!(cx.off_before_render(&callback));
    }

    #[test]
    fn callbacks_can_be_inserted_and_removed() {
        let cx = context();
        let a = cx.on_before_render(|_| Ok(()));
        let b = cx.on_before_render_at(0, |_| Ok(()));
        assert_eq!(cx.before_render().snapshot(), vec![b.clone(), a.clone()]);
        assert!(cx.off_before_render(&b));
        assert_eq!(cx.before_render().len(), 1);
        cx.on_after_render(|_| Ok(()));
        assert_eq!(cx.after_render().len(), 1);
    }
}
