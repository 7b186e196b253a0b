use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::graph::ObjectHandle;
use crate::render::RendererHandle;

/// Cancels a conditional render loop. Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct WatchStopHandle(Arc<AtomicBool>);

impl Default for WatchStopHandle {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl WatchStopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-app mutable state shared by the render loop and user code.
#[derive(Clone)]
pub struct AppGlobals {
    pub camera: Option<ObjectHandle>,
    pub scene: Option<ObjectHandle>,
    pub renderer: Option<RendererHandle>,
    pub dpr: f32,
    pub frame_id: i64,
    pub watch_stop_handle: Option<WatchStopHandle>,
}

impl Default for AppGlobals {
    fn default() -> Self {
        Self {
            camera: None,
            scene: None,
            renderer: None,
            dpr: 1.0,
            frame_id: -1,
            watch_stop_handle: None,
        }
    }
}

impl fmt::Debug for AppGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppGlobals")
            .field("camera", &self.camera)
            .field("scene", &self.scene)
            .field("renderer", &self.renderer.is_some())
            .field("dpr", &self.dpr)
            .field("frame_id", &self.frame_id)
            .field("watch_stop_handle", &self.watch_stop_handle)
            .finish()
    }
}

/// Partial record merged into [`AppGlobals`]. Unset fields are left alone.
#[derive(Clone, Default)]
pub struct GlobalsUpdate {
    camera: Option<Option<ObjectHandle>>,
    scene: Option<Option<ObjectHandle>>,
    renderer: Option<Option<RendererHandle>>,
    dpr: Option<f32>,
    frame_id: Option<i64>,
    watch_stop_handle: Option<Option<WatchStopHandle>>,
}

impl GlobalsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera: ObjectHandle) -> Self {
        self.camera = Some(Some(camera));
        self
    }

    pub fn clear_camera(mut self) -> Self {
        self.camera = Some(None);
        self
    }

    pub fn scene(mut self, scene: ObjectHandle) -> Self {
        self.scene = Some(Some(scene));
        self
    }

    pub fn clear_scene(mut self) -> Self {
        self.scene = Some(None);
        self
    }

    pub fn renderer(mut self, renderer: RendererHandle) -> Self {
        self.renderer = Some(Some(renderer));
        self
    }

    pub fn clear_renderer(mut self) -> Self {
        self.renderer = Some(None);
        self
    }

    pub fn dpr(mut self, dpr: f32) -> Self {
        self.dpr = Some(dpr);
        self
    }

    pub fn frame_id(mut self, frame_id: i64) -> Self {
        self.frame_id = Some(frame_id);
        self
    }

    pub fn watch_stop_handle(mut self, handle: Option<WatchStopHandle>) -> Self {
        self.watch_stop_handle = Some(handle);
        self
    }

    fn apply(self, globals: &mut AppGlobals) {
        if let Some(camera) = self.camera {
            globals.camera = camera;
        }
        if let Some(scene) = self.scene {
            globals.scene = scene;
        }
        if let Some(renderer) = self.renderer {
            globals.renderer = renderer;
        }
        if let Some(dpr) = self.dpr {
            globals.dpr = dpr;
        }
        if let Some(frame_id) = self.frame_id {
            globals.frame_id = frame_id;
        }
        if let Some(handle) = self.watch_stop_handle {
            globals.watch_stop_handle = handle;
        }
    }
}

/// Shared handle to one app's [`AppGlobals`].
#[derive(Debug, Clone, Default)]
pub struct Globals(Arc<RwLock<AppGlobals>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dpr(dpr: f32) -> Self {
        let globals = Self::default();
        globals.0.write().dpr = dpr;
        globals
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AppGlobals> {
        self.0.read()
    }

    pub fn snapshot(&self) -> AppGlobals {
        self.0.read().clone()
    }

    /// Merges `update` into the record, leaving unspecified fields intact.
    /// A changed pixel ratio, or a newly bound renderer, is pushed to the
    /// renderer after the record is updated.
    pub fn update(&self, update: GlobalsUpdate) {
        let touches_renderer = update.dpr.is_some() || matches!(update.renderer, Some(Some(_)));
        let (renderer, dpr) = {
            let mut globals = self.0.write();
            update.apply(&mut globals);
            (globals.renderer.clone(), globals.dpr)
        };
        if touches_renderer {
            if let Some(renderer) = renderer {
                renderer.lock().set_pixel_ratio(dpr);
            }
        }
    }

    pub fn camera(&self) -> Option<ObjectHandle> {
        self.0.read().camera.clone()
    }

    pub fn scene(&self) -> Option<ObjectHandle> {
        self.0.read().scene.clone()
    }

    pub fn renderer(&self) -> Option<RendererHandle> {
        self.0.read().renderer.clone()
    }

    pub fn dpr(&self) -> f32 {
        self.0.read().dpr
    }

    pub fn frame_id(&self) -> i64 {
        self.0.read().frame_id
    }

    pub(crate) fn advance_frame(&self) -> i64 {
        let mut guard = self.0.write();
        guard.frame_id += 1;
        guard.frame_id
    }

    /// Drops the scene, camera and loop state held for a mounted tree.
    pub(crate) fn reset_mount_state(&self) {
        let mut guard = self.0.write();
        guard.camera = None;
        guard.scene = None;
        guard.frame_id = -1;
        guard.watch_stop_handle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    #[test]
    fn update_merges_instead_of_replacing() {
        let globals = Globals::new();
        assert_eq!(globals.dpr(), 1.0);
        assert_eq!(globals.frame_id(), -1);
        globals.update(GlobalsUpdate::new().dpr(2.0));
        let snapshot = globals.snapshot();
        assert_eq!(snapshot.dpr, 2.0);
        assert_eq!(snapshot.frame_id, -1);
        assert!(snapshot.camera.is_none());
        assert!(snapshot.scene.is_none());
    }

    #[test]
    fn watch_stop_handle_is_one_way() {
        let handle = WatchStopHandle::new();
        assert!(handle.is_active());
        let clone = handle.clone();
        clone.stop();
        assert!(!handle.is_active());
    }

    #[test]
    fn dpr_changes_reach_the_bound_renderer() {
        let globals = Globals::with_dpr(2.0);
        let headless = Arc::new(parking_lot::Mutex::new(HeadlessRenderer::default()));
        globals.update(GlobalsUpdate::new().renderer(headless.clone()));
        assert_eq!(headless.lock().pixel_ratio(), 2.0);

        globals.update(GlobalsUpdate::new().dpr(1.5));
        assert_eq!(headless.lock().pixel_ratio(), 1.5);
        globals.update(GlobalsUpdate::new().frame_id(3));
        assert_eq!(headless.lock().pixel_ratio(), 1.5);
    }

    #[test]
    fn reset_mount_state_keeps_dpr() {
        let globals = Globals::with_dpr(3.0);
        globals.update(GlobalsUpdate::new().frame_id(10));
        globals.reset_mount_state();
        assert_eq!(globals.frame_id(), -1);
        assert_eq!(globals.dpr(), 3.0);
    }
}
