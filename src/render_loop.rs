//! Per-frame driver of an app.
//!
//! The host calls [`RenderLoop::tick`] once per frame (from a winit
//! redraw, a test, or a headless loop). Each tick runs the start callbacks
//! once after mount, then `beforeRender`, the render itself, `afterRender`,
//! and finally advances the frame id.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{error, info};
use parking_lot::RwLock;

use crate::callbacks::{panic_message, CallbackRegistry, UpdateCallback, UpdateContext};
use crate::globals::{AppGlobals, Globals, GlobalsUpdate, WatchStopHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Slot holding the optional render override. Clones share the slot.
#[derive(Clone, Default)]
pub struct CustomRender(Arc<RwLock<Option<UpdateCallback>>>);

impl fmt::Debug for CustomRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomRender").field(&self.is_set()).finish()
    }
}

impl CustomRender {
    pub fn set<F>(&self, render: F)
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        *self.0.write() = Some(UpdateCallback::new(render));
    }

    pub fn clear(&self) {
        *self.0.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.0.read().is_some()
    }

    pub fn get(&self) -> Option<UpdateCallback> {
        self.0.read().clone()
    }
}

type WatchPredicate = dyn Fn(&AppGlobals) -> bool + Send + Sync;

#[derive(Clone)]
struct Watch {
    predicate: Arc<WatchPredicate>,
    handle: WatchStopHandle,
}

/// Outcome of one frame that actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame id after the increment.
    pub frame_id: i64,
    /// Callbacks (and a custom render) that returned an error or panicked.
    pub failures: usize,
    /// Whether the default renderer or a custom render ran successfully.
    pub rendered: bool,
}

/// Scheduler owning the three callback lists of an app. Clones share the
/// same state.
#[derive(Clone)]
pub struct RenderLoop {
    state: Arc<RwLock<LoopState>>,
    globals: Globals,
    start: CallbackRegistry,
    before: CallbackRegistry,
    after: CallbackRegistry,
    custom_render: CustomRender,
    watch: Arc<RwLock<Option<Watch>>>,
    started: Arc<AtomicBool>,
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state())
            .field("start", &self.start)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("custom_render", &self.custom_render)
            .finish()
    }
}

impl RenderLoop {
    pub fn new(globals: Globals) -> Self {
        Self {
            state: Arc::new(RwLock::new(LoopState::Idle)),
            globals,
            start: CallbackRegistry::new("start"),
            before: CallbackRegistry::new("beforeRender"),
            after: CallbackRegistry::new("afterRender"),
            custom_render: CustomRender::default(),
            watch: Arc::new(RwLock::new(None)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn start_callbacks(&self) -> &CallbackRegistry {
        &self.start
    }

    pub fn before_render(&self) -> &CallbackRegistry {
        &self.before
    }

    pub fn after_render(&self) -> &CallbackRegistry {
        &self.after
    }

    pub fn custom_render(&self) -> &CustomRender {
        &self.custom_render
    }

    pub fn state(&self) -> LoopState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Idle to running. Start callbacks fire again on the next tick.
    pub fn start(&self) {
        *self.state.write() = LoopState::Running;
        self.started.store(false, Ordering::Release);
    }

    /// Running to idle. Drops any watch.
    pub fn stop(&self) {
        *self.state.write() = LoopState::Idle;
        if let Some(watch) = self.watch.write().take() {
            watch.handle.stop();
        }
    }

    /// Keeps the loop running only while `predicate` holds. The first tick
    /// that sees it false stops the returned handle and idles the loop;
    /// it does not resume on its own.
    pub fn set_watch<F>(&self, predicate: F) -> WatchStopHandle
    where
        F: Fn(&AppGlobals) -> bool + Send + Sync + 'static,
    {
        let handle = WatchStopHandle::new();
        let previous = self.watch.write().replace(Watch {
            predicate: Arc::new(predicate),
            handle: handle.clone(),
        });
        if let Some(previous) = previous {
            previous.handle.stop();
        }
        self.globals
            .update(GlobalsUpdate::new().watch_stop_handle(Some(handle.clone())));
        handle
    }

    fn watch_allows(&self) -> bool {
        let Some(watch) = self.watch.read().clone() else {
            return true;
        };
        if watch.handle.is_active() && (watch.predicate)(&self.globals.snapshot()) {
            return true;
        }
        watch.handle.stop();
        *self.state.write() = LoopState::Idle;
        info!("render loop halted by watch condition");
        false
    }

    /// Runs one frame. Returns `None` when the loop is idle.
    pub fn tick(&self) -> Option<FrameReport> {
        if !self.is_running() || !self.watch_allows() {
            return None;
        }

        let mut failures = 0;
        if !self.started.swap(true, Ordering::AcqRel) {
            failures += self.run_phase(&self.start);
        }
        failures += self.run_phase(&self.before);

        let rendered = match self.render() {
            Ok(rendered) => rendered,
            Err(err) => {
                failures += 1;
                error!("render failed on frame {}: {err:?}", self.globals.frame_id());
                false
            }
        };

        failures += self.run_phase(&self.after);
        let frame_id = self.globals.advance_frame();
        Some(FrameReport {
            frame_id,
            failures,
            rendered,
        })
    }

    fn run_phase(&self, registry: &CallbackRegistry) -> usize {
        let snapshot = self.globals.snapshot();
        registry.run(&context(&snapshot, &self.globals))
    }

    fn render(&self) -> Result<bool> {
        let snapshot = self.globals.snapshot();
        let context = context(&snapshot, &self.globals);
        if let Some(custom) = self.custom_render.get() {
            custom.call_isolated(&context)?;
            return Ok(true);
        }
        let (Some(renderer), Some(scene), Some(camera)) =
            (context.renderer, context.scene, context.camera)
        else {
            return Ok(false);
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| renderer.lock().render(scene, camera)));
        match result {
            Ok(result) => result.map(|()| true).map_err(Into::into),
            Err(panic) => Err(anyhow!("renderer panicked: {}", panic_message(panic))),
        }
    }
}

fn context<'a>(snapshot: &'a AppGlobals, globals: &'a Globals) -> UpdateContext<'a> {
    UpdateContext {
        frame_id: snapshot.frame_id,
        dpr: snapshot.dpr,
        scene: snapshot.scene.as_ref(),
        camera: snapshot.camera.as_ref(),
        renderer: snapshot.renderer.as_ref(),
        globals,
    }
}
