use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::error;
use parking_lot::RwLock;

use crate::globals::Globals;
use crate::graph::ObjectHandle;
use crate::render::RendererHandle;

/// State handed to update callbacks and custom render functions.
pub struct UpdateContext<'a> {
    pub frame_id: i64,
    pub dpr: f32,
    pub scene: Option<&'a ObjectHandle>,
    pub camera: Option<&'a ObjectHandle>,
    pub renderer: Option<&'a RendererHandle>,
    pub globals: &'a Globals,
}

type CallbackFn = dyn Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync;

/// Frame callback. Clones compare equal to each other, which is what
/// removal by value relies on.
#[derive(Clone)]
pub struct UpdateCallback(Arc<CallbackFn>);

impl UpdateCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&UpdateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn call(&self, context: &UpdateContext<'_>) -> Result<()> {
        (self.0)(context)
    }

    /// Runs the callback, turning a panic into an error.
    pub fn call_isolated(&self, context: &UpdateContext<'_>) -> Result<()> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.call(context))) {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("callback panicked: {}", panic_message(panic))),
        }
    }
}

impl PartialEq for UpdateCallback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for UpdateCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateCallback({:p})", Arc::as_ptr(&self.0))
    }
}

pub(crate) fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Ordered list of frame callbacks. Clones share the same list.
#[derive(Clone)]
pub struct CallbackRegistry {
    name: &'static str,
    callbacks: Arc<RwLock<Vec<UpdateCallback>>>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends `callback`.
    pub fn add(&self, callback: UpdateCallback) {
        self.callbacks.write().push(callback);
    }

    /// Inserts `callback` at `index`; indices past the end append.
    pub fn insert(&self, index: usize, callback: UpdateCallback) {
        let mut guard = self.callbacks.write();
        let index = index.min(guard.len());
        guard.insert(index, callback);
    }

    /// Removes the first registration equal to `callback`.
    pub fn remove(&self, callback: &UpdateCallback) -> bool {
        let mut guard = self.callbacks.write();
        match guard.iter().position(|c| c == callback) {
            Some(index) => {
                guard.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&self, index: usize) -> Option<UpdateCallback> {
        let mut guard = self.callbacks.write();
        (index < guard.len()).then(|| guard.remove(index))
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    pub fn snapshot(&self) -> Vec<UpdateCallback> {
        self.callbacks.read().clone()
    }

    /// Runs every callback in registration order. Failures are logged and
    /// do not stop later callbacks. Returns the number of failures.
    ///
    /// The list is snapshotted first, so callbacks may register or remove
    /// callbacks; changes apply from the next run.
    pub fn run(&self, context: &UpdateContext<'_>) -> usize {
        let mut failures = 0;
        for (index, callback) in self.snapshot().iter().enumerate() {
            if let Err(err) = callback.call_isolated(context) {
                failures += 1;
                error!(
                    "{} callback #{index} failed on frame {}: {err:?}",
                    self.name, context.frame_id
                );
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn context(globals: &Globals) -> UpdateContext<'_> {
        UpdateContext {
            frame_id: 0,
            dpr: 1.0,
            scene: None,
            camera: None,
            renderer: None,
            globals,
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> UpdateCallback {
        let log = Arc::clone(log);
        UpdateCallback::new(move |_| {
            log.lock().push(label);
            Ok(())
        })
    }

    #[test]
    fn insert_at_zero_runs_first() {
        let registry = CallbackRegistry::new("beforeRender");
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.add(recorder(&log, "a"));
        registry.add(recorder(&log, "b"));
        registry.insert(0, recorder(&log, "first"));
        registry.insert(99, recorder(&log, "last"));
        let globals = Globals::new();
        registry.run(&context(&globals));
        assert_eq!(*log.lock(), vec!["first", "a", "b", "last"]);
    }

    #[test]
    fn remove_by_value_and_index() {
        let registry = CallbackRegistry::new("afterRender");
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "a");
        registry.add(a.clone());
        registry.add(recorder(&log, "b"));
        registry.add(recorder(&log, "c"));
        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert!(registry.remove_at(1).is_some());
        assert!(registry.remove_at(5).is_none());
        let globals = Globals::new();
        registry.run(&context(&globals));
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[test]
    fn failing_callbacks_do_not_stop_the_rest() {
        let registry = CallbackRegistry::new("beforeRender");
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.add(UpdateCallback::new(|_| Err(anyhow!("boom"))));
        registry.add(UpdateCallback::new(|_| panic!("kaboom")));
        registry.add(recorder(&log, "survivor"));
        let globals = Globals::new();
        let failures = registry.run(&context(&globals));
        assert_eq!(failures, 2);
        assert_eq!(*log.lock(), vec!["survivor"]);
    }
}
