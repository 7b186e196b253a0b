use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RenderError;
use crate::graph::ObjectHandle;

mod common;
mod headless;
pub mod native;
mod shared;

pub use common::{camera_params, collect_draw_items, light_params, CameraParams, DrawItem, LightParams};
pub use headless::HeadlessRenderer;

/// Backend that draws a scene from a camera's point of view.
pub trait SceneRenderer: Send {
    fn render(&mut self, scene: &ObjectHandle, camera: &ObjectHandle) -> Result<(), RenderError>;

    fn resize(&mut self, width: u32, height: u32);

    fn set_pixel_ratio(&mut self, ratio: f32);

    fn size(&self) -> (u32, u32);
}

/// Renderer shared between the app globals and the host.
pub type RendererHandle = Arc<Mutex<dyn SceneRenderer>>;

pub fn renderer_handle<R: SceneRenderer + 'static>(renderer: R) -> RendererHandle {
    Arc::new(Mutex::new(renderer))
}
