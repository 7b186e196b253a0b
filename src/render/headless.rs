use crate::error::RenderError;
use crate::graph::ObjectHandle;

use super::common::{camera_params, collect_draw_items, CameraParams, DrawItem};
use super::SceneRenderer;

/// Renderer without a GPU surface. It walks the scene exactly like the
/// window renderer does and keeps the last draw list for inspection.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    frames_rendered: u64,
    last_draw: Vec<DrawItem>,
    last_camera: Option<CameraParams>,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: 1.0,
            frames_rendered: 0,
            last_draw: Vec::new(),
            last_camera: None,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn last_draw(&self) -> &[DrawItem] {
        &self.last_draw
    }

    pub fn last_camera(&self) -> Option<&CameraParams> {
        self.last_camera.as_ref()
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn render(&mut self, scene: &ObjectHandle, camera: &ObjectHandle) -> Result<(), RenderError> {
        let aspect = self.width as f32 / self.height as f32;
        self.last_camera = Some(camera_params(camera, aspect));
        self.last_draw = collect_draw_items(scene);
        self.frames_rendered += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
