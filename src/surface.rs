use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Output surface an app renders into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    id: String,
    #[serde(default)]
    classes: Vec<String>,
    width: u32,
    height: u32,
    #[serde(default = "default_pixel_ratio")]
    pixel_ratio: f32,
}

fn default_pixel_ratio() -> f32 {
    1.0
}

impl Surface {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            classes: Vec::new(),
            width: width.max(1),
            height: height.max(1),
            pixel_ratio: default_pixel_ratio(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Matches `#id`, `.class` or a bare id.
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            self.id == id
        } else if let Some(class) = selector.strip_prefix('.') {
            self.classes.iter().any(|c| c == class)
        } else {
            self.id == selector
        }
    }
}

/// Where `App::mount` should render.
#[derive(Debug, Clone, PartialEq)]
pub enum MountTarget {
    Selector(String),
    Surface(Surface),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<Surface> for MountTarget {
    fn from(surface: Surface) -> Self {
        Self::Surface(surface)
    }
}

/// Surfaces known to the host, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    surfaces: Arc<RwLock<Vec<Surface>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `surface`, replacing any surface with the same id.
    pub fn register(&self, surface: Surface) {
        let mut guard = self.surfaces.write();
        guard.retain(|s| s.id != surface.id);
        guard.push(surface);
    }

    pub fn unregister(&self, id: &str) -> Option<Surface> {
        let mut guard = self.surfaces.write();
        let index = guard.iter().position(|s| s.id == id)?;
        Some(guard.remove(index))
    }

    pub fn resize(&self, id: &str, width: u32, height: u32) -> bool {
        let mut guard = self.surfaces.write();
        match guard.iter_mut().find(|s| s.id == id) {
            Some(surface) => {
                surface.width = width.max(1);
                surface.height = height.max(1);
                true
            }
            None => false,
        }
    }

    /// First surface matching `selector`.
    pub fn query(&self, selector: &str) -> Option<Surface> {
        self.surfaces
            .read()
            .iter()
            .find(|s| s.matches(selector))
            .cloned()
    }

    pub fn resolve(&self, target: &MountTarget) -> Option<Surface> {
        match target {
            MountTarget::Selector(selector) => self.query(selector),
            MountTarget::Surface(surface) => Some(surface.clone()),
        }
    }
}
