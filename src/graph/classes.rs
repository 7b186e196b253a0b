use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConstructError;
use crate::minidom::MetaType;

use super::object::{ObjectHandle, SceneObject};
use super::value::Value;

/// Broad classification of a library class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scene,
    Group,
    Mesh,
    Camera,
    Light,
    Geometry,
    Material,
    Texture,
    Fog,
}

impl Category {
    /// Objects live in the scene graph; everything else is attached to a
    /// named slot of its parent.
    pub fn is_object(self) -> bool {
        self.default_slot().is_none()
    }

    pub fn default_slot(self) -> Option<&'static str> {
        match self {
            Self::Scene | Self::Group | Self::Mesh | Self::Camera | Self::Light => None,
            Self::Geometry => Some("geometry"),
            Self::Material => Some("material"),
            Self::Texture => Some("map"),
            Self::Fog => Some("fog"),
        }
    }
}

/// One entry of a class's property table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub default: Value,
}

/// Constructor and property table of a library class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    name: String,
    category: Category,
    properties: Vec<PropertyDescriptor>,
    args: Vec<String>,
    attach: Option<String>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            properties: Vec::new(),
            args: Vec::new(),
            attach: None,
        }
    }

    /// Declares a property together with its default value. The default
    /// also fixes the property's value kind.
    pub fn property(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let name = name.into();
        let default = default.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.default = default,
            None => self.properties.push(PropertyDescriptor { name, default }),
        }
        self
    }

    /// Names the properties filled by positional constructor arguments.
    pub fn args<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = names.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the slot an attachment class is assigned to.
    pub fn attach(mut self, slot: impl Into<String>) -> Self {
        self.attach = Some(slot.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn attach_slot(&self) -> Option<&str> {
        if self.category.is_object() {
            return None;
        }
        self.attach
            .as_deref()
            .or_else(|| self.category.default_slot())
    }

    pub fn meta_type(&self) -> MetaType {
        match self.attach_slot() {
            Some(slot) => MetaType::Attachment {
                slot: slot.to_string(),
            },
            None => MetaType::Object,
        }
    }

    /// Builds a new instance, assigning `args` positionally.
    pub fn construct(self: &Arc<Self>, args: &[Value]) -> Result<ObjectHandle, ConstructError> {
        if args.len() > self.args.len() {
            return Err(ConstructError::TooManyArguments {
                class: self.name.clone(),
                max: self.args.len(),
                given: args.len(),
            });
        }
        let mut object = SceneObject::new(Arc::clone(self));
        for (index, (name, value)) in self.args.iter().zip(args).enumerate() {
            let Some(property) = self.find_property(name) else {
                continue;
            };
            let expected = property.default.kind();
            let coerced =
                value
                    .clone()
                    .coerce(expected)
                    .ok_or_else(|| ConstructError::InvalidArgument {
                        class: self.name.clone(),
                        index,
                        expected,
                        found: value.kind(),
                    })?;
            object.insert_param(name, coerced);
        }
        Ok(ObjectHandle::new(object))
    }
}

/// Classes every app knows about without calling `extend`.
pub fn builtin_classes() -> Vec<ClassDescriptor> {
    let white = Value::Color(Vec3::ONE);
    vec![
        ClassDescriptor::new("scene", Category::Scene)
            .property("background", Value::Color(Vec3::new(0.03, 0.03, 0.05))),
        ClassDescriptor::new("group", Category::Group),
        ClassDescriptor::new("mesh", Category::Mesh).property("renderOrder", 0.0),
        ClassDescriptor::new("perspectiveCamera", Category::Camera)
            .property("fov", 50.0)
            .property("aspect", 1.0)
            .property("near", 0.1)
            .property("far", 2000.0)
            .property("zoom", 1.0)
            .args(["fov", "aspect", "near", "far"]),
        ClassDescriptor::new("orthographicCamera", Category::Camera)
            .property("left", -1.0)
            .property("right", 1.0)
            .property("top", 1.0)
            .property("bottom", -1.0)
            .property("near", 0.1)
            .property("far", 2000.0)
            .property("zoom", 1.0)
            .args(["left", "right", "top", "bottom", "near", "far"]),
        ClassDescriptor::new("ambientLight", Category::Light)
            .property("color", white.clone())
            .property("intensity", 1.0)
            .args(["color", "intensity"]),
        ClassDescriptor::new("directionalLight", Category::Light)
            .property("color", white.clone())
            .property("intensity", 1.0)
            .args(["color", "intensity"]),
        ClassDescriptor::new("pointLight", Category::Light)
            .property("color", white.clone())
            .property("intensity", 1.0)
            .property("distance", 0.0)
            .property("decay", 2.0)
            .args(["color", "intensity", "distance", "decay"]),
        ClassDescriptor::new("boxGeometry", Category::Geometry)
            .property("width", 1.0)
            .property("height", 1.0)
            .property("depth", 1.0)
            .args(["width", "height", "depth"]),
        ClassDescriptor::new("sphereGeometry", Category::Geometry)
            .property("radius", 1.0)
            .property("widthSegments", 32.0)
            .property("heightSegments", 16.0)
            .args(["radius", "widthSegments", "heightSegments"]),
        ClassDescriptor::new("planeGeometry", Category::Geometry)
            .property("width", 1.0)
            .property("height", 1.0)
            .args(["width", "height"]),
        ClassDescriptor::new("meshBasicMaterial", Category::Material)
            .property("color", white.clone())
            .property("opacity", 1.0)
            .property("transparent", false)
            .property("wireframe", false),
        ClassDescriptor::new("meshStandardMaterial", Category::Material)
            .property("color", white.clone())
            .property("opacity", 1.0)
            .property("transparent", false)
            .property("wireframe", false)
            .property("metalness", 0.0)
            .property("roughness", 1.0),
        ClassDescriptor::new("texture", Category::Texture)
            .property("source", "")
            .args(["source"]),
        ClassDescriptor::new("fog", Category::Fog)
            .property("color", white)
            .property("near", 1.0)
            .property("far", 1000.0)
            .args(["color", "near", "far"]),
    ]
}
