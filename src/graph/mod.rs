//! Retained scene-graph object model driven by the node operations.
//!
//! Objects form a parent/child hierarchy for everything that is drawn or
//! positioned, while geometries, materials and similar resources hang off
//! named slots of their owner.

mod classes;
mod object;
mod value;

pub use classes::{builtin_classes, Category, ClassDescriptor, PropertyDescriptor};
pub use object::{split_path, ObjectHandle, SceneObject};
pub use value::{Value, ValueKind};
