use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use glam::{EulerRot, Mat4, Quat, Vec3};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::PropertyError;

use super::classes::{Category, ClassDescriptor};
use super::value::{Value, ValueKind};

/// One object of the retained scene graph.
#[derive(Debug)]
pub struct SceneObject {
    uuid: Uuid,
    class: Arc<ClassDescriptor>,
    pub name: String,
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub visible: bool,
    params: BTreeMap<String, Value>,
    children: Vec<ObjectHandle>,
    parent: Option<Weak<RwLock<SceneObject>>>,
    slots: BTreeMap<String, ObjectHandle>,
}

impl SceneObject {
    pub fn new(class: Arc<ClassDescriptor>) -> Self {
        let params = class
            .properties()
            .iter()
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect();
        Self {
            uuid: Uuid::new_v4(),
            class,
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: true,
            params,
            children: Vec::new(),
            parent: None,
            slots: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn category(&self) -> Category {
        self.class.category()
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        self.param(name).and_then(Value::as_number)
    }

    pub fn color(&self, name: &str) -> Option<Vec3> {
        self.param(name).and_then(Value::as_vec3)
    }

    pub fn children(&self) -> &[ObjectHandle] {
        &self.children
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &ObjectHandle)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn local_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }

    pub(crate) fn insert_param(&mut self, name: &str, value: Value) {
        self.params.insert(name.to_string(), value);
    }

    fn unknown(&self, path: &str) -> PropertyError {
        PropertyError::UnknownProperty {
            class: self.class_name().to_string(),
            path: path.to_string(),
        }
    }

    fn transform_mut(&mut self, name: &str) -> Option<&mut Vec3> {
        if !self.category().is_object() {
            return None;
        }
        match name {
            "position" => Some(&mut self.position),
            "rotation" => Some(&mut self.rotation),
            "scale" => Some(&mut self.scale),
            _ => None,
        }
    }

    fn default_of(&self, name: &str) -> Option<Value> {
        if self.category().is_object() {
            match name {
                "position" | "rotation" => return Some(Value::Vec3(Vec3::ZERO)),
                "scale" => return Some(Value::Vec3(Vec3::ONE)),
                "visible" => return Some(Value::Bool(true)),
                _ => {}
            }
        }
        match name {
            "name" => Some(Value::Text(String::new())),
            _ => self.class.find_property(name).map(|p| p.default.clone()),
        }
    }

    fn read_local(&self, name: &str, component: Option<&str>) -> Option<Value> {
        let value = match name {
            "position" | "rotation" | "scale" if self.category().is_object() => {
                let v = match name {
                    "position" => self.position,
                    "rotation" => self.rotation,
                    _ => self.scale,
                };
                Value::Vec3(v)
            }
            "visible" if self.category().is_object() => Value::Bool(self.visible),
            "name" => Value::Text(self.name.clone()),
            _ => self.params.get(name)?.clone(),
        };
        match component {
            None => Some(value),
            Some(component) => {
                let v = value.as_vec3()?;
                component_index(component).map(|i| Value::Number(v[i]))
            }
        }
    }

    fn write_local(
        &mut self,
        path: &str,
        name: &str,
        component: Option<&str>,
        value: Value,
    ) -> Result<(), PropertyError> {
        if let Some(field) = self.transform_mut(name) {
            return assign_vec3(field, path, component, value, ValueKind::Vec3);
        }
        match name {
            "visible" if self.category().is_object() => {
                self.visible = expect_kind(path, value, ValueKind::Bool)?
                    .as_bool()
                    .unwrap_or(true);
                return Ok(());
            }
            "name" => {
                if let Value::Text(text) = expect_kind(path, value, ValueKind::Text)? {
                    self.name = text;
                }
                return Ok(());
            }
            _ => {}
        }
        let kind = self
            .class
            .find_property(name)
            .map(|p| p.default.kind())
            .ok_or_else(|| self.unknown(path))?;
        match component {
            None => {
                let value = expect_kind(path, value, kind)?;
                self.params.insert(name.to_string(), value);
                Ok(())
            }
            Some(_) if matches!(kind, ValueKind::Vec3 | ValueKind::Color) => {
                let slot = self
                    .params
                    .get_mut(name)
                    .ok_or_else(|| PropertyError::UnknownProperty {
                        class: self.class.name().to_string(),
                        path: path.to_string(),
                    })?;
                let mut current = slot.as_vec3().unwrap_or(Vec3::ZERO);
                assign_vec3(&mut current, path, component, value, kind)?;
                *slot = if kind == ValueKind::Color {
                    Value::Color(current)
                } else {
                    Value::Vec3(current)
                };
                Ok(())
            }
            Some(component) => Err(PropertyError::UnknownComponent {
                path: path.to_string(),
                component: component.to_string(),
                kind,
            }),
        }
    }
}

fn component_index(component: &str) -> Option<usize> {
    match component {
        "x" | "r" => Some(0),
        "y" | "g" => Some(1),
        "z" | "b" => Some(2),
        _ => None,
    }
}

fn expect_kind(path: &str, value: Value, expected: ValueKind) -> Result<Value, PropertyError> {
    let found = value.kind();
    value
        .coerce(expected)
        .ok_or_else(|| PropertyError::KindMismatch {
            path: path.to_string(),
            expected,
            found,
        })
}

fn assign_vec3(
    field: &mut Vec3,
    path: &str,
    component: Option<&str>,
    value: Value,
    kind: ValueKind,
) -> Result<(), PropertyError> {
    match component {
        None => {
            let value = expect_kind(path, value, kind)?;
            *field = value.as_vec3().unwrap_or(*field);
            Ok(())
        }
        Some(component) => {
            let index = component_index(component).ok_or_else(|| {
                PropertyError::UnknownComponent {
                    path: path.to_string(),
                    component: component.to_string(),
                    kind,
                }
            })?;
            let number = expect_kind(path, value, ValueKind::Number)?;
            field[index] = number.as_number().unwrap_or(field[index]);
            Ok(())
        }
    }
}

/// Splits `material.color.r` or `position-x` into path segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['.', '-'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Shared handle to a [`SceneObject`].
#[derive(Clone)]
pub struct ObjectHandle(Arc<RwLock<SceneObject>>);

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = self.0.read();
        write!(f, "{}({})", object.class_name(), object.uuid)
    }
}

impl ObjectHandle {
    pub fn new(object: SceneObject) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SceneObject> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SceneObject> {
        self.0.write()
    }

    pub fn uuid(&self) -> Uuid {
        self.0.read().uuid
    }

    pub fn class_name(&self) -> String {
        self.0.read().class_name().to_string()
    }

    pub fn category(&self) -> Category {
        self.0.read().category()
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent(&self) -> Option<ObjectHandle> {
        self.0
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(ObjectHandle)
    }

    pub fn children(&self) -> Vec<ObjectHandle> {
        self.0.read().children.clone()
    }

    pub fn contains(&self, child: &ObjectHandle) -> bool {
        self.0.read().children.iter().any(|c| c.ptr_eq(child))
    }

    /// Appends `child`, detaching it from its previous parent first.
    pub fn add(&self, child: &ObjectHandle) -> bool {
        self.insert_before(child, None)
    }

    /// Inserts `child` before `before`, or appends when `before` is not a
    /// child of this object.
    pub fn insert_before(&self, child: &ObjectHandle, before: Option<&ObjectHandle>) -> bool {
        if child.ptr_eq(self) {
            return false;
        }
        if let Some(previous) = child.parent() {
            previous.remove(child);
        }
        {
            let mut guard = self.0.write();
            let index = before
                .and_then(|b| guard.children.iter().position(|c| c.ptr_eq(b)))
                .unwrap_or(guard.children.len());
            guard.children.insert(index, child.clone());
        }
        child.0.write().parent = Some(Arc::downgrade(&self.0));
        true
    }

    pub fn remove(&self, child: &ObjectHandle) -> bool {
        let removed = {
            let mut guard = self.0.write();
            match guard.children.iter().position(|c| c.ptr_eq(child)) {
                Some(index) => {
                    guard.children.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            child.0.write().parent = None;
        }
        removed
    }

    /// Assigns `object` to a named slot, returning the object it replaced.
    pub fn attach(&self, slot: &str, object: &ObjectHandle) -> Option<ObjectHandle> {
        self.0.write().slots.insert(slot.to_string(), object.clone())
    }

    pub fn detach(&self, slot: &str) -> Option<ObjectHandle> {
        self.0.write().slots.remove(slot)
    }

    pub fn slot(&self, slot: &str) -> Option<ObjectHandle> {
        self.0.read().slots.get(slot).cloned()
    }

    /// Writes a property addressed by a dotted or dashed path. A leading
    /// segment naming an occupied slot forwards the rest of the path to the
    /// attached object.
    pub fn set(&self, path: &str, value: Value) -> Result<(), PropertyError> {
        let segments = split_path(path);
        let Some((head, rest)) = segments.split_first() else {
            return Err(self.0.read().unknown(path));
        };
        if !rest.is_empty() {
            if let Some(target) = self.slot(head) {
                return target.set(&rest.join("."), value);
            }
        }
        let mut guard = self.0.write();
        match rest {
            [] => guard.write_local(path, head, None, value),
            [component] => guard.write_local(path, head, Some(component), value),
            _ => Err(guard.unknown(path)),
        }
    }

    /// Restores a property to its class default.
    pub fn reset(&self, path: &str) -> Result<(), PropertyError> {
        let segments = split_path(path);
        let Some((head, rest)) = segments.split_first() else {
            return Err(self.0.read().unknown(path));
        };
        if !rest.is_empty() {
            if let Some(target) = self.slot(head) {
                return target.reset(&rest.join("."));
            }
        }
        let default = {
            let guard = self.0.read();
            let default = guard.default_of(head).ok_or_else(|| guard.unknown(path))?;
            match rest {
                [] => default,
                [component] => {
                    let index = component_index(component).ok_or_else(|| {
                        PropertyError::UnknownComponent {
                            path: path.to_string(),
                            component: component.to_string(),
                            kind: default.kind(),
                        }
                    })?;
                    let v = default.as_vec3().ok_or_else(|| guard.unknown(path))?;
                    Value::Number(v[index])
                }
                _ => return Err(guard.unknown(path)),
            }
        };
        self.set(path, default)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let segments = split_path(path);
        let (head, rest) = segments.split_first()?;
        if !rest.is_empty() {
            if let Some(target) = self.slot(head) {
                return target.get(&rest.join("."));
            }
        }
        match rest {
            [] => self.0.read().read_local(head, None),
            [component] => self.0.read().read_local(head, Some(component)),
            _ => None,
        }
    }

    pub fn world_matrix(&self) -> Mat4 {
        let local = self.0.read().local_matrix();
        match self.parent() {
            Some(parent) => parent.world_matrix() * local,
            None => local,
        }
    }

    /// Visits this object and every descendant, depth first.
    pub fn traverse(&self, visit: &mut dyn FnMut(&ObjectHandle)) {
        visit(self);
        for child in self.children() {
            child.traverse(visit);
        }
    }
}
