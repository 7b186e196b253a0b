use glam::{Mat4, Vec3};
use uuid::Uuid;

use crate::graph::{Category, ObjectHandle};

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

/// Lighting state consumed by the renderer's uniform buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct LightParams {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// One visible mesh, flattened out of the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub uuid: Uuid,
    /// Class name of the attached geometry.
    pub geometry: String,
    /// World matrix including the geometry's own extents.
    pub model: Mat4,
    pub color: Vec3,
    pub opacity: f32,
}

/// Collects every visible mesh that has a geometry attached. Invisible
/// objects hide their whole subtree.
pub fn collect_draw_items(scene: &ObjectHandle) -> Vec<DrawItem> {
    let mut items = Vec::new();
    walk(scene, Mat4::IDENTITY, &mut items);
    items
}

fn walk(object: &ObjectHandle, parent_world: Mat4, items: &mut Vec<DrawItem>) {
    let (world, children, visible) = {
        let guard = object.read();
        (parent_world * guard.local_matrix(), guard.children().to_vec(), guard.visible)
    };
    if !visible {
        return;
    }
    if object.category() == Category::Mesh {
        if let Some(item) = draw_item(object, world) {
            items.push(item);
        }
    }
    for child in &children {
        walk(child, world, items);
    }
}

fn draw_item(mesh: &ObjectHandle, world: Mat4) -> Option<DrawItem> {
    let geometry = mesh.slot("geometry")?;
    let (class, extent) = {
        let guard = geometry.read();
        (guard.class_name().to_string(), geometry_extent(&guard))
    };
    let (color, opacity) = match mesh.slot("material") {
        Some(material) => {
            let guard = material.read();
            (
                guard.color("color").unwrap_or(Vec3::ONE),
                guard.number("opacity").unwrap_or(1.0),
            )
        }
        None => (Vec3::ONE, 1.0),
    };
    Some(DrawItem {
        uuid: mesh.uuid(),
        geometry: class,
        model: world * Mat4::from_scale(extent),
        color,
        opacity,
    })
}

/// Scale applied to the unit mesh the renderer keeps for a geometry class.
fn geometry_extent(geometry: &crate::graph::SceneObject) -> Vec3 {
    let number = |name: &str, default: f32| geometry.number(name).unwrap_or(default);
    match geometry.class_name() {
        "sphereGeometry" => Vec3::splat(number("radius", 1.0) * 2.0),
        "planeGeometry" => Vec3::new(number("width", 1.0), number("height", 1.0), 1.0),
        _ => Vec3::new(
            number("width", 1.0),
            number("height", 1.0),
            number("depth", 1.0),
        ),
    }
}

/// Builds the view-projection matrix from the camera's world transform.
pub fn camera_params(camera: &ObjectHandle, aspect: f32) -> CameraParams {
    let world = camera.world_matrix();
    let view = world.inverse();
    let guard = camera.read();
    let number = |name: &str, default: f32| guard.number(name).unwrap_or(default);
    let near = number("near", 0.1);
    let far = number("far", 2000.0);
    let zoom = number("zoom", 1.0).max(f32::EPSILON);
    let projection = match guard.class_name() {
        "orthographicCamera" => Mat4::orthographic_rh(
            number("left", -1.0) / zoom,
            number("right", 1.0) / zoom,
            number("bottom", -1.0) / zoom,
            number("top", 1.0) / zoom,
            near,
            far,
        ),
        _ => {
            let fov = (number("fov", 50.0).to_radians() / 2.0).tan().atan2(zoom) * 2.0;
            Mat4::perspective_rh(fov, aspect.max(0.01), near, far)
        }
    };
    CameraParams {
        view_proj: projection * view,
        position: world.transform_point3(Vec3::ZERO),
    }
}

/// First light in the scene, or a neutral default.
pub fn light_params(scene: &ObjectHandle) -> LightParams {
    let mut found = None;
    scene.traverse(&mut |object| {
        if found.is_some() || object.category() != Category::Light {
            return;
        }
        let position = object.world_matrix().transform_point3(Vec3::ZERO);
        let guard = object.read();
        found = Some(LightParams {
            position,
            color: guard.color("color").unwrap_or(Vec3::ONE),
            intensity: guard.number("intensity").unwrap_or(1.0).max(0.1),
        });
    });
    found.unwrap_or(LightParams {
        position: Vec3::new(3.0, 5.0, -3.0),
        color: Vec3::splat(1.0),
        intensity: 1.0,
    })
}
