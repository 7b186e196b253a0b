use std::f32::consts::PI;

pub(crate) const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(globals.light_position.xyz - input.world_pos);
    let normal = normalize(input.normal);
    let diffuse = max(abs(dot(normal, light_dir)), 0.0);
    let ambient = 0.2;
    let intensity = globals.light_color.w;
    let light_color = globals.light_color.xyz;
    let lit_color = (ambient + diffuse * intensity) * object.color.rgb * light_color;
    return vec4<f32>(lit_color, object.color.a);
}
"#;

/// Interleaved position/normal vertices with triangle indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

const CUBE_VERTICES: &[f32] = &[
    // positions        // normals
    -0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, -0.5, 0.5, 0.0, 0.0, 1.0, 0.5, 0.5, 0.5, 0.0, 0.0, 1.0,
    -0.5, 0.5, 0.5, 0.0, 0.0, 1.0, -0.5, -0.5, -0.5, 0.0, 0.0, -1.0, 0.5, -0.5, -0.5, 0.0, 0.0,
    -1.0, 0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, 0.5, -0.5, 0.0, 0.0, -1.0, -0.5, -0.5, -0.5, -1.0,
    0.0, 0.0, -0.5, -0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, 0.5, -1.0, 0.0, 0.0, -0.5, 0.5, -0.5,
    -1.0, 0.0, 0.0, 0.5, -0.5, -0.5, 1.0, 0.0, 0.0, 0.5, -0.5, 0.5, 1.0, 0.0, 0.0, 0.5, 0.5, 0.5,
    1.0, 0.0, 0.0, 0.5, 0.5, -0.5, 1.0, 0.0, 0.0, -0.5, -0.5, -0.5, 0.0, -1.0, 0.0, 0.5, -0.5,
    -0.5, 0.0, -1.0, 0.0, 0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5, -0.5, 0.5, 0.0, -1.0, 0.0, -0.5,
    0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, -0.5, 0.0, 1.0, 0.0, 0.5, 0.5, 0.5, 0.0, 1.0, 0.0, -0.5,
    0.5, 0.5, 0.0, 1.0, 0.0,
];

const CUBE_INDICES: &[u32] = &[
    0, 1, 2, 0, 2, 3, // front
    4, 6, 5, 4, 7, 6, // back
    8, 9, 10, 8, 10, 11, // left
    12, 14, 13, 12, 15, 14, // right
    16, 18, 17, 16, 19, 18, // bottom
    20, 21, 22, 20, 22, 23, // top
];

/// Unit cube centred on the origin.
pub(crate) fn cube() -> MeshData {
    MeshData {
        vertices: CUBE_VERTICES.to_vec(),
        indices: CUBE_INDICES.to_vec(),
    }
}

/// Unit quad in the XY plane facing +Z.
pub(crate) fn plane() -> MeshData {
    MeshData {
        vertices: vec![
            -0.5, -0.5, 0.0, 0.0, 0.0, 1.0, //
            0.5, -0.5, 0.0, 0.0, 0.0, 1.0, //
            0.5, 0.5, 0.0, 0.0, 0.0, 1.0, //
            -0.5, 0.5, 0.0, 0.0, 0.0, 1.0,
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// UV sphere with diameter one.
pub(crate) fn sphere(width_segments: u32, height_segments: u32) -> MeshData {
    let columns = width_segments.max(3);
    let rows = height_segments.max(2);
    let mut vertices = Vec::with_capacity(((columns + 1) * (rows + 1) * 6) as usize);
    for row in 0..=rows {
        let theta = row as f32 / rows as f32 * PI;
        for column in 0..=columns {
            let phi = column as f32 / columns as f32 * 2.0 * PI;
            let normal = [
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            ];
            vertices.extend(normal.iter().map(|n| n * 0.5));
            vertices.extend(normal);
        }
    }
    let stride = columns + 1;
    let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let a = row * stride + column;
            let b = a + stride;
            indices.extend([a, b, a + 1, b, b + 1, a + 1]);
        }
    }
    MeshData { vertices, indices }
}

/// Unit mesh drawn for a geometry class. Unknown classes fall back to the
/// cube.
pub(crate) fn mesh_for(geometry: &str) -> MeshData {
    match geometry {
        "sphereGeometry" => sphere(32, 16),
        "planeGeometry" => plane(),
        _ => cube(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_indices_stay_in_bounds() {
        for mesh in [cube(), plane(), sphere(8, 4)] {
            let count = (mesh.vertices.len() / 6) as u32;
            assert_eq!(mesh.indices.len() % 3, 0);
            assert!(mesh.indices.iter().all(|&i| i < count));
        }
    }

    #[test]
    fn sphere_vertices_sit_on_the_unit_diameter() {
        let mesh = sphere(6, 3);
        for vertex in mesh.vertices.chunks(6) {
            let length = (vertex[0].powi(2) + vertex[1].powi(2) + vertex[2].powi(2)).sqrt();
            assert!((length - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn unknown_geometry_falls_back_to_cube() {
        assert_eq!(mesh_for("torusKnotGeometry"), cube());
    }
}
