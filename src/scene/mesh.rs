//! Mesh generation for the demo geometry
//!
//! Generates vertex and index data for the cube and torus-knot surfaces.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::TAU;

/// Vertex for scene meshes
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneVertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
}

impl SceneVertex {
    /// Size of vertex in bytes
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Vertex buffer layout for wgpu
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Generated mesh data
pub struct SceneMesh {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
}

impl SceneMesh {
    /// Axis-aligned cube centered on the origin, per-face normals.
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        // (normal, four corners CCW seen from outside)
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            (
                [0.0, 0.0, 1.0],
                [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]],
            ),
            (
                [0.0, 0.0, -1.0],
                [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]],
            ),
            (
                [1.0, 0.0, 0.0],
                [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]],
            ),
            (
                [-1.0, 0.0, 0.0],
                [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]],
            ),
            (
                [0.0, 1.0, 0.0],
                [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]],
            ),
            (
                [0.0, -1.0, 0.0],
                [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]],
            ),
        ];

        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            for position in corners {
                vertices.push(SceneVertex { position, normal });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2]);
            indices.extend_from_slice(&[base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }

    /// Torus knot wound `p` times around the torus axis and `q` times
    /// through the hole.
    pub fn torus_knot(
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    ) -> Self {
        let tubular_segments = tubular_segments.max(3);
        let radial_segments = radial_segments.max(3);

        let mut vertices =
            Vec::with_capacity(((tubular_segments + 1) * (radial_segments + 1)) as usize);
        let mut indices = Vec::with_capacity((tubular_segments * radial_segments * 6) as usize);

        let pf = p as f32;
        let qf = q as f32;

        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * pf * TAU;

            // Frenet-like frame from two nearby curve points.
            let p1 = knot_point(u, pf, qf, radius);
            let p2 = knot_point(u + 0.01, pf, qf, radius);
            let tangent = p2 - p1;
            let mut normal = p2 + p1;
            let binormal = tangent.cross(normal).normalize();
            normal = binormal.cross(tangent).normalize();

            for j in 0..=radial_segments {
                let v = j as f32 / radial_segments as f32 * TAU;
                let cx = -tube * v.cos();
                let cy = tube * v.sin();

                let position = p1 + cx * normal + cy * binormal;
                let vertex_normal = (position - p1).normalize();

                vertices.push(SceneVertex {
                    position: position.to_array(),
                    normal: vertex_normal.to_array(),
                });
            }
        }

        for j in 1..=tubular_segments {
            for i in 1..=radial_segments {
                let a = (radial_segments + 1) * (j - 1) + (i - 1);
                let b = (radial_segments + 1) * j + (i - 1);
                let c = (radial_segments + 1) * j + i;
                let d = (radial_segments + 1) * (j - 1) + i;

                indices.extend_from_slice(&[a, b, d]);
                indices.extend_from_slice(&[b, c, d]);
            }
        }

        Self { vertices, indices }
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// Point on the (p, q) torus knot curve at parameter `u`.
fn knot_point(u: f32, p: f32, q: f32, radius: f32) -> Vec3 {
    let cu = u.cos();
    let su = u.sin();
    let qu_over_p = q / p * u;
    let cs = qu_over_p.cos();

    Vec3::new(
        radius * (2.0 + cs) * 0.5 * cu,
        radius * (2.0 + cs) * 0.5 * su,
        radius * qu_over_p.sin() * 0.5,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_mesh() {
        let mesh = SceneMesh::cube(1.0);
        assert_eq!(mesh.vertex_count(), 24); // 6 faces * 4 vertices
        assert_eq!(mesh.index_count(), 36); // 6 faces * 2 triangles * 3
    }

    #[test]
    fn test_cube_extents() {
        let mesh = SceneMesh::cube(2.0);
        for v in &mesh.vertices {
            for c in v.position {
                assert!((c.abs() - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_cube_normals_are_axis_aligned() {
        let mesh = SceneMesh::cube(1.0);
        for v in &mesh.vertices {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-6);
            assert_eq!(n.abs().max_element(), 1.0);
        }
    }

    #[test]
    fn test_torus_knot_mesh() {
        let mesh = SceneMesh::torus_knot(0.3, 0.1, 64, 16, 2, 3);
        // (tubular + 1) * (radial + 1) vertices
        assert_eq!(mesh.vertex_count(), 65 * 17);
        // tubular * radial * 2 triangles * 3 indices
        assert_eq!(mesh.index_count(), 64 * 16 * 6);
    }

    #[test]
    fn test_torus_knot_normals_are_unit_length() {
        let mesh = SceneMesh::torus_knot(0.3, 0.1, 16, 8, 2, 3);
        for v in &mesh.vertices {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_torus_knot_indices_in_range() {
        let mesh = SceneMesh::torus_knot(0.3, 0.1, 8, 6, 2, 3);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_torus_knot_segment_floor() {
        // Degenerate segment counts are clamped, not panicked on.
        let mesh = SceneMesh::torus_knot(0.3, 0.1, 1, 1, 2, 3);
        assert_eq!(mesh.vertex_count(), 4 * 4);
        assert_eq!(mesh.index_count(), 3 * 3 * 6);
    }
}
