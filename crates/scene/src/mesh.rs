//! Built-in geometry.

use frameloop_rhi::vertex::Vertex;
use glam::Vec3;

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Outward normal and color of each cube face.
const FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::new(0.9, 0.2, 0.2)),
    (Vec3::NEG_X, Vec3::new(0.2, 0.9, 0.9)),
    (Vec3::Y, Vec3::new(0.2, 0.9, 0.2)),
    (Vec3::NEG_Y, Vec3::new(0.9, 0.2, 0.9)),
    (Vec3::Z, Vec3::new(0.2, 0.2, 0.9)),
    (Vec3::NEG_Z, Vec3::new(0.9, 0.9, 0.2)),
];

impl Mesh {
    /// Axis-aligned cube centred on the origin with one flat color per face.
    ///
    /// Faces are wound counter-clockwise when seen from outside.
    pub fn cube(size: f32) -> Self {
        let half = size * 0.5;
        let mut vertices = Vec::with_capacity(FACES.len() * 4);
        let mut indices = Vec::with_capacity(FACES.len() * 6);

        for (normal, color) in FACES {
            // Two axes spanning the face, chosen so that u x v == normal.
            let u = normal.any_orthonormal_vector();
            let v = normal.cross(u);
            let center = normal * half;

            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = center + (u * su + v * sv) * half;
                vertices.push(Vertex::new(position, color));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn test_cube_bounds() {
        let cube = Mesh::cube(3.0);
        for vertex in &cube.vertices {
            assert!(vertex.position.abs().max_element() <= 1.5 + 1e-5);
            assert!((vertex.position.abs().max_element() - 1.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = Mesh::cube(1.0);
        for triangle in cube.indices.chunks_exact(3) {
            let a = cube.vertices[triangle[0] as usize].position;
            let b = cube.vertices[triangle[1] as usize].position;
            let c = cube.vertices[triangle[2] as usize].position;
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn test_byte_views() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.vertex_bytes().len(), 24 * 24);
        assert_eq!(cube.index_bytes().len(), 36 * 4);
    }
}
