/// Decoded triangle geometry in the layout the renderer uploads directly:
/// flat f32 arrays, one normal per vertex, colors only when the source
/// format carried them.
pub struct Geometry {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Option<Vec<f32>>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Per-vertex normals from scratch: accumulate the (area-weighted) face
    /// normal of every incident triangle, then normalize. Used when the
    /// source file declares no normal properties.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![0.0f32; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let a = vertex(&self.positions, i0);
            let b = vertex(&self.positions, i1);
            let c = vertex(&self.positions, i2);

            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let face = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];

            for &i in &[i0, i1, i2] {
                normals[i * 3] += face[0];
                normals[i * 3 + 1] += face[1];
                normals[i * 3 + 2] += face[2];
            }
        }

        for n in normals.chunks_exact_mut(3) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > 1e-12 {
                n[0] /= len;
                n[1] /= len;
                n[2] /= len;
            } else {
                n[0] = 0.0;
                n[1] = 0.0;
                n[2] = 1.0;
            }
        }

        self.normals = normals;
    }
}

fn vertex(positions: &[f32], i: usize) -> [f32; 3] {
    [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_normals_accumulate_over_shared_vertices() {
        // Two coplanar triangles in the XY plane sharing an edge.
        let mut geometry = Geometry {
            positions: vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 1.0, 0.0,
            ],
            normals: Vec::new(),
            colors: None,
            indices: vec![0, 1, 2, 1, 3, 2],
        };

        geometry.compute_vertex_normals();

        assert_eq!(geometry.normals.len(), 12);
        for n in geometry.normals.chunks_exact(3) {
            assert!((n[0]).abs() < 1e-6);
            assert!((n[1]).abs() < 1e-6);
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn degenerate_triangle_falls_back_to_up() {
        let mut geometry = Geometry {
            positions: vec![0.0; 9],
            normals: Vec::new(),
            colors: None,
            indices: vec![0, 1, 2],
        };

        geometry.compute_vertex_normals();
        assert_eq!(&geometry.normals[0..3], &[0.0, 0.0, 1.0]);
    }
}
