//! STL decoder, binary and ASCII.
//!
//! Binary layout: 80-byte header (ignored), u32 little-endian triangle count,
//! then 50-byte records of face normal, three vertices, and a 2-byte
//! attribute. ASCII files are keyword-delimited
//! (`solid` / `facet normal` / `outer loop` / `vertex` / `endfacet`).
//!
//! STL is triangle soup: the output has no shared indexing and never carries
//! vertex colors. The stored face normal is replicated to each of the three
//! vertices; a missing or degenerate normal is replaced by the computed one.

use crate::mesh::error::DecodeError;
use crate::mesh::geometry::Geometry;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

pub fn decode_stl(bytes: &[u8]) -> Result<Geometry, DecodeError> {
    if bytes.len() < 6 {
        return Err(DecodeError::InvalidHeader(
            "too small to be an STL file".into(),
        ));
    }

    if looks_ascii(bytes) {
        decode_stl_ascii(std::str::from_utf8(bytes)?)
    } else {
        decode_stl_binary(bytes)
    }
}

/// ASCII iff the file starts with "solid" and the header region carries no
/// NUL bytes. Some binary exporters also write "solid" into the 80-byte
/// header, hence the second check.
fn looks_ascii(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SIZE)];
    String::from_utf8_lossy(head).trim_start().starts_with("solid") && !head.contains(&0)
}

fn decode_stl_binary(bytes: &[u8]) -> Result<Geometry, DecodeError> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(DecodeError::Truncated {
            position: bytes.len(),
        });
    }

    let count = u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ]) as usize;

    let body = &bytes[HEADER_SIZE + 4..];
    if body.len() < count * TRIANGLE_SIZE {
        return Err(DecodeError::Truncated {
            position: HEADER_SIZE + 4 + body.len(),
        });
    }

    let mut positions = Vec::with_capacity(count * 9);
    let mut normals = Vec::with_capacity(count * 9);
    let mut indices = Vec::with_capacity(count * 3);

    for record in body.chunks_exact(TRIANGLE_SIZE).take(count) {
        let normal = read_vec3(&record[0..12]);
        let v0 = read_vec3(&record[12..24]);
        let v1 = read_vec3(&record[24..36]);
        let v2 = read_vec3(&record[36..48]);
        push_triangle(&mut positions, &mut normals, &mut indices, normal, v0, v1, v2);
    }

    Ok(Geometry {
        positions,
        normals,
        colors: None,
        indices,
    })
}

fn decode_stl_ascii(text: &str) -> Result<Geometry, DecodeError> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    let mut facet_normal = [0.0f32; 3];
    let mut facet_vertices: Vec<[f32; 3]> = Vec::with_capacity(3);
    let mut saw_solid = false;
    let mut saw_endsolid = false;
    let mut facet_open = false;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("solid") => saw_solid = true,
            Some("facet") => {
                // "facet normal ni nj nk"
                let _ = parts.next();
                facet_normal = [
                    parts.next().unwrap_or("0").parse()?,
                    parts.next().unwrap_or("0").parse()?,
                    parts.next().unwrap_or("0").parse()?,
                ];
                facet_vertices.clear();
                facet_open = true;
            }
            Some("vertex") => {
                facet_vertices.push([
                    parts
                        .next()
                        .ok_or_else(|| DecodeError::InvalidHeader("vertex missing x".into()))?
                        .parse()?,
                    parts
                        .next()
                        .ok_or_else(|| DecodeError::InvalidHeader("vertex missing y".into()))?
                        .parse()?,
                    parts
                        .next()
                        .ok_or_else(|| DecodeError::InvalidHeader("vertex missing z".into()))?
                        .parse()?,
                ]);
            }
            Some("endfacet") => {
                if facet_vertices.len() != 3 {
                    return Err(DecodeError::InvalidHeader(format!(
                        "facet with {} vertices",
                        facet_vertices.len()
                    )));
                }
                push_triangle(
                    &mut positions,
                    &mut normals,
                    &mut indices,
                    facet_normal,
                    facet_vertices[0],
                    facet_vertices[1],
                    facet_vertices[2],
                );
                facet_open = false;
            }
            Some("endsolid") => {
                saw_endsolid = true;
                break;
            }
            _ => {}
        }
    }

    if !saw_solid {
        return Err(DecodeError::InvalidHeader("missing 'solid' keyword".into()));
    }
    // A facet still open at end-of-input, or a missing endsolid, means the
    // file was cut short; partial geometry must never decode as complete.
    if facet_open || !saw_endsolid {
        return Err(DecodeError::Truncated {
            position: text.len(),
        });
    }

    Ok(Geometry {
        positions,
        normals,
        colors: None,
        indices,
    })
}

fn push_triangle(
    positions: &mut Vec<f32>,
    normals: &mut Vec<f32>,
    indices: &mut Vec<u32>,
    stored_normal: [f32; 3],
    v0: [f32; 3],
    v1: [f32; 3],
    v2: [f32; 3],
) {
    let normal = if length_sq(stored_normal) > 1e-12 {
        stored_normal
    } else {
        face_normal(v0, v1, v2)
    };

    let base = (positions.len() / 3) as u32;
    for v in [v0, v1, v2] {
        positions.extend_from_slice(&v);
        normals.extend_from_slice(&normal);
    }
    indices.extend_from_slice(&[base, base + 1, base + 2]);
}

fn face_normal(v0: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> [f32; 3] {
    let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
    let n = [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ];
    let len = length_sq(n).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

fn length_sq(v: [f32; 3]) -> f32 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

fn read_vec3(buf: &[u8]) -> [f32; 3] {
    [
        f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_stl(triangles: &[([f32; 3], [f32; 3], [f32; 3], [f32; 3])]) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for (n, v0, v1, v2) in triangles {
            for v in [n, v0, v1, v2] {
                for c in v {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&0u16.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn binary_triangle_with_explicit_normal() {
        let bytes = binary_stl(&[(
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        )]);

        let geometry = decode_stl(&bytes).unwrap();
        assert_eq!(geometry.triangle_count(), 1);
        assert_eq!(geometry.vertex_count(), 3);
        assert!(geometry.colors.is_none());
        assert_eq!(
            geometry.positions,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        // Face normal replicated to all three vertices.
        for n in geometry.normals.chunks_exact(3) {
            assert_eq!(n, &[0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn binary_zero_normal_is_recomputed() {
        let bytes = binary_stl(&[(
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        )]);

        let geometry = decode_stl(&bytes).unwrap();
        assert_eq!(&geometry.normals[0..3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn binary_truncated_body_fails() {
        let mut bytes = binary_stl(&[(
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        )]);
        bytes.truncate(bytes.len() - 10);

        assert!(matches!(
            decode_stl(&bytes),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn ascii_triangle() {
        let text = b"solid test\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 0\n\
            vertex 1 0 0\n\
            vertex 0 1 0\n\
            endloop\n\
            endfacet\n\
            endsolid test\n";

        let geometry = decode_stl(text).unwrap();
        assert_eq!(geometry.triangle_count(), 1);
        assert_eq!(&geometry.normals[0..3], &[0.0, 0.0, 1.0]);
        assert_eq!(&geometry.positions[3..6], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn ascii_truncated_mid_facet_fails() {
        let text = b"solid test\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 0\n\
            vertex 1 0 0\n\
            vertex 0 1 0\n\
            endloop\n\
            endfacet\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 1\n\
            vertex 1 0 1\n";

        assert!(matches!(
            decode_stl(text),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn ascii_missing_endsolid_fails() {
        let text = b"solid test\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 0\n\
            vertex 1 0 0\n\
            vertex 0 1 0\n\
            endloop\n\
            endfacet\n";

        assert!(matches!(
            decode_stl(text),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn ascii_bad_vertex_fails() {
        let text = b"solid test\nfacet normal 0 0 1\nouter loop\nvertex 0 zero 0\n";
        assert!(decode_stl(text).is_err());
    }

    #[test]
    fn binary_with_solid_in_header_is_still_binary() {
        let mut bytes = binary_stl(&[(
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        )]);
        bytes[..5].copy_from_slice(b"solid");

        let geometry = decode_stl(&bytes).unwrap();
        assert_eq!(geometry.triangle_count(), 1);
    }
}
