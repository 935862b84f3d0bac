//! PLY decoder.
//!
//! The ASCII header declares elements (`element vertex N`, `element face M`)
//! with an ordered property schema per element; `end_header` terminates it.
//! Vertex and face data follow in the encoding named by the `format` line:
//! ASCII, binary little-endian, or binary big-endian.
//!
//! Decoding is driven entirely by the declared schema: positions are
//! required, `nx/ny/nz` and `red/green/blue` are picked up when present,
//! anything else is read and discarded. Faces are index lists,
//! fan-triangulated. Files without normal properties get per-vertex normals
//! computed from incident faces.

use crate::mesh::error::DecodeError;
use crate::mesh::geometry::Geometry;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    BinaryLittle,
    BinaryBig,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    fn parse(token: &str) -> Result<Self, DecodeError> {
        Ok(match token {
            "char" | "int8" => Self::Char,
            "uchar" | "uint8" => Self::UChar,
            "short" | "int16" => Self::Short,
            "ushort" | "uint16" => Self::UShort,
            "int" | "int32" => Self::Int,
            "uint" | "uint32" => Self::UInt,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            other => {
                return Err(DecodeError::InvalidHeader(format!(
                    "unknown property type '{other}'"
                )));
            }
        })
    }

    fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Scale factor for interpreting this type as a 0-1 color channel.
    fn color_scale(self) -> f64 {
        match self {
            Self::Float | Self::Double => 1.0,
            Self::Char | Self::UChar => 255.0,
            Self::Short | Self::UShort => 65535.0,
            Self::Int | Self::UInt => u32::MAX as f64,
        }
    }
}

#[derive(Clone, Copy)]
enum PropKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

struct PropertyDef {
    name: String,
    kind: PropKind,
}

struct ElementDef {
    name: String,
    count: usize,
    properties: Vec<PropertyDef>,
}

struct Header {
    encoding: Encoding,
    elements: Vec<ElementDef>,
}

pub fn decode_ply(bytes: &[u8]) -> Result<Geometry, DecodeError> {
    let (header, body_offset) = parse_header(bytes)?;
    let body = &bytes[body_offset..];

    let mut reader: Box<dyn RecordReader> = match header.encoding {
        Encoding::Ascii => Box::new(AsciiReader::new(std::str::from_utf8(body)?)),
        Encoding::BinaryLittle => Box::new(BinaryReader::new(body, body_offset, false)),
        Encoding::BinaryBig => Box::new(BinaryReader::new(body, body_offset, true)),
    };

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut colors = Vec::new();
    let mut indices = Vec::new();
    let mut has_normals = false;
    let mut has_colors = false;

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                let schema = VertexSchema::from(element)?;
                has_normals = schema.normal.is_some();
                has_colors = schema.color.is_some();
                // Header counts are untrusted input; cap the reservation by
                // what the body could possibly hold and let `Truncated` fire
                // on the first missing record.
                positions.reserve(element.count.min(body.len()) * 3);

                let mut row = Vec::with_capacity(element.properties.len());
                for _ in 0..element.count {
                    read_row(reader.as_mut(), element, &mut row)?;
                    let [x, y, z] = schema.position;
                    positions.push(row[x] as f32);
                    positions.push(row[y] as f32);
                    positions.push(row[z] as f32);
                    if let Some([nx, ny, nz]) = schema.normal {
                        normals.push(row[nx] as f32);
                        normals.push(row[ny] as f32);
                        normals.push(row[nz] as f32);
                    }
                    if let Some([r, g, b]) = schema.color {
                        colors.push((row[r] / schema.color_scale) as f32);
                        colors.push((row[g] / schema.color_scale) as f32);
                        colors.push((row[b] / schema.color_scale) as f32);
                    }
                }
            }
            "face" => {
                indices.reserve(element.count.min(body.len()) * 3);
                for _ in 0..element.count {
                    read_face(reader.as_mut(), element, &mut indices)?;
                }
            }
            // Other elements (edges, materials) are consumed and dropped.
            _ => {
                let mut row = Vec::new();
                for _ in 0..element.count {
                    read_row(reader.as_mut(), element, &mut row)?;
                }
            }
        }
    }

    let vertex_count = positions.len() / 3;
    for &index in &indices {
        if index as usize >= vertex_count {
            return Err(DecodeError::BadIndex {
                index,
                vertex_count,
            });
        }
    }

    let mut geometry = Geometry {
        positions,
        normals,
        colors: has_colors.then_some(colors),
        indices,
    };
    if !has_normals {
        geometry.compute_vertex_normals();
    }
    Ok(geometry)
}

fn parse_header(bytes: &[u8]) -> Result<(Header, usize), DecodeError> {
    let mut offset = 0usize;
    let mut lines = HeaderLines { bytes, pos: 0 };

    let magic = lines
        .next_line()?
        .ok_or_else(|| DecodeError::InvalidHeader("empty file".into()))?;
    if magic.trim() != "ply" {
        return Err(DecodeError::InvalidHeader("missing 'ply' magic".into()));
    }

    let mut encoding = None;
    let mut elements: Vec<ElementDef> = Vec::new();

    loop {
        let Some(line) = lines.next_line()? else {
            return Err(DecodeError::InvalidHeader("missing end_header".into()));
        };
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("format") => {
                encoding = Some(match parts.next() {
                    Some("ascii") => Encoding::Ascii,
                    Some("binary_little_endian") => Encoding::BinaryLittle,
                    Some("binary_big_endian") => Encoding::BinaryBig,
                    other => {
                        return Err(DecodeError::InvalidHeader(format!(
                            "unknown format '{}'",
                            other.unwrap_or("")
                        )));
                    }
                });
            }
            Some("comment") | Some("obj_info") => {}
            Some("element") => {
                let name = parts
                    .next()
                    .ok_or_else(|| DecodeError::InvalidHeader("element without name".into()))?;
                let count: usize = parts
                    .next()
                    .ok_or_else(|| DecodeError::InvalidHeader("element without count".into()))?
                    .parse()?;
                elements.push(ElementDef {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements.last_mut().ok_or_else(|| {
                    DecodeError::InvalidHeader("property before any element".into())
                })?;
                let type_token = parts
                    .next()
                    .ok_or_else(|| DecodeError::InvalidHeader("property without type".into()))?;
                let (kind, name) = if type_token == "list" {
                    let count = ScalarType::parse(parts.next().ok_or_else(|| {
                        DecodeError::InvalidHeader("list without count type".into())
                    })?)?;
                    let item = ScalarType::parse(parts.next().ok_or_else(|| {
                        DecodeError::InvalidHeader("list without item type".into())
                    })?)?;
                    (PropKind::List { count, item }, parts.next())
                } else {
                    (PropKind::Scalar(ScalarType::parse(type_token)?), parts.next())
                };
                let name = name
                    .ok_or_else(|| DecodeError::InvalidHeader("property without name".into()))?;
                element.properties.push(PropertyDef {
                    name: name.to_string(),
                    kind,
                });
            }
            Some("end_header") => {
                offset = lines.pos;
                break;
            }
            Some(other) => {
                return Err(DecodeError::InvalidHeader(format!(
                    "unexpected header line '{other}'"
                )));
            }
            None => {}
        }
    }

    let encoding =
        encoding.ok_or_else(|| DecodeError::InvalidHeader("missing format line".into()))?;
    Ok((Header { encoding, elements }, offset))
}

struct HeaderLines<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderLines<'a> {
    fn next_line(&mut self) -> Result<Option<&'a str>, DecodeError> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let rest = &self.bytes[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let line = std::str::from_utf8(&rest[..end])?.trim_end_matches('\r');
        // The final line may have no trailing newline; never step past the end.
        self.pos = (self.pos + end + 1).min(self.bytes.len());
        Ok(Some(line))
    }
}

/// Column indices into a decoded vertex row, resolved once per file from the
/// declared property order.
struct VertexSchema {
    position: [usize; 3],
    normal: Option<[usize; 3]>,
    color: Option<[usize; 3]>,
    color_scale: f64,
}

impl VertexSchema {
    fn from(element: &ElementDef) -> Result<Self, DecodeError> {
        let find = |name: &str| {
            element
                .properties
                .iter()
                .position(|p| p.name == name)
        };
        let triple = |a: &str, b: &str, c: &str| match (find(a), find(b), find(c)) {
            (Some(x), Some(y), Some(z)) => Some([x, y, z]),
            _ => None,
        };

        let position = triple("x", "y", "z").ok_or_else(|| {
            DecodeError::InvalidHeader("vertex element lacks x/y/z properties".into())
        })?;
        let color = triple("red", "green", "blue");
        let color_scale = color
            .map(|[r, _, _]| match element.properties[r].kind {
                PropKind::Scalar(ty) => ty.color_scale(),
                PropKind::List { .. } => 1.0,
            })
            .unwrap_or(1.0);

        Ok(Self {
            position,
            normal: triple("nx", "ny", "nz"),
            color,
            color_scale,
        })
    }
}

/// Reads one scalar or one list, in either encoding.
trait RecordReader {
    fn read_scalar(&mut self, ty: ScalarType) -> Result<f64, DecodeError>;
}

/// One row of scalar values; list properties contribute nothing to the row
/// (they are read and dropped, lists only matter for faces).
fn read_row(
    reader: &mut dyn RecordReader,
    element: &ElementDef,
    row: &mut Vec<f64>,
) -> Result<(), DecodeError> {
    row.clear();
    for property in &element.properties {
        match property.kind {
            PropKind::Scalar(ty) => row.push(reader.read_scalar(ty)?),
            PropKind::List { count, item } => {
                let n = reader.read_scalar(count)? as usize;
                for _ in 0..n {
                    reader.read_scalar(item)?;
                }
                row.push(0.0);
            }
        }
    }
    Ok(())
}

fn read_face(
    reader: &mut dyn RecordReader,
    element: &ElementDef,
    indices: &mut Vec<u32>,
) -> Result<(), DecodeError> {
    for property in &element.properties {
        match property.kind {
            PropKind::Scalar(ty) => {
                reader.read_scalar(ty)?;
            }
            PropKind::List { count, item } => {
                let n = reader.read_scalar(count)? as usize;
                if property.name == "vertex_indices" || property.name == "vertex_index" {
                    // Fan triangulation for quads and larger polygons, read
                    // streaming so a corrupt list length cannot drive an
                    // allocation before the data runs out.
                    let mut first = 0u32;
                    let mut prev = 0u32;
                    for i in 0..n {
                        let vertex = reader.read_scalar(item)? as u32;
                        match i {
                            0 => first = vertex,
                            1 => prev = vertex,
                            _ => {
                                indices.extend_from_slice(&[first, prev, vertex]);
                                prev = vertex;
                            }
                        }
                    }
                } else {
                    for _ in 0..n {
                        reader.read_scalar(item)?;
                    }
                }
            }
        }
    }
    Ok(())
}

struct AsciiReader<'a> {
    tokens: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> AsciiReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_ascii_whitespace(),
        }
    }
}

impl RecordReader for AsciiReader<'_> {
    fn read_scalar(&mut self, _ty: ScalarType) -> Result<f64, DecodeError> {
        let token = self
            .tokens
            .next()
            .ok_or(DecodeError::Truncated { position: 0 })?;
        Ok(token.parse::<f64>()?)
    }
}

struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
    big_endian: bool,
}

impl<'a> BinaryReader<'a> {
    fn new(buf: &'a [u8], base: usize, big_endian: bool) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            big_endian,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.pos + n > self.buf.len() {
            return Err(DecodeError::Truncated {
                position: self.base + self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

impl RecordReader for BinaryReader<'_> {
    fn read_scalar(&mut self, ty: ScalarType) -> Result<f64, DecodeError> {
        let bytes = self.take(ty.size())?;
        let be = self.big_endian;
        Ok(match ty {
            ScalarType::Char => bytes[0] as i8 as f64,
            ScalarType::UChar => bytes[0] as f64,
            ScalarType::Short => {
                let b = [bytes[0], bytes[1]];
                (if be {
                    i16::from_be_bytes(b)
                } else {
                    i16::from_le_bytes(b)
                }) as f64
            }
            ScalarType::UShort => {
                let b = [bytes[0], bytes[1]];
                (if be {
                    u16::from_be_bytes(b)
                } else {
                    u16::from_le_bytes(b)
                }) as f64
            }
            ScalarType::Int => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                (if be {
                    i32::from_be_bytes(b)
                } else {
                    i32::from_le_bytes(b)
                }) as f64
            }
            ScalarType::UInt => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                (if be {
                    u32::from_be_bytes(b)
                } else {
                    u32::from_le_bytes(b)
                }) as f64
            }
            ScalarType::Float => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                (if be {
                    f32::from_be_bytes(b)
                } else {
                    f32::from_le_bytes(b)
                }) as f64
            }
            ScalarType::Double => {
                let b = [
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ];
                if be {
                    f64::from_be_bytes(b)
                } else {
                    f64::from_le_bytes(b)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_PLAIN: &[u8] = b"ply\n\
        format ascii 1.0\n\
        comment test\n\
        element vertex 3\n\
        property float x\n\
        property float y\n\
        property float z\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        end_header\n\
        0 0 0\n\
        1 0 0\n\
        0 1 0\n\
        3 0 1 2\n";

    #[test]
    fn ascii_without_colors_or_normals() {
        let geometry = decode_ply(ASCII_PLAIN).unwrap();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.triangle_count(), 1);
        assert!(geometry.colors.is_none());
        // Normals must be computed from the face.
        assert_eq!(geometry.normals.len(), 9);
        assert!((geometry.normals[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ascii_with_uchar_colors() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 3\n\
            property float x\n\
            property float y\n\
            property float z\n\
            property uchar red\n\
            property uchar green\n\
            property uchar blue\n\
            element face 1\n\
            property list uchar int vertex_indices\n\
            end_header\n\
            0 0 0 255 0 0\n\
            1 0 0 0 255 0\n\
            0 1 0 0 0 255\n\
            3 0 1 2\n";

        let geometry = decode_ply(data).unwrap();
        let colors = geometry.colors.unwrap();
        assert_eq!(colors.len(), 9);
        assert!((colors[0] - 1.0).abs() < 1e-6);
        assert!((colors[1]).abs() < 1e-6);
        assert!((colors[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ascii_with_declared_normals_is_not_recomputed() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 3\n\
            property float x\n\
            property float y\n\
            property float z\n\
            property float nx\n\
            property float ny\n\
            property float nz\n\
            element face 1\n\
            property list uchar int vertex_indices\n\
            end_header\n\
            0 0 0 1 0 0\n\
            1 0 0 1 0 0\n\
            0 1 0 1 0 0\n\
            3 0 1 2\n";

        let geometry = decode_ply(data).unwrap();
        // File says +X even though the face points +Z; declared wins.
        assert_eq!(&geometry.normals[0..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn binary_little_endian_vertices_and_faces() {
        let mut data = Vec::new();
        data.extend_from_slice(
            b"ply\n\
            format binary_little_endian 1.0\n\
            element vertex 3\n\
            property float x\n\
            property float y\n\
            property float z\n\
            element face 1\n\
            property list uchar uint vertex_indices\n\
            end_header\n",
        );
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        data.push(3u8);
        for i in [0u32, 1, 2] {
            data.extend_from_slice(&i.to_le_bytes());
        }

        let geometry = decode_ply(&data).unwrap();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert!(geometry.colors.is_none());
    }

    #[test]
    fn quad_is_fan_triangulated() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 4\n\
            property float x\n\
            property float y\n\
            property float z\n\
            element face 1\n\
            property list uchar int vertex_indices\n\
            end_header\n\
            0 0 0\n\
            1 0 0\n\
            1 1 0\n\
            0 1 0\n\
            4 0 1 2 3\n";

        let geometry = decode_ply(data).unwrap();
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn out_of_range_index_fails() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 2\n\
            property float x\n\
            property float y\n\
            property float z\n\
            element face 1\n\
            property list uchar int vertex_indices\n\
            end_header\n\
            0 0 0\n\
            1 0 0\n\
            3 0 1 5\n";

        assert!(matches!(
            decode_ply(data),
            Err(DecodeError::BadIndex { index: 5, .. })
        ));
    }

    #[test]
    fn header_only_file_without_trailing_newline() {
        // A zero-element file may legally end right at "end_header".
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 0\n\
            property float x\n\
            property float y\n\
            property float z\n\
            end_header";
        let geometry = decode_ply(data).unwrap();
        assert_eq!(geometry.vertex_count(), 0);
        assert!(geometry.indices.is_empty());
    }

    #[test]
    fn huge_declared_vertex_count_fails_cleanly() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 3000000000000000000\n\
            property float x\n\
            property float y\n\
            property float z\n\
            end_header\n\
            0 0 0\n";
        assert!(matches!(
            decode_ply(data),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn huge_face_list_length_fails_cleanly() {
        let data = b"ply\n\
            format ascii 1.0\n\
            element vertex 3\n\
            property float x\n\
            property float y\n\
            property float z\n\
            element face 1\n\
            property list uint uint vertex_indices\n\
            end_header\n\
            0 0 0\n\
            1 0 0\n\
            0 1 0\n\
            4294967295 0 1 2\n";
        assert!(matches!(
            decode_ply(data),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn missing_end_header_fails() {
        let data = b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\n";
        assert!(matches!(
            decode_ply(data),
            Err(DecodeError::InvalidHeader(_))
        ));
    }

    #[test]
    fn truncated_binary_body_fails() {
        let mut data = Vec::new();
        data.extend_from_slice(
            b"ply\n\
            format binary_little_endian 1.0\n\
            element vertex 2\n\
            property float x\n\
            property float y\n\
            property float z\n\
            end_header\n",
        );
        data.extend_from_slice(&1.0f32.to_le_bytes());

        assert!(matches!(
            decode_ply(&data),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn not_a_ply_file_fails() {
        assert!(matches!(
            decode_ply(b"solid nope\n"),
            Err(DecodeError::InvalidHeader(_))
        ));
    }
}
