//! STL encoding (ASCII and binary) with format detection on decode.

use mesh_types::{Point3, Solid};
use tracing::debug;

use crate::codec::MeshCodec;
use crate::errors::CodecError;

const HEADER_LEN: usize = 80;
const TRIANGLE_RECORD_LEN: usize = 50;

/// Encoding used when writing. Decoding accepts either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StlFormat {
    /// Text STL. Coordinates are written with the shortest representation
    /// that parses back to the same `f64`, so a round trip is lossless.
    #[default]
    Ascii,
    /// Binary STL. Coordinates are narrowed to `f32`.
    Binary,
}

/// STL codec for the interchange file.
#[derive(Debug, Clone)]
pub struct StlCodec {
    format: StlFormat,
    name: String,
}

impl StlCodec {
    pub fn new(format: StlFormat) -> Self {
        Self {
            format,
            name: "csg".to_string(),
        }
    }

    pub fn ascii() -> Self {
        Self::new(StlFormat::Ascii)
    }

    pub fn binary() -> Self {
        Self::new(StlFormat::Binary)
    }

    /// Solid name written to the ASCII header or binary header text.
    pub fn with_name(mut self, name: &str) -> Self {
        let cleaned: String = name
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        self.name = if cleaned.is_empty() {
            "csg".to_string()
        } else {
            cleaned
        };
        self
    }

    pub fn format(&self) -> StlFormat {
        self.format
    }
}

impl Default for StlCodec {
    fn default() -> Self {
        Self::ascii()
    }
}

impl MeshCodec for StlCodec {
    fn extension(&self) -> &str {
        "stl"
    }

    fn encode(&self, solid: &Solid) -> Result<Vec<u8>, CodecError> {
        if solid.is_empty() {
            return Err(CodecError::EmptyMesh);
        }
        debug!(
            triangles = solid.triangle_count(),
            format = ?self.format,
            "encoding STL"
        );
        match self.format {
            StlFormat::Ascii => Ok(encode_ascii(solid, &self.name).into_bytes()),
            StlFormat::Binary => encode_binary(solid, &self.name),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Solid, CodecError> {
        let solid = if looks_binary(bytes) {
            decode_binary(bytes)?
        } else {
            let text = std::str::from_utf8(bytes).map_err(|e| CodecError::Parse {
                line: 0,
                reason: format!("ASCII STL is not valid UTF-8: {e}"),
            })?;
            decode_ascii(text)?
        };
        debug!(
            triangles = solid.triangle_count(),
            vertices = solid.vertex_count(),
            "decoded STL"
        );
        Ok(solid)
    }
}

/// Binary when the size matches the record count in the header. Some
/// exporters start binary headers with `solid`, so the size check wins.
fn looks_binary(bytes: &[u8]) -> bool {
    if let Some(expected) = binary_len(bytes) {
        if expected == bytes.len() {
            return true;
        }
    }
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    !bytes[start..].starts_with(b"solid")
}

fn binary_len(bytes: &[u8]) -> Option<usize> {
    let count_bytes: [u8; 4] = bytes.get(HEADER_LEN..HEADER_LEN + 4)?.try_into().ok()?;
    let count = u32::from_le_bytes(count_bytes) as usize;
    count
        .checked_mul(TRIANGLE_RECORD_LEN)?
        .checked_add(HEADER_LEN + 4)
}

fn face_normal(a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let nx = e1[1] * e2[2] - e1[2] * e2[1];
    let ny = e1[2] * e2[0] - e1[0] * e2[2];
    let nz = e1[0] * e2[1] - e1[1] * e2[0];
    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 1e-300 {
        [nx / len, ny / len, nz / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

fn encode_ascii(solid: &Solid, name: &str) -> String {
    let mut out = String::with_capacity(solid.triangle_count() * 256);
    out.push_str(&format!("solid {}\n", name));

    for [a, b, c] in solid.triangle_corners() {
        let n = face_normal(&a, &b, &c);
        out.push_str(&format!("  facet normal {} {} {}\n", n[0], n[1], n[2]));
        out.push_str("    outer loop\n");
        for p in [a, b, c] {
            out.push_str(&format!("      vertex {} {} {}\n", p[0], p[1], p[2]));
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }

    out.push_str(&format!("endsolid {}\n", name));
    out
}

fn narrow(value: f64) -> Result<f32, CodecError> {
    let narrowed = value as f32;
    if narrowed.is_finite() {
        Ok(narrowed)
    } else {
        Err(CodecError::OutOfRange { value })
    }
}

fn encode_binary(solid: &Solid, name: &str) -> Result<Vec<u8>, CodecError> {
    let tri_count = solid.triangle_count();
    let count = u32::try_from(tri_count).map_err(|_| CodecError::Parse {
        line: 0,
        reason: format!("{tri_count} triangles exceed the binary STL limit"),
    })?;
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + tri_count * TRIANGLE_RECORD_LEN);

    // Header must not start with "solid" or readers may take it for ASCII.
    let header = format!("binary STL: {}", name);
    let header_bytes = header.as_bytes();
    buf.extend_from_slice(&header_bytes[..header_bytes.len().min(HEADER_LEN)]);
    buf.resize(HEADER_LEN, 0u8);
    buf.extend_from_slice(&count.to_le_bytes());

    for [a, b, c] in solid.triangle_corners() {
        let n = face_normal(&a, &b, &c);
        for component in n {
            buf.extend_from_slice(&(component as f32).to_le_bytes());
        }
        for p in [a, b, c] {
            for component in p {
                buf.extend_from_slice(&narrow(component)?.to_le_bytes());
            }
        }
        // Attribute byte count (unused)
        buf.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(buf)
}

fn decode_binary(bytes: &[u8]) -> Result<Solid, CodecError> {
    let expected = binary_len(bytes).ok_or(CodecError::Truncated {
        expected: HEADER_LEN + 4,
        actual: bytes.len(),
    })?;
    if bytes.len() < expected {
        return Err(CodecError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let soup = bytes[HEADER_LEN + 4..expected]
        .chunks_exact(TRIANGLE_RECORD_LEN)
        .map(|record| {
            // Skip the stored normal (12 bytes); it is recomputed on encode.
            let corner = |k: usize| {
                let o = 12 + k * 12;
                [
                    read_f32(record, o),
                    read_f32(record, o + 4),
                    read_f32(record, o + 8),
                ]
            };
            [corner(0), corner(1), corner(2)]
        });

    Ok(Solid::from_triangle_soup(soup)?)
}

fn read_f32(record: &[u8], offset: usize) -> f64 {
    f64::from(f32::from_le_bytes([
        record[offset],
        record[offset + 1],
        record[offset + 2],
        record[offset + 3],
    ]))
}

fn parse_coordinate(token: Option<&str>, line: usize) -> Result<f64, CodecError> {
    let token = token.ok_or_else(|| CodecError::Parse {
        line,
        reason: "vertex needs three coordinates".to_string(),
    })?;
    let value: f64 = token.parse().map_err(|_| CodecError::Parse {
        line,
        reason: format!("invalid coordinate '{token}'"),
    })?;
    if !value.is_finite() {
        return Err(CodecError::Parse {
            line,
            reason: format!("non-finite coordinate '{token}'"),
        });
    }
    Ok(value)
}

fn decode_ascii(text: &str) -> Result<Solid, CodecError> {
    let mut soup: Vec<[Point3; 3]> = Vec::new();
    let mut polygon: Vec<Point3> = Vec::new();
    let mut open_loop: Option<usize> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let mut tokens = raw.split_whitespace();
        match tokens.next() {
            Some("outer") => {
                if open_loop.is_some() {
                    return Err(CodecError::Parse {
                        line,
                        reason: "nested 'outer loop'".to_string(),
                    });
                }
                open_loop = Some(line);
                polygon.clear();
            }
            Some("vertex") => {
                if open_loop.is_none() {
                    return Err(CodecError::Parse {
                        line,
                        reason: "vertex outside of 'outer loop'".to_string(),
                    });
                }
                let x = parse_coordinate(tokens.next(), line)?;
                let y = parse_coordinate(tokens.next(), line)?;
                let z = parse_coordinate(tokens.next(), line)?;
                polygon.push([x, y, z]);
            }
            Some("endloop") => {
                if open_loop.take().is_none() {
                    return Err(CodecError::Parse {
                        line,
                        reason: "'endloop' without 'outer loop'".to_string(),
                    });
                }
                if polygon.len() < 3 {
                    return Err(CodecError::Parse {
                        line,
                        reason: format!("facet has {} vertices", polygon.len()),
                    });
                }
                // Fan-triangulate the occasional polygonal facet.
                for k in 1..polygon.len() - 1 {
                    soup.push([polygon[0], polygon[k], polygon[k + 1]]);
                }
            }
            _ => {}
        }
    }

    if let Some(line) = open_loop {
        return Err(CodecError::Parse {
            line,
            reason: "unterminated 'outer loop'".to_string(),
        });
    }

    Ok(Solid::from_triangle_soup(soup)?)
}
