use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;
use crate::Point3;

/// Errors from constructing a [`Solid`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("triangle {triangle} references vertex {index} (vertex count = {vertex_count})")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex { index: usize },

    #[error("mesh has too many vertices for 32-bit indices: {count}")]
    TooManyVertices { count: usize },
}

/// Boundary mesh of a solid as an indexed triangle set.
///
/// Transforms never modify `self`; they return a new `Solid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSolid")]
pub struct Solid {
    pub(crate) vertices: Vec<Point3>,
    pub(crate) triangles: Vec<[u32; 3]>,
}

/// Unchecked wire form; deserialized solids are validated through [`Solid::new`].
#[derive(Deserialize)]
struct RawSolid {
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
}

impl TryFrom<RawSolid> for Solid {
    type Error = MeshError;

    fn try_from(raw: RawSolid) -> Result<Self, MeshError> {
        Solid::new(raw.vertices, raw.triangles)
    }
}

/// Summary of the unique edge lengths of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Solid {
    /// Build a solid from vertices and triangle indices, validating both.
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Result<Self, MeshError> {
        let solid = Self {
            vertices,
            triangles,
        };
        solid.validate()?;
        Ok(solid)
    }

    /// Check index bounds and vertex finiteness.
    ///
    /// Solids from [`Solid::new`] and deserialization are always valid; this
    /// is for solids built by the unchecked primitive builders.
    pub fn validate(&self) -> Result<(), MeshError> {
        let vertices = &self.vertices;
        if u32::try_from(vertices.len()).is_err() {
            return Err(MeshError::TooManyVertices {
                count: vertices.len(),
            });
        }
        if let Some(index) = vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(MeshError::NonFiniteVertex { index });
        }
        for (t, tri) in self.triangles.iter().enumerate() {
            for &index in tri {
                if index as usize >= vertices.len() {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: t,
                        index,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build a solid from unindexed triangles, welding bit-identical positions.
    ///
    /// `-0.0` and `0.0` weld to the same vertex.
    pub fn from_triangle_soup<I>(soup: I) -> Result<Self, MeshError>
    where
        I: IntoIterator<Item = [Point3; 3]>,
    {
        let mut vertices: Vec<Point3> = Vec::new();
        let mut lookup: HashMap<[u64; 3], u32> = HashMap::new();
        let mut triangles = Vec::new();

        for corners in soup {
            let mut tri = [0u32; 3];
            for (slot, p) in tri.iter_mut().zip(corners.iter()) {
                let key = weld_key(p);
                *slot = match lookup.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = u32::try_from(vertices.len()).map_err(|_| {
                            MeshError::TooManyVertices {
                                count: vertices.len() + 1,
                            }
                        })?;
                        vertices.push(*p);
                        lookup.insert(key, index);
                        index
                    }
                };
            }
            triangles.push(tri);
        }

        Self::new(vertices, triangles)
    }

    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Corner positions of every triangle, in order.
    pub fn triangle_corners(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        self.triangles.iter().map(move |tri| {
            [
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ]
        })
    }

    /// Bounding box of the vertices referenced by at least one triangle.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for tri in &self.triangles {
            for &index in tri {
                bb.expand_to_include(&self.vertices[index as usize]);
            }
        }
        bb
    }

    /// Uniform scale about the origin.
    pub fn scaled(&self, factor: f64) -> Self {
        self.map_vertices(|p| [p[0] * factor, p[1] * factor, p[2] * factor])
    }

    pub fn translated(&self, offset: Point3) -> Self {
        self.map_vertices(|p| [p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]])
    }

    /// Same surface with every triangle's winding reversed.
    pub fn inverted(&self) -> Self {
        Self {
            vertices: self.vertices.clone(),
            triangles: self.triangles.iter().map(|t| [t[0], t[2], t[1]]).collect(),
        }
    }

    /// Both meshes as one solid (no boolean evaluation, shells are kept apart).
    pub fn merged(&self, other: &Self) -> Result<Self, MeshError> {
        let offset = u32::try_from(self.vertices.len()).map_err(|_| MeshError::TooManyVertices {
            count: self.vertices.len(),
        })?;
        let mut vertices = self.vertices.clone();
        vertices.extend_from_slice(&other.vertices);
        let mut triangles = self.triangles.clone();
        triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
        Self::new(vertices, triangles)
    }

    /// Length statistics over the unique undirected edges.
    ///
    /// Returns `None` for a mesh without triangles.
    pub fn edge_stats(&self) -> Option<EdgeStats> {
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut min = f64::INFINITY;
        let mut max: f64 = 0.0;
        let mut sum = 0.0;

        for tri in &self.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                let key = if a < b { (a, b) } else { (b, a) };
                if !seen.insert(key) {
                    continue;
                }
                let length = distance(&self.vertices[a as usize], &self.vertices[b as usize]);
                min = min.min(length);
                max = max.max(length);
                sum += length;
            }
        }

        if seen.is_empty() {
            return None;
        }
        Some(EdgeStats {
            count: seen.len(),
            min,
            max,
            mean: sum / seen.len() as f64,
        })
    }

    fn map_vertices(&self, f: impl Fn(&Point3) -> Point3) -> Self {
        Self {
            vertices: self.vertices.iter().map(f).collect(),
            triangles: self.triangles.clone(),
        }
    }
}

fn distance(a: &Point3, b: &Point3) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

fn weld_key(p: &Point3) -> [u64; 3] {
    // Adding 0.0 turns -0.0 into +0.0.
    [
        (p[0] + 0.0).to_bits(),
        (p[1] + 0.0).to_bits(),
        (p[2] + 0.0).to_bits(),
    ]
}
