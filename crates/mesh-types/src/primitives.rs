//! Primitive solids with outward-facing (counter-clockwise) winding.

use std::f64::consts::PI;

use crate::solid::{MeshError, Solid};
use crate::Point3;

/// Axis-aligned box spanning `min`..`max`. 8 vertices, 12 triangles.
///
/// Corners must be finite. The result is not validated; use
/// [`Solid::validate`] when the corners come from untrusted input.
pub fn cuboid(min: Point3, max: Point3) -> Solid {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    let vertices = vec![
        [x0, y0, z0], // 0
        [x1, y0, z0], // 1
        [x1, y1, z0], // 2
        [x0, y1, z0], // 3
        [x0, y0, z1], // 4
        [x1, y0, z1], // 5
        [x1, y1, z1], // 6
        [x0, y1, z1], // 7
    ];
    let triangles = vec![
        [0, 2, 1],
        [0, 3, 2], // bottom (-z)
        [4, 5, 6],
        [4, 6, 7], // top (+z)
        [0, 1, 5],
        [0, 5, 4], // front (-y)
        [3, 7, 6],
        [3, 6, 2], // back (+y)
        [0, 4, 7],
        [0, 7, 3], // left (-x)
        [1, 2, 6],
        [1, 6, 5], // right (+x)
    ];
    Solid { vertices, triangles }
}

/// Cube with one corner at the origin.
pub fn cube(size: f64) -> Solid {
    cuboid([0.0; 3], [size; 3])
}

/// Latitude/longitude sphere. `segments` is clamped to at least 3 and
/// `rings` to at least 2.
///
/// `center` and `radius` must be finite. The result is not validated; use
/// [`Solid::validate`] when they come from untrusted input.
pub fn uv_sphere(center: Point3, radius: f64, segments: u32, rings: u32) -> Solid {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let [cx, cy, cz] = center;

    let mut vertices = Vec::with_capacity((segments * (rings - 1) + 2) as usize);
    vertices.push([cx, cy, cz + radius]);
    for i in 1..rings {
        let theta = PI * f64::from(i) / f64::from(rings);
        for j in 0..segments {
            let phi = 2.0 * PI * f64::from(j) / f64::from(segments);
            vertices.push([
                cx + radius * theta.sin() * phi.cos(),
                cy + radius * theta.sin() * phi.sin(),
                cz + radius * theta.cos(),
            ]);
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push([cx, cy, cz - radius]);

    let ring_start = |i: u32| 1 + (i - 1) * segments;
    let mut triangles = Vec::new();

    let first = ring_start(1);
    for j in 0..segments {
        triangles.push([0, first + j, first + (j + 1) % segments]);
    }
    for i in 1..rings - 1 {
        let a = ring_start(i);
        let b = ring_start(i + 1);
        for j in 0..segments {
            let k = (j + 1) % segments;
            triangles.push([a + j, b + j, b + k]);
            triangles.push([a + j, b + k, a + k]);
        }
    }
    let last = ring_start(rings - 1);
    for j in 0..segments {
        triangles.push([bottom, last + (j + 1) % segments, last + j]);
    }

    Solid { vertices, triangles }
}

/// Cube of edge `size` at the origin with a spherical cavity at its center.
///
/// The cavity is an inward-facing sphere shell, so `radius` must be smaller
/// than `size / 2` for the result to be a valid solid.
pub fn cube_minus_sphere(size: f64, radius: f64, segments: u32) -> Result<Solid, MeshError> {
    let half = size / 2.0;
    let cavity = uv_sphere([half; 3], radius, segments, segments / 2).inverted();
    cube(size).merged(&cavity)
}
