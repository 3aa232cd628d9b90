use serde::{Deserialize, Serialize};

use crate::Point3;

/// Axis-aligned bounding box.
///
/// An empty box has `min = +inf` and `max = -inf` on every axis so that
/// expanding it by any point yields that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_to_include(p);
        }
        bb
    }

    pub fn expand_to_include(&mut self, p: &Point3) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Width, height and depth. Zero on every axis for an empty box.
    pub fn size(&self) -> Point3 {
        if self.is_empty() {
            return [0.0; 3];
        }
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Smallest of width, height and depth.
    pub fn min_dimension(&self) -> f64 {
        let [w, h, d] = self.size();
        w.min(h).min(d)
    }

    pub fn max_dimension(&self) -> f64 {
        let [w, h, d] = self.size();
        w.max(h).max(d)
    }

    pub fn center(&self) -> Point3 {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    pub fn volume(&self) -> f64 {
        let [w, h, d] = self.size();
        w * h * d
    }

    /// Largest per-axis distance between the corresponding corners of two boxes.
    pub fn max_deviation(&self, other: &Self) -> f64 {
        let mut deviation: f64 = 0.0;
        for axis in 0..3 {
            deviation = deviation
                .max((self.min[axis] - other.min[axis]).abs())
                .max((self.max[axis] - other.max[axis]).abs());
        }
        deviation
    }

    pub fn contains(&self, p: &Point3) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
