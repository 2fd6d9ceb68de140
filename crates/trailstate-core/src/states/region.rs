//! Region states: ellipses and rectangles in X/Y space.
//!
//! Shapes are plain values in data coordinates. `angle` is in degrees; a
//! point is rotated by `-angle` about the shape's center and then tested
//! against the axis-aligned shape.

use crate::table::Table;
use crate::types::{ColumnKind, ComputationError};
use serde::{Deserialize, Serialize};

/// Rotate `point` counter-clockwise by `degrees` about `center`.
#[must_use]
pub fn rotate(point: [f64; 2], center: [f64; 2], degrees: f64) -> [f64; 2] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point[0] - center[0];
    let dy = point[1] - center[1];
    [
        cos * dx - sin * dy + center[0],
        sin * dx + cos * dy + center[1],
    ]
}

/// Closed ellipse: the boundary is inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: [f64; 2],
    pub rx: f64,
    pub ry: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Ellipse {
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let [cx, cy] = self.center;
        let [px, py] = rotate([x, y], self.center, -self.angle);
        let dx = px - cx;
        let dy = py - cy;
        dx * dx / (self.rx * self.rx) + dy * dy / (self.ry * self.ry) <= 1.0
    }
}

/// Half-open rectangle: lower edges inside, upper edges outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: [f64; 2],
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Rect {
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let [cx, cy] = self.center;
        let p = rotate([x, y], self.center, -self.angle);
        let a = [cx - self.width / 2.0, cy - self.height / 2.0];
        let b = [cx + self.width / 2.0, cy - self.height / 2.0];
        let d = [cx - self.width / 2.0, cy + self.height / 2.0];

        let ap = sub(p, a);
        let ab = sub(b, a);
        let ad = sub(d, a);
        let along_ab = dot(ap, ab);
        let along_ad = dot(ap, ad);
        (0.0..dot(ab, ab)).contains(&along_ab) && (0.0..dot(ad, ad)).contains(&along_ad)
    }
}

fn sub(p: [f64; 2], q: [f64; 2]) -> [f64; 2] {
    [p[0] - q[0], p[1] - q[1]]
}

fn dot(p: [f64; 2], q: [f64; 2]) -> f64 {
    p[0] * q[0] + p[1] * q[1]
}

/// Shape of a region state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionShape {
    Ellipse(Ellipse),
    Rect(Rect),
}

impl RegionShape {
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Ellipse(e) => e.contains(x, y),
            Self::Rect(r) => r.contains(x, y),
        }
    }

    /// Reject degenerate or non-finite geometry.
    pub fn validate(&self) -> Result<(), ComputationError> {
        let (center, extents, angle) = match self {
            Self::Ellipse(e) => (e.center, [e.rx, e.ry], e.angle),
            Self::Rect(r) => (r.center, [r.width, r.height], r.angle),
        };
        if !(center[0].is_finite() && center[1].is_finite() && angle.is_finite()) {
            return Err(ComputationError::InvalidParameters(
                "region center and angle must be finite".to_string(),
            ));
        }
        if extents.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(ComputationError::InvalidParameters(
                "region extents must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Membership of every row's (X, Y) point. Rows without numeric
    /// coordinates are outside.
    pub fn compute(&self, table: &Table) -> Result<Vec<bool>, ComputationError> {
        self.validate()?;
        let x_key = &table
            .column_of_kind(ColumnKind::X)
            .ok_or(ComputationError::MissingColumn(ColumnKind::X))?
            .key;
        let y_key = &table
            .column_of_kind(ColumnKind::Y)
            .ok_or(ComputationError::MissingColumn(ColumnKind::Y))?
            .key;
        Ok(table
            .rows()
            .map(|row| match (row.get(x_key).as_f64(), row.get(y_key).as_f64()) {
                (Some(x), Some(y)) => self.contains(x, y),
                _ => false,
            })
            .collect())
    }
}
