// Joint angle estimation from 2D landmark positions

use crate::models::pose::Keypoint;
use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(a: Point2, b: Point2) -> Self {
        Self::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }
}

impl From<&Keypoint> for Point2 {
    fn from(kp: &Keypoint) -> Self {
        Self::new(kp.x as f64, kp.y as f64)
    }
}

/// Angle ABC in degrees, with `b` as the vertex. Always within [0, 180].
///
/// Uses `atan2(|cross|, dot)` rather than `acos` of the normalized dot product,
/// which loses precision near 0 and 180 and can leave acos's domain after rounding.
/// Coincident points yield 0.
pub fn joint_angle(a: Point2, b: Point2, c: Point2) -> f64 {
    let (ux, uy) = (a.x - b.x, a.y - b.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);

    let cross = ux * vy - uy * vx;
    let dot = ux * vx + uy * vy;

    cross.abs().atan2(dot).to_degrees()
}
