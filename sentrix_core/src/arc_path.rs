//! Curved travel paths between two points on the globe.
//!
//! Every arc is a quadratic Bézier `start -> control -> end`. The control
//! point sits above the chord midpoint at an altitude that grows with the
//! straight-line (chord) distance between the endpoints, so nearby pairs get
//! flat arcs and far-apart pairs get tall ones that clear the surface.

use crate::attack::GeoCoord;
use crate::projection::project_coord;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Altitude parameters for the control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    /// Fixed lift above the sphere surface (default: 0.15)
    pub base_altitude: f64,

    /// Additional lift per unit of chord distance (default: 0.2)
    pub altitude_factor: f64,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            base_altitude: 0.15,
            altitude_factor: 0.2,
        }
    }
}

/// The derived, immutable 3-point control path of one arc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcPath {
    pub start: Vector3<f64>,
    pub control: Vector3<f64>,
    pub end: Vector3<f64>,
}

impl ArcPath {
    /// Builds the path between two geographic coordinates.
    pub fn between(source: GeoCoord, target: GeoCoord, radius: f64, params: &PathParams) -> Self {
        build_path(
            &project_coord(source, radius),
            &project_coord(target, radius),
            radius,
            params,
        )
    }

    /// Evaluates the curve at `t` (clamped to [0, 1]).
    pub fn point_at(&self, t: f64) -> Vector3<f64> {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let u = 1.0 - t;
        self.start * (u * u) + self.control * (2.0 * u * t) + self.end * (t * t)
    }

    /// Samples `segments + 1` evenly spaced (in t) points, endpoints included.
    pub fn sample(&self, segments: usize) -> Vec<Vector3<f64>> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f64 / segments as f64))
            .collect()
    }

    /// Straight-line distance between the endpoints.
    pub fn chord(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Distance of the control point from the sphere center.
    pub fn control_altitude(&self) -> f64 {
        self.control.norm()
    }
}

/// Builds the control path between two points on a sphere of `radius`.
///
/// `control = normalize(midpoint) * (radius + base_altitude + chord * altitude_factor)`.
/// Never fails: coincident endpoints give a low arc, antipodal endpoints
/// (midpoint at the center) lift the control point perpendicular to the
/// source instead of normalizing a zero vector.
pub fn build_path(
    source: &Vector3<f64>,
    target: &Vector3<f64>,
    radius: f64,
    params: &PathParams,
) -> ArcPath {
    let chord = (target - source).norm();
    let altitude = radius + params.base_altitude + chord * params.altitude_factor;

    let midpoint = (source + target) * 0.5;
    let direction = midpoint
        .try_normalize(1e-9)
        .unwrap_or_else(|| fallback_direction(source));

    ArcPath {
        start: *source,
        control: direction * altitude,
        end: *target,
    }
}

/// A unit vector perpendicular to `source`, preferring the north axis.
fn fallback_direction(source: &Vector3<f64>) -> Vector3<f64> {
    let north = Vector3::y();
    let Some(s) = source.try_normalize(1e-9) else {
        return north;
    };

    // Remove the component along the source (Gram-Schmidt)
    let candidate = north - s * s.dot(&north);
    candidate
        .try_normalize(1e-9)
        .or_else(|| (Vector3::x() - s * s.x).try_normalize(1e-9))
        .unwrap_or(north)
}
