//! Sphere projection for the attack globe.
//!
//! Latitude 90 maps to the +Y ("north pole") axis. Longitude is shifted by
//! 180 degrees before conversion so the seam lines up with the origin of an
//! equirectangular earth texture.

use crate::attack::GeoCoord;
use nalgebra::Vector3;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Projects a latitude/longitude pair (degrees) onto a sphere of `radius`.
///
/// Pure and total: out-of-range inputs are not rejected, they run through
/// the same spherical-to-Cartesian formula. Callers validate if they care.
pub fn project(lat: f64, lon: f64, radius: f64) -> Vector3<f64> {
    let phi = (90.0 - lat) * DEG_TO_RAD;
    let theta = (lon + 180.0) * DEG_TO_RAD;

    Vector3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// Projects a [`GeoCoord`].
pub fn project_coord(coord: GeoCoord, radius: f64) -> Vector3<f64> {
    project(coord.lat, coord.lon, radius)
}

/// Inverse of [`project`] for any point off the origin.
///
/// Points above the surface (arc control points, in-flight packets) map to
/// the coordinate directly beneath them. Longitude is returned in
/// (-180, 180]. The origin maps to (0, 0).
pub fn unproject(point: &Vector3<f64>) -> GeoCoord {
    let r = point.norm();
    if r == 0.0 {
        return GeoCoord::new(0.0, 0.0);
    }

    let phi = (point.y / r).clamp(-1.0, 1.0).acos();
    let theta = point.z.atan2(-point.x);

    let lat = 90.0 - phi / DEG_TO_RAD;
    let mut lon = theta / DEG_TO_RAD - 180.0;
    if lon <= -180.0 {
        lon += 360.0;
    }

    GeoCoord::new(lat, lon)
}
