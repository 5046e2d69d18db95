//! Surface queries against a density source.
//!
//! The radial query binary-searches the density sign change along a ray from
//! the planet center; the ray query marches an arbitrary segment and refines
//! the first empty-to-solid transition by bisection. Both work on any
//! density source so callers can substitute an edited (effective) field.

use glam::Vec3;

use crate::density::gradient_of;

/// Maximum binary search iterations for a radial surface query.
pub const SURFACE_SEARCH_ITERATIONS: u32 = 32;
/// The search halts once the density magnitude drops below this value.
pub const SURFACE_HALT_EPSILON: f32 = 0.1;
/// Step used for central-difference surface normals.
pub const NORMAL_EPSILON: f32 = 0.1;

/// A point on (or near) the terrain surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// World position of the surface point.
    pub position: Vec3,
    /// Outward surface normal (negated density gradient).
    pub normal: Vec3,
    /// Radial distance minus the nominal planet radius.
    pub altitude: f32,
    /// Angle in degrees between the normal and the radial direction.
    pub slope: f32,
    /// Index of the dominant biome at this direction, if biomes are active.
    pub biome: Option<usize>,
}

/// Finds the surface along a unit direction from the planet center.
///
/// Brackets `[radius - max_depth, radius + max_height]` radially and binary
/// searches the sign change; on a solid midpoint the search moves outward,
/// on an empty one inward. Returns the surface point, or `None` when the
/// bracket has no solid-to-empty ordering at all (a fully empty or fully
/// solid ray).
#[must_use]
pub fn radial_surface_query(
    center: Vec3,
    radius: f32,
    max_height: f32,
    max_depth: f32,
    direction: Vec3,
    density: impl Fn(Vec3) -> f32,
) -> Option<SurfacePoint> {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO {
        return None;
    }

    let mut lo = (radius - max_depth).max(0.0);
    let mut hi = radius + max_height;
    if density(center + dir * lo) < 0.0 || density(center + dir * hi) >= 0.0 {
        return None;
    }

    let mut mid = (lo + hi) * 0.5;
    for _ in 0..SURFACE_SEARCH_ITERATIONS {
        mid = (lo + hi) * 0.5;
        let d = density(center + dir * mid);
        if d.abs() < SURFACE_HALT_EPSILON {
            break;
        }
        if d > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Some(surface_point_at(center, radius, dir, mid, density))
}

/// Marches a ray segment and returns the first surface crossing, if any.
///
/// `step` controls the march granularity; the crossing is refined by
/// bisection before the surface point is assembled.
#[must_use]
pub fn ray_surface_query(
    center: Vec3,
    radius: f32,
    origin: Vec3,
    direction: Vec3,
    length: f32,
    step: f32,
    density: impl Fn(Vec3) -> f32,
) -> Option<SurfacePoint> {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO || length <= 0.0 {
        return None;
    }

    let step = step.max(1e-3);
    let mut prev_t = 0.0f32;
    if density(origin) >= 0.0 {
        // Started inside the terrain.
        let dir_from_center = (origin - center).normalize_or_zero();
        return Some(surface_point_at(
            center,
            radius,
            dir_from_center,
            (origin - center).length(),
            density,
        ));
    }

    let mut t = step;
    while t <= length {
        let d = density(origin + dir * t);
        if d >= 0.0 {
            // Bisect the bracket [prev_t, t].
            let mut lo = prev_t;
            let mut hi = t;
            for _ in 0..SURFACE_SEARCH_ITERATIONS {
                let m = (lo + hi) * 0.5;
                if density(origin + dir * m) >= 0.0 {
                    hi = m;
                } else {
                    lo = m;
                }
            }
            let hit = origin + dir * hi;
            let radial = (hit - center).normalize_or_zero();
            return Some(surface_point_at(
                center,
                radius,
                radial,
                (hit - center).length(),
                density,
            ));
        }
        prev_t = t;
        t += step;
    }
    None
}

/// Assembles a [`SurfacePoint`] at a radial distance along a direction.
fn surface_point_at(
    center: Vec3,
    radius: f32,
    direction: Vec3,
    radial_distance: f32,
    density: impl Fn(Vec3) -> f32,
) -> SurfacePoint {
    let position = center + direction * radial_distance;
    let gradient = gradient_of(&density, position, NORMAL_EPSILON);
    let normal = (-gradient).normalize_or_zero();
    let normal = if normal == Vec3::ZERO { direction } else { normal };
    let slope = normal.dot(direction).clamp(-1.0, 1.0).acos().to_degrees();

    SurfacePoint {
        position,
        normal,
        altitude: radial_distance - radius,
        slope,
        biome: None,
    }
}
