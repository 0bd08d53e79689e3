//! Per-frame marker visibility against the facility geometry
//!
//! A marker is hidden when real geometry sits between the camera and the
//! marker. The test is a brute-force ray sweep, one ray per marker, which is
//! fine for the tens of markers a facility carries. A depth-buffer test or a
//! spatial index would be needed for thousands.

use glam::{Quat, Vec3};
use std::collections::BTreeSet;

use crate::entity::{EntityId, MarkerSet};
use crate::geometry::{Ray, RaycastProvider};

/// Hits closer than this to the marker itself do not count as occluders
pub const OCCLUSION_EPSILON: f32 = 0.5;

/// Opacity of a visible marker
pub const MARKER_OPACITY: f32 = 0.9;

const PULSE_AMPLITUDE: f32 = 0.1;
const PULSE_SPEED: f32 = 2.0;
const PULSE_PHASE_SCALE: f32 = 0.5;

/// Whether geometry hides `marker` from `camera`
pub fn is_occluded<P: RaycastProvider + ?Sized>(provider: &mut P, camera: Vec3, marker: Vec3) -> bool {
    let Some((ray, distance_to_marker)) = Ray::between(camera, marker) else {
        // Camera inside the marker
        return false;
    };
    let limit = distance_to_marker - OCCLUSION_EPSILON;
    provider.cast(&ray).iter().any(|hit| hit.distance < limit)
}

/// Ids of all markers visible from `camera`.
///
/// Markers are tested at their drawn position so a marker being dragged
/// behind a wall disappears while it is dragged.
pub fn visible_markers<P: RaycastProvider + ?Sized>(
    provider: &mut P,
    camera: Vec3,
    markers: &MarkerSet,
) -> BTreeSet<EntityId> {
    markers
        .iter()
        .filter(|m| !is_occluded(provider, camera, m.visual_position))
        .map(|m| m.id())
        .collect()
}

/// Cosmetic display scale for a marker. Never used for hit-testing.
pub fn pulse_scale(elapsed_secs: f32, position: Vec3) -> f32 {
    let phase = (position.x + position.z) * PULSE_PHASE_SCALE;
    1.0 + PULSE_AMPLITUDE * (elapsed_secs * PULSE_SPEED + phase).sin()
}

/// Rotation that turns a marker's +Z face towards the camera, keeping it upright
pub fn billboard_rotation(marker: Vec3, camera: Vec3) -> Quat {
    let to_camera = camera - marker;
    let flat = Vec3::new(to_camera.x, 0.0, to_camera.z);
    match flat.try_normalize() {
        Some(dir) => Quat::from_rotation_y(dir.x.atan2(dir.z)),
        None => Quat::IDENTITY,
    }
}
