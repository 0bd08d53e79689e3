//! Camera pose, pointer projection and eased framing animations

use glam::{Vec2, Vec3};

use crate::geometry::{Aabb, Ray};

/// Offset from a focused entity to the camera
pub const FOCUS_OFFSET: Vec3 = Vec3::new(5.0, 5.0, 5.0);

/// Length of a framing animation in seconds
pub const FRAMING_DURATION_SECS: f64 = 1.0;

/// Extra room around the model when resetting the view
const RESET_VIEW_MARGIN: f32 = 1.2;

/// Pose used by "reset view" before a model has loaded
pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(30.0, 25.0, 30.0);
pub const DEFAULT_CAMERA_TARGET: Vec3 = Vec3::ZERO;

/// Default vertical field of view (radians)
pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;

/// Where the camera looks from and at. Y is up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Viewport width / height
    pub aspect: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: DEFAULT_CAMERA_POSITION,
            target: DEFAULT_CAMERA_TARGET,
            fov_y: DEFAULT_FOV_Y,
            aspect: 16.0 / 9.0,
        }
    }
}

impl CameraPose {
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    /// Distance from the camera to the world origin
    pub fn distance_from_origin(&self) -> f32 {
        self.position.length()
    }

    /// World-space ray through a point given in normalized device coordinates.
    ///
    /// `ndc.x` grows to the right and `ndc.y` grows upwards, both in [-1, 1].
    pub fn pointer_ray(&self, ndc: Vec2) -> Ray {
        let forward = self.forward();
        let right = forward
            .cross(Vec3::Y)
            .try_normalize()
            .unwrap_or(Vec3::X);
        let up = right.cross(forward);
        let tan_half = (self.fov_y * 0.5).tan();

        let direction = forward
            + right * (ndc.x * tan_half * self.aspect)
            + up * (ndc.y * tan_half);

        Ray {
            origin: self.position,
            direction: direction.normalize(),
        }
    }
}

/// Convert a cursor position in window pixels (origin top-left) to NDC
pub fn cursor_to_ndc(cursor: Vec2, viewport: Vec2) -> Vec2 {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        cursor.x / viewport.x * 2.0 - 1.0,
        -(cursor.y / viewport.y * 2.0 - 1.0),
    )
}

/// Cubic ease-out: fast start, gentle landing
pub fn ease_out_cubic(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

/// One in-flight interpolation between two camera poses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraAnimation {
    pub start_position: Vec3,
    pub end_position: Vec3,
    pub start_target: Vec3,
    pub end_target: Vec3,
    /// Seconds, on the same clock passed to `tick`
    pub start_time: f64,
    pub duration: f64,
    pub generation: u64,
}

impl CameraAnimation {
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0) as f32
    }

    /// Position and look-at target at the given linear progress
    pub fn sample(&self, progress: f32) -> (Vec3, Vec3) {
        let eased = ease_out_cubic(progress);
        (
            self.start_position.lerp(self.end_position, eased),
            self.start_target.lerp(self.end_target, eased),
        )
    }
}

/// Drives at most one framing animation at a time.
///
/// Every started animation gets a new generation number. Ticks carrying an
/// older generation are ignored, so a superseded animation can never write
/// to the camera again.
#[derive(Debug, Clone, Default)]
pub struct CameraAnimator {
    active: Option<CameraAnimation>,
    generation: u64,
}

impl CameraAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start animating from the camera's current pose, superseding any running animation
    pub fn start(&mut self, from: &CameraPose, end_position: Vec3, end_target: Vec3, now: f64) -> u64 {
        self.generation += 1;
        self.active = Some(CameraAnimation {
            start_position: from.position,
            end_position,
            start_target: from.target,
            end_target,
            start_time: now,
            duration: FRAMING_DURATION_SECS,
            generation: self.generation,
        });
        self.generation
    }

    /// Frame an entity: look at it from `FOCUS_OFFSET` away
    pub fn focus_on(&mut self, from: &CameraPose, entity_position: Vec3, now: f64) -> u64 {
        self.start(from, entity_position + FOCUS_OFFSET, entity_position, now)
    }

    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active.is_some_and(|a| a.generation == generation)
    }

    pub fn active(&self) -> Option<&CameraAnimation> {
        self.active.as_ref()
    }

    /// Advance the running animation and write the result into `pose`.
    ///
    /// Returns true while the camera was moved. The animation is dropped once
    /// it reaches full progress.
    pub fn tick(&mut self, now: f64, pose: &mut CameraPose) -> bool {
        let Some(animation) = self.active else {
            return false;
        };
        let progress = animation.progress(now);
        let (position, target) = animation.sample(progress);
        pose.position = position;
        pose.target = target;
        if progress >= 1.0 {
            self.active = None;
        }
        true
    }

    /// Like `tick`, but a no-op unless `generation` is the running animation
    pub fn tick_generation(&mut self, generation: u64, now: f64, pose: &mut CameraPose) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.tick(now, pose)
    }
}

/// Camera position and target that fit `bounds` into view, or the default pose
pub fn reset_view(bounds: Option<&Aabb>, fov_y: f32) -> (Vec3, Vec3) {
    let Some(bounds) = bounds else {
        return (DEFAULT_CAMERA_POSITION, DEFAULT_CAMERA_TARGET);
    };
    let center = bounds.center();
    let radius = bounds.bounding_radius().max(f32::EPSILON);
    let half_fov = (fov_y * 0.5).clamp(0.01, std::f32::consts::FRAC_PI_2);
    let distance = radius / half_fov.sin() * RESET_VIEW_MARGIN;
    let direction = DEFAULT_CAMERA_POSITION.normalize();
    (center + direction * distance, center)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn pose_at(position: Vec3, target: Vec3) -> CameraPose {
        CameraPose {
            position,
            target,
            ..CameraPose::default()
        }
    }

    #[test]
    fn test_ease_out_cubic_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < EPS);
        assert_eq!(ease_out_cubic(2.0), 1.0);
    }

    #[test]
    fn test_pointer_ray_center_is_forward() {
        let pose = pose_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let ray = pose.pointer_ray(Vec2::ZERO);
        assert!(ray.direction.distance(Vec3::NEG_Z) < EPS);
        assert_eq!(ray.origin, pose.position);

        // Top of the screen tilts the ray upwards
        let up = pose.pointer_ray(Vec2::new(0.0, 1.0));
        assert!(up.direction.y > 0.0);
        let right = pose.pointer_ray(Vec2::new(1.0, 0.0));
        assert!(right.direction.x > 0.0);
    }

    #[test]
    fn test_cursor_to_ndc() {
        let viewport = Vec2::new(800.0, 600.0);
        assert_eq!(cursor_to_ndc(Vec2::new(400.0, 300.0), viewport), Vec2::ZERO);
        assert_eq!(cursor_to_ndc(Vec2::new(0.0, 0.0), viewport), Vec2::new(-1.0, 1.0));
        assert_eq!(cursor_to_ndc(Vec2::new(800.0, 600.0), viewport), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_framing_endpoints() {
        let start = pose_at(Vec3::new(10.0, 2.0, -3.0), Vec3::new(1.0, 1.0, 1.0));
        let entity = Vec3::new(4.0, 0.0, 8.0);
        let mut animator = CameraAnimator::new();
        animator.focus_on(&start, entity, 100.0);

        let mut pose = start;
        assert!(animator.tick(100.0, &mut pose));
        assert!(pose.position.distance(start.position) < EPS);
        assert!(pose.target.distance(start.target) < EPS);

        assert!(animator.tick(100.0 + FRAMING_DURATION_SECS, &mut pose));
        assert!(pose.position.distance(entity + FOCUS_OFFSET) < EPS);
        assert!(pose.target.distance(entity) < EPS);
        assert!(!animator.is_animating());
        assert!(!animator.tick(102.0, &mut pose));
    }

    #[test]
    fn test_new_animation_supersedes_old() {
        let start = pose_at(Vec3::new(10.0, 10.0, 10.0), Vec3::ZERO);
        let mut animator = CameraAnimator::new();
        let mut pose = start;

        let first = animator.focus_on(&pose, Vec3::new(-20.0, 0.0, 0.0), 0.0);
        animator.tick(0.4, &mut pose);
        let mid_flight = pose.position;

        let second_target = Vec3::new(0.0, 0.0, 20.0);
        let second = animator.focus_on(&pose, second_target, 0.4);
        assert_ne!(first, second);
        assert_eq!(animator.active().unwrap().start_position, mid_flight);

        // Stale frames from the first animation do nothing
        let before = pose;
        assert!(!animator.tick_generation(first, 0.9, &mut pose));
        assert_eq!(pose, before);

        assert!(animator.tick_generation(second, 1.4, &mut pose));
        assert!(pose.position.distance(second_target + FOCUS_OFFSET) < EPS);
        assert!(pose.target.distance(second_target) < EPS);
        assert!(!animator.tick_generation(first, 2.0, &mut pose));
    }

    #[test]
    fn test_cancel_invalidates_generation() {
        let mut animator = CameraAnimator::new();
        let generation = animator.focus_on(&CameraPose::default(), Vec3::ONE, 0.0);
        animator.cancel();
        let mut pose = CameraPose::default();
        assert!(!animator.tick_generation(generation, 0.5, &mut pose));
        assert_eq!(pose, CameraPose::default());
    }

    #[test]
    fn test_reset_view_without_model() {
        let (position, target) = reset_view(None, DEFAULT_FOV_Y);
        assert_eq!(position, DEFAULT_CAMERA_POSITION);
        assert_eq!(target, DEFAULT_CAMERA_TARGET);
    }

    #[test]
    fn test_reset_view_encloses_bounds() {
        let bounds = Aabb::from_center_size(Vec3::new(5.0, 0.0, 5.0), Vec3::splat(10.0));
        let (position, target) = reset_view(Some(&bounds), DEFAULT_FOV_Y);
        assert!(target.distance(bounds.center()) < EPS);
        let needed = bounds.bounding_radius() / (DEFAULT_FOV_Y * 0.5).sin();
        assert!(position.distance(target) >= needed);
    }
}
