//! Camera controls, orbit navigation and framing animations

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;
use plantview_core::camera::{reset_view, DEFAULT_CAMERA_POSITION, DEFAULT_CAMERA_TARGET, DEFAULT_FOV_Y};
use plantview_core::{CameraAnimator, CameraPose};

use crate::types::{ModelState, ResetView};
use crate::FrameSet;

/// Orbit controller state. Y is up.
#[derive(Debug, Clone, Resource)]
pub struct OrbitSettings {
    pub distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    /// False while a marker drag owns the pointer
    pub enabled: bool,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        let mut settings = Self {
            distance: 1.0,
            azimuth: 0.0,
            elevation: 0.0,
            target: DEFAULT_CAMERA_TARGET,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            enabled: true,
        };
        settings.look_from(DEFAULT_CAMERA_POSITION, DEFAULT_CAMERA_TARGET);
        settings
    }
}

impl OrbitSettings {
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.cos();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.sin();
        self.target + Vec3::new(x, y, z)
    }

    /// Set the orbit so the camera sits at `position` looking at `target`
    pub fn look_from(&mut self, position: Vec3, target: Vec3) {
        let offset = position - target;
        let distance = offset.length();
        self.target = target;
        if distance <= f32::EPSILON {
            return;
        }
        self.distance = distance;
        self.elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.azimuth = offset.z.atan2(offset.x);
    }

    /// Engine-independent pose for the current orbit
    pub fn pose(&self, fov_y: f32, aspect: f32) -> CameraPose {
        CameraPose {
            position: self.position(),
            target: self.target,
            fov_y,
            aspect,
        }
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Framing animations of the main camera
#[derive(Resource, Debug, Default)]
pub struct CameraFraming(pub CameraAnimator);

/// Vertical field of view of the main camera
pub fn camera_fov(projection: &Projection) -> f32 {
    match projection {
        Projection::Perspective(p) => p.fov,
        _ => DEFAULT_FOV_Y,
    }
}

/// Plugin for camera controls
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitSettings>()
            .init_resource::<CameraFraming>()
            .add_systems(Startup, spawn_camera)
            .add_systems(
                Update,
                (handle_reset_view, orbit_controls, apply_framing, update_camera_transform)
                    .chain()
                    .in_set(FrameSet::Controls),
            );
    }
}

fn spawn_camera(mut commands: Commands, settings: Res<OrbitSettings>) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: DEFAULT_FOV_Y,
            near: 0.1,
            far: 2000.0,
            ..default()
        }),
        Transform::from_translation(settings.position()).looking_at(settings.target, Vec3::Y),
        MainCamera,
    ));
}

/// Fit the model into view. Cancels any running framing animation.
fn handle_reset_view(
    mut requests: MessageReader<ResetView>,
    mut settings: ResMut<OrbitSettings>,
    mut framing: ResMut<CameraFraming>,
    model: Res<ModelState>,
    camera_query: Query<&Projection, With<MainCamera>>,
) {
    if requests.read().count() == 0 {
        return;
    }
    let fov = camera_query.single().map(camera_fov).unwrap_or(DEFAULT_FOV_Y);
    let (position, target) = reset_view(model.bounds.as_ref(), fov);
    framing.0.cancel();
    settings.look_from(position, target);
    tracing::info!(
        x = position.x,
        y = position.y,
        z = position.z,
        "Reset camera view"
    );
}

fn orbit_controls(
    mut settings: ResMut<OrbitSettings>,
    mut framing: ResMut<CameraFraming>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
) {
    if !settings.enabled {
        return;
    }
    let delta = motion.delta;
    let navigating = (mouse_button.pressed(MouseButton::Left)
        || mouse_button.pressed(MouseButton::Right))
        && delta != Vec2::ZERO;

    // Manual navigation takes over from a running framing animation
    if (navigating || scroll.delta.y != 0.0) && framing.0.is_animating() {
        framing.0.cancel();
    }

    // Orbit with left mouse drag
    if mouse_button.pressed(MouseButton::Left) {
        settings.azimuth += delta.x * settings.sensitivity;
        settings.elevation = (settings.elevation + delta.y * settings.sensitivity).clamp(-1.5, 1.5);
    }

    // Pan with right mouse drag on the ground plane
    if mouse_button.pressed(MouseButton::Right) {
        let right = Vec3::new(settings.azimuth.sin(), 0.0, -settings.azimuth.cos());
        let forward = Vec3::new(-settings.azimuth.cos(), 0.0, -settings.azimuth.sin());
        let pan_speed = settings.distance * 0.002;
        settings.target -= right * delta.x * pan_speed;
        settings.target += forward * delta.y * pan_speed;
    }

    if scroll.delta.y != 0.0 {
        let zoom_factor = 1.0 - scroll.delta.y * settings.zoom_speed;
        settings.distance = (settings.distance * zoom_factor).clamp(1.0, 1000.0);
    }
}

/// Advance the framing animation and hand the result to the orbit controller
fn apply_framing(
    time: Res<Time>,
    mut framing: ResMut<CameraFraming>,
    mut settings: ResMut<OrbitSettings>,
) {
    if !framing.0.is_animating() {
        return;
    }
    let mut pose = settings.pose(DEFAULT_FOV_Y, 1.0);
    if framing.0.tick(time.elapsed_secs_f64(), &mut pose) {
        settings.look_from(pose.position, pose.target);
    }
}

fn update_camera_transform(
    settings: Res<OrbitSettings>,
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
) {
    if !settings.is_changed() {
        return;
    }
    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = settings.position();
        transform.look_at(settings.target, Vec3::Y);
    }
}
