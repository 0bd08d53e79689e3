//! Scene setup - lights, ground grid and the facility model

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;
use plantview_core::{Aabb, Notice, NoticeLevel};

use crate::types::{ModelState, Notification};
use crate::FrameSet;

/// Helper geometry (grid lines, axes) that never occludes or gets picked
#[derive(Component)]
pub struct SceneHelper;

/// Root entity of the spawned facility model
#[derive(Component)]
pub struct FacilityModel;

/// Plugin for scene setup
pub struct SceneSetupPlugin {
    pub model_path: Option<String>,
}

/// Path of the facility model asset
#[derive(Resource, Debug, Clone)]
struct ModelPath(Option<String>);

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ModelPath(self.model_path.clone()))
            .add_systems(Startup, (setup_scene, start_model_load))
            .add_systems(
                Update,
                (spawn_loaded_model, track_model_meshes)
                    .chain()
                    .before(FrameSet::Input),
            );
    }
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Sunlight from above
    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(40.0, 80.0, 30.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Fill light
    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 200.0,
            shadows_enabled: false,
            color: Color::srgb(1.0, 0.95, 0.9),
            ..default()
        },
        Transform::from_xyz(-30.0, 40.0, -30.0),
    ));

    // Ground grid on the X-Z plane
    let grid_size = 20;
    let grid_spacing = 5.0;
    let grid_extent = grid_size as f32 * grid_spacing;
    let thickness = 0.05;

    let line_material = materials.add(StandardMaterial {
        base_color: Color::srgba(0.4, 0.4, 0.4, 0.5),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    });
    let line_mesh_x = meshes.add(Cuboid::new(grid_extent * 2.0, thickness, thickness));
    let line_mesh_z = meshes.add(Cuboid::new(thickness, thickness, grid_extent * 2.0));

    for i in -grid_size..=grid_size {
        let offset = i as f32 * grid_spacing;
        commands.spawn((
            Mesh3d(line_mesh_x.clone()),
            MeshMaterial3d(line_material.clone()),
            Transform::from_translation(Vec3::new(0.0, 0.0, offset)),
            SceneHelper,
        ));
        commands.spawn((
            Mesh3d(line_mesh_z.clone()),
            MeshMaterial3d(line_material.clone()),
            Transform::from_translation(Vec3::new(offset, 0.0, 0.0)),
            SceneHelper,
        ));
    }
}

fn start_model_load(
    path: Res<ModelPath>,
    asset_server: Res<AssetServer>,
    mut model: ResMut<ModelState>,
) {
    let Some(path) = path.0.as_deref() else {
        tracing::info!("No facility model configured");
        return;
    };
    tracing::info!(path = %path, "Starting to load facility model");
    model.handle = Some(asset_server.load(path.to_string()));
}

/// Spawn the model scene once the glTF has loaded
fn spawn_loaded_model(
    mut commands: Commands,
    mut model: ResMut<ModelState>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
    mut notices: MessageWriter<Notification>,
) {
    if model.spawned || model.failed {
        return;
    }
    let Some(handle) = model.handle.clone() else {
        return;
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(gltf) = gltf_assets.get(&handle) else {
                return;
            };
            let scene = gltf
                .default_scene
                .clone()
                .or_else(|| gltf.scenes.first().cloned());
            match scene {
                Some(scene) => {
                    tracing::info!("Facility model loaded, spawning scene");
                    commands.spawn((SceneRoot(scene), Transform::IDENTITY, FacilityModel));
                    model.spawned = true;
                }
                None => {
                    tracing::error!("Facility model contains no scenes");
                    model.failed = true;
                }
            }
        }
        Some(LoadState::Failed(err)) => {
            tracing::error!(error = %err, "Failed to load facility model");
            model.failed = true;
            notices.write(Notification(Notice {
                level: NoticeLevel::Error,
                message: "Facility model failed to load".to_string(),
            }));
        }
        _ => {}
    }
}

/// Mark the model loaded once its meshes exist, and record its bounds.
///
/// Only meshes below the [`FacilityModel`] root count, so markers, helpers
/// and anything else spawned later never widen the bounds.
fn track_model_meshes(
    mut model: ResMut<ModelState>,
    meshes: Res<Assets<Mesh>>,
    roots: Query<Entity, With<FacilityModel>>,
    children: Query<&Children>,
    model_meshes: Query<(&Mesh3d, &GlobalTransform)>,
) {
    if !model.spawned || model.loaded {
        return;
    }

    let mut bounds: Option<Aabb> = None;
    for root in roots.iter() {
        for entity in children.iter_descendants(root) {
            let Ok((mesh3d, transform)) = model_meshes.get(entity) else {
                continue;
            };
            let Some(mesh) = meshes.get(&mesh3d.0) else {
                continue;
            };
            let Some(positions) = mesh
                .attribute(Mesh::ATTRIBUTE_POSITION)
                .and_then(|values| values.as_float3())
            else {
                continue;
            };
            for p in positions {
                let world = transform.transform_point(Vec3::from_array(*p));
                let point = Aabb::new(world, world);
                bounds = Some(match bounds {
                    Some(b) => b.union(&point),
                    None => point,
                });
            }
        }
    }

    // Scene children appear a frame or more after the root is spawned
    if let Some(bounds) = bounds {
        tracing::info!(
            min = ?bounds.min,
            max = ?bounds.max,
            "Facility model ready"
        );
        model.bounds = Some(bounds);
        model.loaded = true;
    }
}
