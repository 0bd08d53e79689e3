//! Marker meshes, per-frame occlusion and display animation

use bevy::prelude::*;
use plantview_core::occlusion::{billboard_rotation, is_occluded, pulse_scale, MARKER_OPACITY};
use plantview_core::{EntityId, EquipmentStatus, Marker};
use std::collections::HashSet;

use crate::camera::OrbitSettings;
use crate::raycast::SceneRaycaster;
use crate::types::{ModelState, SceneMarkers};
use crate::FrameSet;

/// Display radius of a sphere marker, also its card half-width
const MARKER_RADIUS: f32 = 0.5;

/// Scene entity showing one equipment marker
#[derive(Component, Debug, Clone)]
pub struct MarkerEntity {
    pub id: EntityId,
    pub status: EquipmentStatus,
    pub billboard: bool,
}

/// Shared meshes and per-status materials for markers
#[derive(Resource)]
pub struct MarkerAssets {
    sphere: Handle<Mesh>,
    card: Handle<Mesh>,
    operational: Handle<StandardMaterial>,
    warning: Handle<StandardMaterial>,
    critical: Handle<StandardMaterial>,
}

impl MarkerAssets {
    fn material(&self, status: EquipmentStatus) -> Handle<StandardMaterial> {
        match status {
            EquipmentStatus::Operational => self.operational.clone(),
            EquipmentStatus::Warning => self.warning.clone(),
            EquipmentStatus::Critical => self.critical.clone(),
        }
    }

    fn mesh(&self, billboard: bool) -> Handle<Mesh> {
        if billboard {
            self.card.clone()
        } else {
            self.sphere.clone()
        }
    }
}

/// Plugin for equipment markers
pub struct MarkersPlugin;

impl Plugin for MarkersPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_marker_assets).add_systems(
            Update,
            (sync_markers, update_marker_visibility, animate_markers)
                .chain()
                .in_set(FrameSet::Visibility),
        );
    }
}

fn status_material(status: EquipmentStatus) -> StandardMaterial {
    let [r, g, b] = status.color();
    StandardMaterial {
        base_color: Color::srgba(r, g, b, MARKER_OPACITY),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

fn setup_marker_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(MarkerAssets {
        sphere: meshes.add(Sphere::new(MARKER_RADIUS)),
        card: meshes.add(Rectangle::new(MARKER_RADIUS * 2.0, MARKER_RADIUS * 2.0)),
        operational: materials.add(status_material(EquipmentStatus::Operational)),
        warning: materials.add(status_material(EquipmentStatus::Warning)),
        critical: materials.add(status_material(EquipmentStatus::Critical)),
    });
}

fn spawn_marker(commands: &mut Commands, assets: &MarkerAssets, marker: &Marker) {
    commands.spawn((
        Mesh3d(assets.mesh(marker.entity.is_billboard)),
        MeshMaterial3d(assets.material(marker.entity.status)),
        Transform::from_translation(marker.visual_position),
        Visibility::default(),
        MarkerEntity {
            id: marker.id(),
            status: marker.entity.status,
            billboard: marker.entity.is_billboard,
        },
    ));
}

/// Mirror the marker set into scene entities
fn sync_markers(
    mut commands: Commands,
    markers: Res<SceneMarkers>,
    assets: Option<Res<MarkerAssets>>,
    mut spawned: Query<(
        Entity,
        &mut MarkerEntity,
        &mut Transform,
        &mut MeshMaterial3d<StandardMaterial>,
    )>,
) {
    let Some(assets) = assets else {
        return;
    };

    let mut present = HashSet::new();
    for (entity, mut marker_entity, mut transform, mut material) in spawned.iter_mut() {
        let Some(marker) = markers.0.get(marker_entity.id) else {
            commands.entity(entity).despawn();
            continue;
        };
        if marker.entity.is_billboard != marker_entity.billboard {
            // Mesh kind changed; respawn below
            commands.entity(entity).despawn();
            continue;
        }
        present.insert(marker_entity.id);
        transform.translation = marker.visual_position;
        if marker.entity.status != marker_entity.status {
            marker_entity.status = marker.entity.status;
            material.0 = assets.material(marker.entity.status);
        }
    }

    for marker in markers.0.iter().filter(|m| !present.contains(&m.id())) {
        spawn_marker(&mut commands, &assets, marker);
    }
}

/// Hide markers whose line of sight to the camera crosses the model
fn update_marker_visibility(
    settings: Res<OrbitSettings>,
    model: Res<ModelState>,
    mut raycaster: SceneRaycaster,
    mut query: Query<(&Transform, &mut Visibility), With<MarkerEntity>>,
) {
    let camera = settings.position();
    for (transform, mut visibility) in query.iter_mut() {
        let occluded = model.loaded && is_occluded(&mut raycaster, camera, transform.translation);
        let wanted = if occluded {
            Visibility::Hidden
        } else {
            Visibility::Inherited
        };
        visibility.set_if_neq(wanted);
    }
}

/// Pulse marker scale and turn billboard cards towards the camera
fn animate_markers(
    time: Res<Time>,
    settings: Res<OrbitSettings>,
    mut query: Query<(&MarkerEntity, &mut Transform)>,
) {
    let elapsed = time.elapsed_secs();
    let camera = settings.position();
    for (marker, mut transform) in query.iter_mut() {
        transform.scale = Vec3::splat(pulse_scale(elapsed, transform.translation));
        if marker.billboard {
            transform.rotation = billboard_rotation(transform.translation, camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantview_core::Entity as Equipment;

    fn equipment(id: i64, position: Vec3) -> Equipment {
        Equipment {
            id: EntityId(id),
            name: format!("unit-{id}"),
            position,
            status: EquipmentStatus::Operational,
            is_billboard: false,
        }
    }

    fn marker_app(model_loaded: bool) -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<OrbitSettings>()
            .init_resource::<SceneMarkers>()
            .insert_resource(ModelState {
                loaded: model_loaded,
                ..default()
            })
            .insert_resource(MarkerAssets {
                sphere: Handle::default(),
                card: Handle::default(),
                operational: Handle::default(),
                warning: Handle::default(),
                critical: Handle::default(),
            })
            .add_systems(Update, (sync_markers, update_marker_visibility).chain());
        app
    }

    fn spawned(app: &mut App) -> Vec<(EntityId, Vec3)> {
        let mut query = app.world_mut().query::<(&MarkerEntity, &Transform)>();
        let mut found: Vec<_> = query
            .iter(app.world())
            .map(|(m, t)| (m.id, t.translation))
            .collect();
        found.sort_by_key(|(id, _)| *id);
        found
    }

    #[test]
    fn test_markers_follow_the_marker_set() {
        let mut app = marker_app(false);
        app.world_mut().resource_mut::<SceneMarkers>().0.load([
            equipment(1, Vec3::ZERO),
            equipment(2, Vec3::new(4.0, 0.0, 0.0)),
        ]);
        app.update();
        assert_eq!(
            spawned(&mut app),
            vec![(EntityId(1), Vec3::ZERO), (EntityId(2), Vec3::new(4.0, 0.0, 0.0))]
        );

        {
            let mut markers = app.world_mut().resource_mut::<SceneMarkers>();
            markers.0.set_visual(EntityId(1), Vec3::new(0.0, 2.0, 0.0));
            markers.0.remove(EntityId(2));
        }
        app.update();
        assert_eq!(spawned(&mut app), vec![(EntityId(1), Vec3::new(0.0, 2.0, 0.0))]);
    }

    #[test]
    fn test_markers_stay_visible_without_model() {
        let mut app = marker_app(false);
        app.world_mut()
            .resource_mut::<SceneMarkers>()
            .0
            .load([equipment(1, Vec3::ZERO)]);
        app.update();

        let mut query = app.world_mut().query_filtered::<&mut Visibility, With<MarkerEntity>>();
        for mut visibility in query.iter_mut(app.world_mut()) {
            *visibility = Visibility::Hidden;
        }
        app.update();

        let mut query = app.world_mut().query_filtered::<&Visibility, With<MarkerEntity>>();
        let visibilities: Vec<_> = query.iter(app.world()).copied().collect();
        assert_eq!(visibilities, vec![Visibility::Inherited]);
    }

    #[test]
    fn test_loaded_model_without_meshes_hides_nothing() {
        let mut app = marker_app(true);
        app.world_mut()
            .resource_mut::<SceneMarkers>()
            .0
            .load([equipment(1, Vec3::ZERO), equipment(2, Vec3::new(0.0, 5.0, 0.0))]);
        app.update();

        let mut query = app.world_mut().query_filtered::<&Visibility, With<MarkerEntity>>();
        assert!(query
            .iter(app.world())
            .all(|v| *v == Visibility::Inherited));
    }
}
