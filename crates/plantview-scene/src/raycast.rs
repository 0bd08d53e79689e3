//! Mesh ray casting against the facility model

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings};
use plantview_core::{Ray, RayHit, RaycastProvider};

use crate::markers::MarkerEntity;
use crate::scene::SceneHelper;

/// Ray queries against model meshes only. Markers, grid lines and axes are
/// skipped so they never count as occluders or pick targets.
#[derive(SystemParam)]
pub struct SceneRaycaster<'w, 's> {
    ray_cast: MeshRayCast<'w, 's>,
    excluded: Query<'w, 's, (), Or<(With<MarkerEntity>, With<SceneHelper>)>>,
}

impl RaycastProvider for SceneRaycaster<'_, '_> {
    fn cast(&mut self, ray: &Ray) -> Vec<RayHit> {
        let Ok(direction) = Dir3::new(ray.direction) else {
            return Vec::new();
        };
        let excluded = &self.excluded;
        let filter = |entity: Entity| !excluded.contains(entity);
        let settings = MeshRayCastSettings::default()
            .with_filter(&filter)
            .never_early_exit();

        let mut hits: Vec<RayHit> = self
            .ray_cast
            .cast_ray(Ray3d::new(ray.origin, direction), &settings)
            .iter()
            .map(|(_, hit)| RayHit {
                distance: hit.distance,
                point: hit.point,
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
