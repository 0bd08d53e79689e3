//! Rays, bounding boxes and the ray-intersection seam to the rendering engine

use glam::Vec3;

/// World-space ray with a unit-length direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray, normalizing `direction`. Returns None for a zero direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    /// Ray from `from` towards `to`, with the distance between them
    pub fn between(from: Vec3, to: Vec3) -> Option<(Self, f32)> {
        let delta = to - from;
        let distance = delta.length();
        Self::new(from, delta).map(|ray| (ray, distance))
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Radius of the sphere enclosing the box
    pub fn bounding_radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Slab-method intersection, returns the entry distance along the ray
    pub fn ray_hit(&self, ray: &Ray) -> Option<f32> {
        let o = ray.origin;
        let d = ray.direction;
        let inv = Vec3::new(
            if d.x != 0.0 { 1.0 / d.x } else { f32::INFINITY },
            if d.y != 0.0 { 1.0 / d.y } else { f32::INFINITY },
            if d.z != 0.0 { 1.0 / d.z } else { f32::INFINITY },
        );

        let t1 = (self.min - o) * inv;
        let t2 = (self.max - o) * inv;
        // NaN appears when the origin sits exactly on a slab and the direction is parallel to it
        let near = t1.min(t2);
        let far = t1.max(t2);
        let t_min = near.max_element();
        let t_max = far.min_element();

        if t_max.is_nan() || t_min.is_nan() || t_min > t_max || t_max < 0.0 {
            return None;
        }
        Some(if t_min >= 0.0 { t_min } else { t_max })
    }
}

/// Category tag for scene objects; only `Geometry` takes part in hit-testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    /// Loaded facility model surfaces
    Geometry,
    /// Equipment markers
    Marker,
    /// Grid, axes and other visual aids
    Helper,
    Light,
}

impl ObjectCategory {
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Geometry)
    }
}

/// Intersection of a ray with real geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
}

/// Ray queries against the renderable object set.
///
/// Implementations return hits against `Geometry` objects only, ordered by
/// ascending distance. Markers, helpers and lights never appear.
pub trait RaycastProvider {
    fn cast(&mut self, ray: &Ray) -> Vec<RayHit>;

    fn nearest(&mut self, ray: &Ray) -> Option<RayHit> {
        self.cast(ray).into_iter().next()
    }
}

/// Object in an in-memory scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub category: ObjectCategory,
    pub bounds: Aabb,
}

/// Box-based scene used where no rendering engine is available
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    objects: Vec<SceneObject>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: ObjectCategory, bounds: Aabb) -> Self {
        self.push(category, bounds);
        self
    }

    pub fn push(&mut self, category: ObjectCategory, bounds: Aabb) {
        self.objects.push(SceneObject { category, bounds });
    }
}

impl RaycastProvider for StaticScene {
    fn cast(&mut self, ray: &Ray) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = self
            .objects
            .iter()
            .filter(|o| o.category.is_solid())
            .filter_map(|o| o.bounds.ray_hit(ray))
            .map(|distance| RayHit {
                distance,
                point: ray.at(distance),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

/// Distance along `ray` to its closest approach to a sphere, if it passes within `radius`
pub fn ray_sphere_hit(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let t = (center - ray.origin).dot(ray.direction);
    if t < 0.0 {
        return None;
    }
    let closest = ray.at(t);
    if closest.distance_squared(center) < radius * radius {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0)).unwrap();
        assert!((ray.direction.length() - 1.0).abs() < 1e-6);
        assert!(Ray::new(Vec3::ZERO, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_aabb_hit_from_outside_and_inside() {
        let unit = Aabb::from_center_size(Vec3::ZERO, Vec3::splat(2.0));
        let outside = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z).unwrap();
        assert!((unit.ray_hit(&outside).unwrap() - 9.0).abs() < 1e-5);

        let inside = Ray::new(Vec3::ZERO, Vec3::X).unwrap();
        assert!((unit.ray_hit(&inside).unwrap() - 1.0).abs() < 1e-5);

        let behind = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::Z).unwrap();
        assert!(unit.ray_hit(&behind).is_none());
    }

    #[test]
    fn test_static_scene_skips_non_geometry_and_sorts() {
        let mut scene = StaticScene::new()
            .with(
                ObjectCategory::Geometry,
                Aabb::from_center_size(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE),
            )
            .with(
                ObjectCategory::Helper,
                Aabb::from_center_size(Vec3::new(0.0, 0.0, -2.0), Vec3::ONE),
            )
            .with(
                ObjectCategory::Geometry,
                Aabb::from_center_size(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE),
            );

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        let hits = scene.cast(&ray);
        assert_eq!(hits.len(), 2);
        assert!((hits[0].distance - 4.5).abs() < 1e-5);
        assert!((hits[1].distance - 9.5).abs() < 1e-5);
    }

    #[test]
    fn test_ray_sphere_hit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X).unwrap();
        assert!(ray_sphere_hit(&ray, Vec3::new(5.0, 0.1, 0.0), 0.5).is_some());
        assert!(ray_sphere_hit(&ray, Vec3::new(5.0, 1.0, 0.0), 0.5).is_none());
        assert!(ray_sphere_hit(&ray, Vec3::new(-5.0, 0.0, 0.0), 0.5).is_none());
    }
}
