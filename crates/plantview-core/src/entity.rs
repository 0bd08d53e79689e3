//! Equipment entity types and the marker set that mirrors them in the scene

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for an equipment record, assigned by the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating status of a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Operational,
    Warning,
    Critical,
}

impl Default for EquipmentStatus {
    fn default() -> Self {
        Self::Operational
    }
}

impl EquipmentStatus {
    /// Marker color as linear RGB (0.0-1.0)
    pub fn color(&self) -> [f32; 3] {
        match self {
            Self::Operational => [0.18, 0.8, 0.34],
            Self::Warning => [0.96, 0.62, 0.04],
            Self::Critical => [0.9, 0.16, 0.16],
        }
    }
}

/// An equipment record positioned in the facility model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    #[serde(default)]
    pub status: EquipmentStatus,
    /// Re-orient the marker towards the camera every frame
    #[serde(default)]
    pub is_billboard: bool,
}

/// Equipment that has not been placed yet and has no id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub name: String,
    #[serde(default)]
    pub status: EquipmentStatus,
    #[serde(default)]
    pub is_billboard: bool,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: EquipmentStatus::default(),
            is_billboard: false,
        }
    }
}

/// What a placement click resolves into
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementPayload {
    /// Create a new entity at the clicked point
    New(EntityDraft),
    /// Move an existing entity to the clicked point
    Reposition(EntityId),
}

/// Scene-side mirror of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Last committed record
    pub entity: Entity,
    /// Where the marker is drawn; leads `entity.position` only while dragged
    pub visual_position: Vec3,
}

impl Marker {
    pub fn new(entity: Entity) -> Self {
        Self {
            visual_position: entity.position,
            entity,
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id
    }
}

/// All markers currently in the scene, keyed by entity id
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: BTreeMap<EntityId, Marker>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with freshly loaded records
    pub fn load(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.markers = entities
            .into_iter()
            .map(|e| (e.id, Marker::new(e)))
            .collect();
    }

    /// Insert or replace a single entity; any uncommitted visual offset is dropped
    pub fn upsert(&mut self, entity: Entity) {
        self.markers.insert(entity.id, Marker::new(entity));
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Marker> {
        self.markers.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.markers.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Move the drawn marker without touching the committed record
    pub fn set_visual(&mut self, id: EntityId, position: Vec3) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.visual_position = position;
                true
            }
            None => false,
        }
    }

    /// Copy the visual position into the committed record.
    ///
    /// Returns the previous committed position and the new one.
    pub fn commit_visual(&mut self, id: EntityId) -> Option<(Vec3, Vec3)> {
        let marker = self.markers.get_mut(&id)?;
        let previous = marker.entity.position;
        marker.entity.position = marker.visual_position;
        Some((previous, marker.entity.position))
    }

    /// Set both committed and visual position
    pub fn set_committed(&mut self, id: EntityId, position: Vec3) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.entity.position = position;
                marker.visual_position = position;
                true
            }
            None => false,
        }
    }
}
