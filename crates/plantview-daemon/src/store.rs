//! Equipment records backed by a JSON file

use chrono::{DateTime, Utc};
use glam::Vec3;
use plantview_core::{Entity, EntityDraft, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Equipment {0} not found")]
    NotFound(EntityId),
}

/// A stored equipment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    #[serde(flatten)]
    pub entity: Entity,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create request
#[derive(Debug, Clone, Deserialize)]
pub struct NewEquipment {
    #[serde(flatten)]
    pub draft: EntityDraft,
    pub position: Vec3,
}

/// On-disk file layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    equipment: Vec<EquipmentRecord>,
}

/// Equipment registry, persisted after every write
#[derive(Debug)]
pub struct EquipmentStore {
    path: PathBuf,
    records: BTreeMap<EntityId, EquipmentRecord>,
}

impl EquipmentStore {
    /// Load the store or start empty if the file does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: StoreFile = serde_json::from_str(&content)?;
            file.equipment
                .into_iter()
                .map(|r| (r.entity.id, r))
                .collect()
        } else {
            BTreeMap::new()
        };
        info!(path = %path.display(), count = records.len(), "Loaded equipment store");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn list(&self) -> Vec<EquipmentRecord> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, id: EntityId) -> Option<&EquipmentRecord> {
        self.records.get(&id)
    }

    /// Create a record with the next free id
    pub fn create(&mut self, new: NewEquipment) -> Result<EquipmentRecord, StoreError> {
        let id = EntityId(self.records.keys().next_back().map_or(1, |last| last.0 + 1));
        let record = EquipmentRecord {
            entity: Entity {
                id,
                name: new.draft.name,
                position: new.position,
                status: new.draft.status,
                is_billboard: new.draft.is_billboard,
            },
            updated_at: Utc::now(),
        };
        self.records.insert(id, record.clone());
        if let Err(e) = self.save() {
            self.records.remove(&id);
            return Err(e);
        }
        info!(equipment = %id, name = %record.entity.name, "Created equipment");
        Ok(record)
    }

    pub fn update_position(&mut self, id: EntityId, position: Vec3) -> Result<EquipmentRecord, StoreError> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let previous = record.clone();
        record.entity.position = position;
        record.updated_at = Utc::now();
        let updated = record.clone();

        if let Err(e) = self.save() {
            self.records.insert(id, previous);
            return Err(e);
        }
        info!(equipment = %id, x = position.x, y = position.y, z = position.z, "Updated equipment position");
        Ok(updated)
    }

    fn save(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            equipment: self.list(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
