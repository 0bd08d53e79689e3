//! Plantview Core - Marker interaction and visibility engine
//!
//! This crate provides the engine-independent logic behind the facility viewer:
//! - Equipment entities and the marker set mirroring them in the scene
//! - The interaction state machine for selection, dragging and placement
//! - Occlusion testing of markers against the facility model
//! - Camera pointer projection and eased framing animations
//! - Descriptors for model assets stored as multiple parts
//!
//! Ray queries go through the [`RaycastProvider`] trait so the logic runs
//! against a real renderer or an in-memory [`StaticScene`].

pub mod asset;
pub mod camera;
pub mod entity;
pub mod geometry;
pub mod interaction;
pub mod occlusion;

pub use asset::{AssetCatalog, AssetDescriptor, AssetError, Reassembly};
pub use camera::{CameraAnimator, CameraPose};
pub use entity::{Entity, EntityDraft, EntityId, EquipmentStatus, Marker, MarkerSet, PlacementPayload};
pub use geometry::{Aabb, ObjectCategory, Ray, RayHit, RaycastProvider, StaticScene};
pub use interaction::{
    Effect, InteractionContext, InteractionError, InteractionEvent, Mode, Notice, NoticeLevel,
    PointerButton, RequestId, Session,
};
pub use occlusion::{is_occluded, visible_markers};
