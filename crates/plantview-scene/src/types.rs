//! Resources and messages shared between the scene systems and the app

use bevy::gltf::Gltf;
use bevy::prelude::*;
use plantview_core::{
    Aabb, Entity as Equipment, EntityDraft, EntityId, InteractionEvent, MarkerSet, Notice,
    RequestId, Session,
};

/// The single interaction session
#[derive(Resource, Debug, Default)]
pub struct InteractionSession(pub Session);

/// Markers mirrored from the equipment registry
#[derive(Resource, Debug, Default)]
pub struct SceneMarkers(pub MarkerSet);

/// Currently selected equipment, mirrored from the session for UI readers
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SelectedEquipment(pub Option<EntityId>);

/// Load state of the facility model
#[derive(Resource, Debug, Default, Clone)]
pub struct ModelState {
    pub handle: Option<Handle<Gltf>>,
    /// The model scene has been spawned into the world
    pub spawned: bool,
    /// Model meshes are present and can be ray cast
    pub loaded: bool,
    pub failed: bool,
    /// World-space bounds of the model meshes, once known
    pub bounds: Option<Aabb>,
}

/// A command from the UI layer (toolbar, equipment list, keyboard shortcuts)
#[derive(Message, Debug, Clone)]
pub struct InteractionCommand(pub InteractionEvent);

/// Replace the marker set with a freshly fetched equipment list
#[derive(Message, Debug, Clone)]
pub struct EquipmentLoaded(pub Vec<Equipment>);

/// Fit the whole model into view
#[derive(Message, Debug, Clone, Copy, Default)]
pub struct ResetView;

/// Write requested from the persistence collaborator
#[derive(Message, Debug, Clone)]
pub enum PersistRequest {
    UpdatePosition {
        request: RequestId,
        id: EntityId,
        position: Vec3,
    },
    Create {
        request: RequestId,
        draft: EntityDraft,
        position: Vec3,
    },
}

/// Answer to a [`PersistRequest`]
#[derive(Message, Debug, Clone)]
pub enum PersistOutcome {
    Saved { request: RequestId },
    /// A create succeeded; the record carries the assigned id
    Created { request: RequestId, entity: Equipment },
    Failed { request: RequestId, reason: String },
}

/// User-facing notice raised by the session
#[derive(Message, Debug, Clone)]
pub struct Notification(pub Notice);

/// A point on the model reported by the Edit-mode probe
#[derive(Message, Debug, Clone, Copy)]
pub struct ProbedPoint(pub Vec3);

pub struct TypesPlugin;

impl Plugin for TypesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InteractionSession>()
            .init_resource::<SceneMarkers>()
            .init_resource::<SelectedEquipment>()
            .init_resource::<ModelState>()
            .add_message::<InteractionCommand>()
            .add_message::<EquipmentLoaded>()
            .add_message::<ResetView>()
            .add_message::<PersistRequest>()
            .add_message::<PersistOutcome>()
            .add_message::<Notification>()
            .add_message::<ProbedPoint>();
    }
}
