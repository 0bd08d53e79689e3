//! Plantview Scene - Bevy host for the marker interaction engine
//!
//! This crate wires the engine-independent logic in `plantview-core` into a
//! Bevy app: the facility model, marker meshes, orbit camera, framing
//! animations and pointer input. Persistence stays outside the plugin; the
//! app reads [`PersistRequest`] messages and answers with [`PersistOutcome`].

pub mod camera;
pub mod interaction;
pub mod markers;
pub mod raycast;
pub mod scene;
pub mod types;

use bevy::prelude::*;

/// Per-frame ordering: input, then camera controls and framing, then marker
/// visibility. Rendering follows in the render schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameSet {
    Input,
    Controls,
    Visibility,
}

/// Plugin that sets up the facility scene and marker interaction
#[derive(Default)]
pub struct PlantviewScenePlugin {
    /// Model asset path, usually served by the reconstruction proxy
    pub model_path: Option<String>,
}

impl Plugin for PlantviewScenePlugin {
    fn build(&self, app: &mut App) {
        configure_frame_sets(app);
        app.add_plugins(types::TypesPlugin)
        .add_plugins(scene::SceneSetupPlugin {
            model_path: self.model_path.clone(),
        })
        .add_plugins(camera::CameraPlugin)
        .add_plugins(markers::MarkersPlugin)
        .add_plugins(interaction::InteractionPlugin);
    }
}

fn configure_frame_sets(app: &mut App) {
    app.configure_sets(
        Update,
        (FrameSet::Input, FrameSet::Controls, FrameSet::Visibility).chain(),
    );
}

// Re-export commonly used types
pub use camera::{CameraFraming, MainCamera, OrbitSettings};
pub use types::*;
