//! Interaction state machine for marker placement, selection and dragging
//!
//! The session owns the mode, the drag target, the pending placement and the
//! current selection. Every event is applied synchronously and returns the
//! side effects the host has to carry out (persist a position, move the
//! camera, suspend orbit controls, show a notification). The session never
//! performs I/O itself.
//!
//! Ray resolution is shared by drag, click and placement: the pointer ray is
//! cast against real geometry and the nearest hit wins. On a miss the point
//! falls back to a fixed distance along the ray, so every resolution yields a
//! point even over empty space.

use glam::{Vec2, Vec3};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::camera::CameraPose;
use crate::entity::{EntityDraft, EntityId, MarkerSet, PlacementPayload};
use crate::geometry::{ray_sphere_hit, Ray, RaycastProvider};
use crate::occlusion::OCCLUSION_EPSILON;

/// Pick radius around a marker's center, independent of its pulsed display scale
pub const MARKER_HIT_RADIUS: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("The facility model is still loading, try again once it is visible")]
    GeometryNotReady,
    #[error("Unknown equipment {0}")]
    UnknownEntity(EntityId),
    #[error("Failed to save equipment {id}: {reason}")]
    PersistFailed { id: EntityId, reason: String },
}

/// Mutually exclusive interaction modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Edit,
    Placing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Correlates a persistence request with its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Inputs to the state machine, from the pointer or from UI commands
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    SetEditMode(bool),
    BeginPlacement(PlacementPayload),
    CancelPlacement,
    /// Escape: cancel placement, or clear the selection
    Cancel,
    Select(EntityId),
    Deselect,
    PointerMove(Vec2),
    PointerDown(PointerButton),
    PointerUp(PointerButton),
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Message for the user
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn warning(err: &InteractionError) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: err.to_string(),
        }
    }

    fn error(err: &InteractionError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: err.to_string(),
        }
    }
}

/// Work the host performs on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write a committed marker position to the persistence collaborator
    PersistPosition {
        request: RequestId,
        id: EntityId,
        position: Vec3,
    },
    /// Create a new equipment record at `position`
    CreateEntity {
        request: RequestId,
        draft: EntityDraft,
        position: Vec3,
    },
    SelectionChanged(Option<EntityId>),
    /// Start a framing animation onto this point
    FocusCamera(Vec3),
    /// Orbit navigation must ignore the pointer until `ResumeControls`
    SuspendControls,
    ResumeControls,
    /// Diagnostic point probe result
    Probed(Vec3),
    Notify(Notice),
}

/// What the session needs to know about the scene for one event
pub struct InteractionContext<'a> {
    pub camera: &'a CameraPose,
    pub markers: &'a mut MarkerSet,
    /// Ray queries against the loaded model; None until it has loaded
    pub geometry: Option<&'a mut dyn RaycastProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingWrite {
    id: EntityId,
    previous: Vec3,
    written: Vec3,
}

/// The single interaction session for the application
#[derive(Debug, Clone, Default)]
pub struct Session {
    mode: Mode,
    drag_target: Option<EntityId>,
    placement: Option<PlacementPayload>,
    selected: Option<EntityId>,
    pointer: Vec2,
    next_request: u64,
    pending: BTreeMap<RequestId, PendingWrite>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn drag_target(&self) -> Option<EntityId> {
        self.drag_target
    }

    pub fn placement(&self) -> Option<&PlacementPayload> {
        self.placement.as_ref()
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Last pointer position in normalized device coordinates
    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    /// Apply one event and return the effects it produced
    pub fn handle(&mut self, event: InteractionEvent, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        let effects = match event {
            InteractionEvent::SetEditMode(enabled) => self.set_edit_mode(enabled, ctx),
            InteractionEvent::BeginPlacement(payload) => self.begin_placement(payload, ctx),
            InteractionEvent::CancelPlacement => self.cancel_placement(),
            InteractionEvent::Cancel => self.cancel(),
            InteractionEvent::Select(id) => self.select(id, ctx),
            InteractionEvent::Deselect => self.deselect(),
            InteractionEvent::PointerMove(ndc) => self.pointer_move(ndc, ctx),
            InteractionEvent::PointerDown(button) => self.pointer_down(button, ctx),
            InteractionEvent::PointerUp(button) => self.pointer_up(button, ctx),
            InteractionEvent::Click => self.click(ctx),
        };
        self.check_invariants();
        effects
    }

    pub fn set_edit_mode(&mut self, enabled: bool, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        match (self.mode, enabled) {
            (Mode::Edit, false) => {
                effects.extend(self.commit_drag(ctx));
                self.mode = Mode::Normal;
                info!("Edit mode off");
            }
            (Mode::Normal, true) => {
                self.mode = Mode::Edit;
                info!("Edit mode on");
            }
            (Mode::Placing, true) => {
                self.placement = None;
                self.mode = Mode::Edit;
                info!("Placement cancelled, edit mode on");
            }
            _ => {}
        }
        effects
    }

    pub fn begin_placement(&mut self, payload: PlacementPayload, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        if let PlacementPayload::Reposition(id) = &payload {
            if !ctx.markers.contains(*id) {
                let err = InteractionError::UnknownEntity(*id);
                warn!(entity = %id, "Cannot reposition unknown equipment");
                return vec![Effect::Notify(Notice::warning(&err))];
            }
        }

        let effects = self.commit_drag(ctx);
        debug!(payload = ?payload, "Entering placement mode");
        self.mode = Mode::Placing;
        self.placement = Some(payload);
        effects
    }

    pub fn cancel_placement(&mut self) -> Vec<Effect> {
        if self.mode == Mode::Placing {
            self.placement = None;
            self.mode = Mode::Normal;
            info!("Placement cancelled");
        }
        Vec::new()
    }

    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.mode == Mode::Placing {
            self.cancel_placement()
        } else {
            self.deselect()
        }
    }

    pub fn select(&mut self, id: EntityId, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        let Some(marker) = ctx.markers.get(id) else {
            let err = InteractionError::UnknownEntity(id);
            return vec![Effect::Notify(Notice::warning(&err))];
        };
        let position = marker.entity.position;
        self.selected = Some(id);
        info!(entity = %id, "Selected equipment");
        vec![Effect::SelectionChanged(Some(id)), Effect::FocusCamera(position)]
    }

    pub fn deselect(&mut self) -> Vec<Effect> {
        match self.selected.take() {
            Some(_) => vec![Effect::SelectionChanged(None)],
            None => Vec::new(),
        }
    }

    pub fn pointer_move(&mut self, ndc: Vec2, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        self.pointer = ndc;
        let Some(id) = self.drag_target else {
            return Vec::new();
        };
        let Some(geometry) = ctx.geometry.as_deref_mut() else {
            return Vec::new();
        };
        let Some(marker) = ctx.markers.get(id) else {
            return Vec::new();
        };

        let ray = ctx.camera.pointer_ray(ndc);
        let fallback = ctx.camera.position.distance(marker.visual_position);
        let point = resolve_point(geometry, &ray, fallback);
        ctx.markers.set_visual(id, point);
        Vec::new()
    }

    pub fn pointer_down(&mut self, button: PointerButton, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        if button != PointerButton::Primary || self.mode != Mode::Edit {
            return Vec::new();
        }
        let ray = ctx.camera.pointer_ray(self.pointer);
        let Some(id) = pick_marker(ctx, &ray) else {
            return Vec::new();
        };
        debug!(entity = %id, "Drag started");
        self.drag_target = Some(id);
        vec![Effect::SuspendControls]
    }

    pub fn pointer_up(&mut self, _button: PointerButton, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        self.commit_drag(ctx)
    }

    pub fn click(&mut self, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        if self.mode == Mode::Placing {
            return self.commit_placement(ctx);
        }

        let ray = ctx.camera.pointer_ray(self.pointer);
        if let Some(id) = pick_marker(ctx, &ray) {
            return match self.mode {
                Mode::Normal => self.select(id, ctx),
                // Dragging was already armed by the pointer-down
                _ => Vec::new(),
            };
        }

        if self.mode != Mode::Edit {
            return Vec::new();
        }
        let Some(geometry) = ctx.geometry.as_deref_mut() else {
            let err = InteractionError::GeometryNotReady;
            warn!("Point probe before the model loaded");
            return vec![Effect::Notify(Notice::warning(&err))];
        };
        match geometry.nearest(&ray) {
            Some(hit) => {
                info!(
                    x = hit.point.x,
                    y = hit.point.y,
                    z = hit.point.z,
                    "Probed model point"
                );
                vec![Effect::Probed(hit.point)]
            }
            None => Vec::new(),
        }
    }

    /// The persistence collaborator accepted a request
    pub fn persist_succeeded(&mut self, request: RequestId) {
        self.pending.remove(&request);
    }

    /// The persistence collaborator rejected a request.
    ///
    /// A failed position write restores the marker to where it was before the
    /// commit, unless it has been moved again since.
    pub fn persist_failed(&mut self, request: RequestId, reason: &str, markers: &mut MarkerSet) -> Vec<Effect> {
        let Some(write) = self.pending.remove(&request) else {
            let notice = Notice {
                level: NoticeLevel::Error,
                message: format!("Failed to save equipment: {reason}"),
            };
            return vec![Effect::Notify(notice)];
        };

        let still_there = markers
            .get(write.id)
            .is_some_and(|m| m.entity.position == write.written);
        if still_there && self.drag_target != Some(write.id) {
            markers.set_committed(write.id, write.previous);
            warn!(entity = %write.id, reason = %reason, "Position write failed, restored previous position");
        } else {
            warn!(entity = %write.id, reason = %reason, "Position write failed");
        }

        let err = InteractionError::PersistFailed {
            id: write.id,
            reason: reason.to_string(),
        };
        vec![Effect::Notify(Notice::error(&err))]
    }

    fn commit_drag(&mut self, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        let Some(id) = self.drag_target.take() else {
            return Vec::new();
        };
        let mut effects = vec![Effect::ResumeControls];
        let Some((previous, committed)) = ctx.markers.commit_visual(id) else {
            return effects;
        };
        if previous == committed {
            debug!(entity = %id, "Drag ended without movement");
            return effects;
        }
        info!(entity = %id, x = committed.x, y = committed.y, z = committed.z, "Drag committed");
        effects.push(self.persist(id, previous, committed));
        effects
    }

    fn commit_placement(&mut self, ctx: &mut InteractionContext<'_>) -> Vec<Effect> {
        let Some(geometry) = ctx.geometry.as_deref_mut() else {
            let err = InteractionError::GeometryNotReady;
            warn!("Placement before the model loaded");
            return vec![Effect::Notify(Notice::warning(&err))];
        };

        let ray = ctx.camera.pointer_ray(self.pointer);
        let fallback = ctx.camera.distance_from_origin() * 0.5;
        let point = resolve_point(geometry, &ray, fallback);

        let payload = self.placement.take();
        self.mode = Mode::Normal;

        match payload {
            Some(PlacementPayload::New(draft)) => {
                info!(name = %draft.name, "Placing new equipment");
                let request = self.next_request_id();
                vec![Effect::CreateEntity {
                    request,
                    draft,
                    position: point,
                }]
            }
            Some(PlacementPayload::Reposition(id)) => {
                let Some(previous) = ctx.markers.get(id).map(|m| m.entity.position) else {
                    let err = InteractionError::UnknownEntity(id);
                    return vec![Effect::Notify(Notice::warning(&err))];
                };
                ctx.markers.set_committed(id, point);
                info!(entity = %id, "Repositioned equipment");
                vec![self.persist(id, previous, point)]
            }
            None => Vec::new(),
        }
    }

    fn persist(&mut self, id: EntityId, previous: Vec3, written: Vec3) -> Effect {
        let request = self.next_request_id();
        self.pending.insert(
            request,
            PendingWrite {
                id,
                previous,
                written,
            },
        );
        Effect::PersistPosition {
            request,
            id,
            position: written,
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.drag_target.is_none() || self.mode == Mode::Edit,
            "drag target outside edit mode"
        );
        debug_assert!(
            self.placement.is_none() || self.mode == Mode::Placing,
            "placement payload outside placing mode"
        );
        debug_assert!(
            self.mode != Mode::Placing || self.placement.is_some(),
            "placing mode without payload"
        );
    }
}

/// Nearest geometry hit, or the point `fallback_distance` along the ray
pub fn resolve_point(geometry: &mut dyn RaycastProvider, ray: &Ray, fallback_distance: f32) -> Vec3 {
    match geometry.nearest(ray) {
        Some(hit) => hit.point,
        None => ray.at(fallback_distance),
    }
}

/// Nearest marker under the ray that is not hidden behind geometry
fn pick_marker(ctx: &mut InteractionContext<'_>, ray: &Ray) -> Option<EntityId> {
    let wall = ctx
        .geometry
        .as_deref_mut()
        .and_then(|g| g.nearest(ray))
        .map(|hit| hit.distance + OCCLUSION_EPSILON)
        .unwrap_or(f32::INFINITY);

    ctx.markers
        .iter()
        .filter_map(|m| ray_sphere_hit(ray, m.visual_position, MARKER_HIT_RADIUS).map(|t| (t, m.id())))
        .filter(|(t, _)| *t < wall)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}
