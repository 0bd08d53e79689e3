//! Pointer and keyboard input feeding the interaction session
//!
//! Raw input becomes [`InteractionEvent`]s in a fixed order per frame
//! (commands, move, press, release, click). The effects the session returns
//! are carried out here: camera framing, control suspension, selection
//! mirroring, and persistence requests written as messages for the app.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use plantview_core::camera::{cursor_to_ndc, DEFAULT_FOV_Y};
use plantview_core::{
    Effect, InteractionContext, InteractionEvent, NoticeLevel, PointerButton, RaycastProvider,
};

use crate::camera::{camera_fov, CameraFraming, MainCamera, OrbitSettings};
use crate::raycast::SceneRaycaster;
use crate::types::{
    EquipmentLoaded, InteractionCommand, InteractionSession, ModelState, Notification,
    PersistOutcome, PersistRequest, ProbedPoint, SceneMarkers, SelectedEquipment,
};
use crate::FrameSet;

/// Pointer travel (pixels) above which a press-release is a drag, not a click
const CLICK_SLOP: f32 = 5.0;

/// Cursor bookkeeping between frames
#[derive(Resource, Debug, Default)]
pub struct PointerTracker {
    last_cursor: Option<Vec2>,
    press_position: Option<Vec2>,
}

/// Plugin for pointer interaction
pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PointerTracker>().add_systems(
            Update,
            (load_equipment, handle_persist_outcomes, handle_input)
                .chain()
                .in_set(FrameSet::Input),
        );
    }
}

/// Everything a session effect may touch
#[derive(SystemParam)]
pub struct EffectSink<'w> {
    selected: ResMut<'w, SelectedEquipment>,
    orbit: ResMut<'w, OrbitSettings>,
    framing: ResMut<'w, CameraFraming>,
    time: Res<'w, Time>,
    persist: MessageWriter<'w, PersistRequest>,
    notices: MessageWriter<'w, Notification>,
    probes: MessageWriter<'w, ProbedPoint>,
}

impl EffectSink<'_> {
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistPosition {
                    request,
                    id,
                    position,
                } => {
                    self.persist.write(PersistRequest::UpdatePosition {
                        request,
                        id,
                        position,
                    });
                }
                Effect::CreateEntity {
                    request,
                    draft,
                    position,
                } => {
                    self.persist.write(PersistRequest::Create {
                        request,
                        draft,
                        position,
                    });
                }
                Effect::SelectionChanged(id) => {
                    self.selected.0 = id;
                }
                Effect::FocusCamera(position) => {
                    let pose = self.orbit.pose(DEFAULT_FOV_Y, 1.0);
                    let now = self.time.elapsed_secs_f64();
                    self.framing.0.focus_on(&pose, position, now);
                }
                Effect::SuspendControls => {
                    self.orbit.enabled = false;
                }
                Effect::ResumeControls => {
                    self.orbit.enabled = true;
                }
                Effect::Probed(point) => {
                    tracing::info!(x = point.x, y = point.y, z = point.z, "Model point");
                    self.probes.write(ProbedPoint(point));
                }
                Effect::Notify(notice) => {
                    match notice.level {
                        NoticeLevel::Info => tracing::info!(message = %notice.message, "Notice"),
                        NoticeLevel::Warning => tracing::warn!(message = %notice.message, "Notice"),
                        NoticeLevel::Error => tracing::error!(message = %notice.message, "Notice"),
                    }
                    self.notices.write(Notification(notice));
                }
            }
        }
    }
}

/// Collect this frame's events in dispatch order
fn collect_events(
    window: Option<&Window>,
    mouse_button: &ButtonInput<MouseButton>,
    keyboard: &ButtonInput<KeyCode>,
    tracker: &mut PointerTracker,
    commands: impl Iterator<Item = InteractionEvent>,
) -> Vec<InteractionEvent> {
    let mut events: Vec<InteractionEvent> = commands.collect();

    if keyboard.just_pressed(KeyCode::Escape) {
        events.push(InteractionEvent::Cancel);
    }

    let Some(window) = window else {
        return events;
    };
    let viewport = Vec2::new(window.width(), window.height());
    let cursor = window.cursor_position();

    if let Some(cursor) = cursor {
        if tracker.last_cursor != Some(cursor) {
            tracker.last_cursor = Some(cursor);
            events.push(InteractionEvent::PointerMove(cursor_to_ndc(cursor, viewport)));
        }
    }

    let buttons = [
        (MouseButton::Left, PointerButton::Primary),
        (MouseButton::Right, PointerButton::Secondary),
        (MouseButton::Middle, PointerButton::Middle),
    ];
    for (button, pointer) in buttons {
        if mouse_button.just_pressed(button) {
            if button == MouseButton::Left {
                tracker.press_position = cursor;
            }
            events.push(InteractionEvent::PointerDown(pointer));
        }
    }
    for (button, pointer) in buttons {
        if mouse_button.just_released(button) {
            events.push(InteractionEvent::PointerUp(pointer));
            if button == MouseButton::Left {
                if let (Some(start), Some(end)) = (tracker.press_position.take(), cursor) {
                    if start.distance(end) <= CLICK_SLOP {
                        events.push(InteractionEvent::Click);
                    }
                }
            }
        }
    }

    events
}

fn handle_input(
    windows: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<&Projection, With<MainCamera>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut tracker: ResMut<PointerTracker>,
    mut ui_commands: MessageReader<InteractionCommand>,
    mut session: ResMut<InteractionSession>,
    mut markers: ResMut<SceneMarkers>,
    model: Res<ModelState>,
    mut raycaster: SceneRaycaster,
    mut sink: EffectSink,
) {
    let window = windows.single().ok();
    let events = collect_events(
        window,
        &mouse_button,
        &keyboard,
        &mut tracker,
        ui_commands.read().map(|c| c.0.clone()),
    );
    if events.is_empty() {
        return;
    }

    let fov = camera_query.single().map(camera_fov).unwrap_or(DEFAULT_FOV_Y);
    let aspect = window
        .filter(|w| w.height() > 0.0)
        .map_or(16.0 / 9.0, |w| w.width() / w.height());

    for event in events {
        let pose = sink.orbit.pose(fov, aspect);
        let geometry = if model.loaded {
            Some(&mut raycaster as &mut dyn RaycastProvider)
        } else {
            None
        };
        let mut ctx = InteractionContext {
            camera: &pose,
            markers: &mut markers.0,
            geometry,
        };
        let effects = session.0.handle(event, &mut ctx);
        sink.apply(effects);
    }
}

/// Replace markers with a freshly fetched equipment list
fn load_equipment(mut loads: MessageReader<EquipmentLoaded>, mut markers: ResMut<SceneMarkers>) {
    for loaded in loads.read() {
        tracing::info!(count = loaded.0.len(), "Loaded equipment markers");
        markers.0.load(loaded.0.iter().cloned());
    }
}

/// Feed persistence results back into the session
fn handle_persist_outcomes(
    mut outcomes: MessageReader<PersistOutcome>,
    mut session: ResMut<InteractionSession>,
    mut markers: ResMut<SceneMarkers>,
    mut sink: EffectSink,
) {
    for outcome in outcomes.read() {
        match outcome {
            PersistOutcome::Saved { request } => {
                session.0.persist_succeeded(*request);
            }
            PersistOutcome::Created { request, entity } => {
                session.0.persist_succeeded(*request);
                tracing::info!(equipment = %entity.id, name = %entity.name, "Equipment created");
                markers.0.upsert(entity.clone());
            }
            PersistOutcome::Failed { request, reason } => {
                let effects = session.0.persist_failed(*request, reason, &mut markers.0);
                sink.apply(effects);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypesPlugin;
    use plantview_core::{Entity as Equipment, EntityId, EquipmentStatus, MarkerSet, Notice};

    /// Messages to write at the start of the next frame
    #[derive(Resource, Default)]
    struct Outbox {
        commands: Vec<InteractionEvent>,
        outcomes: Vec<PersistOutcome>,
    }

    /// Messages the plugin wrote, gathered for assertions
    #[derive(Resource, Default)]
    struct Inbox {
        requests: Vec<PersistRequest>,
        notices: Vec<Notice>,
    }

    fn flush_outbox(
        mut outbox: ResMut<Outbox>,
        mut commands: MessageWriter<InteractionCommand>,
        mut outcomes: MessageWriter<PersistOutcome>,
    ) {
        for event in outbox.commands.drain(..) {
            commands.write(InteractionCommand(event));
        }
        for outcome in outbox.outcomes.drain(..) {
            outcomes.write(outcome);
        }
    }

    fn fill_inbox(
        mut inbox: ResMut<Inbox>,
        mut requests: MessageReader<PersistRequest>,
        mut notices: MessageReader<Notification>,
    ) {
        inbox.requests.extend(requests.read().cloned());
        inbox.notices.extend(notices.read().map(|n| n.0.clone()));
    }

    /// Headless app running the input systems in plugin order
    fn input_app(model_loaded: bool) -> App {
        let mut markers = MarkerSet::new();
        markers.load([Equipment {
            id: EntityId(1),
            name: "compressor".to_string(),
            position: Vec3::ZERO,
            status: EquipmentStatus::Operational,
            is_billboard: false,
        }]);

        let mut app = App::new();
        app.add_plugins(TypesPlugin)
            .init_resource::<Time>()
            .init_resource::<Assets<Mesh>>()
            .init_resource::<ButtonInput<MouseButton>>()
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<OrbitSettings>()
            .init_resource::<CameraFraming>()
            .init_resource::<PointerTracker>()
            .init_resource::<Outbox>()
            .init_resource::<Inbox>()
            .insert_resource(SceneMarkers(markers))
            .insert_resource(ModelState {
                loaded: model_loaded,
                ..default()
            })
            .add_systems(
                Update,
                (
                    flush_outbox,
                    load_equipment,
                    handle_persist_outcomes,
                    handle_input,
                    fill_inbox,
                )
                    .chain(),
            );
        app
    }

    fn send(app: &mut App, events: impl IntoIterator<Item = InteractionEvent>) {
        app.world_mut()
            .resource_mut::<Outbox>()
            .commands
            .extend(events);
        app.update();
    }

    fn drag_marker(app: &mut App) {
        send(
            app,
            [
                InteractionEvent::SetEditMode(true),
                InteractionEvent::PointerMove(Vec2::ZERO),
                InteractionEvent::PointerDown(PointerButton::Primary),
                InteractionEvent::PointerMove(Vec2::new(0.2, 0.0)),
                InteractionEvent::PointerUp(PointerButton::Primary),
            ],
        );
    }

    #[test]
    fn test_select_command_updates_selection_and_frames_camera() {
        let mut app = input_app(false);
        send(&mut app, [InteractionEvent::Select(EntityId(1))]);

        let world = app.world();
        assert_eq!(world.resource::<SelectedEquipment>().0, Some(EntityId(1)));
        assert!(world.resource::<CameraFraming>().0.is_animating());
        assert_eq!(world.resource::<InteractionSession>().0.selected(), Some(EntityId(1)));
    }

    #[test]
    fn test_unknown_selection_notifies() {
        let mut app = input_app(false);
        send(&mut app, [InteractionEvent::Select(EntityId(42))]);

        let world = app.world();
        assert_eq!(world.resource::<SelectedEquipment>().0, None);
        assert!(!world.resource::<CameraFraming>().0.is_animating());
        let notices = &world.resource::<Inbox>().notices;
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0].level, NoticeLevel::Warning));
    }

    #[test]
    fn test_drag_suspends_controls_until_release() {
        let mut app = input_app(true);
        send(
            &mut app,
            [
                InteractionEvent::SetEditMode(true),
                InteractionEvent::PointerMove(Vec2::ZERO),
                InteractionEvent::PointerDown(PointerButton::Primary),
            ],
        );
        assert!(!app.world().resource::<OrbitSettings>().enabled);
        assert_eq!(
            app.world().resource::<InteractionSession>().0.drag_target(),
            Some(EntityId(1))
        );

        send(&mut app, [InteractionEvent::PointerUp(PointerButton::Primary)]);
        assert!(app.world().resource::<OrbitSettings>().enabled);
        assert_eq!(app.world().resource::<InteractionSession>().0.drag_target(), None);
    }

    #[test]
    fn test_failed_position_write_restores_marker() {
        let mut app = input_app(true);
        drag_marker(&mut app);

        let request = {
            let world = app.world();
            let moved = world.resource::<SceneMarkers>().0.get(EntityId(1)).unwrap();
            assert_ne!(moved.entity.position, Vec3::ZERO);
            let requests = &world.resource::<Inbox>().requests;
            assert_eq!(requests.len(), 1);
            match requests[0] {
                PersistRequest::UpdatePosition { request, id, .. } => {
                    assert_eq!(id, EntityId(1));
                    request
                }
                ref other => panic!("unexpected request {other:?}"),
            }
        };

        app.world_mut()
            .resource_mut::<Outbox>()
            .outcomes
            .push(PersistOutcome::Failed {
                request,
                reason: "connection refused".to_string(),
            });
        app.update();

        let world = app.world();
        let marker = world.resource::<SceneMarkers>().0.get(EntityId(1)).unwrap();
        assert_eq!(marker.entity.position, Vec3::ZERO);
        assert_eq!(marker.visual_position, Vec3::ZERO);
        let notices = &world.resource::<Inbox>().notices;
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0].level, NoticeLevel::Error));
        assert!(notices[0].message.contains("connection refused"));
    }

    #[test]
    fn test_saved_position_write_keeps_marker() {
        let mut app = input_app(true);
        drag_marker(&mut app);

        let request = match app.world().resource::<Inbox>().requests[0] {
            PersistRequest::UpdatePosition { request, .. } => request,
            ref other => panic!("unexpected request {other:?}"),
        };
        app.world_mut()
            .resource_mut::<Outbox>()
            .outcomes
            .push(PersistOutcome::Saved { request });
        app.update();

        let world = app.world();
        let marker = world.resource::<SceneMarkers>().0.get(EntityId(1)).unwrap();
        assert_ne!(marker.entity.position, Vec3::ZERO);
        assert!(world.resource::<Inbox>().notices.is_empty());
    }

    #[test]
    fn test_loaded_equipment_replaces_markers() {
        let mut app = input_app(false);
        app.add_systems(Startup, |mut loads: MessageWriter<EquipmentLoaded>| {
            loads.write(EquipmentLoaded(vec![Equipment {
                id: EntityId(7),
                name: "boiler".to_string(),
                position: Vec3::new(1.0, 2.0, 3.0),
                status: EquipmentStatus::Warning,
                is_billboard: true,
            }]));
        });
        app.update();

        let markers = &app.world().resource::<SceneMarkers>().0;
        assert!(markers.get(EntityId(1)).is_none());
        assert_eq!(
            markers.get(EntityId(7)).unwrap().visual_position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_commands_and_escape_without_window() {
        let buttons = ButtonInput::<MouseButton>::default();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::Escape);
        let mut tracker = PointerTracker::default();

        let events = collect_events(
            None,
            &buttons,
            &keyboard,
            &mut tracker,
            [InteractionEvent::SetEditMode(true)].into_iter(),
        );
        assert_eq!(
            events,
            vec![InteractionEvent::SetEditMode(true), InteractionEvent::Cancel]
        );
    }

    #[test]
    fn test_press_without_window_emits_nothing() {
        let mut buttons = ButtonInput::<MouseButton>::default();
        buttons.press(MouseButton::Left);
        let keyboard = ButtonInput::<KeyCode>::default();
        let mut tracker = PointerTracker::default();

        let events = collect_events(None, &buttons, &keyboard, &mut tracker, std::iter::empty());
        assert!(events.is_empty());
        assert!(tracker.press_position.is_none());
    }
}
