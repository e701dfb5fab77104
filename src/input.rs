use crate::band::{BandSet, Card, FlipCard, LanyardSettings, PointerRay, ResetBand};
use crate::motion::DragState;
use crate::ui::UiFocus;
use crate::MainCamera;
use bevy::input::mouse::MouseButtonInput;
use bevy::input::ButtonState;
use bevy::prelude::*;
use bevy::window::{CursorIcon, PrimaryWindow};
use bevy_rapier3d::prelude::*;

pub struct InputPlugin;
impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HoverState>()
            .init_resource::<CursorLease>()
            .add_systems(
                Update,
                (
                    update_pointer_ray,
                    pick_card,
                    grab_card,
                    update_cursor,
                )
                    .chain()
                    .in_set(BandSet::Input),
            )
            .add_systems(
                Update,
                (flip_trigger, reset_trigger, help_toggle, debug_render_toggle)
                    .in_set(BandSet::Input),
            );
    }
}

/// Whether the pointer ray currently lands on the card, and where.
#[derive(Resource, Default)]
pub struct HoverState {
    pub hovered: bool,
    pub hit_point: Option<Vec3>,
}

/// Cursor icon this plugin has put on the window. `None` means the window
/// cursor belongs to someone else and must be left alone.
#[derive(Resource, Default)]
pub struct CursorLease {
    held: Option<CursorIcon>,
}

pub fn cursor_for(hovered: bool, dragging: bool) -> Option<CursorIcon> {
    match (hovered, dragging) {
        (false, _) => None,
        (true, true) => Some(CursorIcon::Grabbing),
        (true, false) => Some(CursorIcon::Grab),
    }
}

fn update_pointer_ray(
    windows: Query<&Window, With<PrimaryWindow>>,
    q_cam: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut pointer: ResMut<PointerRay>,
) {
    pointer.ray = None;
    let Ok(win) = windows.get_single() else {
        return;
    };
    let Ok((cam, cam_transform)) = q_cam.get_single() else {
        return;
    };
    pointer.camera_distance = cam_transform.translation().length();
    let Some(cursor) = win.cursor_position() else {
        return;
    };
    pointer.ray = cam.viewport_to_world(cam_transform, cursor);
}

fn card_hit(pointer: &PointerRay, rapier: Option<&RapierContext>, card: Entity) -> Option<Vec3> {
    let ray = pointer.ray?;
    let rapier = rapier?;
    let only_card = |e: Entity| e == card;
    let filter = QueryFilter::default().predicate(&only_card);
    let (_, toi) = rapier.cast_ray(ray.origin, *ray.direction, f32::MAX, true, filter)?;
    Some(ray.get_point(toi))
}

fn pick_card(
    pointer: Res<PointerRay>,
    rapier: Option<Res<RapierContext>>,
    card: Query<Entity, With<Card>>,
    mut hover: ResMut<HoverState>,
) {
    let hit = match card.get_single() {
        Ok(card) => card_hit(&pointer, rapier.as_deref(), card),
        Err(_) => None,
    };
    if hover.hovered != hit.is_some() {
        debug!("card hover: {}", hit.is_some());
    }
    hover.hovered = hit.is_some();
    hover.hit_point = hit;
}

fn grab_card(
    mut mousebtn_evr: EventReader<MouseButtonInput>,
    hover: Res<HoverState>,
    ui_focus: Option<Res<UiFocus>>,
    card: Query<&Transform, With<Card>>,
    mut drag: ResMut<DragState>,
) {
    let ui_has_pointer = ui_focus.map_or(false, |f| f.pointer_captured);
    for ev in mousebtn_evr.read() {
        if ev.button != MouseButton::Left {
            continue;
        }
        match ev.state {
            ButtonState::Pressed => {
                if ui_has_pointer || drag.is_dragging() {
                    continue;
                }
                let Some(hit) = hover.hit_point else {
                    continue;
                };
                let Ok(transform) = card.get_single() else {
                    continue;
                };
                *drag = DragState::begin(hit, transform.translation);
                debug!("drag begin, offset {:?}", drag.offset());
            }
            ButtonState::Released => {
                if drag.is_dragging() {
                    *drag = DragState::NotDragging;
                    debug!("drag end");
                }
            }
        }
    }
}

/// Puts the grab cursor up while the card is under the pointer and takes it
/// down on hover-exit, including when the card itself goes away.
fn update_cursor(
    hover: Res<HoverState>,
    drag: Res<DragState>,
    card: Query<(), With<Card>>,
    mut lease: ResMut<CursorLease>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
) {
    let wanted = if card.is_empty() {
        None
    } else {
        cursor_for(hover.hovered, drag.is_dragging())
    };
    if wanted == lease.held {
        return;
    }
    let Ok(mut win) = windows.get_single_mut() else {
        return;
    };
    win.cursor.icon = wanted.unwrap_or_default();
    lease.held = wanted;
}

fn flip_trigger(mut ev_flip: EventWriter<FlipCard>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::Space) {
        ev_flip.send(FlipCard);
    }
}

fn reset_trigger(mut ev_reset: EventWriter<ResetBand>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyR) {
        ev_reset.send(ResetBand);
    }
}

fn help_toggle(mut settings: ResMut<LanyardSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyH) {
        settings.show_help = !settings.show_help;
    }
}

fn debug_render_toggle(mut settings: ResMut<LanyardSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::F3) {
        settings.debug_render = !settings.debug_render;
    }
}
