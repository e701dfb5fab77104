use bevy::diagnostic::{DiagnosticsStore, EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};

use crate::band::{BandSet, FlipCard, LanyardSettings, ResetBand};
use crate::motion::{DragState, FlipState};

pub struct UiPlugin;
impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin)
            .init_resource::<UiFocus>()
            .add_systems(Update, ui_system.before(BandSet::Input));
    }
}

/// Set while egui owns the pointer so clicks on a panel never grab the card.
#[derive(Resource, Default)]
pub struct UiFocus {
    pub pointer_captured: bool,
}

#[allow(clippy::too_many_arguments)]
fn ui_system(
    mut contexts: EguiContexts,
    mut settings: ResMut<LanyardSettings>,
    flip: Res<FlipState>,
    drag: Res<DragState>,
    diagnostics: Res<DiagnosticsStore>,
    mut ev_flip: EventWriter<FlipCard>,
    mut ev_reset: EventWriter<ResetBand>,
    mut focus: ResMut<UiFocus>,
) {
    let ctx = contexts.ctx_mut();

    egui::Window::new("Lanyard").show(ctx, |ui| {
        ui.label(format!("Showing: {}", flip.side_label()));
        let status = if flip.flipping {
            format!("Flipping ({:.0}%)", flip.progress * 100.0)
        } else if drag.is_dragging() {
            "Dragging".to_string()
        } else {
            "Hanging".to_string()
        };
        ui.label(status);

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!flip.flipping && !drag.is_dragging(), egui::Button::new("Flip"))
                .clicked()
            {
                ev_flip.send(FlipCard);
            }
            if ui.button("Reset").clicked() {
                ev_reset.send(ResetBand);
            }
        });

        ui.separator();

        ui.add(egui::Slider::new(&mut settings.max_speed, 0.0..=100.0).text("Max lerp speed"));
        let max = settings.max_speed;
        ui.add(egui::Slider::new(&mut settings.min_speed, 0.0..=max).text("Min lerp speed"));
        ui.add(egui::Slider::new(&mut settings.flip_rate, 1.0..=20.0).text("Flip rate"));
        ui.add(egui::Slider::new(&mut settings.gravity.y, -100.0..=0.0).text("Gravity"));

        ui.separator();

        ui.checkbox(&mut settings.debug_render, "Physics debug");
        ui.checkbox(&mut settings.show_diagnostics, "Diagnostics");
        ui.checkbox(&mut settings.show_help, "Help");
    });

    if settings.show_help {
        egui::Window::new("Help").show(ctx, |ui| {
            ui.label("Left Mouse: Grab and drag the card");
            ui.label("Space: Flip card");
            ui.label("R: Reset lanyard");
            ui.label("F3: Toggle physics debug");
            ui.label("H: Toggle Help");
        });
    }

    if settings.show_diagnostics {
        egui::Window::new("Diagnostics").show(ctx, |ui| {
            if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
                if let Some(value) = fps.smoothed() {
                    ui.label(format!("FPS: {:.1}", value));
                }
            }
            if let Some(entity_count) = diagnostics.get(&EntityCountDiagnosticsPlugin::ENTITY_COUNT)
            {
                if let Some(value) = entity_count.value() {
                    ui.label(format!("Entities: {}", value));
                }
            }
        });
    }

    focus.pointer_captured = ctx.is_pointer_over_area() || ctx.wants_pointer_input();
}
