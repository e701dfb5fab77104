mod band;
mod input;
mod motion;
mod ui;

use band::{BandPlugin, LanyardSettings};
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::diagnostic::{EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin};
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::render::RapierDebugRenderPlugin;
use input::InputPlugin;
use ui::UiPlugin;

fn main() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.04)))
        .insert_resource(Msaa::Sample4)
        .insert_resource(AmbientLight {
            color: Color::WHITE,
            brightness: 400.0,
        })
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(EntityCountDiagnosticsPlugin)
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "lanyard-rs".into(),
                        resolution: (600., 500.).into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(LogPlugin {
                    filter: "wgpu=error,naga=warn,bevy_render=warn,lanyard_rs=debug".into(),
                    ..default()
                }),
        )
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(RapierDebugRenderPlugin {
            enabled: false,
            ..default()
        })
        .add_plugins((BandPlugin, UiPlugin, InputPlugin))
        .add_systems(Startup, (setup_camera, setup_lighting))
        .run();
}

fn setup_camera(mut commands: Commands, settings: Res<LanyardSettings>) {
    commands.spawn((
        Camera3dBundle {
            camera: Camera {
                hdr: true,
                ..default()
            },
            tonemapping: Tonemapping::TonyMcMapface,
            projection: PerspectiveProjection {
                fov: settings.fov_degrees.to_radians(),
                ..default()
            }
            .into(),
            transform: Transform::from_translation(settings.camera_position)
                .looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        },
        MainCamera,
    ));
}

// Three studio-style key lights around the card.
fn setup_lighting(mut commands: Commands) {
    let strips = [
        (Vec3::new(0.0, -1.0, 5.0), 2000.0),
        (Vec3::new(-1.0, -1.0, 1.0), 3000.0),
        (Vec3::new(1.0, 1.0, 1.0), 3000.0),
    ];
    for (position, illuminance) in strips {
        commands.spawn(DirectionalLightBundle {
            directional_light: DirectionalLight {
                illuminance,
                ..default()
            },
            transform: Transform::from_translation(position).looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        });
    }
}

#[derive(Component)]
pub struct MainCamera;
