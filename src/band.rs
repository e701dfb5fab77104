use bevy::color::palettes::css;
use bevy::math::cubic_splines::{CubicCardinalSpline, CubicGenerator};
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy_rapier3d::render::DebugRenderContext;

use crate::motion::{self, DragState, FlipState, FlipStep};

/// Update order inside a frame: pointer and keyboard first, then the card
/// controller, then the strap is drawn from the settled positions.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum BandSet {
    Input,
    Motion,
    Render,
}

#[derive(Resource, Clone)]
pub struct LanyardSettings {
    pub gravity: Vec3,
    pub min_speed: f32,
    pub max_speed: f32,
    pub flip_rate: f32,
    pub anchor: Vec3,
    pub joint_spacing: f32,
    pub rope_length: f32,
    pub joint_radius: f32,
    pub card_half_extents: Vec3,
    pub card_hang_anchor: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub camera_position: Vec3,
    pub fov_degrees: f32,
    pub band_color: Color,
    pub band_width: f32,
    pub band_resolution: usize,
    pub show_help: bool,
    pub show_diagnostics: bool,
    pub debug_render: bool,
}

impl Default for LanyardSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -40.0, 0.0),
            min_speed: 0.0,
            max_speed: 40.0,
            flip_rate: 5.0,
            anchor: Vec3::new(0.0, 3.0, 0.0),
            joint_spacing: 0.5,
            rope_length: 1.2,
            joint_radius: 0.1,
            card_half_extents: Vec3::new(0.8, 1.125, 0.01),
            card_hang_anchor: Vec3::new(0.0, 1.45, 0.0),
            linear_damping: 4.0,
            angular_damping: 3.0,
            camera_position: Vec3::new(0.0, 0.0, 70.0),
            fov_degrees: 9.0,
            band_color: Color::WHITE,
            band_width: 6.0,
            band_resolution: 32,
            show_help: true,
            show_diagnostics: false,
            debug_render: false,
        }
    }
}

/// Asks the card to turn over. Dropped while a flip runs or the card is held.
#[derive(Event, Default)]
pub struct FlipCard;

#[derive(Event, Default)]
pub struct ResetBand;

/// Pointer ray for the current frame, refreshed by the input plugin.
#[derive(Resource, Default)]
pub struct PointerRay {
    pub ray: Option<Ray3d>,
    pub camera_distance: f32,
}

/// Every body in the chain, anchor and card included.
#[derive(Component)]
pub struct ChainLink;

#[derive(Component)]
pub struct Anchor;

/// Intermediate rope body, numbered from the anchor down.
#[derive(Component)]
pub struct Joint(pub usize);

/// Trailing copy of a joint position used when drawing the strap.
#[derive(Component, Default)]
pub struct SmoothedJoint {
    pub lerped: Option<Vec3>,
}

#[derive(Component)]
pub struct Card;

const JOINT_COUNT: usize = 3;
const SMOOTHED_JOINTS: usize = 2;

pub struct BandPlugin;
impl Plugin for BandPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LanyardSettings>()
            .init_resource::<DragState>()
            .init_resource::<FlipState>()
            .init_resource::<PointerRay>()
            .add_event::<FlipCard>()
            .add_event::<ResetBand>()
            .configure_sets(
                Update,
                (BandSet::Input, BandSet::Motion, BandSet::Render).chain(),
            )
            .add_systems(Startup, (spawn_band, configure_band_gizmos))
            .add_systems(
                Update,
                (sync_gravity, sync_debug_render, handle_reset).in_set(BandSet::Input),
            )
            .add_systems(
                Update,
                (
                    sync_card_mode,
                    follow_pointer,
                    smooth_joints,
                    handle_flip_requests,
                    animate_flip,
                )
                    .chain()
                    .in_set(BandSet::Motion),
            )
            .add_systems(Update, draw_band.in_set(BandSet::Render));
    }
}

fn spawn_band_inner(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    settings: &LanyardSettings,
) {
    let damping = Damping {
        linear_damping: settings.linear_damping,
        angular_damping: settings.angular_damping,
    };
    let yaw_only = LockedAxes::ROTATION_LOCKED_X | LockedAxes::ROTATION_LOCKED_Z;
    let below_anchor = |i: usize| settings.anchor - Vec3::Y * settings.joint_spacing * i as f32;

    let mut parent = commands
        .spawn((
            RigidBody::Fixed,
            TransformBundle::from_transform(Transform::from_translation(settings.anchor)),
            Sleeping::default(),
            Anchor,
            ChainLink,
        ))
        .id();

    for i in 1..=JOINT_COUNT {
        let rope = RopeJointBuilder::new(settings.rope_length)
            .local_anchor1(Vec3::ZERO)
            .local_anchor2(Vec3::ZERO);
        let mut joint = commands.spawn((
            RigidBody::Dynamic,
            Collider::ball(settings.joint_radius),
            damping,
            yaw_only,
            Sleeping::default(),
            TransformBundle::from_transform(Transform::from_translation(below_anchor(i))),
            ImpulseJoint::new(parent, rope),
            Joint(i),
            ChainLink,
        ));
        if i <= SMOOTHED_JOINTS {
            joint.insert(SmoothedJoint::default());
        }
        parent = joint.id();
    }

    let he = settings.card_half_extents;
    let socket = SphericalJointBuilder::new()
        .local_anchor1(Vec3::ZERO)
        .local_anchor2(settings.card_hang_anchor);

    let slab = meshes.add(Cuboid::new(he.x * 2.0, he.y * 2.0, he.z * 2.0));
    let face = meshes.add(Rectangle::new(he.x * 1.9, he.y * 1.9));
    let clip = meshes.add(Cuboid::new(0.3, 0.35, 0.06));
    let slab_mat = materials.add(StandardMaterial {
        base_color: Color::srgb(0.08, 0.08, 0.1),
        metallic: 0.8,
        perceptual_roughness: 0.9,
        clearcoat: 1.0,
        clearcoat_perceptual_roughness: 0.15,
        ..default()
    });
    let front_mat = materials.add(StandardMaterial {
        base_color: Color::srgb(0.55, 0.45, 0.95),
        perceptual_roughness: 0.6,
        clearcoat: 1.0,
        clearcoat_perceptual_roughness: 0.15,
        ..default()
    });
    let back_mat = materials.add(StandardMaterial {
        base_color: Color::srgb(0.95, 0.75, 0.35),
        perceptual_roughness: 0.6,
        clearcoat: 1.0,
        clearcoat_perceptual_roughness: 0.15,
        ..default()
    });
    let metal = materials.add(StandardMaterial {
        base_color: Color::from(css::SILVER),
        metallic: 1.0,
        perceptual_roughness: 0.3,
        ..default()
    });

    let card_pos = below_anchor(JOINT_COUNT + 1);
    commands
        .spawn((
            RigidBody::Dynamic,
            Collider::cuboid(he.x, he.y, he.z),
            damping,
            yaw_only,
            Velocity::zero(),
            Sleeping::default(),
            ImpulseJoint::new(parent, socket),
            PbrBundle {
                mesh: slab,
                material: slab_mat,
                transform: Transform::from_translation(card_pos),
                ..default()
            },
            Card,
            ChainLink,
        ))
        .with_children(|card| {
            card.spawn(PbrBundle {
                mesh: face.clone(),
                material: front_mat,
                transform: Transform::from_xyz(0.0, 0.0, he.z + 0.001),
                ..default()
            });
            card.spawn(PbrBundle {
                mesh: face,
                material: back_mat,
                transform: Transform::from_xyz(0.0, 0.0, -he.z - 0.001)
                    .with_rotation(Quat::from_rotation_y(std::f32::consts::PI)),
                ..default()
            });
            card.spawn(PbrBundle {
                mesh: clip,
                material: metal,
                transform: Transform::from_xyz(0.0, he.y + 0.1, 0.0),
                ..default()
            });
        });

    info!(
        "lanyard spawned: {} joints, rope {:.2}, card at {:?}",
        JOINT_COUNT, settings.rope_length, card_pos
    );
}

pub fn spawn_band(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<LanyardSettings>,
) {
    spawn_band_inner(&mut commands, &mut meshes, &mut materials, &settings);
}

fn configure_band_gizmos(
    mut config_store: ResMut<GizmoConfigStore>,
    settings: Res<LanyardSettings>,
) {
    let (config, _) = config_store.config_mut::<DefaultGizmoConfigGroup>();
    config.line_width = settings.band_width;
}

fn sync_gravity(
    settings: Res<LanyardSettings>,
    config: Option<ResMut<RapierConfiguration>>,
) {
    let Some(mut config) = config else {
        return;
    };
    if settings.is_changed() && config.gravity != settings.gravity {
        config.gravity = settings.gravity;
        debug!("gravity set to {:?}", settings.gravity);
    }
}

fn sync_debug_render(
    settings: Res<LanyardSettings>,
    ctx: Option<ResMut<DebugRenderContext>>,
) {
    let Some(mut ctx) = ctx else {
        return;
    };
    if settings.is_changed() && ctx.enabled != settings.debug_render {
        ctx.enabled = settings.debug_render;
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_reset(
    mut commands: Commands,
    mut ev_reset: EventReader<ResetBand>,
    chain: Query<Entity, With<ChainLink>>,
    mut drag: ResMut<DragState>,
    mut flip: ResMut<FlipState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<LanyardSettings>,
) {
    if ev_reset.read().last().is_none() {
        return;
    }
    for e in &chain {
        commands.entity(e).despawn_recursive();
    }
    *drag = DragState::NotDragging;
    *flip = FlipState::default();
    spawn_band_inner(&mut commands, &mut meshes, &mut materials, &settings);
    info!("lanyard reset");
}

/// Held cards follow the pointer as kinematic bodies; released ones go back
/// to the simulation.
fn sync_card_mode(drag: Res<DragState>, mut card: Query<&mut RigidBody, With<Card>>) {
    let Ok(mut body) = card.get_single_mut() else {
        return;
    };
    let wanted = if drag.is_dragging() {
        RigidBody::KinematicPositionBased
    } else {
        RigidBody::Dynamic
    };
    if *body != wanted {
        *body = wanted;
    }
}

fn follow_pointer(
    drag: Res<DragState>,
    pointer: Res<PointerRay>,
    mut chain: Query<&mut Sleeping, With<ChainLink>>,
    mut card: Query<&mut Transform, With<Card>>,
) {
    let Some(ray) = pointer.ray else {
        return;
    };
    let Some(target) = drag.target(ray.origin, *ray.direction, pointer.camera_distance) else {
        return;
    };
    let Ok(mut transform) = card.get_single_mut() else {
        return;
    };
    for mut sleeping in &mut chain {
        sleeping.sleeping = false;
    }
    transform.translation = target;
}

fn smooth_joints(
    time: Res<Time>,
    settings: Res<LanyardSettings>,
    anchor: Query<(), With<Anchor>>,
    card: Query<(), With<Card>>,
    mut joints: Query<(&Transform, &mut SmoothedJoint)>,
) {
    if anchor.is_empty() || card.is_empty() {
        return;
    }
    let dt = time.delta_seconds();
    for (transform, mut smoothed) in &mut joints {
        motion::smooth_toward(
            &mut smoothed.lerped,
            transform.translation,
            dt,
            settings.min_speed,
            settings.max_speed,
        );
    }
}

fn handle_flip_requests(
    mut ev_flip: EventReader<FlipCard>,
    drag: Res<DragState>,
    mut flip: ResMut<FlipState>,
    card: Query<&Transform, With<Card>>,
) {
    for _ in ev_flip.read() {
        let Ok(transform) = card.get_single() else {
            continue;
        };
        if flip.request(drag.is_dragging(), motion::yaw_of(transform.rotation)) {
            debug!(
                "flip started from yaw {:.3}, showing {}",
                flip.start_angle,
                flip.side_label()
            );
        } else {
            debug!("flip ignored (flipping: {}, dragging: {})", flip.flipping, drag.is_dragging());
        }
    }
}

/// While a flip runs the yaw is written directly, bypassing torque. Otherwise
/// angular velocity is cleared every frame so the ropes cannot spin the card.
fn animate_flip(
    time: Res<Time>,
    settings: Res<LanyardSettings>,
    mut flip: ResMut<FlipState>,
    mut card: Query<(&mut Transform, &mut Velocity), With<Card>>,
) {
    let Ok((mut transform, mut velocity)) = card.get_single_mut() else {
        return;
    };
    match flip.advance(time.delta_seconds(), settings.flip_rate) {
        FlipStep::Idle => velocity.angvel = Vec3::ZERO,
        FlipStep::Turning(yaw) => transform.rotation = Quat::from_rotation_y(yaw),
        FlipStep::Settled(yaw) => {
            velocity.angvel = Vec3::ZERO;
            transform.rotation = Quat::from_rotation_y(yaw);
            debug!("flip settled at yaw {:.3}", yaw);
        }
    }
}

fn draw_band(
    mut gizmos: Gizmos,
    settings: Res<LanyardSettings>,
    anchor: Query<&Transform, With<Anchor>>,
    joints: Query<(&Joint, &Transform, Option<&SmoothedJoint>)>,
) {
    let Ok(anchor) = anchor.get_single() else {
        return;
    };
    let mut links: Vec<(usize, Vec3)> = joints
        .iter()
        .map(|(joint, t, smoothed)| {
            let p = smoothed.and_then(|s| s.lerped).unwrap_or(t.translation);
            (joint.0, p)
        })
        .collect();
    if links.is_empty() {
        return;
    }
    links.sort_by_key(|(i, _)| *i);

    // endpoints are repeated so the spline runs through every control point
    let mut points = vec![anchor.translation, anchor.translation];
    points.extend(links.iter().map(|(_, p)| *p));
    if let Some(&(_, last)) = links.last() {
        points.push(last);
    }

    let curve = CubicCardinalSpline::new_catmull_rom(points).to_curve();
    gizmos.linestrip(
        curve.iter_positions(settings.band_resolution),
        settings.band_color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::time::TimeUpdateStrategy;
    use std::f32::consts::PI;
    use std::time::Duration;

    fn motion_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(100)))
            .init_resource::<LanyardSettings>()
            .init_resource::<DragState>()
            .init_resource::<FlipState>()
            .init_resource::<PointerRay>()
            .add_event::<FlipCard>()
            .add_systems(
                Update,
                (
                    sync_card_mode,
                    follow_pointer,
                    smooth_joints,
                    handle_flip_requests,
                    animate_flip,
                )
                    .chain(),
            );
        app
    }

    fn spawn_card(app: &mut App) -> Entity {
        app.world_mut()
            .spawn((
                Card,
                ChainLink,
                RigidBody::Dynamic,
                Velocity::zero(),
                Sleeping::default(),
                Transform::from_xyz(0.0, 1.0, 0.0),
            ))
            .id()
    }

    #[test]
    fn flip_event_turns_card_half_way_round_and_settles() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);

        app.world_mut().send_event(FlipCard);
        for _ in 0..5 {
            app.update();
        }

        let flip = *app.world().resource::<FlipState>();
        assert!(!flip.flipping);
        assert!(!flip.front_side);
        assert_eq!(flip.progress, 1.0);

        let t = app.world().get::<Transform>(card).unwrap();
        assert_eq!(t.rotation, Quat::from_rotation_y(flip.start_angle + PI));
        let v = app.world().get::<Velocity>(card).unwrap();
        assert_eq!(v.angvel, Vec3::ZERO);
    }

    #[test]
    fn repeated_flip_events_start_a_single_flip() {
        let mut app = motion_app();
        spawn_card(&mut app);

        app.world_mut().send_event(FlipCard);
        app.world_mut().send_event(FlipCard);
        app.update();

        let flip = *app.world().resource::<FlipState>();
        assert!(flip.flipping);
        assert!(!flip.front_side);
    }

    #[test]
    fn flip_while_dragging_is_ignored() {
        let mut app = motion_app();
        spawn_card(&mut app);
        app.insert_resource(DragState::Dragging { offset: Vec3::ZERO });

        app.world_mut().send_event(FlipCard);
        app.update();

        assert_eq!(*app.world().resource::<FlipState>(), FlipState::default());
    }

    #[test]
    fn idle_card_has_spin_cleared_each_frame() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);
        app.world_mut().get_mut::<Velocity>(card).unwrap().angvel = Vec3::new(0.0, 3.0, 0.0);

        app.update();

        assert_eq!(app.world().get::<Velocity>(card).unwrap().angvel, Vec3::ZERO);
    }

    #[test]
    fn drag_switches_card_to_kinematic_and_back() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);

        app.insert_resource(DragState::begin(Vec3::new(0.2, 1.5, 0.0), Vec3::new(0.0, 1.0, 0.0)));
        app.update();
        assert_eq!(
            *app.world().get::<RigidBody>(card).unwrap(),
            RigidBody::KinematicPositionBased
        );

        app.insert_resource(DragState::NotDragging);
        app.update();
        assert_eq!(*app.world().get::<RigidBody>(card).unwrap(), RigidBody::Dynamic);
    }

    #[test]
    fn drag_begin_then_end_before_a_frame_leaves_card_dynamic() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);

        let mut drag = DragState::begin(Vec3::ONE, Vec3::ZERO);
        assert!(drag.is_dragging());
        drag = DragState::NotDragging;
        app.insert_resource(drag);
        app.update();

        assert_eq!(*app.world().get::<RigidBody>(card).unwrap(), RigidBody::Dynamic);
        assert!(!app.world().resource::<DragState>().is_dragging());
    }

    #[test]
    fn dragged_card_follows_pointer_minus_offset_and_wakes_chain() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);
        let joint = app
            .world_mut()
            .spawn((ChainLink, Sleeping { sleeping: true, ..default() }))
            .id();

        let offset = Vec3::new(0.1, 0.0, 0.0);
        app.insert_resource(DragState::Dragging { offset });
        app.insert_resource(PointerRay {
            ray: Some(Ray3d {
                origin: Vec3::new(0.0, 0.0, 70.0),
                direction: Dir3::NEG_Z,
            }),
            camera_distance: 70.0,
        });
        app.update();

        let t = app.world().get::<Transform>(card).unwrap();
        assert_eq!(t.translation, Vec3::ZERO - offset);
        assert!(!app.world().get::<Sleeping>(joint).unwrap().sleeping);
    }

    #[test]
    fn released_card_is_left_to_physics() {
        let mut app = motion_app();
        let card = spawn_card(&mut app);
        app.insert_resource(PointerRay {
            ray: Some(Ray3d {
                origin: Vec3::new(0.0, 0.0, 70.0),
                direction: Dir3::NEG_Z,
            }),
            camera_distance: 70.0,
        });
        app.update();

        let t = app.world().get::<Transform>(card).unwrap();
        assert_eq!(t.translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn joints_are_smoothed_only_once_chain_is_ready() {
        let mut app = motion_app();
        let joint = app
            .world_mut()
            .spawn((Transform::from_xyz(0.0, 2.5, 0.0), SmoothedJoint::default()))
            .id();

        app.update();
        assert_eq!(app.world().get::<SmoothedJoint>(joint).unwrap().lerped, None);

        app.world_mut().spawn(Anchor);
        spawn_card(&mut app);
        app.update();
        assert_eq!(
            app.world().get::<SmoothedJoint>(joint).unwrap().lerped,
            Some(Vec3::new(0.0, 2.5, 0.0))
        );

        app.world_mut().get_mut::<Transform>(joint).unwrap().translation = Vec3::new(0.0, 2.0, 0.0);
        app.update();
        let lerped = app.world().get::<SmoothedJoint>(joint).unwrap().lerped.unwrap();
        assert!(lerped.y < 2.5 && lerped.y >= 2.0);
    }

    #[test]
    fn reset_respawns_chain_and_clears_state() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .init_resource::<LanyardSettings>()
            .init_resource::<DragState>()
            .init_resource::<FlipState>()
            .add_event::<ResetBand>()
            .add_systems(Startup, spawn_band)
            .add_systems(Update, handle_reset);
        app.update();

        let mut links = app.world_mut().query_filtered::<Entity, With<ChainLink>>();
        let before: Vec<Entity> = links.iter(app.world()).collect();
        assert_eq!(before.len(), JOINT_COUNT + 2);

        let mut smoothed = app.world_mut().query::<&SmoothedJoint>();
        assert_eq!(smoothed.iter(app.world()).count(), SMOOTHED_JOINTS);

        app.insert_resource(DragState::Dragging { offset: Vec3::X });
        app.world_mut().resource_mut::<FlipState>().flipping = true;
        app.world_mut().send_event(ResetBand);
        app.update();

        let after: Vec<Entity> = links.iter(app.world()).collect();
        assert_eq!(after.len(), JOINT_COUNT + 2);
        assert!(after.iter().all(|e| !before.contains(e)));
        assert_eq!(*app.world().resource::<DragState>(), DragState::NotDragging);
        assert_eq!(*app.world().resource::<FlipState>(), FlipState::default());
    }
}
