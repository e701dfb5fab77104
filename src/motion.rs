//! Frame-rate independent motion rules for the lanyard card.
//!
//! Everything here is plain data plus math so the ECS systems in `band`
//! stay thin: they read the physics bodies, feed them through these helpers
//! and write the result back.

use bevy::prelude::*;
use std::f32::consts::PI;

/// Grab state of the card. The offset is the grab point relative to the
/// card origin, captured once at pointer-down.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub enum DragState {
    #[default]
    NotDragging,
    Dragging {
        offset: Vec3,
    },
}

impl DragState {
    pub fn begin(hit_point: Vec3, card_position: Vec3) -> Self {
        DragState::Dragging {
            offset: hit_point - card_position,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    pub fn offset(&self) -> Option<Vec3> {
        match *self {
            DragState::Dragging { offset } => Some(offset),
            DragState::NotDragging => None,
        }
    }

    /// Kinematic target for the card, or `None` when nothing is held.
    pub fn target(&self, ray_origin: Vec3, ray_dir: Vec3, camera_distance: f32) -> Option<Vec3> {
        self.offset()
            .map(|offset| drag_target(ray_origin, ray_dir, camera_distance, offset))
    }
}

/// Walks `camera_distance` along the pointer ray and removes the grab offset
/// so the card keeps the same spot under the cursor.
pub fn drag_target(ray_origin: Vec3, ray_dir: Vec3, camera_distance: f32, offset: Vec3) -> Vec3 {
    let point = ray_origin + ray_dir.normalize_or_zero() * camera_distance;
    point - offset
}

/// Lerp speed for a joint that trails `distance` behind its body.
///
/// The distance is clamped to `[0.1, 1]` so slow drifts still catch up at a
/// minimum pace and large jumps never exceed `max_speed`.
pub fn smoothing_rate(distance: f32, min_speed: f32, max_speed: f32) -> f32 {
    min_speed + distance.clamp(0.1, 1.0) * (max_speed - min_speed)
}

/// Advances a cached position toward `target`. An empty cache is seeded from
/// the target, so the first frame never lags.
pub fn smooth_toward(
    cached: &mut Option<Vec3>,
    target: Vec3,
    dt: f32,
    min_speed: f32,
    max_speed: f32,
) -> Vec3 {
    let current = *cached.get_or_insert(target);
    let rate = smoothing_rate(current.distance(target), min_speed, max_speed);
    // a long frame would overshoot past the target with t > 1
    let t = (dt * rate).clamp(0.0, 1.0);
    let next = current.lerp(target, t);
    *cached = Some(next);
    next
}

/// Yaw of a rotation about the world Y axis.
pub fn yaw_of(rotation: Quat) -> f32 {
    rotation.to_euler(EulerRot::YXZ).0
}

/// What the card rotation should do this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlipStep {
    /// No flip running; physics owns the rotation.
    Idle,
    /// Mid-flip; force the yaw to this angle.
    Turning(f32),
    /// The flip just finished; snap to this yaw and kill the spin.
    Settled(f32),
}

#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct FlipState {
    pub flipping: bool,
    pub front_side: bool,
    pub start_angle: f32,
    pub progress: f32,
}

impl Default for FlipState {
    fn default() -> Self {
        Self {
            flipping: false,
            front_side: true,
            start_angle: 0.0,
            progress: 0.0,
        }
    }
}

impl FlipState {
    /// Starts a half turn from `current_yaw`. Requests made while a flip is
    /// running or while the card is held are dropped, not queued.
    pub fn request(&mut self, dragging: bool, current_yaw: f32) -> bool {
        if self.flipping || dragging {
            return false;
        }
        self.flipping = true;
        self.front_side = !self.front_side;
        self.start_angle = current_yaw;
        self.progress = 0.0;
        true
    }

    pub fn advance(&mut self, dt: f32, rate: f32) -> FlipStep {
        if !self.flipping {
            return FlipStep::Idle;
        }
        self.progress = (self.progress + dt.max(0.0) * rate).min(1.0);
        if self.progress >= 1.0 {
            self.flipping = false;
            FlipStep::Settled(self.end_angle())
        } else {
            FlipStep::Turning(self.start_angle + PI * self.progress)
        }
    }

    pub fn end_angle(&self) -> f32 {
        self.start_angle + PI
    }

    pub fn side_label(&self) -> &'static str {
        if self.front_side {
            "Front"
        } else {
            "Back"
        }
    }
}
