//! Dead reckoning for remote player entities.
//!
//! Authoritative snapshots arrive at a lower rate than the render loop.
//! Each remote entity keeps a two-sample history of authoritative state;
//! every frame the blend extrapolates from both the on-screen estimate and
//! the latest authoritative sample, weighting toward the authoritative one
//! as frame time approaches the reference step, and snaps outright when
//! the predicted deviation is large enough to read as rubber-banding.

use std::time::Instant;

use glam::Vec2;

use square::registry::{Entity, Registry};
use square::{Position, Velocity};

/// Reference step the blend is tuned for: the broadcast interval (1/15 s).
pub const REFERENCE_STEP: f32 = 0.0666;

/// Predicted deviation at which interpolation gives way to a hard snap.
pub const SNAP_THRESHOLD: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct BlendConfig {
    pub reference_step: f32,
    pub snap_threshold: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            reference_step: REFERENCE_STEP,
            snap_threshold: SNAP_THRESHOLD,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DrError {
    /// Two samples with the same timestamp make the acceleration estimate
    /// a division by zero.
    #[error("zero time delta between state samples")]
    ZeroTimeDelta,
}

/// Two-sample history of authoritative state plus a derived acceleration
/// estimate. Written only on snapshot arrival; the per-frame blend reads
/// it and writes the render position elsewhere.
#[derive(Debug, Clone)]
pub struct DeadReckoning {
    pub previous_position: Vec2,
    pub position: Vec2,
    pub previous_velocity: Vec2,
    pub velocity: Vec2,
    pub previous_time: Instant,
    pub time: Instant,
    pub acceleration: Vec2,
}

impl DeadReckoning {
    /// Initial state for a just-created entity: both samples sit at the
    /// spawn position with zero velocity and acceleration.
    pub fn seeded(position: Vec2, now: Instant) -> Self {
        Self {
            previous_position: position,
            position,
            previous_velocity: Vec2::ZERO,
            velocity: Vec2::ZERO,
            previous_time: now,
            time: now,
            acceleration: Vec2::ZERO,
        }
    }

    /// Apply one authoritative sample: shift the current sample into the
    /// previous slot, store the new one, and re-derive acceleration.
    pub fn observe(&mut self, position: Vec2, velocity: Vec2, now: Instant) -> Result<(), DrError> {
        if now <= self.time {
            return Err(DrError::ZeroTimeDelta);
        }
        self.previous_position = self.position;
        self.previous_velocity = self.velocity;
        self.previous_time = self.time;
        self.position = position;
        self.velocity = velocity;
        self.time = now;

        let dt = self.time.duration_since(self.previous_time).as_secs_f32();
        self.acceleration = (self.velocity - self.previous_velocity) / dt;
        Ok(())
    }
}

/// One frame of the blend for a single entity. `rendered_position` and
/// `rendered_velocity` are what is currently on screen; the return value
/// is the corrected render position.
pub fn blend(
    dr: &DeadReckoning,
    rendered_position: Vec2,
    rendered_velocity: Vec2,
    delta_time: f32,
    config: &BlendConfig,
) -> Vec2 {
    let dt2 = delta_time * delta_time;
    let time_cap = (delta_time / config.reference_step).clamp(0.0, 1.0);

    let blended_vel = rendered_velocity.lerp(dr.velocity, time_cap);
    let pos_t0 = rendered_position + blended_vel * delta_time + 0.5 * dr.acceleration * dt2;
    let pos_t1 = dr.position + dr.velocity * delta_time + 0.5 * dr.acceleration * dt2;
    let mut predicted = pos_t0.lerp(pos_t1, time_cap);

    // Large corrections snap to the authoritative position instead of
    // interpolating through a visible jump.
    if (predicted.x - dr.position.x).abs() >= config.snap_threshold {
        predicted.x = dr.position.x;
    }
    if (predicted.y - dr.position.y).abs() >= config.snap_threshold {
        predicted.y = dr.position.y;
    }
    predicted
}

/// Run the blend for every entity carrying dead-reckoning state except the
/// local player, whose position is driven directly by input.
pub fn apply(registry: &mut Registry, local: Option<Entity>, delta_time: f32, config: &BlendConfig) {
    registry.join3_mut(
        |entity, dr: &mut DeadReckoning, position: &mut Position, velocity: &mut Velocity| {
            if Some(entity) == local {
                return;
            }
            position.0 = blend(dr, position.0, velocity.0, delta_time, config);
        },
    );
}
