//! Deterministic simulation step and event application.
//!
//! This module is the only place physics constants live. Client and server
//! link the same constants and the same `f32` arithmetic, which is what makes
//! replay-based reconciliation converge: replaying the same events over the
//! same starting state is bit-identical on both ends.

use crate::sim::event::GameEvent;
use crate::sim::state::{PlayerId, PlayerState, WorldState};
use crate::util::time::tick_delta;

/// Downward acceleration, units per second
pub const GRAVITY: f32 = 40.0;
/// Floor height; `y` grows downward, entities rest at this value
pub const FLOOR_LEVEL: f32 = 500.0;
/// Horizontal acceleration per held direction, units per second
pub const HORIZONTAL_SPEED: f32 = 60.0;
/// Instant upward velocity applied on jump
pub const JUMP_IMPULSE: f32 = 30.0;
/// Per-tick velocity damping factor
pub const VELOCITY_DAMPING: f32 = 0.9;
/// Tolerance below the floor at which a player still counts as grounded
pub const GROUND_TOLERANCE: f32 = 1e-3;

/// Whether a player is standing on the floor and may jump.
///
/// The step clamp writes `FLOOR_LEVEL` exactly, so the tolerance only matters
/// for states that round-tripped through the text codec. Pure function of
/// state: client and server agree after deserialization.
pub fn is_grounded(player: &PlayerState) -> bool {
    player.y >= FLOOR_LEVEL - GROUND_TOLERANCE
}

/// Apply a single event to the world.
///
/// Join always succeeds and resets the entity to spawn; Leave is idempotent;
/// Input for an id absent from the world is ignored.
pub fn apply_event(state: &mut WorldState, event: &GameEvent, id: PlayerId) {
    match event {
        GameEvent::Join => {
            state.players.insert(id, PlayerState::spawn());
        }
        GameEvent::Leave => {
            state.players.remove(&id);
        }
        GameEvent::Input(input) => {
            if let Some(player) = state.players.get_mut(&id) {
                player.vel_x += input.x_axis() * tick_delta() * HORIZONTAL_SPEED;
                if input.up && is_grounded(player) {
                    player.vel_y -= JUMP_IMPULSE;
                }
            }
        }
    }
}

/// Advance every entity by one fixed timestep.
///
/// Must run exactly once per simulated tick, after all events for that tick
/// have been applied. Velocity is integrated per-tick (position moves by the
/// full velocity each step), then clamped to the floor and damped.
pub fn step(state: &mut WorldState) {
    let dt = tick_delta();
    for player in state.players.values_mut() {
        player.vel_y += GRAVITY * dt;
        player.x += player.vel_x;
        player.y += player.vel_y;
        if player.y > FLOOR_LEVEL {
            player.y = FLOOR_LEVEL;
        }
        player.vel_x *= VELOCITY_DAMPING;
        player.vel_y *= VELOCITY_DAMPING;
    }
}
