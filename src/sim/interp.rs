//! Snapshot interpolation for remote entities.
//!
//! The client renders other players a little in the past, blended between the
//! two most recent authoritative snapshots. The local player is excluded: its
//! entity is driven by the predictor, never smoothed here.

use crate::sim::state::{PlayerId, WorldState};

/// Blend `state1` toward `state2` by `alpha`, skipping `except_id`.
///
/// Returns a copy of `state2`, so an entity present only in `state2` (a
/// freshly joined player) appears immediately at its current position. For
/// every other entity present in both states the position is linearly
/// interpolated; velocities are taken from `state2` as-is. `alpha` is clamped
/// to `[0, 1]` before use.
pub fn lerp(
    state1: &WorldState,
    state2: &WorldState,
    alpha: f32,
    except_id: PlayerId,
) -> WorldState {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut result = state2.clone();

    for (id, player) in result.players.iter_mut() {
        if *id == except_id {
            continue;
        }
        if let Some(from) = state1.players.get(id) {
            player.x = from.x + alpha * (player.x - from.x);
            player.y = from.y + alpha * (player.y - from.y);
        }
    }

    result
}
