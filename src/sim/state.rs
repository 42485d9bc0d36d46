//! Entity and world state: pure data

use std::collections::BTreeMap;

/// Player identifier, assigned per connection by the transport layer
pub type PlayerId = u32;

/// Simulation tick index, monotonic per stream
pub type Tick = u32;

/// Spawn position for newly joined players
pub const SPAWN_X: f32 = 100.0;
pub const SPAWN_Y: f32 = 100.0;

/// Kinematic state of a single player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl PlayerState {
    /// Fresh entity at the spawn point
    pub fn spawn() -> Self {
        Self {
            x: SPAWN_X,
            y: SPAWN_Y,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }
}

/// World state: ordered mapping from player id to entity state.
///
/// Ordered so that iteration (and therefore event application and
/// serialization) is deterministic across client and server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    pub players: BTreeMap<PlayerId, PlayerState>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
