//! Game events: the tagged input stream the simulation folds into state

/// Button state sampled from the local input device for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
}

impl PlayerInput {
    /// Horizontal axis: -1.0 (left), 0.0, or 1.0 (right)
    pub fn x_axis(&self) -> f32 {
        (self.right as i8 - self.left as i8) as f32
    }

    /// True when no button is held; empty inputs are not recorded or sent
    pub fn is_empty(&self) -> bool {
        self.x_axis() == 0.0 && !self.up
    }
}

/// A single simulation event.
///
/// Carries no tick or player id of its own; both are attached by the event
/// history store at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Player entered the world; inserts a fresh entity at spawn
    Join,
    /// Player left the world; removes the entity
    Leave,
    /// Held-button state for one tick
    Input(PlayerInput),
}
