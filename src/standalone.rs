//! Offline single-player session.
//!
//! No transport, no scheduler: one local player, joined at tick zero. Each
//! frame folds whatever is pending through `replay_all_as_one_tick`, which
//! collapses tick granularity to one physics step per frame and keeps the
//! history empty between frames.

use crate::sim::event::{GameEvent, PlayerInput};
use crate::sim::history::EventHistory;
use crate::sim::state::{PlayerId, Tick, WorldState};

/// The one local player in an offline session
pub const LOCAL_PLAYER_ID: PlayerId = 0;

/// Offline session state
#[derive(Debug)]
pub struct StandaloneSession {
    tick: Tick,
    state: WorldState,
    history: EventHistory,
}

impl StandaloneSession {
    pub fn new() -> Self {
        let mut history = EventHistory::new();
        history.add_event(GameEvent::Join, LOCAL_PLAYER_ID, 0);

        Self {
            tick: 0,
            state: WorldState::new(),
            history,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Advance one frame: record the sampled input (if any) and fold all
    /// pending events into a single simulation step.
    pub fn update(&mut self, input: PlayerInput) {
        if !input.is_empty() {
            self.history
                .add_event(GameEvent::Input(input), LOCAL_PLAYER_ID, self.tick);
        }

        self.state = self.history.replay_all_as_one_tick(&self.state);
        self.tick += 1;
    }
}

impl Default for StandaloneSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{SPAWN_X, SPAWN_Y};

    #[test]
    fn first_frame_spawns_the_local_player() {
        let mut session = StandaloneSession::new();
        session.update(PlayerInput::default());

        let player = session.state().player(LOCAL_PLAYER_ID).unwrap();
        assert_eq!(player.x, SPAWN_X);
        // one step of gravity has already pulled the spawn position down
        assert!(player.y > SPAWN_Y);
    }

    #[test]
    fn input_moves_the_player_and_history_stays_empty() {
        let mut session = StandaloneSession::new();
        session.update(PlayerInput::default());
        let before = session.state().player(LOCAL_PLAYER_ID).unwrap().x;

        session.update(PlayerInput {
            right: true,
            ..Default::default()
        });

        let player = session.state().player(LOCAL_PLAYER_ID).unwrap();
        assert!(player.x > before);
        assert!(session.history.is_empty());
        assert_eq!(session.tick(), 2);
    }
}
