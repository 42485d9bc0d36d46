//! Client-side prediction and server reconciliation.
//!
//! The session keeps two views of the world: a self view predicted ahead of
//! the last authoritative snapshot by replaying the player's own unconfirmed
//! inputs, and an others view interpolated between the two most recent
//! snapshots. The transport and renderer live outside; the session consumes
//! decoded packets and hands back the packet to transmit, if any.

use tracing::debug;

use crate::net::protocol::Packet;
use crate::net::snapshot::{decode_state, SnapshotError};
use crate::sim::event::{GameEvent, PlayerInput};
use crate::sim::history::EventHistory;
use crate::sim::interp::lerp;
use crate::sim::state::{PlayerId, Tick, WorldState};
use crate::util::time::rtt_to_tick_offset;

/// Client session errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to decode world snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Optional id filter restricting which entities a view draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFilter {
    Only(PlayerId),
    Except(PlayerId),
}

impl PlayerFilter {
    pub fn allows(&self, id: PlayerId) -> bool {
        match self {
            PlayerFilter::Only(only) => id == *only,
            PlayerFilter::Except(except) => id != *except,
        }
    }
}

/// Display style handed to the rendering collaborator alongside a world view
#[derive(Debug, Clone, Copy)]
pub struct DrawStyle {
    /// RGBA color for the entity shapes
    pub color: [u8; 4],
    pub filter: Option<PlayerFilter>,
}

/// Predictor/reconciler state for one connected client
#[derive(Debug, Default)]
pub struct ClientSession {
    tick: Tick,
    player_id: PlayerId,
    history: EventHistory,

    self_state: WorldState,
    others_state: WorldState,

    last_snapshot: WorldState,
    last_snapshot_tick: Tick,
    prev_snapshot: WorldState,
    prev_snapshot_tick: Tick,
    ticks_since_snapshot: u32,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local tick counter
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Player id assigned by the server (0 until PLAYER_ID arrives)
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Predicted world containing the local player's unconfirmed inputs.
    /// Render with `PlayerFilter::Only(player_id)`.
    pub fn self_state(&self) -> &WorldState {
        &self.self_state
    }

    /// Interpolated world for remote players.
    /// Render with `PlayerFilter::Except(player_id)`.
    pub fn others_state(&self) -> &WorldState {
        &self.others_state
    }

    /// Advance the session by one tick.
    ///
    /// Records and returns the input packet to transmit (unreliable delivery
    /// is fine) when the sampled input is non-trivial, advances the predicted
    /// self view by exactly one tick, and refreshes the interpolated others
    /// view.
    pub fn update(&mut self, input: PlayerInput) -> Option<Packet> {
        let mut outbound = None;
        if !input.is_empty() {
            self.history
                .add_event(GameEvent::Input(input), self.player_id, self.tick);
            outbound = Some(Packet::PlayerInput {
                input,
                tick: self.tick,
            });
        }

        self.self_state = self
            .history
            .replay_range(&self.self_state, self.tick, self.tick + 1);

        let alpha = match self
            .last_snapshot_tick
            .checked_sub(self.prev_snapshot_tick)
        {
            None | Some(0) => 1.0,
            Some(span) => self.ticks_since_snapshot as f32 / span as f32,
        };
        self.others_state = lerp(
            &self.prev_snapshot,
            &self.last_snapshot,
            alpha,
            self.player_id,
        );

        self.tick += 1;
        self.ticks_since_snapshot += 1;
        outbound
    }

    /// Consume one server packet.
    ///
    /// `rtt_ms` is the transport's current round-trip estimate, used only for
    /// tick synchronization. A snapshot that fails to decode is surfaced and
    /// discarded; the session keeps its previous state.
    pub fn handle_packet(&mut self, packet: Packet, rtt_ms: u32) -> Result<(), ClientError> {
        match packet {
            Packet::GameTick { tick } => {
                self.tick = tick.saturating_add(rtt_to_tick_offset(rtt_ms));
                debug!(server_tick = tick, local_tick = self.tick, "tick sync");
            }
            Packet::PlayerId { id } => {
                self.player_id = id;
                debug!(player_id = id, "assigned player id");
            }
            Packet::GameState { text, tick } => self.reconcile(&text, tick)?,
            Packet::PlayerInput { .. } => {
                debug!("ignoring PLAYER_INPUT addressed to a client");
            }
        }
        Ok(())
    }

    /// Fold a new authoritative snapshot into the session.
    ///
    /// The decoded state becomes the new interpolation endpoint; the self
    /// view is rebuilt by fast-forwarding the snapshot through the client's
    /// own buffered inputs up to the current tick.
    fn reconcile(&mut self, text: &str, snapshot_tick: Tick) -> Result<(), ClientError> {
        let decoded = decode_state(text)?;

        self.prev_snapshot = std::mem::replace(&mut self.last_snapshot, decoded.clone());
        self.prev_snapshot_tick = self.last_snapshot_tick;
        self.last_snapshot_tick = snapshot_tick;
        self.ticks_since_snapshot = 0;

        let end_tick = self.tick.saturating_sub(1);
        self.self_state = self.history.replay_range(&decoded, snapshot_tick, end_tick);

        // every future fast-forward starts at a later snapshot tick, so
        // anything below this one is dead history
        if let Some(cutoff) = snapshot_tick.checked_sub(1) {
            self.history.drop_history(cutoff);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::snapshot::encode_state;
    use crate::sim::physics::FLOOR_LEVEL;
    use crate::sim::state::PlayerState;

    const RIGHT: PlayerInput = PlayerInput {
        left: false,
        right: true,
        up: false,
    };

    fn grounded(x: f32) -> PlayerState {
        PlayerState {
            x,
            y: FLOOR_LEVEL,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }

    fn snapshot_packet(state: &WorldState, tick: Tick) -> Packet {
        Packet::GameState {
            text: encode_state(state).unwrap(),
            tick,
        }
    }

    fn session_with_world(id: PlayerId, state: &WorldState, tick: Tick) -> ClientSession {
        let mut session = ClientSession::new();
        session.handle_packet(Packet::PlayerId { id }, 0).unwrap();
        session.handle_packet(Packet::GameTick { tick }, 0).unwrap();
        session
            .handle_packet(snapshot_packet(state, tick), 0)
            .unwrap();
        session
    }

    #[test]
    fn update_predicts_and_emits_input_packet() {
        let mut world = WorldState::new();
        world.players.insert(1, grounded(100.0));
        let mut session = session_with_world(1, &world, 0);

        let sent = session.update(RIGHT);

        assert_eq!(
            sent,
            Some(Packet::PlayerInput {
                input: RIGHT,
                tick: 0
            })
        );
        // the input moved the predicted self entity
        assert!(session.self_state().player(1).unwrap().vel_x > 0.0);
        assert_eq!(session.tick(), 1);
    }

    #[test]
    fn trivial_input_sends_nothing_but_still_steps() {
        let mut world = WorldState::new();
        world.players.insert(1, grounded(100.0));
        let mut session = session_with_world(1, &world, 0);
        session.self_state.players.get_mut(&1).unwrap().y = FLOOR_LEVEL - 50.0;

        let sent = session.update(PlayerInput::default());

        assert_eq!(sent, None);
        // gravity still applied by the per-tick step
        assert!(session.self_state().player(1).unwrap().vel_y > 0.0);
    }

    #[test]
    fn tick_sync_adds_half_rtt_in_ticks() {
        let mut session = ClientSession::new();
        session
            .handle_packet(Packet::GameTick { tick: 100 }, 100)
            .unwrap();
        assert_eq!(session.tick(), 103);
    }

    #[test]
    fn reconciliation_replays_unconfirmed_inputs() {
        let mut world = WorldState::new();
        world.players.insert(1, grounded(100.0));
        let mut session = session_with_world(1, &world, 10);

        // three locally predicted ticks: inputs at 10, 11, 12
        for _ in 0..3 {
            session.update(RIGHT);
        }
        let history = session.history.clone();

        // authoritative state for tick 11 arrives while we are at tick 13
        let mut authoritative = WorldState::new();
        authoritative.players.insert(1, grounded(104.0));
        session
            .handle_packet(snapshot_packet(&authoritative, 11), 0)
            .unwrap();

        let expected = history.replay_range(&authoritative, 11, 12);
        assert_eq!(*session.self_state(), expected);

        // inputs below the snapshot tick can never be replayed again
        assert_eq!(session.history.oldest_tick(), Some(11));
    }

    #[test]
    fn others_view_interpolates_between_snapshot_pair() {
        let mut first = WorldState::new();
        first.players.insert(1, grounded(100.0));
        first.players.insert(2, grounded(0.0));
        let mut session = session_with_world(1, &first, 0);

        let mut second = WorldState::new();
        second.players.insert(1, grounded(100.0));
        second.players.insert(2, grounded(60.0));
        session
            .handle_packet(snapshot_packet(&second, 8), 0)
            .unwrap();

        // first update after the snapshot: alpha = 0/8
        session.update(PlayerInput::default());
        assert_eq!(session.others_state().player(2).unwrap().x, 0.0);

        // two more ticks: alpha = 2/8
        session.update(PlayerInput::default());
        session.update(PlayerInput::default());
        assert_eq!(session.others_state().player(2).unwrap().x, 15.0);

        // the local player is never smoothed
        assert_eq!(
            session.others_state().player(1),
            session.last_snapshot.player(1)
        );
    }

    #[test]
    fn equal_snapshot_ticks_pin_alpha_to_one() {
        let mut world = WorldState::new();
        world.players.insert(2, grounded(40.0));
        let mut session = session_with_world(1, &world, 0);

        // only one snapshot seen: prev and last tick are both 0
        session.update(PlayerInput::default());
        assert_eq!(session.others_state().player(2).unwrap().x, 40.0);
    }

    #[test]
    fn undecodable_snapshot_is_surfaced_and_discarded() {
        let mut world = WorldState::new();
        world.players.insert(1, grounded(100.0));
        let mut session = session_with_world(1, &world, 5);
        let before = session.self_state().clone();

        let result = session.handle_packet(
            Packet::GameState {
                text: "garbage".to_string(),
                tick: 9,
            },
            0,
        );

        assert!(matches!(result, Err(ClientError::Snapshot(_))));
        assert_eq!(*session.self_state(), before);
        assert_eq!(session.last_snapshot_tick, 5);
    }

    #[test]
    fn player_filter_only_and_except() {
        assert!(PlayerFilter::Only(3).allows(3));
        assert!(!PlayerFilter::Only(3).allows(4));
        assert!(PlayerFilter::Except(3).allows(4));
        assert!(!PlayerFilter::Except(3).allows(3));
    }
}
