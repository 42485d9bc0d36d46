//! Authoritative tick scheduler.
//!
//! The server deliberately resolves ticks `server_lateness` behind its own
//! counter so that inputs delayed or reordered by the network still land
//! inside the fold window for their nominal tick. Folding happens in two
//! stages: a staging state trails the broadcast state by one receive window,
//! and history is pruned only once a tick range has passed through both.

pub mod runtime;

use tracing::{info, warn};

use crate::net::protocol::Packet;
use crate::net::snapshot::{encode_state, SnapshotError};
use crate::sim::event::{GameEvent, PlayerInput};
use crate::sim::history::EventHistory;
use crate::sim::state::{PlayerId, Tick, WorldState};

pub use runtime::{ConnectionEvent, GameServer, ServerHandle};

/// Server session errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to encode world snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// An outbound packet with its routing
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver to one connection
    To(PlayerId, Packet),
    /// Deliver to every connection
    Broadcast(Packet),
}

/// Scheduling constants, in ticks
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Broadcast cadence: one authoritative fold every `tick_period` ticks
    pub tick_period: u32,
    /// Lateness tolerance: how far behind its nominal tick an input may
    /// arrive and still be folded
    pub receive_tick_period: u32,
    /// How far behind the raw tick counter resolved ticks trail
    pub server_lateness: u32,
}

impl SchedulerConfig {
    pub fn new(tick_period: u32, receive_tick_period: u32) -> Self {
        Self {
            tick_period,
            receive_tick_period,
            server_lateness: receive_tick_period,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(6, 60)
    }
}

/// Authoritative world and event buffer for one server process
#[derive(Debug)]
pub struct ServerSession {
    tick: Tick,
    history: EventHistory,
    /// Latest resolved, broadcast state
    state: WorldState,
    /// Staging state trailing the broadcast state by one receive window
    late_state: WorldState,
    /// Inputs stamped below this tick can no longer be folded
    fold_floor: Tick,
    sched: SchedulerConfig,
}

impl ServerSession {
    pub fn new(sched: SchedulerConfig) -> Self {
        Self {
            tick: 0,
            history: EventHistory::new(),
            state: WorldState::new(),
            late_state: WorldState::new(),
            fold_floor: 0,
            sched,
        }
    }

    /// Raw tick counter
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Latest resolved authoritative state
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// A new connection: synthesize its Join and hand it the handshake
    /// packets (current tick, then its assigned id).
    pub fn on_connect(&mut self, id: PlayerId) -> Vec<Outbound> {
        self.history.add_event(GameEvent::Join, id, self.tick);
        info!(player_id = id, tick = self.tick, "player connected");

        vec![
            Outbound::To(id, Packet::GameTick { tick: self.tick }),
            Outbound::To(id, Packet::PlayerId { id }),
        ]
    }

    /// A dropped connection: synthesize its Leave at the current tick
    pub fn on_disconnect(&mut self, id: PlayerId) {
        self.history.add_event(GameEvent::Leave, id, self.tick);
        info!(player_id = id, tick = self.tick, "player disconnected");
    }

    /// Buffer an input at the tick the client stamped it with.
    ///
    /// The stamp may be earlier than the server's own counter; that is the
    /// lateness the receive window absorbs. Inputs below the resolved fold
    /// floor can never be folded and are dropped (documented loss).
    pub fn on_input(&mut self, id: PlayerId, input: PlayerInput, client_tick: Tick) {
        if client_tick < self.fold_floor {
            warn!(
                player_id = id,
                client_tick,
                fold_floor = self.fold_floor,
                "input arrived too late, dropping"
            );
            return;
        }
        self.history
            .add_event(GameEvent::Input(input), id, client_tick);
    }

    /// Advance one tick; on broadcast cadence, fold and emit a snapshot.
    ///
    /// An encode failure skips that broadcast but never stops the loop; the
    /// fold and prune have already happened and the next cadence emits a
    /// fresh state.
    pub fn update(&mut self) -> Result<Option<Outbound>, ServerError> {
        let outbound = if self.tick % self.sched.tick_period == 0 {
            self.resolve()?
        } else {
            None
        };
        self.tick += 1;
        Ok(outbound)
    }

    /// Two-stage fold at resolved tick `T = tick - server_lateness`:
    /// staging absorbs `[T - tick_period - receive, T - receive)`, the
    /// broadcast state absorbs `[T - receive, T)` on top of it, then history
    /// up to the staging fold start is pruned.
    fn resolve(&mut self) -> Result<Option<Outbound>, ServerError> {
        let max_lateness =
            self.sched.server_lateness + self.sched.tick_period + self.sched.receive_tick_period;
        if self.tick < max_lateness {
            return Ok(None);
        }

        // the gate above proves these cannot underflow; a failed guard means
        // the stream has not started yet, not a wrap
        let Some(resolved_tick) = self.tick.checked_sub(self.sched.server_lateness) else {
            return Ok(None);
        };
        let Some(previous_tick) = resolved_tick.checked_sub(self.sched.tick_period) else {
            return Ok(None);
        };
        let Some(fold_start) = previous_tick.checked_sub(self.sched.receive_tick_period) else {
            return Ok(None);
        };
        let Some(fold_mid) = resolved_tick.checked_sub(self.sched.receive_tick_period) else {
            return Ok(None);
        };

        self.late_state = self
            .history
            .replay_range(&self.late_state, fold_start, fold_mid);
        self.state = self.history.replay_range(&self.late_state, fold_mid, resolved_tick);
        self.fold_floor = fold_mid;

        // the next staging fold starts at fold_mid; everything at or below
        // fold_start has been consumed by both stages
        debug_assert!(fold_start < fold_mid);
        let encoded = encode_state(&self.state);
        self.history.drop_history(fold_start);

        Ok(Some(Outbound::Broadcast(Packet::GameState {
            text: encoded?,
            tick: resolved_tick,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::snapshot::decode_state;
    use crate::sim::state::SPAWN_X;

    const RIGHT: PlayerInput = PlayerInput {
        left: false,
        right: true,
        up: false,
    };

    /// Drive `count` ticks, collecting every broadcast state packet
    fn run_ticks(session: &mut ServerSession, count: u32) -> Vec<(String, Tick)> {
        let mut broadcasts = Vec::new();
        for _ in 0..count {
            if let Some(Outbound::Broadcast(Packet::GameState { text, tick })) =
                session.update().unwrap()
            {
                broadcasts.push((text, tick));
            }
        }
        broadcasts
    }

    #[test]
    fn connect_hands_back_tick_then_id() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        let sends = session.on_connect(5);

        assert_eq!(
            sends,
            vec![
                Outbound::To(5, Packet::GameTick { tick: 0 }),
                Outbound::To(5, Packet::PlayerId { id: 5 }),
            ]
        );
    }

    #[test]
    fn no_broadcast_before_the_lateness_window_fills() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        // server_lateness + tick_period + receive_tick_period = 126
        assert!(run_ticks(&mut session, 126).is_empty());

        let broadcasts = run_ticks(&mut session, 1);
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].1, 66);
    }

    #[test]
    fn broadcast_cadence_and_stamps() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        let broadcasts = run_ticks(&mut session, 138);

        let ticks: Vec<Tick> = broadcasts.iter().map(|(_, t)| *t).collect();
        assert_eq!(ticks, vec![66, 72]);
    }

    #[test]
    fn late_input_inside_the_window_is_folded() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        session.on_connect(5);
        run_ticks(&mut session, 50);

        // stamped far behind the server's counter, still inside the window
        session.on_input(5, RIGHT, 2);

        let broadcasts = run_ticks(&mut session, 80);
        let (text, tick) = &broadcasts[0];
        assert_eq!(*tick, 66);
        let state = decode_state(text).unwrap();
        assert!(state.player(5).unwrap().x > SPAWN_X);
    }

    #[test]
    fn input_below_the_fold_floor_is_dropped() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        // first resolve sets the fold floor to 6
        run_ticks(&mut session, 127);
        assert_eq!(session.fold_floor, 6);

        session.on_input(5, RIGHT, 3);
        assert!(session.history.is_empty());

        session.on_input(5, RIGHT, 6);
        assert_eq!(session.history.oldest_tick(), Some(6));
    }

    #[test]
    fn two_stage_fold_matches_a_single_replay() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        session.on_connect(1);
        session.on_input(1, RIGHT, 10);

        let mut reference = EventHistory::new();
        reference.add_event(GameEvent::Join, 1, 0);
        reference.add_event(GameEvent::Input(RIGHT), 1, 10);

        let broadcasts = run_ticks(&mut session, 133);
        let (text, tick) = broadcasts.last().unwrap();
        assert_eq!(*tick, 72);
        assert_eq!(
            decode_state(text).unwrap(),
            reference.replay_range(&WorldState::new(), 0, 72)
        );
    }

    #[test]
    fn leave_removes_the_player_from_later_folds() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        session.on_connect(1);
        let first = run_ticks(&mut session, 127);
        assert!(decode_state(&first[0].0).unwrap().player(1).is_some());

        session.on_disconnect(1);
        let later = run_ticks(&mut session, 70);
        let (text, tick) = later.last().unwrap();
        assert_eq!(*tick, 132);
        assert!(decode_state(text).unwrap().is_empty());
    }

    #[test]
    fn pruning_never_reaches_the_next_fold_window() {
        let mut session = ServerSession::new(SchedulerConfig::default());
        session.on_connect(1);
        run_ticks(&mut session, 127);

        // history below the staging fold start is gone, the rest survives
        assert!(session.history.oldest_tick().map_or(true, |t| t > 0));
    }
}
