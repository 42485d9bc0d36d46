//! Per-tick append-only event log with bulk replay and bulk pruning.
//!
//! The store is the source of truth for "what happened when". Replay is a
//! pure fold over the buffered events; two calls over the same range yield
//! identical states, which both the client reconciler and the server
//! scheduler rely on.

use std::collections::BTreeMap;

use crate::sim::event::GameEvent;
use crate::sim::physics::{apply_event, step};
use crate::sim::state::{PlayerId, Tick, WorldState};

/// Event history: tick -> (player id, event) pairs in arrival order.
///
/// Arrival order within a tick is part of the determinism contract: two
/// events at the same tick for the same player apply in the order they were
/// inserted.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: BTreeMap<Tick, Vec<(PlayerId, GameEvent)>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the given tick. Never fails; ticks may arrive out
    /// of order.
    pub fn add_event(&mut self, event: GameEvent, id: PlayerId, tick: Tick) {
        self.events.entry(tick).or_default().push((id, event));
    }

    /// Replay `[start_tick, end_tick)` over a copy of `start_state`.
    ///
    /// For each tick in increasing order: apply that tick's buffered events
    /// (if any), then run one simulation step. Does not mutate the store.
    /// An empty or inverted range returns `start_state` unchanged.
    pub fn replay_range(
        &self,
        start_state: &WorldState,
        start_tick: Tick,
        end_tick: Tick,
    ) -> WorldState {
        let mut state = start_state.clone();
        let mut tick = start_tick;

        while tick < end_tick {
            if let Some(events) = self.events.get(&tick) {
                for (id, event) in events {
                    apply_event(&mut state, event, *id);
                }
            }
            step(&mut state);
            tick += 1;
        }

        state
    }

    /// Fold every buffered event, across all ticks in tick-then-insertion
    /// order, into a copy of `start_state`, run exactly one simulation step,
    /// and clear the history.
    ///
    /// Collapses tick granularity intentionally: all pending events land in a
    /// single physics step. Callers should avoid letting large bursts pend.
    pub fn replay_all_as_one_tick(&mut self, start_state: &WorldState) -> WorldState {
        let mut state = start_state.clone();

        for events in self.events.values() {
            for (id, event) in events {
                apply_event(&mut state, event, *id);
            }
        }
        step(&mut state);
        self.events.clear();

        state
    }

    /// Remove every tick `<= last_dropped_tick`. Irreversible.
    ///
    /// The caller must guarantee no subsequent replay will request a dropped
    /// tick; a replay over a dropped range silently behaves as if those ticks
    /// had zero events.
    pub fn drop_history(&mut self, last_dropped_tick: Tick) {
        match last_dropped_tick.checked_add(1) {
            Some(first_kept) => {
                self.events = self.events.split_off(&first_kept);
            }
            None => self.events.clear(),
        }
    }

    /// Earliest tick with buffered events, if any
    pub fn oldest_tick(&self) -> Option<Tick> {
        self.events.keys().next().copied()
    }

    /// Number of ticks with at least one buffered event
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
