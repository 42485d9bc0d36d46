//! The fixed-rate tick task and its channel plumbing.
//!
//! Transport handlers feed `ConnectionEvent`s into an mpsc queue; the tick
//! task drains the queue synchronously at the top of every tick, before the
//! scheduler advances, so history mutation from message handlers always
//! completes before that tick's fold runs. Outbound packets fan out over a
//! broadcast channel; each connection task filters for its own targeted
//! sends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::net::protocol::Packet;
use crate::server::{Outbound, SchedulerConfig, ServerSession};
use crate::sim::state::PlayerId;
use crate::util::time::TICK_DURATION_MICROS;

/// Transport-side events feeding the tick task
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected { player_id: PlayerId },
    Disconnected { player_id: PlayerId },
    Packet { player_id: PlayerId, packet: Packet },
}

/// Handle to a running tick task
#[derive(Clone)]
pub struct ServerHandle {
    pub event_tx: mpsc::Sender<ConnectionEvent>,
    outbound_tx: broadcast::Sender<Outbound>,
    next_player_id: Arc<AtomicU32>,
}

impl ServerHandle {
    /// Allocate a connection-unique player id
    pub fn allocate_player_id(&self) -> PlayerId {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to the outbound packet stream
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }
}

/// The authoritative tick loop
pub struct GameServer {
    session: ServerSession,
    event_rx: mpsc::Receiver<ConnectionEvent>,
    outbound_tx: broadcast::Sender<Outbound>,
}

impl GameServer {
    pub fn new(sched: SchedulerConfig) -> (Self, ServerHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(64);

        let handle = ServerHandle {
            event_tx,
            outbound_tx: outbound_tx.clone(),
            // id 0 stays free so "unassigned" is distinguishable on clients
            next_player_id: Arc::new(AtomicU32::new(1)),
        };

        let server = Self {
            session: ServerSession::new(sched),
            event_rx,
            outbound_tx,
        };

        (server, handle)
    }

    /// Run the fixed-rate tick loop until the task is dropped.
    ///
    /// Burst catch-up: when the loop falls behind schedule it executes the
    /// missed ticks back-to-back instead of skipping them, keeping the tick
    /// counter aligned with wall-clock time.
    pub async fn run(mut self) {
        info!("authoritative tick loop started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

        loop {
            tick_interval.tick().await;

            // inbound dispatch completes before simulation advances
            self.drain_events();

            match self.session.update() {
                Ok(Some(outbound)) => {
                    // send only fails with no subscribers; nothing to do then
                    let _ = self.outbound_tx.send(outbound);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, tick = self.session.tick(), "skipping broadcast");
                }
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ConnectionEvent::Connected { player_id } => {
                    for outbound in self.session.on_connect(player_id) {
                        let _ = self.outbound_tx.send(outbound);
                    }
                }
                ConnectionEvent::Disconnected { player_id } => {
                    self.session.on_disconnect(player_id);
                }
                ConnectionEvent::Packet { player_id, packet } => match packet {
                    Packet::PlayerInput { input, tick } => {
                        self.session.on_input(player_id, input, tick);
                    }
                    other => {
                        debug!(player_id, packet = ?other, "ignoring unexpected packet");
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_event_produces_the_handshake_sends() {
        tokio_test::block_on(async {
            let (server, handle) = GameServer::new(SchedulerConfig::default());
            let mut outbound_rx = handle.subscribe();
            tokio::spawn(server.run());

            let id = handle.allocate_player_id();
            assert_eq!(id, 1);
            handle
                .event_tx
                .send(ConnectionEvent::Connected { player_id: id })
                .await
                .unwrap();

            match outbound_rx.recv().await.unwrap() {
                Outbound::To(to, Packet::GameTick { .. }) => assert_eq!(to, id),
                other => panic!("expected tick handshake, got {other:?}"),
            }
            match outbound_rx.recv().await.unwrap() {
                Outbound::To(to, Packet::PlayerId { id: assigned }) => {
                    assert_eq!(to, id);
                    assert_eq!(assigned, id);
                }
                other => panic!("expected id assignment, got {other:?}"),
            }
        });
    }
}
