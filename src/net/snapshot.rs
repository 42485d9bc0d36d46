//! World-state text codec for GAME_STATE payloads.
//!
//! The wire document maps each player id (as a string key) to its four
//! kinematic fields. The encoded text must fit the fixed wire buffer with a
//! NUL terminator; oversize is an explicit error here, never a silent
//! truncation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::net::protocol::STATE_TEXT_CAPACITY;
use crate::sim::state::{PlayerId, PlayerState, WorldState};

/// Longest admissible encoding: buffer capacity minus the NUL terminator
pub const MAX_ENCODED_LEN: usize = STATE_TEXT_CAPACITY - 1;

#[derive(Serialize, Deserialize)]
struct WireDoc {
    players: BTreeMap<String, WirePlayer>,
}

#[derive(Serialize, Deserialize)]
struct WirePlayer {
    px: f32,
    py: f32,
    vx: f32,
    vy: f32,
}

/// State codec errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("encoded state is {len} bytes, exceeds the {MAX_ENCODED_LEN} byte limit")]
    PayloadTooLarge { len: usize },

    #[error("malformed state text: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid player id key: {0:?}")]
    InvalidPlayerId(String),
}

/// Encode a world state, length-checked against the wire buffer
pub fn encode_state(state: &WorldState) -> Result<String, SnapshotError> {
    let doc = WireDoc {
        players: state
            .players
            .iter()
            .map(|(id, p)| {
                (
                    id.to_string(),
                    WirePlayer {
                        px: p.x,
                        py: p.y,
                        vx: p.vel_x,
                        vy: p.vel_y,
                    },
                )
            })
            .collect(),
    };

    let text = serde_json::to_string(&doc)?;
    if text.len() > MAX_ENCODED_LEN {
        return Err(SnapshotError::PayloadTooLarge { len: text.len() });
    }
    Ok(text)
}

/// Decode a world state from snapshot text
pub fn decode_state(text: &str) -> Result<WorldState, SnapshotError> {
    let doc: WireDoc = serde_json::from_str(text)?;
    let mut state = WorldState::new();

    for (key, p) in doc.players {
        let id: PlayerId = key
            .parse()
            .map_err(|_| SnapshotError::InvalidPlayerId(key.clone()))?;
        state.players.insert(
            id,
            PlayerState {
                x: p.px,
                y: p.py,
                vel_x: p.vx,
                vel_y: p.vy,
            },
        );
    }

    Ok(state)
}
