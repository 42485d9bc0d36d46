//! Wire packet definitions and codec.
//!
//! Every packet is one discriminator byte followed by a fixed-layout
//! little-endian payload, so a datagram-style transport can carry them
//! without framing metadata.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::sim::event::PlayerInput;
use crate::sim::state::{PlayerId, Tick};

/// Client input for one tick; unreliable delivery is acceptable
pub const MSG_PLAYER_INPUT: u8 = 0;
/// Authoritative world snapshot, server to clients
pub const MSG_GAME_STATE: u8 = 1;
/// Tick announcement (handshake and resync)
pub const MSG_GAME_TICK: u8 = 2;
/// Player id assignment, once per connection
pub const MSG_PLAYER_ID: u8 = 3;

/// Capacity of the GAME_STATE text buffer, NUL terminator included
pub const STATE_TEXT_CAPACITY: usize = 1024;

/// Messages exchanged between client and server
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Held-button state stamped with the client tick it belongs to
    PlayerInput { input: PlayerInput, tick: Tick },

    /// Encoded world state stamped with its resolved tick
    GameState { text: String, tick: Tick },

    /// The sender's current tick
    GameTick { tick: Tick },

    /// Assigned player id
    PlayerId { id: PlayerId },
}

/// Wire codec errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown message discriminator: {0}")]
    UnknownMessage(u8),

    #[error("truncated {kind} packet: {len} bytes")]
    Truncated { kind: &'static str, len: usize },

    #[error("state text is {len} bytes, exceeds the {STATE_TEXT_CAPACITY} byte buffer")]
    PayloadTooLarge { len: usize },

    #[error("state text is not valid UTF-8")]
    InvalidText,
}

impl Packet {
    /// Encode to wire bytes.
    ///
    /// Fails only for a GAME_STATE whose text cannot fit the buffer with its
    /// NUL terminator; the snapshot encoder enforces the same bound earlier,
    /// so hitting this from inside the crate is a programming error.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Packet::PlayerInput { input, tick } => {
                let mut buf = BytesMut::with_capacity(8);
                buf.put_u8(MSG_PLAYER_INPUT);
                buf.put_u8(input.left as u8);
                buf.put_u8(input.right as u8);
                buf.put_u8(input.up as u8);
                buf.put_u32_le(*tick);
                Ok(buf.freeze())
            }
            Packet::GameState { text, tick } => {
                if text.len() >= STATE_TEXT_CAPACITY {
                    return Err(ProtocolError::PayloadTooLarge { len: text.len() });
                }
                let mut buf = BytesMut::with_capacity(1 + STATE_TEXT_CAPACITY + 4);
                buf.put_u8(MSG_GAME_STATE);
                buf.put_slice(text.as_bytes());
                buf.put_bytes(0, STATE_TEXT_CAPACITY - text.len());
                buf.put_u32_le(*tick);
                Ok(buf.freeze())
            }
            Packet::GameTick { tick } => {
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u8(MSG_GAME_TICK);
                buf.put_u32_le(*tick);
                Ok(buf.freeze())
            }
            Packet::PlayerId { id } => {
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u8(MSG_PLAYER_ID);
                buf.put_u32_le(*id);
                Ok(buf.freeze())
            }
        }
    }

    /// Decode from wire bytes
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let total = data.len();
        let mut buf = data;
        if !buf.has_remaining() {
            return Err(ProtocolError::Empty);
        }

        match buf.get_u8() {
            MSG_PLAYER_INPUT => {
                if buf.remaining() < 7 {
                    return Err(ProtocolError::Truncated {
                        kind: "PLAYER_INPUT",
                        len: total,
                    });
                }
                let input = PlayerInput {
                    left: buf.get_u8() != 0,
                    right: buf.get_u8() != 0,
                    up: buf.get_u8() != 0,
                };
                let tick = buf.get_u32_le();
                Ok(Packet::PlayerInput { input, tick })
            }
            MSG_GAME_STATE => {
                if buf.remaining() < STATE_TEXT_CAPACITY + 4 {
                    return Err(ProtocolError::Truncated {
                        kind: "GAME_STATE",
                        len: total,
                    });
                }
                let raw = buf.copy_to_bytes(STATE_TEXT_CAPACITY);
                let end = raw
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(STATE_TEXT_CAPACITY);
                let text = std::str::from_utf8(&raw[..end])
                    .map_err(|_| ProtocolError::InvalidText)?
                    .to_string();
                let tick = buf.get_u32_le();
                Ok(Packet::GameState { text, tick })
            }
            MSG_GAME_TICK => {
                if buf.remaining() < 4 {
                    return Err(ProtocolError::Truncated {
                        kind: "GAME_TICK",
                        len: total,
                    });
                }
                Ok(Packet::GameTick {
                    tick: buf.get_u32_le(),
                })
            }
            MSG_PLAYER_ID => {
                if buf.remaining() < 4 {
                    return Err(ProtocolError::Truncated {
                        kind: "PLAYER_ID",
                        len: total,
                    });
                }
                Ok(Packet::PlayerId {
                    id: buf.get_u32_le(),
                })
            }
            other => Err(ProtocolError::UnknownMessage(other)),
        }
    }
}
