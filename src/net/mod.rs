//! Wire protocol and state serialization

pub mod protocol;
pub mod snapshot;

pub use protocol::{Packet, ProtocolError};
pub use snapshot::{decode_state, encode_state, SnapshotError};
