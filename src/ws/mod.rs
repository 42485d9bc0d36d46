//! WebSocket transport layer

pub mod handler;

pub use handler::ws_handler;
