//! Time utilities for the fixed-rate simulation

use std::time::Instant;

/// Simulation tick rate, shared by client and server
pub const SIMULATION_TPS: u32 = 60;
/// Duration of one tick in microseconds
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Fixed timestep in seconds
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Convert a round-trip time in milliseconds to a one-way tick offset.
///
/// Half the RTT, expressed in ticks; used by the client to compensate its
/// local tick counter when the server announces its own.
pub fn rtt_to_tick_offset(rtt_ms: u32) -> u32 {
    (rtt_ms as f32 / 2.0 / 1000.0 * SIMULATION_TPS as f32) as u32
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_offset_in_ticks() {
        // 100ms round trip -> 50ms one way -> 3 ticks at 60 TPS
        assert_eq!(rtt_to_tick_offset(100), 3);
        assert_eq!(rtt_to_tick_offset(0), 0);
        // sub-tick latency rounds down
        assert_eq!(rtt_to_tick_offset(20), 0);
    }
}
