//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::server::ServerHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub server: ServerHandle,
}

impl AppState {
    pub fn new(config: Config, server: ServerHandle) -> Self {
        Self {
            config: Arc::new(config),
            server,
        }
    }
}
