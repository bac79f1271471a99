//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::RoomRegistry;
use crate::util::rate_limit::ConnectionGuard;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub connections: Arc<ConnectionGuard>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let rooms = Arc::new(RoomRegistry::new(config.game));
        let connections = Arc::new(ConnectionGuard::new(config.max_connections_per_origin));

        Self {
            config,
            rooms,
            connections,
        }
    }
}
