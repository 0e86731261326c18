use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::presence::MessageRouter;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub connection_manager: Arc<ConnectionManager>,
    pub router: Arc<MessageRouter>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let router = Arc::new(MessageRouter::new(
            connection_manager.clone(),
            &settings.presence,
        ));

        Self {
            settings: Arc::new(settings),
            connection_manager,
            router,
            start_time: Instant::now(),
        }
    }
}
