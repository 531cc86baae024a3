pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::dispatcher::EventDispatcher;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub dispatcher: Arc<EventDispatcher>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        database: Arc<Database>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            config,
            database,
            dispatcher,
        }
    }
}
