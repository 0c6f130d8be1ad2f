//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use journey_engine::Engine;

use crate::sender::PlatformClients;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Engine,
    /// Used directly for webhook-side calls such as callback acknowledgements.
    pub platforms: Arc<PlatformClients>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(db: Database, engine: Engine, platforms: Arc<PlatformClients>, admin_token: Option<String>) -> Self {
        Self {
            db,
            engine,
            platforms,
            admin_token,
        }
    }
}
