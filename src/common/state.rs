// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::bookmarks::services::ConnectionManager;
use crate::common::dev_mode::DevModeConfig;
use crate::services::GoogleService;

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt_secret: String,
    /// Public origin of this deployment, used as the base of every
    /// post-login redirect
    pub site_origin: String,
    pub dev_mode: DevModeConfig,
    pub google_service: Arc<GoogleService>,
    pub connection_manager: ConnectionManager,
}
