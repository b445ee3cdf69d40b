// Library exports for the Hearth backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::{DieselDatabaseConfig, DieselPool};
pub use middleware::{auth_middleware, AuthenticatedUser, RequiredRights};
pub use models::auth::{TokenClaims, TokenType};
pub use models::token::Token;
pub use services::{JwtCodec, TaskQueue, TokenPair, TokenService};
pub use utils::ApiError;

use std::sync::Arc;
use tracing::info;

/// Initialize shared application state for the server binary and for
/// embedders that mount the core into a larger deployment
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = app_config::config();

    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    info!("Database URL: {}", db::mask_connection_string(&db_config.url));
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(&diesel_pool)
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    let token_service = Arc::new(TokenService::from_config(config, diesel_pool.clone()));
    let task_queue = Arc::new(TaskQueue::new(config.security.import_worker_concurrency));

    Ok(AppState {
        config: Arc::new(config.clone()),
        diesel_pool,
        token_service,
        task_queue,
    })
}
