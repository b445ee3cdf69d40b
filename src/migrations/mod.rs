// Migration orchestrator, embedded in the application binary

pub mod diesel;

use crate::db::DieselPool;
use std::error::Error;
use tracing::info;

/// Embedded migrations can be turned off when an external tool owns the schema
pub fn should_run_migrations() -> bool {
    !crate::app_config::config().disable_embedded_migrations
}

pub async fn run_all_migrations(pool: &DieselPool) -> Result<(), Box<dyn Error + Send + Sync>> {
    let applied = diesel::run_migrations(pool).await?;
    if applied > 0 {
        info!("Applied {} migrations", applied);
    } else {
        info!("Migrations up to date");
    }
    Ok(())
}
