// Diesel migration runner for PostgreSQL
// Uses embedded migrations from the diesel_migrations crate
// Note: diesel_migrations requires sync connections, not async

use crate::db::diesel_pool::MIGRATIONS;
use crate::db::DieselPool;
use diesel::{Connection, PgConnection};
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

/// Run all pending migrations; returns how many were applied
pub async fn run_migrations(_pool: &DieselPool) -> Result<usize, Box<dyn Error + Send + Sync>> {
    // Migrations need a sync connection, so they run in a blocking task
    let database_url = crate::app_config::config().database_url.clone();

    let applied =
        tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
            debug!("Establishing sync connection for migrations...");
            let mut conn = PgConnection::establish(&database_url)
                .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

            let pending = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to check pending migrations: {}", e))?;

            if pending.is_empty() {
                debug!("No pending migrations to run");
                return Ok(0);
            }

            let mut applied_count = 0;
            for migration in pending {
                info!("Applying migration: {}", migration.name());
                conn.run_migration(&migration)
                    .map_err(|e| format!("Failed to run migration {}: {}", migration.name(), e))?;
                applied_count += 1;
            }

            Ok(applied_count)
        })
        .await
        .map_err(|e| format!("Migration task panicked: {}", e))??;

    Ok(applied)
}
