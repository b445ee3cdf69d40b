// Shared helpers for DB-backed integration tests
// Tests skip gracefully when no test database is reachable, mirroring how
// the pool tests behave in CI without infrastructure.

use hearth_backend_core::db::{create_diesel_pool, DieselDatabaseConfig, DieselPool};
use hearth_backend_core::models::User;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "IntegrationTest123!";

/// Connect to the configured test database, running migrations on first
/// use. Returns None (and skips the test) when no database is available.
pub async fn setup_test_pool() -> Option<DieselPool> {
    dotenv::from_filename(".env.test").ok();
    dotenv::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not configured");
        return None;
    }

    let config = DieselDatabaseConfig::default();
    let pool = match create_diesel_pool(config).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Skipping test: failed to create pool: {}", e);
            return None;
        },
    };

    if let Err(e) = hearth_backend_core::migrations::run_all_migrations(&pool).await {
        eprintln!("Skipping test: migrations failed: {}", e);
        return None;
    }

    Some(pool)
}

/// Create a user with a unique username and the shared test password
pub async fn create_test_user(pool: &DieselPool, admin: bool) -> User {
    let mut conn = pool.get().await.expect("Failed to get connection");
    let username = format!("test-{}", Uuid::new_v4());

    User::create(&mut conn, &username, TEST_PASSWORD, "Test User", admin)
        .await
        .expect("Failed to create test user")
}

/// Delete a test user; tokens and memberships cascade away
pub async fn cleanup_user(pool: &DieselPool, user: &User) {
    let mut conn = pool.get().await.expect("Failed to get connection");
    user.delete(&mut conn).await.ok();
}
