use sqlx::PgPool;
use tracing::info;

pub mod automation_repository;
pub mod postgres_automation_repository;

/// Establish a connection to the database and verify it.
pub async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
