use renthive_common::AppError;

use crate::DbPool;

pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration error: {}", e)))?;

    tracing::info!("Database migrations completed");
    Ok(())
}
