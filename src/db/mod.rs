pub use artifacts::{ArtifactRepository, FEATURED_LIMIT};
pub use likes::LikeRepository;
pub use pool::DbPool;

mod artifacts;
mod likes;
mod pool;

use uuid::Uuid;

pub type Database = DbPool;

pub async fn init_db(database_url: &str) -> Result<Database, sqlx::Error> {
    let db = Database::new(database_url).await?;

    pool::run_migrations(db.inner()).await?;

    Ok(db)
}

/// Errors surfaced by the repositories
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Stored document is malformed: {0}")]
    Corrupt(serde_json::Error),
}

/// Fresh store-assigned document id
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Canonical form of a client-supplied id, or `None` if it is not one of ours.
pub fn parse_id(raw: &str) -> Option<String> {
    Uuid::try_parse(raw).ok().map(|id| id.simple().to_string())
}

fn decode_extra(raw: &str) -> Result<crate::models::Extra, StoreError> {
    serde_json::from_str(raw).map_err(StoreError::Corrupt)
}

fn encode_extra(extra: &crate::models::Extra) -> Result<String, StoreError> {
    serde_json::to_string(extra).map_err(StoreError::Corrupt)
}

#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    pool::run_migrations(&pool).await.unwrap();
    pool
}
