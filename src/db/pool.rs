use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

#[derive(Clone)]
pub struct DbPool(SqlitePool);

impl DbPool {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self(pool))
    }

    pub fn inner(&self) -> &SqlitePool {
        &self.0
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations");

    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            artifact_name TEXT,
            adder_email TEXT,
            extra TEXT NOT NULL DEFAULT '{}'
        )
    "#).execute(pool).await?;

    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS likes (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            artifact_id TEXT,
            user_email TEXT,
            extra TEXT NOT NULL DEFAULT '{}'
        )
    "#).execute(pool).await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_adder_email ON artifacts(adder_email)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_artifact_id ON likes(artifact_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_user_email ON likes(user_email)")
        .execute(pool)
        .await?;

    info!("Database migrations completed");
    Ok(())
}
