use sqlx::SqlitePool;
use tracing::info;

use super::{decode_extra, encode_extra, new_id, StoreError};
use crate::models::{Like, NewLike};

pub struct LikeRepository {
    pool: SqlitePool,
}

impl LikeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Likes recorded for `email`, in insertion order
    pub async fn list_by_user(&self, email: &str) -> Result<Vec<Like>, StoreError> {
        let rows = sqlx::query_as::<_, LikeRow>(
            "SELECT id, artifact_id, user_email, extra FROM likes WHERE user_email = ? ORDER BY seq",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LikeRow::into_like).collect()
    }

    /// Get a like by ID
    pub async fn find(&self, id: &str) -> Result<Option<Like>, StoreError> {
        let row = sqlx::query_as::<_, LikeRow>(
            "SELECT id, artifact_id, user_email, extra FROM likes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LikeRow::into_like).transpose()
    }

    /// Record a like. Duplicate (artifact, user) pairs are accepted as-is.
    pub async fn create(&self, like: NewLike) -> Result<String, StoreError> {
        let id = new_id();

        sqlx::query("INSERT INTO likes (id, artifact_id, user_email, extra) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&like.artifact_id)
            .bind(&like.user_email)
            .bind(encode_extra(&like.extra)?)
            .execute(&self.pool)
            .await?;

        info!("Created like {} for artifact {:?}", id, like.artifact_id);
        Ok(id)
    }

    /// Delete a like by its own id
    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM likes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("Deleted like {}", id);
        }
        Ok(deleted)
    }
}

/// Raw database row for likes
#[derive(sqlx::FromRow)]
struct LikeRow {
    id: String,
    artifact_id: Option<String>,
    user_email: Option<String>,
    extra: String,
}

impl LikeRow {
    fn into_like(self) -> Result<Like, StoreError> {
        Ok(Like {
            id: self.id,
            artifact_id: self.artifact_id,
            user_email: self.user_email,
            extra: decode_extra(&self.extra)?,
        })
    }
}
