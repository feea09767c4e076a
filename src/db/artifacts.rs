use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{decode_extra, encode_extra, new_id, StoreError};
use crate::models::{Artifact, ArtifactWithLikes, Extra, NewArtifact, UpdateResult};

/// Maximum number of artifacts in the featured listing
pub const FEATURED_LIMIT: i64 = 6;

const SELECT_WITH_LIKES: &str = r#"
    SELECT a.id, a.artifact_name, a.adder_email, a.extra,
           (SELECT COUNT(*) FROM likes l WHERE l.artifact_id = a.id) AS likes_count
    FROM artifacts a"#;

pub struct ArtifactRepository {
    pool: SqlitePool,
}

impl ArtifactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All artifacts in insertion order, optionally narrowed to names containing `name`
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Artifact>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            "SELECT id, artifact_name, adder_email, extra FROM artifacts ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut artifacts = rows
            .into_iter()
            .map(ArtifactRow::into_artifact)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(name) = name {
            artifacts.retain(|a| a.name_contains(name));
        }
        debug!("Listed {} artifacts (filter: {:?})", artifacts.len(), name);
        Ok(artifacts)
    }

    /// Artifacts whose `adder_email` equals `email`
    pub async fn list_by_adder(&self, email: &str) -> Result<Vec<Artifact>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            "SELECT id, artifact_name, adder_email, extra FROM artifacts WHERE adder_email = ? ORDER BY seq",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ArtifactRow::into_artifact).collect()
    }

    /// Get an artifact by ID
    pub async fn find(&self, id: &str) -> Result<Option<Artifact>, StoreError> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT id, artifact_name, adder_email, extra FROM artifacts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArtifactRow::into_artifact).transpose()
    }

    /// Get an artifact by ID together with its like count
    pub async fn get_with_likes(&self, id: &str) -> Result<Option<ArtifactWithLikes>, StoreError> {
        let row = sqlx::query_as::<_, ArtifactLikesRow>(&format!("{SELECT_WITH_LIKES} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ArtifactLikesRow::into_artifact).transpose()
    }

    /// Most liked artifacts, ties kept in insertion order
    pub async fn featured(&self, limit: i64) -> Result<Vec<ArtifactWithLikes>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactLikesRow>(&format!(
            "{SELECT_WITH_LIKES} ORDER BY likes_count DESC, a.seq ASC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ArtifactLikesRow::into_artifact).collect()
    }

    /// Persist a new artifact and return its store-assigned id
    pub async fn create(&self, artifact: NewArtifact) -> Result<String, StoreError> {
        let id = new_id();

        sqlx::query(
            "INSERT INTO artifacts (id, artifact_name, adder_email, extra) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&artifact.artifact_name)
        .bind(&artifact.adder_email)
        .bind(encode_extra(&artifact.extra)?)
        .execute(&self.pool)
        .await?;

        info!("Created artifact {} ({:?})", id, artifact.artifact_name);
        Ok(id)
    }

    /// Shallow-merge `patch` onto the stored artifact
    pub async fn update(&self, id: &str, patch: Extra) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Write before reading: SQLite then waits for the write lock instead of
        // failing when two readers both try to upgrade.
        let claimed = sqlx::query("UPDATE artifacts SET id = id WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if claimed == 0 {
            return Ok(UpdateResult::new(0, 0));
        }

        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT id, artifact_name, adder_email, extra FROM artifacts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = row.map(ArtifactRow::into_artifact).transpose()? else {
            return Ok(UpdateResult::new(0, 0));
        };

        let merged = current.merged(patch);
        if merged == current.body() {
            return Ok(UpdateResult::new(1, 0));
        }

        sqlx::query(
            r#"UPDATE artifacts
               SET artifact_name = ?,
                   adder_email = ?,
                   extra = ?
               WHERE id = ?"#,
        )
        .bind(&merged.artifact_name)
        .bind(&merged.adder_email)
        .bind(encode_extra(&merged.extra)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Updated artifact {}", id);
        Ok(UpdateResult::new(1, 1))
    }

    /// Delete an artifact, returning how many documents were removed
    pub async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("Deleted artifact {}", id);
        }
        Ok(deleted)
    }
}

/// Raw database row for artifacts
#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    artifact_name: Option<String>,
    adder_email: Option<String>,
    extra: String,
}

impl ArtifactRow {
    fn into_artifact(self) -> Result<Artifact, StoreError> {
        Ok(Artifact {
            id: self.id,
            artifact_name: self.artifact_name,
            adder_email: self.adder_email,
            extra: decode_extra(&self.extra)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactLikesRow {
    #[sqlx(flatten)]
    artifact: ArtifactRow,
    likes_count: i64,
}

impl ArtifactLikesRow {
    fn into_artifact(self) -> Result<ArtifactWithLikes, StoreError> {
        Ok(ArtifactWithLikes {
            artifact: self.artifact.into_artifact()?,
            likes_count: self.likes_count,
        })
    }
}
