use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A raw `sessions` row: the serialized payload plus its expiry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSession {
    pub data: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load_session(&self, id: &Uuid) -> Result<Option<StoredSession>, AppError>;
    async fn upsert_session(&self, id: &Uuid, data: &[u8], expires_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl SessionRepository for PostgresRepository {
    async fn load_session(&self, id: &Uuid) -> Result<Option<StoredSession>, AppError> {
        let stored = sqlx::query_as::<_, StoredSession>(
            r#"
            SELECT data, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn upsert_session(&self, id: &Uuid, data: &[u8], expires_at: DateTime<Utc>) -> Result<(), AppError> {
        // Expiry is fixed at creation; on conflict only the payload moves.
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(id)
        .bind(data)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
