use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::installation::Installation;

/// Turbine's installation registry: which GitHub App installations the
/// product has observed, and whether each is currently enabled.
#[async_trait::async_trait]
pub trait InstallationRegistry: Send + Sync {
    /// Installations whose account id is in `account_ids`. Empty result is
    /// not an error.
    async fn list_installations(&self, account_ids: &[i64]) -> Result<Vec<Installation>, AppError>;

    async fn set_installation_enabled(&self, installation_id: i64, enabled: bool) -> Result<(), AppError>;
}

/// Which installations each user has switched on. Independent of the
/// registry's own enabled bit; reconciliation reads both sides.
#[async_trait::async_trait]
pub trait UserInstallations: Send + Sync {
    async fn enabled_installation_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Idempotent: enabling an already-enabled installation is a no-op.
    async fn record_enabled(&self, user_id: i64, installation_id: i64) -> Result<(), AppError>;

    async fn record_disabled(&self, user_id: i64, installation_id: i64) -> Result<(), AppError>;

    /// Any error reads as "not enabled by this user".
    async fn installation_enabled_by_user(&self, user_id: i64, installation_id: i64) -> bool;
}

#[async_trait::async_trait]
impl InstallationRegistry for PostgresRepository {
    async fn list_installations(&self, account_ids: &[i64]) -> Result<Vec<Installation>, AppError> {
        let installations = sqlx::query_as::<_, Installation>(
            r#"
            SELECT installation_id, account_id
            FROM ci_installations
            WHERE account_id = ANY($1)
            "#,
        )
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(installations)
    }

    async fn set_installation_enabled(&self, installation_id: i64, enabled: bool) -> Result<(), AppError> {
        let query = if enabled {
            "UPDATE ci_installations SET enabled_at = now() WHERE installation_id = $1"
        } else {
            "UPDATE ci_installations SET enabled_at = NULL WHERE installation_id = $1"
        };
        sqlx::query(query).bind(installation_id).execute(&self.pool).await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserInstallations for PostgresRepository {
    async fn enabled_installation_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT installation_id FROM user_installations WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn record_enabled(&self, user_id: i64, installation_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_installations (user_id, installation_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(installation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_disabled(&self, user_id: i64, installation_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_installations WHERE user_id = $1 AND installation_id = $2")
            .bind(user_id)
            .bind(installation_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn installation_enabled_by_user(&self, user_id: i64, installation_id: i64) -> bool {
        let count: Result<i64, _> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_installations WHERE user_id = $1 AND installation_id = $2",
        )
        .bind(user_id)
        .bind(installation_id)
        .fetch_one(&self.pool)
        .await;

        matches!(count, Ok(n) if n > 0)
    }
}
