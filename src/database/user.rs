use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::github::AccessToken;
use crate::models::user::User;
use sqlx::types::Json;

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Assign the token to the user with this GitHub id, creating the user
    /// if they have never logged in before. Email and credential are
    /// refreshed on every login. Returns our user id.
    async fn github_login(&self, github_id: i64, email: &str, token: &AccessToken) -> Result<i64, AppError>;
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, github_id, github_token, billing_customer_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn github_login(&self, github_id: i64, email: &str, token: &AccessToken) -> Result<i64, AppError> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE github_id = $1")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE users SET email = $1, github_token = $2 WHERE id = $3")
                    .bind(email)
                    .bind(Json(token))
                    .bind(id)
                    .execute(&self.pool)
                    .await?;

                Ok(id)
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO users (email, github_id, github_token)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(email)
                .bind(github_id)
                .bind(Json(token))
                .fetch_one(&self.pool)
                .await?;

                Ok(id)
            }
        }
    }
}
