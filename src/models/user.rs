use crate::github::AccessToken;
use sqlx::types::Json;

/// A Turbine console user. Created on first GitHub login and updated on
/// every successful login after that.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub github_id: i64,
    /// Stored OAuth credential; None if the user has never completed a
    /// login (or the token was cleared).
    pub github_token: Option<Json<AccessToken>>,
    /// Payment-provider customer reference. Carried for the billing
    /// integration, never dereferenced here.
    pub billing_customer_id: Option<String>,
}

impl User {
    pub fn credential(&self) -> Option<&AccessToken> {
        self.github_token.as_deref()
    }
}
