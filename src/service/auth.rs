use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::github::IdentityProvider;
use crate::models::session::Session;
use tracing::info;

/// The GitHub OAuth login flow: begin issues the redirect, complete
/// validates the callback and attaches the user to the session.
pub struct LoginService<'a> {
    users: &'a dyn UserRepository,
    github: &'a dyn IdentityProvider,
}

impl<'a> LoginService<'a> {
    pub fn new(users: &'a dyn UserRepository, github: &'a dyn IdentityProvider) -> Self {
        LoginService { users, github }
    }

    /// Start a login attempt: arm the session's CSRF token and return the
    /// provider URL to redirect the browser to.
    pub fn begin(&self, session: &mut Session) -> String {
        let state = session.begin_oauth();
        self.github.authorize_url(&state)
    }

    /// Handle the provider callback. The pending state token is consumed
    /// before anything else happens, so a failed callback can never be
    /// replayed; the user must restart from `begin`.
    pub async fn complete(&self, session: &mut Session, state: &str, code: &str) -> Result<i64, AppError> {
        let Some(expected) = session.take_oauth_state() else {
            return Err(AppError::BadRequest("login flow was not initiated from this session".to_string()));
        };

        if expected.to_string() != state {
            return Err(AppError::BadRequest("invalid oauth state".to_string()));
        }

        let token = self.github.exchange_code(code).await?;
        let identity = self.github.identity(&token).await?;
        let email = self
            .github
            .primary_email(&token)
            .await?
            .ok_or_else(|| AppError::BadRequest("GitHub account has no primary verified email".to_string()))?;

        let user_id = self.users.github_login(identity.account_id, &email, &token).await?;
        session.log_in(user_id);

        info!(user_id = user_id, login = %identity.login, "logged in as GitHub user");

        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::Session;
    use crate::test_utils::{MockProvider, MockRepository};
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn session() -> Session {
        Session::fresh(Utc::now())
    }

    #[rocket::async_test]
    async fn complete_without_pending_state_is_rejected() {
        let users = MockRepository::new();
        let github = MockProvider::new();
        let service = LoginService::new(&users, &github);

        let mut session = session();
        let result = service.complete(&mut session, "any-state", "code").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(github.exchanges.load(Ordering::SeqCst), 0, "code must not be exchanged");
        assert!(!session.logged_in());
    }

    #[rocket::async_test]
    async fn complete_with_mismatched_state_is_rejected_and_token_burned() {
        let users = MockRepository::new();
        let github = MockProvider::new();
        let service = LoginService::new(&users, &github);

        let mut session = session();
        let state = session.begin_oauth();

        let result = service.complete(&mut session, "wrong-state", "code").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(github.exchanges.load(Ordering::SeqCst), 0);

        // The token was consumed by the failed attempt: retrying with the
        // value that would have matched is rejected too.
        let retry = service.complete(&mut session, &state.to_string(), "code").await;
        assert!(matches!(retry, Err(AppError::BadRequest(_))));
        assert!(!session.logged_in());
    }

    #[rocket::async_test]
    async fn complete_logs_the_session_in() {
        let users = MockRepository::new();
        let github = MockProvider::new();
        let service = LoginService::new(&users, &github);

        let mut session = session();
        let state = session.begin_oauth();

        let user_id = service.complete(&mut session, &state.to_string(), "code").await.unwrap();

        assert!(session.logged_in());
        assert_eq!(session.data.user_id, user_id);
        assert_eq!(session.data.oauth_state, None, "token is spent on success as well");
        assert_eq!(github.exchanges.load(Ordering::SeqCst), 1);

        let user = users.get_user(user_id).await.unwrap().expect("user created on first login");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.github_id, 10);
        assert!(user.credential().is_some());
    }

    #[rocket::async_test]
    async fn second_login_reuses_the_user() {
        let users = MockRepository::new();
        let github = MockProvider::new();
        let service = LoginService::new(&users, &github);

        let mut first = session();
        let state = first.begin_oauth();
        let first_id = service.complete(&mut first, &state.to_string(), "code").await.unwrap();

        let mut second = session();
        let state = second.begin_oauth();
        let second_id = service.complete(&mut second, &state.to_string(), "code").await.unwrap();

        assert_eq!(first_id, second_id);
    }
}
