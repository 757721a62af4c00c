use crate::auth::{SessionGuard, remove_session_cookie};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::github::GithubClient;
use crate::service::auth::LoginService;
use crate::service::session::SessionStore;
use rocket::http::CookieJar;
use rocket::response::Redirect;
use rocket::{State, routes};
use sqlx::PgPool;
use tracing::warn;

#[rocket::get("/login")]
pub async fn login(pool: &State<PgPool>, github: &State<GithubClient>, session: SessionGuard) -> Redirect {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = LoginService::new(&repo, github.inner());

    let mut session = session.0.lock().await;
    Redirect::temporary(service.begin(&mut session))
}

#[rocket::get("/callback?<state>&<code>")]
pub async fn callback(
    pool: &State<PgPool>,
    github: &State<GithubClient>,
    session: SessionGuard,
    state: Option<String>,
    code: Option<String>,
) -> Result<Redirect, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = LoginService::new(&repo, github.inner());

    // An absent parameter behaves like a mismatched one: validation fails
    // and the pending state token is burned either way.
    let mut session = session.0.lock().await;
    service
        .complete(&mut session, &state.unwrap_or_default(), &code.unwrap_or_default())
        .await?;

    Ok(Redirect::temporary("/console"))
}

#[rocket::get("/logout")]
pub async fn logout(pool: &State<PgPool>, session: SessionGuard, cookies: &CookieJar<'_>) -> Redirect {
    let session = session.0.lock().await;
    if session.logged_in() {
        let repo = PostgresRepository { pool: pool.inner().clone() };
        let store = SessionStore::new(&repo);
        if let Err(e) = store.delete(&session).await {
            warn!(error = ?e, session_id = %session.id(), "could not delete session");
        }
        remove_session_cookie(cookies);
    }

    Redirect::to("/")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, callback, logout]
}

#[cfg(test)]
mod tests {
    use crate::build_rocket;
    use crate::test_utils::test_config;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn login_issues_session_cookie_and_redirects_to_github() {
        let client = Client::tracked(build_rocket(test_config())).await.expect("valid rocket instance");

        let response = client.get("/github/login").dispatch().await;

        assert_eq!(response.status(), Status::TemporaryRedirect);

        let location = response.headers().get_one("Location").expect("redirect location");
        assert!(location.starts_with("https://github.com/login/oauth/authorize"), "{location}");
        assert!(location.contains("state="));

        let cookie = response.cookies().get("sid").expect("session cookie issued");
        assert_eq!(cookie.path(), Some("/"));
    }

    #[rocket::async_test]
    async fn callback_without_initiated_flow_is_rejected() {
        let client = Client::tracked(build_rocket(test_config())).await.expect("valid rocket instance");

        // No cookie: the request gets a fresh session with no pending OAuth
        // state, so the callback must be treated as forged.
        let response = client.get("/github/callback?state=abc&code=def").dispatch().await;

        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn logout_of_anonymous_session_redirects_home() {
        let client = Client::tracked(build_rocket(test_config())).await.expect("valid rocket instance");

        let response = client.get("/github/logout").dispatch().await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/"));
    }
}
