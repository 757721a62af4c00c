use crate::database::postgres_repository::PostgresRepository;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use crate::models::user::User;
use crate::service::session::{COOKIE_NAME, COOKIE_PATH, SessionStore};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::time::OffsetDateTime;
use rocket::Response;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// The per-request session cell: populated once by the session guard, read
/// back by [`SessionSaver`]. `None` records a failed resolve.
type SessionCell = Option<Arc<Mutex<Session>>>;

/// Request guard resolving the session addressed by the `sid` cookie, or
/// creating one. Cached per request; the only failure is a storage error,
/// which aborts the request with a 500. New sessions get their cookie here.
pub struct SessionGuard(pub Arc<Mutex<Session>>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionGuard {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, AppError> {
        let cell = req
            .local_cache_async(async {
                let Some(pool) = req.rocket().state::<PgPool>() else {
                    error!("database pool is not managed; cannot resolve sessions");
                    return None;
                };

                let repo = PostgresRepository { pool: pool.clone() };
                let store = SessionStore::new(&repo);
                let cookie = req.cookies().get(COOKIE_NAME).map(|c| c.value().to_string());

                match store.resolve(cookie.as_deref()).await {
                    Ok(session) => {
                        if session.is_new() {
                            set_session_cookie(req.cookies(), &session);
                        }
                        Some(Arc::new(Mutex::new(session)))
                    }
                    Err(e) => {
                        error!(error = ?e, "could not resolve session");
                        None
                    }
                }
            })
            .await;

        match cell {
            Some(session) => Outcome::Success(SessionGuard(session.clone())),
            None => Outcome::Error((Status::InternalServerError, AppError::SessionUnavailable)),
        }
    }
}

/// Request guard for routes that need a logged-in user. 401 when the
/// session is anonymous or references a user that no longer exists.
pub struct CurrentUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, AppError> {
        let session = match req.guard::<SessionGuard>().await {
            Outcome::Success(session) => session,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let user_id = session.0.lock().await.data.user_id;
        if user_id == 0 {
            return Outcome::Error((Status::Unauthorized, AppError::Unauthorized));
        }

        let Some(pool) = req.rocket().state::<PgPool>() else {
            return Outcome::Error((Status::InternalServerError, AppError::SessionUnavailable));
        };
        let repo = PostgresRepository { pool: pool.clone() };

        match repo.get_user(user_id).await {
            Ok(Some(user)) => Outcome::Success(CurrentUser(user)),
            // Session points at a user that no longer exists.
            Ok(None) => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

pub(crate) fn set_session_cookie(cookies: &CookieJar<'_>, session: &Session) {
    let mut cookie = Cookie::build((COOKIE_NAME, session.id().to_string()))
        .path(COOKIE_PATH)
        .secure(true)
        .http_only(true);
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(session.expires_at().timestamp()) {
        cookie = cookie.expires(expires);
    }
    cookies.add(cookie);
}

pub(crate) fn remove_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::build(COOKIE_NAME).path(COOKIE_PATH));
}

/// Persists the request's session, if one was resolved, after the handler
/// has run, including on error responses. A failure here is logged rather
/// than surfaced; the response is already on its way out and a disconnected
/// client must not lose session durability silently.
pub struct SessionSaver;

#[rocket::async_trait]
impl Fairing for SessionSaver {
    fn info(&self) -> Info {
        Info {
            name: "Session Saver",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, _res: &mut Response<'r>) {
        let cell: &SessionCell = req.local_cache(|| None);
        let Some(session) = cell else {
            return;
        };
        let Some(pool) = req.rocket().state::<PgPool>() else {
            return;
        };

        let repo = PostgresRepository { pool: pool.clone() };
        let store = SessionStore::new(&repo);

        let mut session = session.lock().await;
        if let Err(e) = store.save(&mut session).await {
            error!(error = ?e, session_id = %session.id(), "could not save session");
        }
    }
}
