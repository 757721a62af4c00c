use crate::database::session::SessionRepository;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use chrono::{Duration, Utc};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "sid";
pub const COOKIE_PATH: &str = "/";

/// How long a session lives, fixed at creation and never refreshed.
const RETENTION_DAYS: i64 = 90;

/// Durable session storage with diff-gated writes. Every anomaly short of a
/// storage failure degrades to a fresh, unauthenticated session.
pub struct SessionStore<'a> {
    repo: &'a dyn SessionRepository,
}

impl<'a> SessionStore<'a> {
    pub fn new(repo: &'a dyn SessionRepository) -> Self {
        SessionStore { repo }
    }

    /// Resolve the session addressed by the `sid` cookie value, or create a
    /// new one. Only a storage read failure is an error; a missing cookie,
    /// an unparseable id, an unknown id, or a corrupt row all fall back to
    /// a fresh session.
    pub async fn resolve(&self, cookie: Option<&str>) -> Result<Session, AppError> {
        let Some(value) = cookie else {
            return Ok(self.create());
        };

        let Ok(id) = Uuid::parse_str(value) else {
            return Ok(self.create());
        };

        let Some(stored) = self.repo.load_session(&id).await? else {
            return Ok(self.create());
        };

        match serde_json::from_slice(&stored.data) {
            Ok(data) => Ok(Session::loaded(id, stored.expires_at, stored.data, data)),
            // Corrupt payload: discard the row's contents and start over.
            Err(_) => Ok(self.create()),
        }
    }

    /// A new in-memory session, not yet persisted. The snapshot is taken
    /// here, so an untouched session never reaches storage.
    pub fn create(&self) -> Session {
        Session::fresh(Utc::now() + Duration::days(RETENTION_DAYS))
    }

    /// Persist the session if its serialized form changed since load or
    /// creation. Safe to call unconditionally at end of request.
    pub async fn save(&self, session: &mut Session) -> Result<(), AppError> {
        let data = serde_json::to_vec(&session.data)?;
        if data == session.snapshot() {
            return Ok(());
        }

        self.repo.upsert_session(&session.id(), &data, session.expires_at()).await?;
        session.set_snapshot(data);

        Ok(())
    }

    pub async fn delete(&self, session: &Session) -> Result<(), AppError> {
        self.repo.delete_session(&session.id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSessionRepo;
    use std::sync::atomic::Ordering;

    #[rocket::async_test]
    async fn resolve_missing_cookie_creates() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let session = store.resolve(None).await.unwrap();

        assert!(session.is_new());
        assert!(!session.logged_in());
        assert_eq!(repo.loads.load(Ordering::SeqCst), 0, "no cookie means no lookup");
    }

    #[rocket::async_test]
    async fn resolve_malformed_cookie_creates() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let session = store.resolve(Some("not-a-uuid")).await.unwrap();

        assert!(session.is_new());
        assert_eq!(repo.loads.load(Ordering::SeqCst), 0, "malformed id never reaches storage");
    }

    #[rocket::async_test]
    async fn resolve_unknown_id_creates() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let session = store.resolve(Some("7a6e02a0-5ef8-43f9-95f5-2708863cc753")).await.unwrap();

        assert!(session.is_new());
        assert_ne!(session.id().to_string(), "7a6e02a0-5ef8-43f9-95f5-2708863cc753");
    }

    #[rocket::async_test]
    async fn resolve_corrupt_row_creates() {
        let id = Uuid::new_v4();
        let repo = MockSessionRepo::with_row(id, b"notjson".to_vec());
        let store = SessionStore::new(&repo);

        let session = store.resolve(Some(&id.to_string())).await.unwrap();

        assert!(session.is_new());
        assert_ne!(session.id(), id);
    }

    #[rocket::async_test]
    async fn resolve_storage_error_propagates() {
        let repo = MockSessionRepo::failing();
        let store = SessionStore::new(&repo);

        let result = store.resolve(Some(&Uuid::new_v4().to_string())).await;

        assert!(matches!(result, Err(AppError::Db { .. })));
    }

    #[rocket::async_test]
    async fn resolve_loads_existing_session() {
        let id = Uuid::new_v4();
        let repo = MockSessionRepo::with_row(id, br#"{"user_id":7,"oauth_state":null}"#.to_vec());
        let store = SessionStore::new(&repo);

        let session = store.resolve(Some(&id.to_string())).await.unwrap();

        assert!(!session.is_new(), "loaded session must not re-issue the cookie");
        assert_eq!(session.id(), id);
        assert_eq!(session.data.user_id, 7);
    }

    #[rocket::async_test]
    async fn save_untouched_fresh_session_writes_nothing() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let mut session = store.create();
        store.save(&mut session).await.unwrap();

        assert_eq!(repo.upserts.load(Ordering::SeqCst), 0);
    }

    #[rocket::async_test]
    async fn save_untouched_loaded_session_writes_nothing() {
        let id = Uuid::new_v4();
        let repo = MockSessionRepo::with_row(id, br#"{"user_id":7,"oauth_state":null}"#.to_vec());
        let store = SessionStore::new(&repo);

        let mut session = store.resolve(Some(&id.to_string())).await.unwrap();
        store.save(&mut session).await.unwrap();

        assert_eq!(repo.upserts.load(Ordering::SeqCst), 0);
    }

    #[rocket::async_test]
    async fn save_after_mutation_upserts_exactly_once() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let mut session = store.create();
        session.log_in(42);
        store.save(&mut session).await.unwrap();
        assert_eq!(repo.upserts.load(Ordering::SeqCst), 1);

        // The snapshot was refreshed: saving again is a no-op.
        store.save(&mut session).await.unwrap();
        assert_eq!(repo.upserts.load(Ordering::SeqCst), 1);
    }

    #[rocket::async_test]
    async fn saved_session_round_trips_through_storage() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let mut session = store.create();
        session.log_in(42);
        session.begin_oauth();
        store.save(&mut session).await.unwrap();

        let reloaded = store.resolve(Some(&session.id().to_string())).await.unwrap();
        assert_eq!(reloaded.data, session.data);
    }

    #[rocket::async_test]
    async fn delete_removes_row() {
        let repo = MockSessionRepo::new();
        let store = SessionStore::new(&repo);

        let mut session = store.create();
        session.log_in(42);
        store.save(&mut session).await.unwrap();

        store.delete(&session).await.unwrap();

        let replacement = store.resolve(Some(&session.id().to_string())).await.unwrap();
        assert!(replacement.is_new());
    }
}
