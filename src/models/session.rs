use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The persisted part of a session. This is what gets serialized into the
/// `sessions` row; everything else on [`Session`] is request-local state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Our user id; 0 until a GitHub login succeeds.
    pub user_id: i64,
    /// CSRF token for an in-flight GitHub OAuth round-trip.
    pub oauth_state: Option<Uuid>,
}

/// A browser session, addressed by the `sid` cookie.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    expires_at: DateTime<Utc>,
    new: bool,
    /// Serialization of `data` as last persisted (or as created), used to
    /// skip writes for untouched sessions.
    snapshot: Vec<u8>,
    pub data: SessionData,
}

impl Session {
    pub(crate) fn fresh(expires_at: DateTime<Utc>) -> Self {
        let data = SessionData::default();
        let snapshot = serde_json::to_vec(&data).expect("default session data serializes");
        Session {
            id: Uuid::new_v4(),
            expires_at,
            new: true,
            snapshot,
            data,
        }
    }

    pub(crate) fn loaded(id: Uuid, expires_at: DateTime<Utc>, snapshot: Vec<u8>, data: SessionData) -> Self {
        Session {
            id,
            expires_at,
            new: false,
            snapshot,
            data,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether this session was created for the current request and a
    /// `Set-Cookie` still needs to be issued.
    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn logged_in(&self) -> bool {
        self.data.user_id != 0
    }

    pub fn log_in(&mut self, user_id: i64) {
        self.data.user_id = user_id;
    }

    /// Start a GitHub OAuth round-trip: store and return a fresh state token.
    /// Any previously pending token is replaced.
    pub fn begin_oauth(&mut self) -> Uuid {
        let state = Uuid::new_v4();
        self.data.oauth_state = Some(state);
        state
    }

    /// Consume the pending OAuth state token. The token is cleared no matter
    /// what the caller decides about it, so it can never be presented twice.
    pub fn take_oauth_state(&mut self) -> Option<Uuid> {
        self.data.oauth_state.take()
    }

    pub(crate) fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    pub(crate) fn set_snapshot(&mut self, snapshot: Vec<u8>) {
        self.snapshot = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_in() {
        let tests = [(0i64, false), (1, true), (42, true)];

        for (user_id, want) in tests {
            let mut session = Session::fresh(Utc::now());
            session.data.user_id = user_id;
            assert_eq!(session.logged_in(), want, "user_id {}", user_id);
        }
    }

    #[test]
    fn oauth_state_is_single_use() {
        let mut session = Session::fresh(Utc::now());
        let state = session.begin_oauth();

        assert_eq!(session.take_oauth_state(), Some(state));
        // Consumed once, gone forever; a replayed callback sees nothing.
        assert_eq!(session.take_oauth_state(), None);
    }

    #[test]
    fn oauth_state_cleared_even_when_caller_rejects() {
        let mut session = Session::fresh(Utc::now());
        session.begin_oauth();

        // The caller compares the token against a mismatched `state` param
        // and rejects, but the token must already be gone.
        let _mismatch = session.take_oauth_state();
        assert_eq!(session.data.oauth_state, None);
    }

    #[test]
    fn begin_oauth_replaces_pending_token() {
        let mut session = Session::fresh(Utc::now());
        let first = session.begin_oauth();
        let second = session.begin_oauth();

        assert_ne!(first, second);
        assert_eq!(session.take_oauth_state(), Some(second));
    }

    #[test]
    fn session_data_round_trips() {
        let data = SessionData {
            user_id: 7,
            oauth_state: Some(Uuid::new_v4()),
        };
        let bytes = serde_json::to_vec(&data).unwrap();
        let back: SessionData = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, data);
    }
}
