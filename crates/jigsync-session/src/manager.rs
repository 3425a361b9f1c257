//! The session manager: issues client identities and resumes them.
//!
//! `SessionManager` is not thread-safe by itself. The server keeps it
//! behind a mutex, separate from the room registry lock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jigsync_protocol::ClientId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Issues and tracks client identities.
pub struct SessionManager {
    /// Known sessions, keyed by client id.
    sessions: HashMap<ClientId, Session>,

    /// Resume token → client id. Kept in sync with `sessions`.
    tokens: HashMap<String, ClientId>,

    /// Next id to hand out. Ids are never reused for the life of the
    /// process.
    next_id: u64,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Issues a brand-new identity for a fresh connection.
    pub fn open(&mut self) -> &Session {
        let client_id = ClientId(self.next_id);
        self.next_id += 1;

        let token = generate_token();
        self.tokens.insert(token.clone(), client_id);
        tracing::info!(%client_id, "session opened");

        self.sessions.entry(client_id).or_insert(Session {
            client_id,
            state: SessionState::Connected,
            resume_token: token,
        })
    }

    /// Marks a client's connection as gone and starts the grace period.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(&mut self, client_id: ClientId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&client_id)
            .ok_or(SessionError::NotFound(client_id))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        tracing::debug!(%client_id, "session disconnected, grace period started");
        Ok(())
    }

    /// Binds a new connection to the identity that owns `token`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not recognized
    /// - [`SessionError::AlreadyConnected`]: another connection holds it
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    pub fn resume(&mut self, token: &str) -> Result<&Session, SessionError> {
        let client_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)?;

        let grace = self.grace();
        let session = self
            .sessions
            .get_mut(&client_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Disconnected { since } => {
                if is_past_grace(since, grace) {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(client_id));
                }
                session.state = SessionState::Connected;
                tracing::info!(%client_id, "session resumed");
                Ok(&*session)
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(client_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(client_id)),
        }
    }

    /// Forgets a session immediately, token included.
    ///
    /// Used for the throwaway identity a connection was given before it
    /// resumed an older one.
    pub fn discard(&mut self, client_id: ClientId) -> Option<Session> {
        let session = self.sessions.remove(&client_id)?;
        self.tokens.remove(&session.resume_token);
        tracing::debug!(%client_id, "session discarded");
        Some(session)
    }

    /// Expires disconnected sessions whose grace period has elapsed.
    ///
    /// Returns the ids that were expired by this call.
    pub fn expire_stale(&mut self) -> Vec<ClientId> {
        let grace = self.grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = session.state {
                if is_past_grace(since, grace) {
                    session.state = SessionState::Expired;
                    expired.push(session.client_id);
                    tracing::debug!(client_id = %session.client_id, "session expired");
                }
            }
        }

        expired
    }

    /// Removes expired sessions and invalidates their tokens.
    pub fn cleanup_expired(&mut self) {
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                self.tokens.remove(&session.resume_token);
                false
            } else {
                true
            }
        });
    }

    /// Looks up a session by client id.
    pub fn get(&self, client_id: &ClientId) -> Option<&Session> {
        self.sessions.get(client_id)
    }

    /// Returns the number of tracked sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.resume_grace_secs)
    }
}

fn is_past_grace(since: Instant, grace: Duration) -> bool {
    grace.is_zero() || since.elapsed() > grace
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Time-dependent behavior is tested with two fixed configs instead of
    //! sleeping: grace 0 (resume always fails) and grace 3600 (never
    //! expires during a test).

    use super::*;

    fn manager_with_no_grace() -> SessionManager {
        SessionManager::new(SessionConfig { resume_grace_secs: 0 })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig { resume_grace_secs: 3600 })
    }

    fn open(mgr: &mut SessionManager) -> (ClientId, String) {
        let session = mgr.open();
        (session.client_id, session.resume_token.clone())
    }

    // =====================================================================
    // open()
    // =====================================================================

    #[test]
    fn test_open_returns_connected_session_with_token() {
        let mut mgr = manager_with_long_grace();
        let session = mgr.open();

        assert!(matches!(session.state, SessionState::Connected));
        assert_eq!(session.resume_token.len(), 32);
        assert!(session.resume_token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_open_issues_distinct_ids_and_tokens() {
        let mut mgr = manager_with_long_grace();
        let (id1, token1) = open(&mut mgr);
        let (id2, token2) = open(&mut mgr);

        assert_ne!(id1, id2);
        assert_ne!(token1, token2);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn test_open_never_reuses_discarded_ids() {
        let mut mgr = manager_with_long_grace();
        let (id1, _) = open(&mut mgr);
        mgr.discard(id1);
        let (id2, _) = open(&mut mgr);
        assert_ne!(id1, id2);
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[test]
    fn test_disconnect_marks_session_disconnected() {
        let mut mgr = manager_with_long_grace();
        let (id, _) = open(&mut mgr);

        mgr.disconnect(id).unwrap();

        let session = mgr.get(&id).expect("session should still exist");
        assert!(matches!(session.state, SessionState::Disconnected { .. }));
    }

    #[test]
    fn test_disconnect_unknown_client_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        assert_eq!(
            mgr.disconnect(ClientId(99)),
            Err(SessionError::NotFound(ClientId(99)))
        );
    }

    // =====================================================================
    // resume()
    // =====================================================================

    #[test]
    fn test_resume_within_grace_restores_identity() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = open(&mut mgr);
        mgr.disconnect(id).unwrap();

        let session = mgr.resume(&token).expect("should resume");
        assert_eq!(session.client_id, id);
        assert!(matches!(session.state, SessionState::Connected));
    }

    #[test]
    fn test_resume_unknown_token_fails() {
        let mut mgr = manager_with_long_grace();
        assert_eq!(mgr.resume("nope").unwrap_err(), SessionError::InvalidToken);
    }

    #[test]
    fn test_resume_connected_session_fails() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = open(&mut mgr);
        assert_eq!(
            mgr.resume(&token).unwrap_err(),
            SessionError::AlreadyConnected(id)
        );
    }

    #[test]
    fn test_resume_without_grace_expires() {
        let mut mgr = manager_with_no_grace();
        let (id, token) = open(&mut mgr);
        mgr.disconnect(id).unwrap();

        assert_eq!(mgr.resume(&token).unwrap_err(), SessionError::SessionExpired(id));
        assert!(matches!(mgr.get(&id).unwrap().state, SessionState::Expired));
    }

    // =====================================================================
    // expire_stale() / cleanup_expired() / discard()
    // =====================================================================

    #[test]
    fn test_expire_stale_only_touches_disconnected_sessions() {
        let mut mgr = manager_with_no_grace();
        let (gone, _) = open(&mut mgr);
        let (live, _) = open(&mut mgr);
        mgr.disconnect(gone).unwrap();

        assert_eq!(mgr.expire_stale(), vec![gone]);
        assert!(matches!(mgr.get(&live).unwrap().state, SessionState::Connected));
    }

    #[test]
    fn test_expire_stale_skips_sessions_within_grace() {
        let mut mgr = manager_with_long_grace();
        let (id, _) = open(&mut mgr);
        mgr.disconnect(id).unwrap();
        assert!(mgr.expire_stale().is_empty());
    }

    #[test]
    fn test_cleanup_expired_invalidates_token() {
        let mut mgr = manager_with_no_grace();
        let (id, token) = open(&mut mgr);
        mgr.disconnect(id).unwrap();
        mgr.expire_stale();
        mgr.cleanup_expired();

        assert!(mgr.get(&id).is_none());
        assert!(mgr.is_empty());
        assert_eq!(mgr.resume(&token).unwrap_err(), SessionError::InvalidToken);
    }

    #[test]
    fn test_discard_forgets_session_and_token() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = open(&mut mgr);

        assert!(mgr.discard(id).is_some());
        assert!(mgr.discard(id).is_none());
        assert_eq!(mgr.resume(&token).unwrap_err(), SessionError::InvalidToken);
    }

    #[test]
    fn test_full_lifecycle_open_drop_resume_drop_expire() {
        let mut mgr = manager_with_long_grace();
        let (id, token) = open(&mut mgr);

        mgr.disconnect(id).unwrap();
        assert_eq!(mgr.resume(&token).unwrap().client_id, id);
        mgr.disconnect(id).unwrap();
        assert_eq!(mgr.resume(&token).unwrap().client_id, id);
        assert_eq!(mgr.len(), 1);
    }
}
