//! In-memory session store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
struct Session {
    email: String,
    created_at: Instant,
}

/// Mutex-guarded map of opaque session tokens to authenticated identities.
///
/// Sessions carry a fixed time-to-live from creation. Expired entries
/// behave exactly like absent ones and are evicted at lookup rather than
/// by a background task.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session for `email` and return its opaque token.
    pub fn create(&self, email: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.inner.lock().unwrap();
        sessions.insert(
            token.clone(),
            Session {
                email: email.to_string(),
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Resolve a token to its email, or `None` for unknown and expired
    /// tokens alike. Expired entries are removed on the way out.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let mut sessions = self.inner.lock().unwrap();
        match sessions.get(token) {
            Some(session) if session.created_at.elapsed() < self.ttl => {
                Some(session.email.clone())
            }
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Drop a session. Unknown tokens are ignored.
    pub fn invalidate(&self, token: &str) {
        self.inner.lock().unwrap().remove(token);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_session_resolves_to_its_email() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create("me@example.com");

        assert_eq!(store.lookup(&token), Some("me@example.com".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_token_is_absent() {
        let store = SessionStore::new(Duration::from_secs(60));

        assert_eq!(store.lookup("no-such-token"), None);
    }

    #[test]
    fn expired_session_reads_like_a_missing_one_and_is_evicted() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create("me@example.com");

        assert_eq!(store.lookup(&token), None);
        // the lookup evicted the entry
        assert!(store.is_empty());
        assert_eq!(store.lookup(&token), store.lookup("never-created"));
    }

    #[test]
    fn invalidate_removes_the_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create("me@example.com");

        store.invalidate(&token);

        assert_eq!(store.lookup(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn tokens_are_unique_per_session() {
        let store = SessionStore::new(Duration::from_secs(60));

        let first = store.create("me@example.com");
        let second = store.create("me@example.com");

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }
}
