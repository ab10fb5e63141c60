//! Explicit state machine for in-flight logins.
//!
//! Each login attempt is one [`LoginFlow`] value: created `Pending` when
//! the gate redirects the browser to the provider, resolved to
//! `Authenticated` or `Rejected` once the callback comes home. Keeping the
//! flow a tagged value instead of control flow inside the handlers lets
//! the CSRF and replay rules be exercised without any HTTP plumbing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How long a pending login may wait for its callback.
const PENDING_TTL: Duration = Duration::from_secs(600);

/// One login attempt, from the first redirect until the callback resolves.
#[derive(Debug, Clone)]
pub enum LoginFlow {
    /// Redirect issued; waiting for the provider to call back with a code.
    Pending {
        return_to: String,
        issued_at: Instant,
    },
    /// Identity verified and present on the allow list.
    Authenticated { email: String, return_to: String },
    /// Identity verified but not on the allow list.
    Rejected { email: String },
}

impl LoginFlow {
    fn pending(return_to: String) -> Self {
        LoginFlow::Pending {
            return_to,
            issued_at: Instant::now(),
        }
    }

    /// Advance the flow with a verified identity and its allow-list
    /// verdict. Flows that already resolved stay as they are.
    pub fn resolve(self, email: &str, allowed: bool) -> LoginFlow {
        match self {
            LoginFlow::Pending { return_to, .. } => {
                if allowed {
                    LoginFlow::Authenticated {
                        email: email.to_string(),
                        return_to,
                    }
                } else {
                    LoginFlow::Rejected {
                        email: email.to_string(),
                    }
                }
            }
            resolved => resolved,
        }
    }
}

/// Pending logins keyed by their single-use CSRF state token.
#[derive(Debug)]
pub struct LoginFlows {
    ttl: Duration,
    inner: Mutex<HashMap<String, LoginFlow>>,
}

impl LoginFlows {
    pub fn new() -> Self {
        Self {
            ttl: PENDING_TTL,
            inner: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a flow, returning the state token to round-trip through the
    /// provider. Abandoned pending flows are swept here.
    pub fn begin(&self, return_to: String) -> String {
        let state = Uuid::new_v4().to_string();
        let mut flows = self.inner.lock().unwrap();
        flows.retain(|_, flow| match flow {
            LoginFlow::Pending { issued_at, .. } => issued_at.elapsed() < self.ttl,
            _ => false,
        });
        flows.insert(state.clone(), LoginFlow::pending(return_to));
        state
    }

    /// Take the pending flow matching a callback's state token.
    ///
    /// Returns `None` when the token was never issued, was already used,
    /// or waited past its time-to-live; callers must treat all three as a
    /// CSRF mismatch. The entry is removed either way, so a state token
    /// can never be replayed.
    pub fn take(&self, state: &str) -> Option<LoginFlow> {
        let flow = self.inner.lock().unwrap().remove(state)?;
        match &flow {
            LoginFlow::Pending { issued_at, .. } if issued_at.elapsed() < self.ttl => Some(flow),
            _ => None,
        }
    }
}

impl Default for LoginFlows {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a return-to target to a same-origin relative path.
///
/// Absolute URLs, scheme-relative `//host` forms and backslash variants
/// all fall back to the site root, closing the open-redirect hole on the
/// callback.
pub fn sanitize_return_to(path: &str) -> String {
    if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') {
        path.to_string()
    } else {
        "/".to_string()
    }
}
