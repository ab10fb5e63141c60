//! The request gate: every request passes here before touching a file.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{flow, google};
use crate::serve::AppState;
use crate::session::SESSION_COOKIE;

/// Paths the gate hands off untouched: the OAuth callback plus the login
/// and logout endpoints.
const OPEN_PATHS: [&str; 3] = [super::CALLBACK_PATH, "/login", "/logout"];

/// Decide whether a request may reach the file-serving stage.
///
/// A valid session cookie lets the request through. Anything else begins a
/// login flow that remembers the requested path and redirects the browser
/// to the provider. The session store is only read here; the pending-login
/// map gains an entry on redirect.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if OPEN_PATHS.contains(&path) {
        return next.run(request).await;
    }

    if let Some(token) = session_cookie(request.headers()) {
        if state.sessions.lookup(&token).is_some() {
            return next.run(request).await;
        }
    }

    let return_to = flow::sanitize_return_to(
        request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/"),
    );
    tracing::debug!("no valid session for {return_to}, starting login flow");
    let flow_state = state.logins.begin(return_to);
    Redirect::to(&google::authorize_url(&state.config, &flow_state)).into_response()
}

/// Pull the session token out of the request's cookies.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie_str in cookie_header.split(';') {
        if let Ok(parsed) = cookie::Cookie::parse(cookie_str.trim()) {
            if parsed.name() == SESSION_COOKIE {
                return Some(parsed.value().to_string());
            }
        }
    }

    None
}
