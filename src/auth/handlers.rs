//! Login, logout and the OAuth callback.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::flow::LoginFlow;
use super::{google, middleware};
use crate::error::AppError;
use crate::serve::AppState;
use crate::session::SESSION_COOKIE;

/// Where the provider sends the browser back to. Must match the path of
/// the redirect URI registered with the provider byte for byte, trailing
/// slash included.
pub const CALLBACK_PATH: &str = "/googleauth/";

/// `GET /login` — start a fresh flow that lands back on the site root.
pub async fn login(State(state): State<AppState>) -> Redirect {
    let flow_state = state.logins.begin("/".to_string());
    Redirect::to(&google::authorize_url(&state.config, &flow_state))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: String,
    #[serde(default)]
    state: String,
}

/// `GET /googleauth/` — the provider's redirect target.
///
/// The state token is checked first: an unknown or reused token never
/// reaches the token endpoint. A verified identity on the allow list gets
/// a session and is sent back to the path it originally asked for.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let flow = state
        .logins
        .take(&params.state)
        .ok_or(AppError::CsrfMismatch)?;

    let email = google::exchange_code(&state.http, &state.config, &params.code).await?;

    complete_login(&state, flow, &email)
}

/// Apply the allow-list verdict for a verified identity and finish the
/// flow: session, cookie and redirect on success, a 403 page otherwise.
fn complete_login(state: &AppState, flow: LoginFlow, email: &str) -> Result<Response, AppError> {
    match flow.resolve(email, state.config.is_email_allowed(email)) {
        LoginFlow::Authenticated { email, return_to } => {
            let token = state.sessions.create(&email);
            tracing::info!("login succeeded for {email}");
            Ok((
                StatusCode::SEE_OTHER,
                [
                    (header::LOCATION, return_to),
                    (
                        header::SET_COOKIE,
                        session_cookie_header(&token, state.config.serves_tls()),
                    ),
                ],
            )
                .into_response())
        }
        LoginFlow::Rejected { email } => {
            tracing::warn!("denied login for {email}: not on the allow list");
            Err(AppError::NotAllowed(email))
        }
        LoginFlow::Pending { .. } => Err(AppError::CsrfMismatch),
    }
}

/// `GET /logout` — drop the session, clear the cookie, back to login.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = middleware::session_cookie(&headers) {
        state.sessions.invalidate(&token);
    }

    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/login".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
}

/// The session cookie: HTTP-only, site-rooted, `Secure` over TLS. No
/// `Max-Age`, the server-side time-to-live governs expiry.
fn session_cookie_header(token: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax{secure}")
}
