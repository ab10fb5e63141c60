//! Unified error handling for the gate and file-serving handlers.
//!
//! Handlers return [`AppError`] through `?`; the `IntoResponse` impl maps
//! each variant to its HTTP status. Configuration problems never reach
//! this type: they abort startup through `anyhow` before the router is
//! built.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Callback state token absent, unknown, reused or timed out.
    #[error("login state token mismatch")]
    CsrfMismatch,

    /// Token exchange or identity verification against the provider
    /// failed. Authorization codes are single-use, so this is terminal
    /// for the request.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Identity verified but not on the allow list.
    #[error("{0} is not authorized")]
    NotAllowed(String),

    /// Template file could not be rendered.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// Requested file does not exist or is outside the served tree.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::CsrfMismatch => {
                tracing::warn!("rejected callback with unknown or reused state token");
                (StatusCode::FORBIDDEN, "login state mismatch").into_response()
            }
            AppError::Provider(message) => {
                tracing::error!("provider error: {message}");
                (StatusCode::UNAUTHORIZED, "login failed").into_response()
            }
            AppError::NotAllowed(email) => {
                (StatusCode::FORBIDDEN, Html(unauthorized_page(&email))).into_response()
            }
            AppError::Template(error) => {
                tracing::error!("template rendering failed: {error}");
                (StatusCode::INTERNAL_SERVER_ERROR, "template rendering failed").into_response()
            }
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::Io(error) if error.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND.into_response()
            }
            AppError::Io(error) => {
                tracing::error!("i/o error while serving: {error}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Page shown to a verified identity that is not on the allow list.
fn unauthorized_page(email: &str) -> String {
    let email = tera::escape_html(email);
    format!(
        r#"<div style="
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        max-width: 600px;
        margin: 100px auto;
        padding: 2rem;
        text-align: center;
        border-radius: 8px;
        box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        background: #fff;
      ">
        <h1 style="color: #e53e3e; margin-bottom: 1.5rem;">Unauthorized</h1>
        <p style="color: #4a5568; margin-bottom: 2rem; line-height: 1.6;">
          Your email <strong>{email}</strong> is not authorized to access this content.
        </p>
        <a href="/logout" style="
          display: inline-block;
          background: #3182ce;
          color: white;
          padding: 0.75rem 1.5rem;
          text-decoration: none;
          border-radius: 4px;
          font-weight: 500;
        ">Login as different user</a>
      </div>"#
    )
}
