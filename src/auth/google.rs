//! Server-to-server half of the login: the authorization-code exchange
//! and the ID-token claim checks.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Build the browser-facing authorize URL for a login flow.
pub fn authorize_url(config: &AppConfig, state: &str) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        AUTHORIZE_ENDPOINT,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode("email profile"),
        urlencoding::encode(state),
    )
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// Claims carried in the provider's ID token.
///
/// Only the fields the gate acts on are modeled; see the
/// [Google documentation](https://developers.google.com/identity/openid-connect/openid-connect)
/// for the full payload.
#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl IdTokenClaims {
    /// Decode the claims segment of a JWT without checking its signature.
    ///
    /// The token arrives on the TLS response from the provider's own token
    /// endpoint, so the transport vouches for its origin; the claim checks
    /// in [`Self::verify_email`] still run.
    pub fn decode(token: &str) -> Result<Self, AppError> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| AppError::Provider("malformed ID token".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AppError::Provider(format!("ID token payload is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Provider(format!("ID token claims did not parse: {e}")))
    }

    /// Check the claims and surface the verified email address, lowercased
    /// for the allow-list comparison.
    pub fn verify_email(&self, client_id: &str, now: i64) -> Result<String, AppError> {
        if self.aud != client_id {
            return Err(AppError::Provider(format!(
                "ID token audience mismatch: {}",
                self.aud
            )));
        }
        if !ISSUERS.contains(&self.iss.as_str()) {
            return Err(AppError::Provider(format!(
                "unexpected ID token issuer: {}",
                self.iss
            )));
        }
        if self.exp <= now {
            return Err(AppError::Provider("ID token is expired".to_string()));
        }
        if !self.email_verified {
            return Err(AppError::Provider(
                "email is not verified with the provider".to_string(),
            ));
        }
        self.email
            .as_deref()
            .map(str::to_lowercase)
            .ok_or_else(|| AppError::Provider("ID token carries no email claim".to_string()))
    }
}

/// Exchange an authorization code for a verified email address.
///
/// Codes are single-use; any failure here is terminal for the request and
/// the user restarts the flow by revisiting the original URL.
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &AppConfig,
    code: &str,
) -> Result<String, AppError> {
    let params = [
        ("code", code),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];

    let response = http
        .post(TOKEN_ENDPOINT)
        .form(&params)
        .send()
        .await
        .map_err(|e| AppError::Provider(format!("token exchange request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("token exchange failed: {status} - {body}");
        return Err(AppError::Provider(format!(
            "token endpoint returned {status}"
        )));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|e| AppError::Provider(format!("invalid token response: {e}")))?;

    let claims = IdTokenClaims::decode(&tokens.id_token)?;
    claims.verify_email(&config.client_id, Utc::now().timestamp())
}
