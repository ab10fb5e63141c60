//! Process configuration: environment variables plus the optional `.auth`
//! allow-list file.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Immutable configuration, loaded once at startup and shared through the
/// router state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub port: u16,
    /// Exact-match allow list, lowercased. No wildcard entries: a `*` in
    /// the list is a literal asterisk and matches nothing.
    pub allowed_emails: HashSet<String>,
    pub session_ttl: Duration,
}

impl AppConfig {
    /// Load configuration from the environment and the optional `.auth`
    /// file in `dir`.
    ///
    /// Required: `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`,
    /// `REDIRECT_URI`. Optional: `PORT` (default 8000), `AUTH`
    /// (comma-separated emails, merged with the `.auth` file) and
    /// `SESSION_TTL_SECS` (default one day).
    pub fn from_env(dir: &Path) -> Result<Self> {
        let auth_file = dir.join(".auth");
        let file_content = if auth_file.exists() {
            Some(
                std::fs::read_to_string(&auth_file)
                    .with_context(|| format!("failed to read {}", auth_file.display()))?,
            )
        } else {
            None
        };

        let allowed_emails =
            parse_allow_list(env::var("AUTH").ok().as_deref(), file_content.as_deref());
        if allowed_emails.is_empty() {
            tracing::warn!("allow list is empty, every login will be denied");
        }

        Ok(Self {
            client_id: env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?,
            client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET must be set")?,
            redirect_uri: env::var("REDIRECT_URI").context("REDIRECT_URI must be set")?,
            port: match env::var("PORT") {
                Ok(value) => value.parse().context("PORT must be a valid port number")?,
                Err(_) => DEFAULT_PORT,
            },
            session_ttl: match env::var("SESSION_TTL_SECS") {
                Ok(value) => Duration::from_secs(
                    value.parse().context("SESSION_TTL_SECS must be an integer")?,
                ),
                Err(_) => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            },
            allowed_emails,
        })
    }

    /// Exact-match allow-list check; no wildcard expansion.
    pub fn is_email_allowed(&self, email: &str) -> bool {
        self.allowed_emails.contains(&email.to_lowercase())
    }

    /// Whether the site is reached over TLS, which decides the `Secure`
    /// cookie flag. The registered redirect URI is the only scheme signal
    /// the process has.
    pub fn serves_tls(&self) -> bool {
        self.redirect_uri.starts_with("https://")
    }
}

/// Merge the `AUTH` variable and the `.auth` file into one email set.
fn parse_allow_list(env_value: Option<&str>, file_content: Option<&str>) -> HashSet<String> {
    let mut emails: HashSet<String> = env_value
        .map(|value| value.split(',').filter_map(normalize_entry).collect())
        .unwrap_or_default();

    if let Some(content) = file_content {
        emails.extend(content.lines().filter_map(normalize_entry));
    }

    emails
}

fn normalize_entry(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        None
    } else {
        Some(entry.to_lowercase())
    }
}
