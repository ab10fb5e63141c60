//! Router assembly and the gated file-serving stage.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, Uri},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth;
use crate::auth::flow::LoginFlows;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::render::{self, TemplateVars, TEMPLATE_EXT};
use crate::session::SessionStore;

/// Shared request-handling context: the configuration, the two in-memory
/// stores, the outbound HTTP client and the served folder.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
    pub logins: Arc<LoginFlows>,
    pub http: reqwest::Client,
    pub root: Arc<PathBuf>,
    pub vars: Arc<TemplateVars>,
}

impl AppState {
    pub fn new(config: AppConfig, root: PathBuf) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        Self {
            config: Arc::new(config),
            sessions,
            logins: Arc::new(LoginFlows::new()),
            http: reqwest::Client::new(),
            root: Arc::new(root),
            vars: Arc::new(TemplateVars::default()),
        }
    }
}

/// Build the application router: the auth endpoints, the gate in front of
/// everything, and the file fallback.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(auth::handlers::login))
        .route("/logout", get(auth::handlers::logout))
        .route(auth::CALLBACK_PATH, get(auth::handlers::callback))
        .fallback(serve_path)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until terminated.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = router(state);

    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve the requested file from the site root.
///
/// Template files render with the conversion variables; everything else
/// streams raw with a guessed content type. The gate has already run, so
/// any request landing here carries a valid session.
async fn serve_path(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    let relative = sanitize(uri.path().trim_start_matches('/')).ok_or(AppError::NotFound)?;

    let file_path = if relative.as_os_str().is_empty() {
        resolve_index(&state.root).ok_or(AppError::NotFound)?
    } else {
        state.root.join(&relative)
    };

    if !file_path.is_file() {
        return Err(AppError::NotFound);
    }

    let is_template = file_path
        .extension()
        .map_or(false, |ext| ext == TEMPLATE_EXT);
    if is_template {
        let source = tokio::fs::read_to_string(&file_path).await?;
        let html = render::render_str(&source, &state.vars)?;
        return Ok(Html(html).into_response());
    }

    let bytes = tokio::fs::read(&file_path).await?;
    let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// Normalize a request path into a safe relative path under the root.
///
/// Rejects parent/root components and dot-file segments, so `../`
/// traversal and files like `.auth` or `.env` are unreachable.
fn sanitize(raw: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(raw).ok()?;
    if decoded.contains('\\') {
        return None;
    }

    let mut clean = PathBuf::new();
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => {
                if part.to_str().map_or(true, |s| s.starts_with('.')) {
                    return None;
                }
                clean.push(part);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }

    Some(clean)
}

/// The site root prefers the converted template over plain HTML.
fn resolve_index(root: &Path) -> Option<PathBuf> {
    ["index.jinja2", "index.html"]
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// CORS for the gated site: explicit origins when configured, permissive
/// otherwise.
fn build_cors_layer() -> CorsLayer {
    match std::env::var("CORS_ALLOWED_ORIGINS").ok() {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!("CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS");
                CorsLayer::permissive()
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET])
                    .allow_headers([header::CONTENT_TYPE])
                    .allow_credentials(true)
            }
        }
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashSet;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config(ttl: Duration) -> AppConfig {
        AppConfig {
            client_id: "1234.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8000/googleauth/".to_string(),
            port: 8000,
            allowed_emails: HashSet::from(["me@example.com".to_string()]),
            session_ttl: ttl,
        }
    }

    fn test_state(root: &Path) -> AppState {
        AppState::new(test_config(Duration::from_secs(60)), root.to_path_buf())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_with_session(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("session={token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_request_redirects_to_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<h1>secret</h1>").unwrap();
        let app = router(test_state(dir.path()));

        let response = app.oneshot(get("/page.html")).await.unwrap();

        assert!(response.status().is_redirection());
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(location.contains("state="));
        assert!(!body_string(response).await.contains("secret"));
    }

    #[tokio::test]
    async fn session_cookie_allows_file_access() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<h1>secret</h1>").unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app
            .oneshot(get_with_session("/page.html", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "text/html"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL].to_str().unwrap(),
            "private, max-age=3600"
        );
        assert!(body_string(response).await.contains("secret"));
    }

    #[tokio::test]
    async fn expired_session_redirects_like_no_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<h1>secret</h1>").unwrap();
        let state = AppState::new(test_config(Duration::ZERO), dir.path().to_path_buf());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app
            .oneshot(get_with_session("/page.html", &token))
            .await
            .unwrap();

        assert!(response.status().is_redirection());
    }

    #[tokio::test]
    async fn gate_remembers_the_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = router(state.clone());

        let response = app
            .oneshot(get("/reports/q3.html?tab=2"))
            .await
            .unwrap();

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        let state_token = location
            .rsplit("state=")
            .next()
            .expect("authorize URL carries a state parameter");
        match state.logins.take(state_token) {
            Some(auth::flow::LoginFlow::Pending { return_to, .. }) => {
                assert_eq!(return_to, "/reports/q3.html?tab=2");
            }
            other => panic!("expected a pending flow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_rejected_before_any_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = router(state.clone());

        // no token endpoint is reachable from the test; a 403 (and not a
        // provider 401) proves the request died at the state check
        let response = app
            .oneshot(get("/googleauth/?code=abc&state=forged"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn template_files_render_with_the_conversion_variables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.jinja2"),
            r#"<link href="{{ bootstrap5_css_url }}">"#,
        )
        .unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app.oneshot(get_with_session("/", &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("bootstrap@5.3.2/dist/css/bootstrap.min.css"));
        assert!(!body.contains("{{"));
    }

    #[tokio::test]
    async fn malformed_template_is_a_server_error_not_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jinja2"), "{% if %}").unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app
            .oneshot(get_with_session("/broken.jinja2", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_string(response).await.contains("{% if %}"));
    }

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app
            .oneshot(get_with_session("/nope.html", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dot_files_are_unreachable_even_with_a_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".auth"), "me@example.com\n").unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state);

        let response = app
            .oneshot(get_with_session("/.auth", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let token = state.sessions.create("me@example.com");
        let app = router(state.clone());

        let response = app
            .oneshot(get_with_session("/logout", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn sanitize_accepts_plain_relative_paths() {
        assert_eq!(sanitize("docs/guide.html"), Some(PathBuf::from("docs/guide.html")));
        assert_eq!(sanitize("with%20space.txt"), Some(PathBuf::from("with space.txt")));
        assert_eq!(sanitize(""), Some(PathBuf::new()));
    }

    #[test]
    fn sanitize_rejects_traversal_and_dot_files() {
        assert_eq!(sanitize("../outside.txt"), None);
        assert_eq!(sanitize("docs/../../outside.txt"), None);
        assert_eq!(sanitize("%2e%2e/outside.txt"), None);
        assert_eq!(sanitize(".auth"), None);
        assert_eq!(sanitize("docs/.env"), None);
        assert_eq!(sanitize("docs\\..\\outside.txt"), None);
    }

    #[test]
    fn root_index_prefers_the_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "html").unwrap();
        assert_eq!(
            resolve_index(dir.path()),
            Some(dir.path().join("index.html"))
        );

        std::fs::write(dir.path().join("index.jinja2"), "template").unwrap();
        assert_eq!(
            resolve_index(dir.path()),
            Some(dir.path().join("index.jinja2"))
        );
    }
}
