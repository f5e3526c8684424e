//!
//! Futur Génie gate server
//! -----------------------
//! Axum application fronting the platform's role areas.
//!
//! Responsibilities:
//! - Session gate middleware over every route.
//! - Email/password sign-in and logout with an HttpOnly session cookie.
//! - Post-authentication callback and profile selection.
//! - Role landing endpoints that echo the resolved request context.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::callback::{Navigation, PostAuthRouter, SelectionError};
use crate::config::GateConfig;
use crate::error::{AppError, AppResult};
use crate::gate::{AUTH_PATH, SESSION_COOKIE, SessionGate, credential_from_headers, session_gate};
use crate::identity::{AuthProvider, IdentityStore, LoginRequest, MemoryIdentityStore, RequestContext};
use crate::routes::RoleRouteTable;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SessionGate>,
    pub router: Arc<PostAuthRouter>,
    pub provider: Arc<dyn AuthProvider>,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        provider: Arc<dyn AuthProvider>,
        table: Arc<RoleRouteTable>,
        config: &GateConfig,
    ) -> Self {
        let gate = SessionGate::new(store.clone(), table, config.public_prefixes.clone(), config.store_timeout);
        let router = PostAuthRouter::new(store, config.store_timeout);
        Self {
            gate: Arc::new(gate),
            router: Arc::new(router),
            provider,
            session_ttl: config.session_ttl,
            secure_cookies: config.secure_cookies,
        }
    }

    /// State over a single in-memory store acting as both collaborator and sign-in provider.
    pub fn with_memory_store(store: Arc<MemoryIdentityStore>, table: Arc<RoleRouteTable>, config: &GateConfig) -> Self {
        Self::new(store.clone(), store, table, config)
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/api/health", get(|| async { "ok" }))
        .route("/auth", get(auth_entry))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/callback", get(auth_callback))
        .route("/profile-selector", get(list_profiles).post(choose_profile))
        .route("/parent", get(landing))
        .route("/parent/{*rest}", get(landing))
        .route("/teacher", get(landing))
        .route("/teacher/{*rest}", get(landing))
        .route("/admin", get(landing))
        .route("/admin/{*rest}", get(landing))
        .route("/super-admin", get(landing))
        .route("/super-admin/{*rest}", get(landing))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.gate.clone(), session_gate))
        .with_state(state)
}

/// Load the role-route table and identity seed, then serve until the listener fails.
pub async fn run_with_config(config: GateConfig) -> anyhow::Result<()> {
    let table = match &config.route_table_file {
        Some(path) => RoleRouteTable::load_file(path)?,
        None => RoleRouteTable::default(),
    };
    table.validate(&config.public_prefixes).context("Invalid role-route table")?;
    for entry in table.entries() {
        info!(target: "startup", "role {} owns {:?}", entry.role, entry.prefixes);
    }

    let ttl = chrono::Duration::from_std(config.session_ttl).context("session TTL out of range")?;
    let store = match &config.seed_file {
        Some(path) => MemoryIdentityStore::load_seed_file(path, ttl)?,
        None => {
            warn!(target: "startup", "no identity seed configured; every sign-in will fail");
            MemoryIdentityStore::new(ttl)
        }
    };

    let state = AppState::with_memory_store(Arc::new(store), Arc::new(table), &config);
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.http_port))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn session_cookie(token: &str, ttl: Duration, secure: bool) -> AppResult<HeaderValue> {
    let mut v = format!("{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}", SESSION_COOKIE, token, ttl.as_secs());
    if secure { v.push_str("; Secure"); }
    HeaderValue::from_str(&v).map_err(|e| AppError::internal("cookie_error", e.to_string()))
}

fn clear_session_cookie(secure: bool) -> HeaderValue {
    let v = if secure {
        "genie_session=deleted; Max-Age=0; HttpOnly; SameSite=Lax; Path=/; Secure"
    } else {
        "genie_session=deleted; Max-Age=0; HttpOnly; SameSite=Lax; Path=/"
    };
    HeaderValue::from_static(v)
}

fn callback_location(redirect_to: Option<&str>) -> String {
    match redirect_to.filter(|s| !s.is_empty()) {
        Some(to) => format!("/auth/callback?redirectTo={}", urlencoding::encode(to)),
        None => "/auth/callback".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    error: Option<String>,
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedirectQuery {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
    #[serde(rename = "redirectTo", default)]
    redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectPayload {
    profile_id: String,
    #[serde(rename = "redirectTo", default)]
    redirect_to: Option<String>,
}

async fn auth_entry(Query(q): Query<AuthQuery>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "sign_in_required",
        "error": q.error,
        "redirectTo": q.redirect_to,
    }))
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<Response> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::user("missing_credentials", "Email et mot de passe requis"));
    }
    let req = LoginRequest { email: payload.email, password: payload.password, ip: None };
    match state.provider.login(&req) {
        Ok(resp) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::SET_COOKIE,
                session_cookie(&resp.session.token, state.session_ttl, state.secure_cookies)?,
            );
            let to = callback_location(payload.redirect_to.as_deref());
            Ok((headers, Redirect::to(&to)).into_response())
        }
        Err(e) if e.to_string() == "invalid_credentials" => {
            info!(email = %req.email, "login rejected");
            Err(AppError::auth("invalid_credentials", "Email ou mot de passe incorrect"))
        }
        Err(e) => {
            error!("login error: {e}");
            Err(AppError::store("login_unavailable", e.to_string()))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = credential_from_headers(&headers) {
        state.provider.logout(&token);
    }
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie(state.secure_cookies));
    (h, Redirect::to(AUTH_PATH))
}

async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<RedirectQuery>,
) -> Redirect {
    let credential = credential_from_headers(&headers);
    let nav = state.router.resolve(credential.as_deref(), q.redirect_to.as_deref()).await;
    Redirect::to(&nav.location())
}

async fn list_profiles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<RedirectQuery>,
) -> AppResult<Response> {
    let credential = credential_from_headers(&headers);
    let Some(profiles) = state.router.profiles_for_selection(credential.as_deref()).await? else {
        return Ok(Redirect::to(AUTH_PATH).into_response());
    };
    let options: Vec<serde_json::Value> = profiles
        .iter()
        .map(|p| serde_json::json!({
            "id": p.id,
            "label": p.display_name(),
            "role": p.role,
            "role_label": p.role.label_fr(),
        }))
        .collect();
    Ok(Json(serde_json::json!({"status": "ok", "profiles": options, "redirectTo": q.redirect_to})).into_response())
}

async fn choose_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SelectPayload>,
) -> Response {
    let credential = credential_from_headers(&headers);
    let result = state
        .router
        .select_profile(credential.as_deref(), &payload.profile_id, payload.redirect_to.as_deref())
        .await;
    match result {
        Ok(nav) => Redirect::to(&nav.location()).into_response(),
        Err(SelectionError::NoSession) => Redirect::to(&Navigation::AuthError.location()).into_response(),
        Err(e) => {
            warn!(profile_id = %payload.profile_id, error = %e, "profile selection failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"status": "error", "error": e.to_string(), "retryable": true})),
            )
                .into_response()
        }
    }
}

async fn landing(Extension(ctx): Extension<RequestContext>, uri: Uri) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "path": uri.path(),
        "user_id": ctx.user_id,
        "role": ctx.role,
        "home": ctx.role.home_path(),
        "request_id": ctx.request_id,
    }))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found("not_found", format!("no page at {}", uri.path()))
}
