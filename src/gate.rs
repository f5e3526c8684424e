//! Session gate: runs in front of every route and decides pass-through,
//! allow, or redirect from freshly fetched session and role data.
//!
//! Every store failure fails closed to `/auth`. A valid user on another
//! role's area is sent to their own home instead of being signed out.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, info, warn};

use crate::identity::{IdentityStore, RequestContext, with_timeout};
use crate::routes::{RoleRouteTable, path_matches};

pub const SESSION_COOKIE: &str = "genie_session";
pub const AUTH_PATH: &str = "/auth";

pub fn default_public_prefixes() -> Vec<String> {
    [
        "/auth",
        "/api",
        "/profile-selector",
        "/static",
        "/assets",
        "/_next",
        "/icons",
        "/favicon.ico",
        "/manifest.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Public path; no lookup was made.
    PassThrough,
    /// Protected path, caller authorized.
    Allow(RequestContext),
    Redirect(String),
}

impl GateDecision {
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            GateDecision::Redirect(loc) => Some(loc.as_str()),
            _ => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, GateDecision::Redirect(_))
    }
}

/// `/auth?redirectTo=<path>` so sign-in can return the caller where they were going.
pub fn login_redirect(path: &str) -> String {
    format!("{}?redirectTo={}", AUTH_PATH, urlencoding::encode(path))
}

pub struct SessionGate {
    store: Arc<dyn IdentityStore>,
    table: Arc<RoleRouteTable>,
    public_prefixes: Vec<String>,
    timeout: Duration,
}

impl SessionGate {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        table: Arc<RoleRouteTable>,
        public_prefixes: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self { store, table, public_prefixes, timeout }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|p| path_matches(path, p))
    }

    /// Evaluate one request. `path` is the pathname without query string.
    pub async fn evaluate(&self, path: &str, credential: Option<&str>) -> GateDecision {
        if self.is_public(path) {
            return GateDecision::PassThrough;
        }

        let session = match with_timeout(self.timeout, self.store.get_session(credential)).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                info!(path, "gate: no session");
                return GateDecision::Redirect(login_redirect(path));
            }
            Err(e) => {
                warn!(path, error = %e, "gate: session lookup failed");
                return GateDecision::Redirect(AUTH_PATH.to_string());
            }
        };

        let role = match with_timeout(self.timeout, self.store.get_role_for_user(&session.user_id)).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!(path, user_id = %session.user_id, "gate: authenticated user has no active profile");
                return GateDecision::Redirect(AUTH_PATH.to_string());
            }
            Err(e) => {
                warn!(path, user_id = %session.user_id, error = %e, "gate: role lookup failed");
                return GateDecision::Redirect(AUTH_PATH.to_string());
            }
        };

        if !self.table.is_area_of(role, path) {
            if let Some(owner) = self.table.owner_of(path) {
                info!(path, user_id = %session.user_id, %role, %owner, "gate: wrong role for path");
                return GateDecision::Redirect(role.home_path().to_string());
            }
        }
        debug!(path, user_id = %session.user_id, %role, "gate: allow");
        GateDecision::Allow(RequestContext::new(session.user_id, role))
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

/// Session cookie first, then `Authorization: Bearer`.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// axum middleware wrapping the whole router.
pub async fn session_gate(
    State(gate): State<Arc<SessionGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let credential = credential_from_headers(req.headers());
    match gate.evaluate(&path, credential.as_deref()).await {
        GateDecision::PassThrough => next.run(req).await,
        GateDecision::Allow(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        GateDecision::Redirect(location) => Redirect::to(&location).into_response(),
    }
}
