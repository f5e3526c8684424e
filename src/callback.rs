//! Post-authentication routing: after sign-in, sign-up or email confirmation,
//! decide between the auth error screen, profile selection, and a landing page.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::identity::{IdentityStore, Profile, Role, StoreError, with_timeout};

pub const PROFILE_SELECTOR_PATH: &str = "/profile-selector";
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    AuthError,
    /// Several profiles; `redirect_to` is carried through the selection step.
    ProfileSelector { profiles: Vec<Profile>, redirect_to: Option<String> },
    Destination(String),
}

impl Navigation {
    pub fn location(&self) -> String {
        match self {
            Navigation::AuthError => format!("/auth?error={}", urlencoding::encode(AUTH_FAILED_MESSAGE)),
            Navigation::ProfileSelector { redirect_to: Some(to), .. } => {
                format!("{}?redirectTo={}", PROFILE_SELECTOR_PATH, urlencoding::encode(to))
            }
            Navigation::ProfileSelector { redirect_to: None, .. } => PROFILE_SELECTOR_PATH.to_string(),
            Navigation::Destination(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no active session")]
    NoSession,
    #[error("profile {0} is not available for this account")]
    UnknownProfile(String),
    #[error("could not activate profile: {0}")]
    Store(#[from] StoreError),
}

/// Keep only same-origin absolute paths; anything else is treated as absent.
pub fn sanitize_redirect(redirect_to: Option<&str>) -> Option<String> {
    let to = redirect_to?.trim();
    let local = to.starts_with('/')
        && !to.starts_with("//")
        && !to.contains('\\')
        && !to.contains("://");
    local.then(|| to.to_string())
}

/// Where a user with `role` lands once their profile is settled.
pub fn route_for_role(role: Role, redirect_to: Option<&str>) -> String {
    match sanitize_redirect(redirect_to) {
        Some(to) => to,
        None => role.home_path().to_string(),
    }
}

pub struct PostAuthRouter {
    store: Arc<dyn IdentityStore>,
    timeout: Duration,
}

impl PostAuthRouter {
    pub fn new(store: Arc<dyn IdentityStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Current user and every profile they own, fetched fresh.
    async fn current_user(&self, credential: Option<&str>) -> Result<Option<(String, Vec<Profile>)>, StoreError> {
        let Some(session) = with_timeout(self.timeout, self.store.get_session(credential)).await? else {
            return Ok(None);
        };
        let profiles = with_timeout(self.timeout, self.store.get_profiles_for_user(&session.user_id)).await?;
        Ok(Some((session.user_id, profiles)))
    }

    /// Read-only: never pins a profile, even when only one exists.
    pub async fn resolve(&self, credential: Option<&str>, redirect_to: Option<&str>) -> Navigation {
        let (user_id, mut profiles) = match self.current_user(credential).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                info!("callback: no authenticated user");
                return Navigation::AuthError;
            }
            Err(e) => {
                warn!(error = %e, "callback: identity lookup failed");
                return Navigation::AuthError;
            }
        };
        match profiles.len() {
            0 => {
                warn!(%user_id, "callback: authenticated user has no profile");
                Navigation::AuthError
            }
            1 => {
                let role = profiles.remove(0).role;
                let to = route_for_role(role, redirect_to);
                info!(%user_id, %role, to = %to, "callback: single profile");
                Navigation::Destination(to)
            }
            n => {
                info!(%user_id, profiles = n, "callback: profile selection required");
                Navigation::ProfileSelector { profiles, redirect_to: sanitize_redirect(redirect_to) }
            }
        }
    }

    /// Profiles offered on the selection screen; `None` when there is no session.
    pub async fn profiles_for_selection(&self, credential: Option<&str>) -> Result<Option<Vec<Profile>>, StoreError> {
        Ok(self.current_user(credential).await?.map(|(_, profiles)| profiles))
    }

    /// Pin the chosen profile, then route with its role. Exactly one write.
    pub async fn select_profile(
        &self,
        credential: Option<&str>,
        profile_id: &str,
        redirect_to: Option<&str>,
    ) -> Result<Navigation, SelectionError> {
        let (user_id, profiles) = self.current_user(credential).await?.ok_or(SelectionError::NoSession)?;
        let chosen = profiles
            .into_iter()
            .find(|p| p.id == profile_id)
            .ok_or_else(|| SelectionError::UnknownProfile(profile_id.to_string()))?;
        with_timeout(self.timeout, self.store.set_active_profile(&user_id, &chosen.id)).await?;
        let to = route_for_role(chosen.role, redirect_to);
        info!(%user_id, profile_id = %chosen.id, role = %chosen.role, to = %to, "profile selected");
        Ok(Navigation::Destination(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_redirects_survive() {
        assert_eq!(sanitize_redirect(Some("/teacher/lessons")).as_deref(), Some("/teacher/lessons"));
        assert_eq!(sanitize_redirect(Some("/parent?tab=notes")).as_deref(), Some("/parent?tab=notes"));
        assert_eq!(sanitize_redirect(Some("")), None);
        assert_eq!(sanitize_redirect(Some("   ")), None);
        assert_eq!(sanitize_redirect(Some("//evil.example")), None);
        assert_eq!(sanitize_redirect(Some("https://evil.example/")), None);
        assert_eq!(sanitize_redirect(Some("/\\evil.example")), None);
        assert_eq!(sanitize_redirect(Some("teacher")), None);
        assert_eq!(sanitize_redirect(None), None);
    }

    #[test]
    fn role_home_is_the_fallback() {
        assert_eq!(route_for_role(Role::Teacher, None), "/teacher");
        assert_eq!(route_for_role(Role::SuperAdmin, Some("")), "/super-admin");
        assert_eq!(route_for_role(Role::Unknown, None), "/");
        assert_eq!(route_for_role(Role::Parent, Some("/teacher/lessons")), "/teacher/lessons");
    }

    #[test]
    fn auth_error_location_carries_message() {
        assert_eq!(Navigation::AuthError.location(), "/auth?error=Authentication%20failed");
        let sel = Navigation::ProfileSelector { profiles: vec![], redirect_to: Some("/parent/notes".into()) };
        assert_eq!(sel.location(), "/profile-selector?redirectTo=%2Fparent%2Fnotes");
    }
}
