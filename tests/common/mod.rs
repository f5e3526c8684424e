//! Shared fake identity store for the gate and callback tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use futurgenie_gate::identity::{IdentityStore, Profile, Role, Session, StoreError, StoreResult};

pub const TOKEN: &str = "tok-123";

#[derive(Default)]
pub struct Calls {
    pub get_session: AtomicUsize,
    pub get_role: AtomicUsize,
    pub get_profiles: AtomicUsize,
    pub set_active: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.get_session.load(Ordering::SeqCst)
            + self.get_role.load(Ordering::SeqCst)
            + self.get_profiles.load(Ordering::SeqCst)
            + self.set_active.load(Ordering::SeqCst)
    }
}

/// Scriptable store: `user_id` is returned for `TOKEN`, every other
/// credential has no session.
pub struct FakeStore {
    pub user_id: Option<String>,
    pub role: Option<Role>,
    pub profiles: Vec<Profile>,
    pub session_error: Option<StoreError>,
    pub role_error: Option<StoreError>,
    pub profiles_error: Option<StoreError>,
    pub set_active_error: Option<StoreError>,
    pub delay: Option<Duration>,
    pub calls: Calls,
    pub activated: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            role: None,
            profiles: Vec::new(),
            session_error: None,
            role_error: None,
            profiles_error: None,
            set_active_error: None,
            delay: None,
            calls: Calls::default(),
            activated: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None, ..Self::signed_in("nobody") }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_profiles(mut self, profiles: Vec<Profile>) -> Self {
        self.profiles = profiles;
        self
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

pub fn profile(id: &str, user_id: &str, role: Role) -> Profile {
    Profile {
        id: id.to_string(),
        user_id: user_id.to_string(),
        role,
        family_name: "Durand".to_string(),
        surname: "Camille".to_string(),
    }
}

#[async_trait]
impl IdentityStore for FakeStore {
    async fn get_session(&self, credential: Option<&str>) -> StoreResult<Option<Session>> {
        self.calls.get_session.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(e) = &self.session_error {
            return Err(e.clone());
        }
        let Some(user_id) = &self.user_id else { return Ok(None) };
        if credential != Some(TOKEN) {
            return Ok(None);
        }
        let now = Utc::now();
        Ok(Some(Session {
            session_id: "sid-1".to_string(),
            token: TOKEN.to_string(),
            user_id: user_id.clone(),
            issued_at: now,
            expires_at: now + chrono::Duration::hours(1),
        }))
    }

    async fn get_role_for_user(&self, _user_id: &str) -> StoreResult<Option<Role>> {
        self.calls.get_role.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.role_error {
            return Err(e.clone());
        }
        Ok(self.role)
    }

    async fn get_profiles_for_user(&self, user_id: &str) -> StoreResult<Vec<Profile>> {
        self.calls.get_profiles.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.profiles_error {
            return Err(e.clone());
        }
        Ok(self.profiles.iter().filter(|p| p.user_id == user_id).cloned().collect())
    }

    async fn set_active_profile(&self, user_id: &str, profile_id: &str) -> StoreResult<()> {
        self.calls.set_active.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.set_active_error {
            return Err(e.clone());
        }
        self.activated.lock().push((user_id.to_string(), profile_id.to_string()));
        Ok(())
    }
}
