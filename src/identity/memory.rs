//! In-process identity store used for local runs and end-to-end tests.
//! Mirrors the hosted backend's contract closely enough that the gate and the
//! post-auth router cannot tell the difference.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use super::profile::{Profile, Role};
use super::provider::{AuthProvider, LoginRequest, LoginResponse, hash_password, verify_password};
use super::session::{Session, SessionManager};
use super::store::{IdentityStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
    pub user_id: String,
    pub email: String,
    /// Clear-text; hashed with argon2 when the seed is loaded.
    pub password: String,
}

pub struct MemoryIdentityStore {
    sessions: SessionManager,
    accounts: RwLock<HashMap<String, Account>>,
    profiles: RwLock<Vec<Profile>>,
    active: RwLock<HashMap<String, String>>,
    offline: AtomicBool,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self { Self::new(Duration::hours(1)) }
}

impl MemoryIdentityStore {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            sessions: SessionManager::new(session_ttl),
            accounts: RwLock::new(HashMap::new()),
            profiles: RwLock::new(Vec::new()),
            active: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn from_seed(seed: Seed, session_ttl: Duration) -> Result<Self> {
        let store = Self::new(session_ttl);
        for acc in &seed.accounts {
            store.add_account(&acc.email, &acc.password, &acc.user_id)?;
        }
        for p in seed.profiles {
            store.add_profile(p);
        }
        Ok(store)
    }

    pub fn load_seed_file(path: &Path, session_ttl: Duration) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("While reading identity seed {}", path.display()))?;
        let seed: Seed = serde_json::from_str(&text)
            .with_context(|| format!("While parsing identity seed {}", path.display()))?;
        let store = Self::from_seed(seed, session_ttl)?;
        info!(
            target: "startup",
            "identity seed loaded: accounts={}, profiles={}",
            store.accounts.read().len(),
            store.profiles.read().len()
        );
        Ok(store)
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: &str) -> Result<()> {
        let key = email.trim().to_lowercase();
        if key.is_empty() { return Err(anyhow!("account email must not be empty")); }
        let password_hash = hash_password(password)?;
        self.accounts.write().insert(key, Account { user_id: user_id.to_string(), password_hash });
        Ok(())
    }

    pub fn add_profile(&self, profile: Profile) {
        self.profiles.write().push(profile);
    }

    /// Open a session without a password, as a completed magic-link or
    /// email confirmation would.
    pub fn issue_session(&self, user_id: &str) -> Result<Session> {
        self.sessions.issue(user_id)
    }

    /// Sign the user out everywhere; the next sign-in starts unselected.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        self.clear_active(user_id);
        self.sessions.revoke_user(user_id)
    }

    pub fn active_profile(&self, user_id: &str) -> Option<String> {
        self.active.read().get(user_id).cloned()
    }

    /// Make every collaborator call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn clear_active(&self, user_id: &str) {
        if let Some(profile_id) = self.active.write().remove(user_id) {
            debug!(user_id, profile_id = %profile_id, "active profile cleared");
        }
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("identity store offline".into()));
        }
        Ok(())
    }

    fn profiles_of(&self, user_id: &str) -> Vec<Profile> {
        self.profiles.read().iter().filter(|p| p.user_id == user_id).cloned().collect()
    }

    fn user_known(&self, user_id: &str) -> bool {
        self.accounts.read().values().any(|a| a.user_id == user_id)
            || self.profiles.read().iter().any(|p| p.user_id == user_id)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_session(&self, credential: Option<&str>) -> StoreResult<Option<Session>> {
        self.ensure_online()?;
        Ok(credential.and_then(|token| self.sessions.validate(token)))
    }

    async fn get_role_for_user(&self, user_id: &str) -> StoreResult<Option<Role>> {
        self.ensure_online()?;
        let owned = self.profiles_of(user_id);
        if let Some(active_id) = self.active.read().get(user_id) {
            return Ok(owned.iter().find(|p| &p.id == active_id).map(|p| p.role));
        }
        match owned.as_slice() {
            [only] => Ok(Some(only.role)),
            _ => Ok(None),
        }
    }

    async fn get_profiles_for_user(&self, user_id: &str) -> StoreResult<Vec<Profile>> {
        self.ensure_online()?;
        Ok(self.profiles_of(user_id))
    }

    async fn set_active_profile(&self, user_id: &str, profile_id: &str) -> StoreResult<()> {
        self.ensure_online()?;
        if !self.user_known(user_id) {
            return Err(StoreError::NotFound(format!("user {} not found", user_id)));
        }
        if !self.profiles_of(user_id).iter().any(|p| p.id == profile_id) {
            return Err(StoreError::Rejected(format!("profile {} does not belong to user {}", profile_id, user_id)));
        }
        self.active.write().insert(user_id.to_string(), profile_id.to_string());
        debug!(user_id, profile_id, "active profile set");
        Ok(())
    }
}

impl AuthProvider for MemoryIdentityStore {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("identity store offline"));
        }
        let account = self.accounts.read().get(&req.email.trim().to_lowercase()).cloned();
        let Some(account) = account else { return Err(anyhow!("invalid_credentials")); };
        if !verify_password(&account.password_hash, &req.password) {
            return Err(anyhow!("invalid_credentials"));
        }
        let session = self.sessions.issue(&account.user_id)?;
        // a fresh sign-in picks its profile again
        self.clear_active(&account.user_id);
        info!(user_id = %account.user_id, sid = %session.session_id, ip = ?req.ip, "auth.login");
        Ok(LoginResponse { session })
    }

    fn logout(&self, token: &str) -> bool {
        match self.sessions.logout(token) {
            Some(session) => {
                self.clear_active(&session.user_id);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_store() -> MemoryIdentityStore {
        let store = MemoryIdentityStore::default();
        store.add_account("famille@ecole.fr", "tableau", "u1").unwrap();
        for (id, role) in [("p-parent", Role::Parent), ("p-teacher", Role::Teacher)] {
            store.add_profile(Profile {
                id: id.into(),
                user_id: "u1".into(),
                role,
                family_name: "Bernard".into(),
                surname: "Luc".into(),
            });
        }
        store
    }

    fn login(store: &MemoryIdentityStore) -> Session {
        let req = LoginRequest { email: "famille@ecole.fr".into(), password: "tableau".into(), ip: None };
        store.login(&req).unwrap().session
    }

    #[tokio::test]
    async fn logout_and_sign_in_forget_the_selected_profile() {
        let store = family_store();
        let first = login(&store);
        store.set_active_profile("u1", "p-teacher").await.unwrap();
        assert_eq!(store.get_role_for_user("u1").await.unwrap(), Some(Role::Teacher));

        assert!(store.logout(&first.token));
        assert_eq!(store.active_profile("u1"), None);
        assert_eq!(store.get_role_for_user("u1").await.unwrap(), None);

        // a pin set outside any logout is still dropped by the next sign-in
        store.set_active_profile("u1", "p-parent").await.unwrap();
        login(&store);
        assert_eq!(store.active_profile("u1"), None);

        store.set_active_profile("u1", "p-parent").await.unwrap();
        assert_eq!(store.revoke_user("u1"), 1);
        assert_eq!(store.active_profile("u1"), None);
    }
}
