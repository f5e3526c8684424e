use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use crate::tprintln;

pub type SessionToken = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn gen_id() -> Result<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!("session token rng failed: {}", e))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Token -> session map with a per-user index for bulk revocation.
/// Owned by whichever store issues sessions; there is no process-wide table.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    user_index: RwLock<HashMap<String, HashSet<SessionToken>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::hours(1)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), user_index: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, user_id: &str) -> Result<Session> {
        let now = Utc::now();
        let sess = Session {
            session_id: gen_id()?,
            token: gen_id()?,
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.token.clone(), sess.clone());
        self.user_index
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(sess.token.clone());
        tprintln!("session.issue user={} sid={} ttl_secs={}", user_id, sess.session_id, self.ttl.num_seconds());
        Ok(sess)
    }

    /// Live session for `token`; an expired entry is dropped on the way out.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.remove(token);
        }
        None
    }

    /// Drop `token`, returning the session it belonged to.
    pub fn logout(&self, token: &str) -> Option<Session> {
        self.remove(token)
    }

    pub fn revoke_user(&self, user_id: &str) -> usize {
        let tokens = self.user_index.write().remove(user_id).unwrap_or_default();
        let mut sessions = self.sessions.write();
        let count = tokens.iter().filter(|t| sessions.remove(*t).is_some()).count();
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }

    fn remove(&self, token: &str) -> Option<Session> {
        let removed = self.sessions.write().remove(token)?;
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(&removed.user_id) {
            set.remove(token);
            if set.is_empty() { idx.remove(&removed.user_id); }
        }
        Some(removed)
    }
}
