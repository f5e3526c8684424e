use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::profile::{Profile, Role};
use super::session::Session;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("identity store unreachable: {0}")]
    Transport(String),
    #[error("identity store timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Hosted identity backend as seen by the gate and the post-auth router.
/// Row-level security is the backend's job; callers only read sessions and
/// profiles and pin the active profile.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Session for the request credential (cookie or bearer token), if any.
    async fn get_session(&self, credential: Option<&str>) -> StoreResult<Option<Session>>;

    /// Role of the user's active profile. With no explicit selection, a sole
    /// profile counts as active; several unselected profiles yield `None`.
    async fn get_role_for_user(&self, user_id: &str) -> StoreResult<Option<Role>>;

    async fn get_profiles_for_user(&self, user_id: &str) -> StoreResult<Vec<Profile>>;

    async fn set_active_profile(&self, user_id: &str, profile_id: &str) -> StoreResult<()>;
}

/// Bound a collaborator call; an elapsed timer is reported as `Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
