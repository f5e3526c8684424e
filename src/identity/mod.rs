//! Identity and profile handling for the session gate and the post-auth router.
//! Keep the public surface thin and split implementation across sub-modules.

mod profile;
mod session;
mod store;
mod memory;
mod provider;
mod request_context;

pub use profile::{Profile, Role};
pub use session::{Session, SessionToken, SessionManager};
pub use store::{IdentityStore, StoreError, StoreResult, with_timeout};
pub use memory::{MemoryIdentityStore, Seed, SeedAccount};
pub use provider::{AuthProvider, LoginRequest, LoginResponse, hash_password, verify_password};
pub use request_context::RequestContext;
