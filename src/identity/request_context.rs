use super::Role;

/// Identity attached to a protected request once the gate lets it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub role: Role,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role, request_id: uuid::Uuid::new_v4().to_string() }
    }
}
