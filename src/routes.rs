//! Role -> path-prefix table consulted by the session gate.
//! Prefixes match whole path segments (`/parent` covers `/parent/x`, not
//! `/parenting`); `validate` enforces that no two roles own overlapping
//! prefixes and that no role area hides behind a public prefix.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::identity::Role;

/// True when `path` is `prefix` itself or lies below it.
pub fn path_matches(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn prefixes_overlap(a: &str, b: &str) -> bool {
    path_matches(a, b) || path_matches(b, a)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub role: Role,
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRouteTable {
    entries: Vec<RouteEntry>,
}

impl Default for RoleRouteTable {
    fn default() -> Self {
        let entry = |role: Role, prefix: &str| RouteEntry { role, prefixes: vec![prefix.to_string()] };
        Self {
            entries: vec![
                entry(Role::SuperAdmin, "/super-admin"),
                entry(Role::Admin, "/admin"),
                entry(Role::Teacher, "/teacher"),
                entry(Role::Parent, "/parent"),
            ],
        }
    }
}

impl RoleRouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self { Self { entries } }

    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<RouteEntry> = serde_json::from_str(text).context("While parsing role-route table")?;
        Ok(Self { entries })
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("While reading role-route table {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn entries(&self) -> &[RouteEntry] { &self.entries }

    /// Start-up check against the gate's public prefixes; a table that fails
    /// here must not be served.
    pub fn validate(&self, public_prefixes: &[String]) -> AppResult<()> {
        let invalid = |msg: String| AppError::config("invalid_route_table", msg);
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.role == Role::Unknown {
                return Err(invalid(format!("route table entry {} has an unknown role", i)));
            }
            if self.entries[..i].iter().any(|e| e.role == entry.role) {
                return Err(invalid(format!("role {} appears more than once in the route table", entry.role)));
            }
            for prefix in &entry.prefixes {
                if prefix.trim_end_matches('/').len() < 2 || !prefix.starts_with('/') {
                    return Err(invalid(format!(
                        "prefix {:?} for role {} must be a non-root absolute path",
                        prefix, entry.role
                    )));
                }
                if let Some(public) = public_prefixes.iter().find(|p| prefixes_overlap(prefix, p)) {
                    return Err(invalid(format!(
                        "prefix {:?} ({}) overlaps public prefix {:?}",
                        prefix, entry.role, public
                    )));
                }
            }
        }
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                for pa in &a.prefixes {
                    for pb in &b.prefixes {
                        if prefixes_overlap(pa, pb) {
                            return Err(invalid(format!(
                                "prefix {:?} ({}) overlaps prefix {:?} ({})",
                                pa, a.role, pb, b.role
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// True when `path` falls in one of `role`'s own areas.
    pub fn is_area_of(&self, role: Role, path: &str) -> bool {
        self.prefixes_for(role).iter().any(|p| path_matches(path, p))
    }

    pub fn prefixes_for(&self, role: Role) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .map(|e| e.prefixes.as_slice())
            .unwrap_or(&[])
    }

    /// Role owning `path`, or `None` for paths no role claims.
    pub fn owner_of(&self, path: &str) -> Option<Role> {
        self.entries
            .iter()
            .find(|e| e.prefixes.iter().any(|p| path_matches(path, p)))
            .map(|e| e.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::default_public_prefixes;

    #[test]
    fn default_table_is_valid_and_owns_role_areas() {
        let t = RoleRouteTable::default();
        t.validate(&default_public_prefixes()).unwrap();
        assert_eq!(t.owner_of("/super-admin/schools"), Some(Role::SuperAdmin));
        assert_eq!(t.owner_of("/admin"), Some(Role::Admin));
        assert_eq!(t.owner_of("/teacher/lessons"), Some(Role::Teacher));
        assert_eq!(t.owner_of("/parent/children/3"), Some(Role::Parent));
        assert_eq!(t.owner_of("/"), None);
        assert_eq!(t.owner_of("/quiz/12"), None);
        assert_eq!(t.prefixes_for(Role::Teacher), ["/teacher".to_string()]);
        assert!(t.prefixes_for(Role::Unknown).is_empty());
        assert!(t.is_area_of(Role::Teacher, "/teacher/lessons"));
        assert!(!t.is_area_of(Role::Teacher, "/parent"));
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let t = RoleRouteTable::default();
        assert_eq!(t.owner_of("/parenting-tips"), None);
        assert_eq!(t.owner_of("/teachers-lounge"), None);
        assert_eq!(t.owner_of("/admin/"), Some(Role::Admin));
        assert!(path_matches("/favicon.ico", "/favicon.ico"));
        assert!(path_matches("/static/app.css", "/static/"));
        assert!(!path_matches("/authors", "/auth"));
        assert!(path_matches("/anything", "/"));
    }

    #[test]
    fn role_prefix_under_public_prefix_is_rejected() {
        let public = default_public_prefixes();
        let hidden = RoleRouteTable::new(vec![RouteEntry { role: Role::Admin, prefixes: vec!["/api/admin".into()] }]);
        let err = hidden.validate(&public).unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert!(err.to_string().contains("public prefix"), "{err}");

        let covering = RoleRouteTable::new(vec![RouteEntry { role: Role::Parent, prefixes: vec!["/profile".into()] }]);
        assert!(covering.validate(&["/profile/public".to_string()]).is_err());

        // sibling names that only share characters are fine
        let sibling = RoleRouteTable::new(vec![RouteEntry { role: Role::Teacher, prefixes: vec!["/authoring".into()] }]);
        sibling.validate(&public).unwrap();
    }

    #[test]
    fn overlapping_prefixes_are_rejected() {
        let t = RoleRouteTable::from_json(
            r#"[{"role":"admin","prefixes":["/admin"]},{"role":"super_admin","prefixes":["/admin/super"]}]"#,
        ).unwrap();
        let err = t.validate(&[]).unwrap_err().to_string();
        assert!(err.contains("overlaps"), "{err}");
    }

    #[test]
    fn duplicate_roles_and_bad_prefixes_are_rejected() {
        let dup = RoleRouteTable::new(vec![
            RouteEntry { role: Role::Parent, prefixes: vec!["/parent".into()] },
            RouteEntry { role: Role::Parent, prefixes: vec!["/famille".into()] },
        ]);
        assert!(dup.validate(&[]).is_err());

        let root = RoleRouteTable::new(vec![RouteEntry { role: Role::Teacher, prefixes: vec!["/".into()] }]);
        assert!(root.validate(&[]).is_err());

        let relative = RoleRouteTable::new(vec![RouteEntry { role: Role::Teacher, prefixes: vec!["teacher".into()] }]);
        assert!(relative.validate(&[]).is_err());
    }

    #[test]
    fn unknown_role_entry_is_rejected() {
        let t = RoleRouteTable::from_json(r#"[{"role":"janitor","prefixes":["/janitor"]}]"#).unwrap();
        assert!(t.validate(&[]).is_err());
    }
}
