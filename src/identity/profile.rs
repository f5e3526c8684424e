use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Persona a profile acts as. Unrecognised wire values decode to `Unknown`
/// so a profile row with a stray role still routes somewhere (`/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Teacher,
    Admin,
    SuperAdmin,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Unknown => "unknown",
        }
    }

    /// Landing area for the role.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "/super-admin",
            Role::Admin => "/admin",
            Role::Teacher => "/teacher",
            Role::Parent => "/parent",
            Role::Unknown => "/",
        }
    }

    /// Label shown on the profile-selection screen.
    pub fn label_fr(&self) -> &'static str {
        match self {
            Role::Parent => "Parent",
            Role::Teacher => "Enseignant",
            Role::Admin => "Administrateur",
            Role::SuperAdmin => "Super administrateur",
            Role::Unknown => "Profil",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub surname: String,
}

impl Profile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.family_name.trim(), self.surname.trim()).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_paths_follow_role() {
        assert_eq!(Role::SuperAdmin.home_path(), "/super-admin");
        assert_eq!(Role::Admin.home_path(), "/admin");
        assert_eq!(Role::Teacher.home_path(), "/teacher");
        assert_eq!(Role::Parent.home_path(), "/parent");
        assert_eq!(Role::Unknown.home_path(), "/");
    }

    #[test]
    fn unknown_wire_role_decodes_to_unknown() {
        let p: Profile = serde_json::from_str(
            r#"{"id":"p1","user_id":"u1","role":"janitor","family_name":"Martin","surname":"Léa"}"#,
        ).unwrap();
        assert_eq!(p.role, Role::Unknown);
        assert_eq!(serde_json::from_str::<Role>("\"super_admin\"").unwrap(), Role::SuperAdmin);
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
    }

    #[test]
    fn display_name_joins_family_name_and_surname() {
        let p = Profile {
            id: "p1".into(),
            user_id: "u1".into(),
            role: Role::Teacher,
            family_name: "Dupont".into(),
            surname: "Claire ".into(),
        };
        assert_eq!(p.display_name(), "Dupont Claire");
        let no_surname = Profile { surname: String::new(), ..p };
        assert_eq!(no_surname.display_name(), "Dupont");
    }
}
