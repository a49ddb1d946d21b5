//! Role definitions and parsing

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Roles a user may hold within their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access to tenant-scoped data
    Viewer,
    /// May create and update items and assets
    ProjectAdmin,
    /// Full control inside the organization, including user management
    OrgAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Viewer, Role::ProjectAdmin, Role::OrgAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::ProjectAdmin => "project_admin",
            Role::OrgAdmin => "org_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim() {
            "viewer" => Some(Role::Viewer),
            "project_admin" => Some(Role::ProjectAdmin),
            "org_admin" => Some(Role::OrgAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Role::parse(s).ok_or_else(|| CoreError::validation(format!("unknown role: {}", s)))
    }
}

/// Validate a user-management role payload: every entry must name a known
/// role and the set must not be empty.
pub fn validate_roles(roles: &[String]) -> Result<Vec<Role>> {
    if roles.is_empty() {
        return Err(CoreError::validation("at least one role is required"));
    }
    let mut parsed = Vec::with_capacity(roles.len());
    for raw in roles {
        let role = Role::parse(raw)
            .ok_or_else(|| CoreError::validation(format!("unknown role: {}", raw)))?;
        if !parsed.contains(&role) {
            parsed.push(role);
        }
    }
    Ok(parsed)
}

/// Parse role strings from token claims. Unknown strings are carried in the
/// claims but never satisfy a guard, so they are simply dropped here.
pub fn roles_from_claims(roles: &[String]) -> Vec<Role> {
    roles.iter().filter_map(|r| Role::parse(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Role::parse("  org_admin "), Some(Role::OrgAdmin));
    }

    #[test]
    fn test_validate_roles_rejects_unknown() {
        let err = validate_roles(&["superuser".to_string()]).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_validate_roles_rejects_empty() {
        assert!(validate_roles(&[]).is_err());
    }

    #[test]
    fn test_validate_roles_dedupes() {
        let roles = validate_roles(&["viewer".to_string(), "viewer".to_string()]).unwrap();
        assert_eq!(roles, vec![Role::Viewer]);
    }

    #[test]
    fn test_claims_roles_drop_unknown() {
        let roles = roles_from_claims(&[
            "viewer".to_string(),
            "galactic_overlord".to_string(),
        ]);
        assert_eq!(roles, vec![Role::Viewer]);
    }
}
