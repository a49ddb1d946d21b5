//! Per-request authenticated context

use chrono::{DateTime, Utc};

use crate::auth::roles::{roles_from_claims, Role};
use crate::auth::token::Claims;
use crate::error::{CoreError, Result};
use crate::MAIN_TENANT_ORG_ID;

/// Identity attached to a request after its bearer token is validated.
/// Every data-plane operation scopes itself through `org_id`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub org_id: i64,
    pub roles: Vec<Role>,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| CoreError::validation("token subject is not a user id"))?;
        Ok(Self {
            user_id,
            org_id: claims.org_id,
            roles: roles_from_claims(&claims.roles),
            expires_at: claims.expires_at(),
        })
    }

    pub fn is_main_tenant(&self) -> bool {
        self.org_id == MAIN_TENANT_ORG_ID
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    /// Role guard. Rejects unless this context holds at least one of the
    /// declared roles. Declaring an empty set is a programming error and is
    /// reported as an internal failure, not as a permissions problem.
    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if roles.is_empty() {
            return Err(CoreError::Internal(
                "role guard declared with an empty role set".to_string(),
            ));
        }
        if self.has_any(roles) {
            Ok(())
        } else {
            Err(CoreError::InsufficientPermissions)
        }
    }

    /// Resolve the organization a request may operate on.
    ///
    /// The main tenant may name any organization explicitly; every other
    /// context is pinned to its own and any attempt to reach across is
    /// rejected with `forbidden_org_change`.
    pub fn resolve_org(&self, requested: Option<i64>) -> Result<i64> {
        match requested {
            None => Ok(self.org_id),
            Some(org_id) if org_id == self.org_id => Ok(self.org_id),
            Some(org_id) => {
                if !self.is_main_tenant() {
                    return Err(CoreError::ForbiddenOrgChange);
                }
                if org_id <= 0 {
                    return Err(CoreError::validation("org_id must be positive"));
                }
                Ok(org_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(org_id: i64, roles: Vec<Role>) -> AuthContext {
        AuthContext {
            user_id: 10,
            org_id,
            roles,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_require_any_accepts_intersection() {
        let c = ctx(2, vec![Role::ProjectAdmin]);
        assert!(c
            .require_any(&[Role::OrgAdmin, Role::ProjectAdmin])
            .is_ok());
    }

    #[test]
    fn test_require_any_rejects_disjoint() {
        let c = ctx(2, vec![Role::Viewer]);
        let err = c.require_any(&[Role::OrgAdmin]).unwrap_err();
        assert_eq!(err.code(), "insufficient_permissions");
    }

    #[test]
    fn test_require_any_empty_set_is_internal() {
        let c = ctx(2, vec![Role::OrgAdmin]);
        let err = c.require_any(&[]).unwrap_err();
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn test_main_tenant_may_cross_orgs() {
        let c = ctx(MAIN_TENANT_ORG_ID, vec![Role::OrgAdmin]);
        assert_eq!(c.resolve_org(Some(42)).unwrap(), 42);
        assert_eq!(c.resolve_org(None).unwrap(), MAIN_TENANT_ORG_ID);
    }

    #[test]
    fn test_other_tenant_is_pinned() {
        let c = ctx(2, vec![Role::OrgAdmin]);
        assert_eq!(c.resolve_org(None).unwrap(), 2);
        assert_eq!(c.resolve_org(Some(2)).unwrap(), 2);
        let err = c.resolve_org(Some(42)).unwrap_err();
        assert_eq!(err.code(), "forbidden_org_change");
    }
}
