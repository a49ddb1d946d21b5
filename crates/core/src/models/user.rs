use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A user account. The password digest never serializes; invariant 7 of the
/// data model is enforced at the type level rather than per handler.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub org_id: i64,
    pub email: String,
    #[serde(skip)]
    pub password_digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_digest_never_serializes() {
        let user = User {
            id: 1,
            org_id: 1,
            email: "superadmin@maintenant.com".to_string(),
            password_digest: "$argon2id$secret".to_string(),
            first_name: None,
            last_name: None,
            roles: vec!["org_admin".to_string()],
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(!json.contains("first_name"));
    }
}
