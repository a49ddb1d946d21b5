//! Signed session tokens
//!
//! Issues and validates the HS256 tokens that carry `(user_id, org_id, roles)`
//! between requests. Only one algorithm is ever accepted on verify; oversized
//! or structurally broken tokens are rejected before any cryptographic work.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

/// Hard cap on accepted token size, checked before decoding.
const MAX_TOKEN_BYTES: usize = 8 * 1024;

/// Maximum length of a single role entry after trimming.
const MAX_ROLE_LEN: usize = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token was signed with an unexpected algorithm")]
    WrongAlgorithm,

    #[error("token issuer is not recognised")]
    BadIssuer,

    #[error("token audience is not recognised")]
    BadAudience,

    #[error("token subject is not a valid user id")]
    InvalidUserId,

    #[error("token organization id is not valid")]
    InvalidOrgId,

    #[error("token carries no roles")]
    NoRoles,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TokenError {
    /// Stable machine code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expired => "token_expired",
            Self::Malformed => "malformed_token",
            Self::WrongAlgorithm => "invalid_signing_method",
            Self::InvalidUserId => "invalid_user_id",
            Self::InvalidOrgId => "invalid_org_id",
            Self::NoRoles => "no_roles",
            Self::InvalidInput(_) => "validation_error",
            Self::NotYetValid | Self::BadSignature | Self::BadIssuer | Self::BadAudience => {
                "authentication_required"
            }
        }
    }
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, stringified per RFC 7519 `sub`
    pub sub: String,
    /// Organization the session is bound to
    pub org_id: i64,
    /// Role names as issued; unknown entries never satisfy a guard
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse::<i64>().ok().filter(|id| *id > 0)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// Remaining lifetime relative to now. Negative once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at() - Utc::now()
    }
}

/// Issues and validates session tokens with a single symmetric key.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl TokenManager {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_nbf = true;

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::seconds(config.jwt_expiry_secs),
        }
    }

    /// Issue a token for an authenticated user.
    ///
    /// Roles are sanitized: trimmed, capped at 50 characters, empties
    /// dropped. An empty sanitized set is an input error, as are
    /// non-positive ids.
    pub fn issue(
        &self,
        user_id: i64,
        org_id: i64,
        roles: &[String],
    ) -> Result<String, TokenError> {
        if user_id <= 0 {
            return Err(TokenError::InvalidInput(
                "user_id must be positive".to_string(),
            ));
        }
        if org_id <= 0 {
            return Err(TokenError::InvalidInput(
                "org_id must be positive".to_string(),
            ));
        }

        let sanitized: Vec<String> = roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| {
                let mut r = r.to_string();
                r.truncate(MAX_ROLE_LEN);
                r
            })
            .collect();
        if sanitized.is_empty() {
            return Err(TokenError::InvalidInput(
                "at least one role is required".to_string(),
            ));
        }

        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            org_id,
            roles: sanitized,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Malformed)
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::Malformed);
        }
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::WrongAlgorithm
                }
                ErrorKind::InvalidIssuer => TokenError::BadIssuer,
                ErrorKind::InvalidAudience => TokenError::BadAudience,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.user_id().is_none() {
            return Err(TokenError::InvalidUserId);
        }
        if claims.org_id <= 0 {
            return Err(TokenError::InvalidOrgId);
        }
        if claims.roles.iter().all(|r| r.trim().is_empty()) {
            return Err(TokenError::NoRoles);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new(&AppConfig::default())
    }

    fn manager_with(expiry_secs: i64) -> TokenManager {
        let config = AppConfig {
            jwt_expiry_secs: expiry_secs,
            ..AppConfig::default()
        };
        TokenManager::new(&config)
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let mgr = manager();
        let token = mgr
            .issue(7, 1, &["org_admin".to_string(), "viewer".to_string()])
            .unwrap();
        let claims = mgr.verify(&token).unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.org_id, 1);
        assert_eq!(claims.roles, vec!["org_admin", "viewer"]);
        assert!(claims.remaining() > Duration::zero());
    }

    #[test]
    fn test_issue_sanitizes_roles() {
        let mgr = manager();
        let long_role = "x".repeat(120);
        let token = mgr
            .issue(1, 1, &["  viewer  ".to_string(), String::new(), long_role])
            .unwrap();
        let claims = mgr.verify(&token).unwrap();
        assert_eq!(claims.roles[0], "viewer");
        assert_eq!(claims.roles[1].len(), 50);
    }

    #[test]
    fn test_issue_rejects_bad_input() {
        let mgr = manager();
        assert!(matches!(
            mgr.issue(0, 1, &["viewer".to_string()]),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            mgr.issue(1, -4, &["viewer".to_string()]),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            mgr.issue(1, 1, &["   ".to_string()]),
            Err(TokenError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_before_crypto() {
        let mgr = manager();
        assert_eq!(mgr.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(mgr.verify("a.b"), Err(TokenError::Malformed));

        let huge = "a".repeat(MAX_TOKEN_BYTES + 1);
        assert_eq!(mgr.verify(&huge), Err(TokenError::Malformed));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let mgr = manager();
        let other = TokenManager::new(&AppConfig {
            jwt_secret: "another-secret-key-of-sufficient-len".to_string(),
            ..AppConfig::default()
        });
        let token = other.issue(1, 1, &["viewer".to_string()]).unwrap();
        assert_eq!(mgr.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let mgr = manager();
        let other = TokenManager::new(&AppConfig {
            jwt_issuer: "someone-else".to_string(),
            ..AppConfig::default()
        });
        let token = other.issue(1, 1, &["viewer".to_string()]).unwrap();
        assert_eq!(mgr.verify(&token), Err(TokenError::BadIssuer));
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let mgr = manager();
        let other = TokenManager::new(&AppConfig {
            jwt_audience: "other-api".to_string(),
            ..AppConfig::default()
        });
        let token = other.issue(1, 1, &["viewer".to_string()]).unwrap();
        assert_eq!(mgr.verify(&token), Err(TokenError::BadAudience));
    }

    #[test]
    fn test_verify_rejects_wrong_algorithm() {
        // A token signed with HS384 must be refused even with the right key.
        let config = AppConfig::default();
        let mut header = Header::new(Algorithm::HS384);
        header.typ = Some("JWT".to_string());
        let now = Utc::now();
        let claims = Claims {
            sub: "1".to_string(),
            org_id: 1,
            roles: vec!["viewer".to_string()],
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(manager().verify(&token), Err(TokenError::WrongAlgorithm));
    }

    #[test]
    fn test_verify_rejects_expired() {
        // Issue with the shortest legal lifetime, then verify against a
        // manager whose leeway is zeroed so the clock does not save it.
        let config = AppConfig::default();
        let now = Utc::now();
        let claims = Claims {
            sub: "1".to_string(),
            org_id: 1,
            roles: vec!["viewer".to_string()],
            iss: config.jwt_issuer.clone(),
            aud: config.jwt_audience.clone(),
            iat: (now - Duration::hours(2)).timestamp(),
            nbf: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        let mut mgr = manager();
        mgr.validation.leeway = 0;
        assert_eq!(mgr.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_verify_rejects_bad_claims() {
        let config = AppConfig::default();
        let now = Utc::now();
        let make = |sub: &str, org_id: i64, roles: Vec<String>| {
            let claims = Claims {
                sub: sub.to_string(),
                org_id,
                roles,
                iss: config.jwt_issuer.clone(),
                aud: config.jwt_audience.clone(),
                iat: now.timestamp(),
                nbf: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
            };
            encode(
                &Header::new(Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            )
            .unwrap()
        };
        let mgr = manager();

        assert_eq!(
            mgr.verify(&make("0", 1, vec!["viewer".to_string()])),
            Err(TokenError::InvalidUserId)
        );
        assert_eq!(
            mgr.verify(&make("nope", 1, vec!["viewer".to_string()])),
            Err(TokenError::InvalidUserId)
        );
        assert_eq!(
            mgr.verify(&make("1", 0, vec!["viewer".to_string()])),
            Err(TokenError::InvalidOrgId)
        );
        assert_eq!(mgr.verify(&make("1", 1, vec![])), Err(TokenError::NoRoles));
    }

    #[test]
    fn test_expiry_tracks_config() {
        let mgr = manager_with(1800);
        let token = mgr.issue(1, 1, &["viewer".to_string()]).unwrap();
        let claims = mgr.verify(&token).unwrap();
        let remaining = claims.remaining();
        assert!(remaining <= Duration::seconds(1800));
        assert!(remaining > Duration::seconds(1700));
    }
}
