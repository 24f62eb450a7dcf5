//! JWT validation
//!
//! Darshan does not issue tokens; the portal's auth service does. This module
//! only verifies bearer tokens and exposes the claims the handlers need.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Secret used when running with --dev-mode and no JWT_SECRET set
pub const DEV_SECRET: &str = "dev-only-insecure-secret";

/// Claims carried by portal-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id (MongoDB ObjectId hex of the user document)
    pub sub: String,

    /// Actor role: "admin" or "rtc"
    pub role: String,

    /// District ids an rtc actor is assigned to; empty for admins
    #[serde(default, rename = "assignedDistricts")]
    pub assigned_districts: Vec<String>,

    /// Expiry (seconds since epoch)
    pub exp: u64,

    /// Issued-at (seconds since epoch)
    #[serde(default)]
    pub iat: u64,
}

/// Result of token verification
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Verifies bearer tokens against the configured secret
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
}

impl JwtValidator {
    /// Create a validator for the given HMAC secret
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create a validator using the fixed development secret
    pub fn new_dev() -> Self {
        Self::new(DEV_SECRET)
    }

    /// Verify a token and extract its claims
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header.and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(secret: &str, role: &str, districts: Vec<String>, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "64ab00000000000000000001".to_string(),
            role: role.to_string(),
            assigned_districts: districts,
            exp: (now + exp_offset) as u64,
            iat: now as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_round_trip() {
        let validator = JwtValidator::new("test-secret");
        let token = make_token("test-secret", "rtc", vec!["d1".into()], 3600);

        let result = validator.verify_token(&token);
        assert!(result.valid);
        let claims = result.claims.unwrap();
        assert_eq!(claims.role, "rtc");
        assert_eq!(claims.assigned_districts, vec!["d1".to_string()]);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let validator = JwtValidator::new("test-secret");
        let token = make_token("other-secret", "admin", vec![], 3600);

        let result = validator.verify_token(&token);
        assert!(!result.valid);
        assert!(result.claims.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_expired_token_rejected() {
        let validator = JwtValidator::new("test-secret");
        let token = make_token("test-secret", "admin", vec![], -3600);

        let result = validator.verify_token(&token);
        assert!(!result.valid);
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
