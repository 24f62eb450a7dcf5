//! Roles and per-record authorization checks
//!
//! Two roles exist: `admin` has full access, `rtc` (regional tourism
//! coordinator) is scoped to its assigned districts and to records it
//! created. Deletion is admin-only; update additionally allows the owning
//! rtc actor. That asymmetry is long-standing portal behavior and both gates
//! are kept explicit here.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::Claims;
use crate::types::{DarshanError, Result};

/// Actor roles, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regional tourism coordinator - scoped access
    Rtc,
    /// Full access
    Admin,
}

impl Role {
    /// Parse a role string from token claims. Unknown roles are rejected.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "rtc" => Some(Role::Rtc),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Rtc => write!(f, "rtc"),
        }
    }
}

/// The authenticated entity performing an operation
#[derive(Debug, Clone)]
pub struct Actor {
    /// User document id (ObjectId hex)
    pub id: String,
    pub role: Role,
    /// District ids this actor may manage; only meaningful for rtc
    pub assigned_districts: Vec<String>,
}

impl Actor {
    /// Build an actor from verified token claims.
    /// Tokens with a role outside admin/rtc cannot use the content API.
    pub fn from_claims(claims: &Claims) -> Result<Actor> {
        let role = Role::parse(&claims.role).ok_or_else(|| {
            DarshanError::Forbidden(format!("Role '{}' may not manage content", claims.role))
        })?;

        Ok(Actor {
            id: claims.sub.clone(),
            role,
            assigned_districts: claims.assigned_districts.clone(),
        })
    }

    /// May this actor create or update records scoped to the given district?
    pub fn can_manage_district(&self, district_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Rtc => self.assigned_districts.iter().any(|d| d == district_id),
        }
    }

    /// May this actor mutate a record created by `created_by`?
    /// Admins are exempt from the ownership check.
    pub fn owns(&self, created_by: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Rtc => self.id == created_by,
        }
    }

    /// Only admins may delete records
    pub fn can_delete(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtc(districts: &[&str]) -> Actor {
        Actor {
            id: "u-rtc".to_string(),
            role: Role::Rtc,
            assigned_districts: districts.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn admin() -> Actor {
        Actor {
            id: "u-admin".to_string(),
            role: Role::Admin,
            assigned_districts: vec![],
        }
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Rtc);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("rtc"), Some(Role::Rtc));
        assert_eq!(Role::parse("editor"), None);
    }

    #[test]
    fn test_rtc_scope_check() {
        let actor = rtc(&["dist-a"]);
        assert!(actor.can_manage_district("dist-a"));
        assert!(!actor.can_manage_district("dist-b"));
    }

    #[test]
    fn test_admin_manages_any_district() {
        assert!(admin().can_manage_district("dist-b"));
    }

    #[test]
    fn test_ownership_check() {
        let actor = rtc(&["dist-a"]);
        assert!(actor.owns("u-rtc"));
        assert!(!actor.owns("u-other"));
        assert!(admin().owns("u-other"));
    }

    #[test]
    fn test_only_admin_deletes() {
        assert!(admin().can_delete());
        assert!(!rtc(&["dist-a"]).can_delete());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let claims = Claims {
            sub: "u1".to_string(),
            role: "visitor".to_string(),
            assigned_districts: vec![],
            exp: 0,
            iat: 0,
        };
        assert!(Actor::from_claims(&claims).is_err());
    }
}
