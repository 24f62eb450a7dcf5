//! Authentication and authorization for Darshan
//!
//! Provides:
//! - JWT token validation (tokens are issued by the portal's auth service)
//! - Role and scope checks for content operations

pub mod actor;
pub mod jwt;

pub use actor::{Actor, Role};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
