//! HTTP routes for Darshan

pub mod entity;
pub mod health;
pub mod helpers;

pub use health::{health_check, version_info};
pub use helpers::{failure_response, json_response, success_response};
