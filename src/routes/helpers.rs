//! Shared response and auth helpers for route handlers
//!
//! Every handler translates errors at this boundary into the
//! `{ success: false, message, error? }` envelope; nothing escapes to the
//! runtime as a raw error.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::auth::{extract_token_from_header, Actor, JwtValidator};
use crate::server::AppState;
use crate::types::DarshanError;

pub type FullBody = Full<Bytes>;

/// Serialize a body into a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Success envelope carrying one named payload entry
pub fn success_response(
    status: StatusCode,
    message: &str,
    key: &str,
    payload: Value,
) -> Response<FullBody> {
    json_response(
        status,
        &json!({
            "success": true,
            "message": message,
            key: payload,
        }),
    )
}

/// Translate an error into the failure envelope. Validation failures carry
/// the per-field map so forms can annotate inputs.
pub fn failure_response(err: &DarshanError) -> Response<FullBody> {
    let status = err.http_status();

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Request failed");
    }

    let mut body = json!({
        "success": false,
        "message": err.client_message(),
    });

    if let DarshanError::Validation(map) = err {
        body["errors"] = json!(map);
    }

    json_response(status, &body)
}

fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Resolve the acting admin or rtc user from the request, or produce the
/// error response to return as-is.
pub fn require_actor(
    req: &Request<Incoming>,
    state: &AppState,
) -> Result<Actor, Response<FullBody>> {
    let token = match extract_token_from_header(get_auth_header(req)) {
        Some(t) => t,
        None => {
            return Err(failure_response(&DarshanError::Unauthorized(
                "No token provided".to_string(),
            )))
        }
    };

    let validator = if state.args.dev_mode {
        JwtValidator::new_dev()
    } else {
        JwtValidator::new(&state.args.jwt_secret())
    };

    let result = validator.verify_token(token);
    if !result.valid {
        return Err(failure_response(&DarshanError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".to_string()),
        )));
    }

    let claims = result.claims.expect("valid token carries claims");
    Actor::from_claims(&claims).map_err(|e| failure_response(&e))
}

/// Collect the request body, returning it with the declared content type
pub async fn read_body(
    req: Request<Incoming>,
) -> Result<(Option<String>, Bytes), Response<FullBody>> {
    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            failure_response(&DarshanError::BadRequest(format!(
                "Failed to read request body: {}",
                e
            )))
        })?;

    Ok((content_type, body))
}
