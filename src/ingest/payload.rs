//! Request payload parsing and field reassembly
//!
//! Submissions arrive in one of two encodings that must decode to the same
//! logical record:
//! - `multipart/form-data`: scalars as string parts, nested objects in
//!   bracket notation (`coordinates[lat]`), flat string arrays comma-joined,
//!   structured arrays JSON-stringified, the binary under the `headerImage`
//!   part, and an `uploadMethod` marker part;
//! - `application/json`: one object with the same fields, arrays and nested
//!   objects native, `headerImage` holding a literal URL.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use crate::assets::AssetUpload;
use crate::ingest::descriptor::EntityDescriptor;
use crate::types::{DarshanError, Result};

/// Multipart part name carrying the binary file
pub const FILE_FIELD: &str = "headerImage";

/// Multipart part name telling the receiver how to interpret the image field
pub const UPLOAD_METHOD_FIELD: &str = "uploadMethod";

/// How the submission sources its header image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMethod {
    /// A binary file is attached and must be pushed to the asset host
    File,
    /// `headerImage` carries a user-pasted URL, stored literally
    Url,
}

impl UploadMethod {
    pub fn parse(s: &str) -> Option<UploadMethod> {
        match s {
            "file" => Some(UploadMethod::File),
            "url" => Some(UploadMethod::Url),
            _ => None,
        }
    }
}

impl fmt::Display for UploadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMethod::File => write!(f, "file"),
            UploadMethod::Url => write!(f, "url"),
        }
    }
}

/// A submission body, decoded far enough to branch on
#[derive(Debug)]
pub enum IngestPayload {
    Json(Value),
    Multipart {
        /// Text parts in arrival order
        fields: Vec<(String, String)>,
        file: Option<AssetUpload>,
    },
}

impl IngestPayload {
    /// Decode a request body by content type
    pub async fn from_body(content_type: Option<&str>, body: Bytes) -> Result<IngestPayload> {
        let content_type = content_type.unwrap_or("application/json");

        if content_type.starts_with("multipart/form-data") {
            let boundary = multer::parse_boundary(content_type)
                .map_err(|e| DarshanError::BadRequest(format!("Invalid multipart body: {}", e)))?;
            return parse_multipart(body, &boundary).await;
        }

        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| DarshanError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        if !value.is_object() {
            return Err(DarshanError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        }
        Ok(IngestPayload::Json(value))
    }

    /// The declared upload method. Multipart defaults to `file` when a
    /// binary is attached; JSON bodies always carry a literal URL.
    pub fn upload_method(&self) -> UploadMethod {
        match self {
            IngestPayload::Json(_) => UploadMethod::Url,
            IngestPayload::Multipart { fields, file } => fields
                .iter()
                .find(|(k, _)| k == UPLOAD_METHOD_FIELD)
                .and_then(|(_, v)| UploadMethod::parse(v))
                .unwrap_or(if file.is_some() {
                    UploadMethod::File
                } else {
                    UploadMethod::Url
                }),
        }
    }
}

async fn parse_multipart(body: Bytes, boundary: &str) -> Result<IngestPayload> {
    let stream = futures_util::stream::once(async move {
        Ok::<Bytes, std::convert::Infallible>(body)
    });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut file: Option<AssetUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DarshanError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        // The binary arrives under the image field name with a filename;
        // a text part under the same name is a pasted URL
        if name == FILE_FIELD && field.file_name().is_some() {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| DarshanError::BadRequest(format!("Failed to read file: {}", e)))?
                .to_vec();

            file = Some(AssetUpload {
                bytes,
                filename,
                content_type,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| DarshanError::BadRequest(format!("Failed to read field: {}", e)))?;
        fields.push((name, value));
    }

    Ok(IngestPayload::Multipart { fields, file })
}

/// Split a `parent[child]` part name
fn parse_bracket(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let close = key.rfind(']')?;
    if close != key.len() - 1 || open == 0 || open + 1 >= close {
        return None;
    }
    Some((&key[..open], &key[open + 1..close]))
}

/// Rebuild the logical record from flattened multipart fields.
///
/// Malformed structured sub-lists are logged and treated as empty - a bad
/// `politicalOverview` string must never fail the whole submission.
pub fn reassemble(fields: &[(String, String)], desc: &EntityDescriptor) -> Value {
    let mut out = Map::new();

    for (key, value) in fields {
        if key == UPLOAD_METHOD_FIELD {
            continue;
        }

        if let Some((parent, child)) = parse_bracket(key) {
            let entry = out
                .entry(parent.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(obj) = entry {
                obj.insert(child.to_string(), scalar_value(value));
            }
            continue;
        }

        if desc.string_list_fields.contains(&key.as_str()) {
            let items: Vec<Value> = value
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect();
            out.insert(key.clone(), Value::Array(items));
            continue;
        }

        if desc.structured_list_fields.contains(&key.as_str()) {
            let parsed = match serde_json::from_str::<Value>(value) {
                Ok(Value::Array(items)) => Value::Array(items),
                Ok(_) | Err(_) => {
                    warn!(field = %key, "Malformed structured list in submission, treating as empty");
                    Value::Array(vec![])
                }
            };
            out.insert(key.clone(), parsed);
            continue;
        }

        if desc.int_fields.contains(&key.as_str()) {
            match value.trim().parse::<i64>() {
                Ok(n) => {
                    out.insert(key.clone(), Value::Number(n.into()));
                }
                Err(_) => {
                    warn!(field = %key, value = %value, "Non-numeric value for integer field, dropping");
                }
            }
            continue;
        }

        out.insert(key.clone(), Value::String(value.clone()));
    }

    Value::Object(out)
}

/// Numbers inside bracketed objects (lat/lng) arrive as strings
fn scalar_value(raw: &str) -> Value {
    if let Ok(f) = raw.trim().parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Normalize a JSON-branch body to the same logical shape `reassemble`
/// produces: the upload-method marker is transport detail, not record data.
pub fn normalize_json(mut value: Value) -> Value {
    if let Value::Object(ref mut map) = value {
        map.remove(UPLOAD_METHOD_FIELD);
    }
    value
}
