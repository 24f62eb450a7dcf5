//! Record validation
//!
//! Pure checks over the reassembled record. Every failure is accumulated
//! into one map so the caller can annotate all offending fields at once;
//! nothing here touches the network or the database.

use serde_json::Value;

use crate::ingest::descriptor::EntityDescriptor;
use crate::ingest::payload::UploadMethod;
use crate::types::ErrorMap;

/// Derive a URL slug from a display name: lowercase, alphanumerics kept,
/// runs of anything else collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn field_present(record: &Value, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn label_for(field: &str) -> String {
    // "gramPanchayat" -> "Gram panchayat"
    let mut label = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            label.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            label.push(' ');
            label.extend(c.to_lowercase());
        } else {
            label.push(c);
        }
    }
    label
}

/// Validate a draft record against its entity rules.
///
/// `has_file` reports whether a binary was attached to the submission.
/// An empty map means the record may proceed.
pub fn validate_record(
    record: &Value,
    method: UploadMethod,
    has_file: bool,
    desc: &EntityDescriptor,
) -> ErrorMap {
    let mut errors = ErrorMap::new();

    if str_field(record, "name").map(str::trim).unwrap_or("").is_empty() {
        errors.insert("name".to_string(), "Name is required".to_string());
    }

    if str_field(record, "slug").map(str::trim).unwrap_or("").is_empty() {
        errors.insert("slug".to_string(), "Slug is required".to_string());
    }

    // Exactly one image strategy is active per submission
    match method {
        UploadMethod::File => {
            // The pipeline replaces the attachment with the hosted URL
            // before validation runs, so either signal satisfies this
            let has_image = has_file
                || !str_field(record, "headerImage").map(str::trim).unwrap_or("").is_empty();
            if !has_image {
                errors.insert(
                    "headerImage".to_string(),
                    "An image file is required".to_string(),
                );
            }
        }
        UploadMethod::Url => {
            if str_field(record, "headerImage").map(str::trim).unwrap_or("").is_empty() {
                errors.insert(
                    "headerImage".to_string(),
                    "An image URL is required".to_string(),
                );
            }
        }
    }

    let coordinates = record.get("coordinates");
    let lat = coordinates.and_then(|c| c.get("lat")).and_then(Value::as_f64);
    let lng = coordinates.and_then(|c| c.get("lng")).and_then(Value::as_f64);

    if desc.requires_coordinates {
        if lat.is_none() {
            errors.insert(
                "coordinates.lat".to_string(),
                "Latitude is required".to_string(),
            );
        }
        if lng.is_none() {
            errors.insert(
                "coordinates.lng".to_string(),
                "Longitude is required".to_string(),
            );
        }
    } else {
        // Optional, but never one without the other
        match (lat, lng) {
            (Some(_), None) => {
                errors.insert(
                    "coordinates.lng".to_string(),
                    "Latitude and longitude must be provided together".to_string(),
                );
            }
            (None, Some(_)) => {
                errors.insert(
                    "coordinates.lat".to_string(),
                    "Latitude and longitude must be provided together".to_string(),
                );
            }
            _ => {}
        }
    }

    for field in desc.required_fields {
        if !field_present(record, field) {
            errors.insert(
                field.to_string(),
                format!("{} is required", label_for(field)),
            );
        }
    }

    errors
}
