//! Generic record ingest pipeline
//!
//! One create/update/delete flow shared by districts, panchayats and media
//! items, parameterized by an `EntityDescriptor` and the schema type. Within
//! a call the steps run strictly in order: payload decode, asset upload,
//! reassembly, validation, foreign-key and scope checks, uniqueness, then
//! the database write. There is no retry and no transaction; slug races are
//! settled by the collection's unique index.

use bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::assets::{AssetStore, DeleteOutcome};
use crate::auth::Actor;
use crate::db::schemas::RecordFields;
use crate::db::{IntoIndexes, MongoClient, MutMetadata};
use crate::ingest::descriptor::{EntityDescriptor, SlugScope};
use crate::ingest::payload::{normalize_json, reassemble, IngestPayload, UploadMethod, FILE_FIELD};
use crate::ingest::validate::{slugify, validate_record};
use crate::types::{DarshanError, ErrorMap, Result};

/// Bound shared by every schema the pipeline can persist
pub trait IngestRecord:
    Serialize
    + DeserializeOwned
    + Unpin
    + Send
    + Sync
    + IntoIndexes
    + MutMetadata
    + RecordFields
{
}

impl<T> IngestRecord for T where
    T: Serialize
        + DeserializeOwned
        + Unpin
        + Send
        + Sync
        + IntoIndexes
        + MutMetadata
        + RecordFields
{
}

/// Create a record from a decoded submission
pub async fn create_record<T: IngestRecord>(
    mongo: &MongoClient,
    assets: &dyn AssetStore,
    actor: &Actor,
    payload: IngestPayload,
    desc: &EntityDescriptor,
) -> Result<Value> {
    let method = payload.upload_method();
    let (mut fields, file) = split_payload(payload, desc);
    let had_file = file.is_some();

    // Upload runs before the static checks; a rejection later in the
    // pipeline leaves the uploaded asset on the host (no compensation).
    if method == UploadMethod::File {
        if let Some(ref upload) = file {
            let url = assets
                .upload(upload, desc.asset_folder, &desc.constraints)
                .await?;
            set_field(&mut fields, FILE_FIELD, Value::String(url));
        }
    }

    strip_server_fields(&mut fields);
    drop_blank_refs(&mut fields, desc);
    ensure_slug(&mut fields);

    let errors = validate_record(&fields, method, had_file, desc);
    if !errors.is_empty() {
        return Err(DarshanError::Validation(errors));
    }

    check_ref_fields(mongo, &fields, desc).await?;
    check_scope(actor, &fields)?;
    check_slug_unique(mongo, desc, &fields, None, None).await?;

    if field_str(&fields, "status").unwrap_or("").is_empty() {
        set_field(&mut fields, "status", json!(desc.default_status));
    }
    set_field(&mut fields, "createdBy", Value::String(actor.id.clone()));

    let record: T = serde_json::from_value(fields)
        .map_err(|e| DarshanError::BadRequest(format!("Malformed record: {}", e)))?;

    let collection = mongo.collection::<T>(desc.collection).await?;
    let id = collection
        .insert_one(record)
        .await
        .map_err(|e| map_duplicate_key(e, desc))?;

    info!(entity = desc.entity_name, id = %id, actor = %actor.id, "Record created");

    load_populated::<T>(mongo, desc, &id).await
}

/// Apply a partial or full field replacement to an existing record
pub async fn update_record<T: IngestRecord>(
    mongo: &MongoClient,
    assets: &dyn AssetStore,
    actor: &Actor,
    payload: IngestPayload,
    desc: &EntityDescriptor,
    id: &str,
) -> Result<Value> {
    let oid = parse_object_id(id, desc)?;
    let collection = mongo.collection::<T>(desc.collection).await?;
    let existing = collection
        .find_by_id(&oid)
        .await?
        .ok_or_else(|| not_found(desc))?;

    if !actor.owns(existing.record_created_by()) {
        return Err(DarshanError::Forbidden(
            "You may only modify records you created".to_string(),
        ));
    }

    let method = payload.upload_method();
    let (mut fields, file) = split_payload(payload, desc);

    // A new file replaces the stored asset URL; without one the existing
    // image stands
    if method == UploadMethod::File {
        if let Some(ref upload) = file {
            let url = assets
                .upload(upload, desc.asset_folder, &desc.constraints)
                .await?;
            set_field(&mut fields, FILE_FIELD, Value::String(url));
        }
    }

    strip_server_fields(&mut fields);
    drop_blank_refs(&mut fields, desc);

    // A blank slug on update means "leave it alone", not "erase it"
    if field_str(&fields, "slug").map(str::trim) == Some("") {
        if let Value::Object(map) = &mut fields {
            map.remove("slug");
        }
    }

    check_partial_coordinates(&fields)?;

    // FK syntax/existence for whatever references the update touches, and
    // the scope check against the NEW district when it is changing
    check_ref_fields(mongo, &fields, desc).await?;
    check_scope(actor, &fields)?;

    let slug_touched = fields.get("slug").is_some();
    let scope_touched = match desc.slug_scope {
        SlugScope::WithinField(f) => fields.get(f).is_some(),
        SlugScope::Global => false,
    };
    if slug_touched || scope_touched {
        let slug = field_str(&fields, "slug")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| existing.record_slug());
        let scope_value = match desc.slug_scope {
            SlugScope::WithinField(f) => field_str(&fields, f)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| existing.record_scope_ref()),
            SlugScope::Global => None,
        };
        check_slug_unique(mongo, desc, &json!({ "slug": slug }), scope_value, Some(&oid)).await?;
    }

    let set_doc = build_set_document(&fields)?;
    collection
        .update_one(doc! { "_id": oid }, doc! { "$set": set_doc })
        .await
        .map_err(|e| map_duplicate_key(e, desc))?;

    info!(entity = desc.entity_name, id = %oid, actor = %actor.id, "Record updated");

    load_populated::<T>(mongo, desc, &oid).await
}

/// Delete a record: cascade-unset dependents, best-effort asset cleanup,
/// then remove the document. Returns the confirmation payload.
pub async fn delete_record<T: IngestRecord>(
    mongo: &MongoClient,
    assets: &dyn AssetStore,
    actor: &Actor,
    desc: &EntityDescriptor,
    id: &str,
) -> Result<Value> {
    if !actor.can_delete() {
        return Err(DarshanError::Forbidden(
            "Only administrators may delete records".to_string(),
        ));
    }

    let oid = parse_object_id(id, desc)?;
    let collection = mongo.collection::<T>(desc.collection).await?;
    let existing = collection
        .find_by_id(&oid)
        .await?
        .ok_or_else(|| not_found(desc))?;

    // Dependent documents keep existing; only their reference is removed
    for dep in desc.dependents {
        let cleared = mongo
            .unset_reference_many(dep.collection, dep.field, &oid.to_hex())
            .await?;
        if cleared > 0 {
            info!(
                entity = desc.entity_name,
                id = %oid,
                collection = dep.collection,
                cleared,
                "Cleared dependent references"
            );
        }
    }

    cleanup_remote_asset(assets, existing.record_header_image()).await;

    collection.delete_one(doc! { "_id": oid }).await?;

    info!(entity = desc.entity_name, id = %oid, actor = %actor.id, "Record deleted");

    let mut confirmation = json!({
        "id": oid.to_hex(),
        "name": existing.record_name(),
        "slug": existing.record_slug(),
    });
    if let Some(scope) = existing.record_scope_ref() {
        confirmation["district"] = Value::String(scope.to_string());
    }
    Ok(confirmation)
}

/// Remove the stored asset from the host if it is one of ours. Failures are
/// logged and swallowed; record deletion must proceed regardless.
async fn cleanup_remote_asset(assets: &dyn AssetStore, url: &str) {
    if url.is_empty() {
        return;
    }
    match assets.delete(url).await {
        DeleteOutcome::Deleted => debug!(url = %url, "Remote asset deleted"),
        DeleteOutcome::Skipped(reason) => debug!(url = %url, reason = %reason, "Remote asset skipped"),
        DeleteOutcome::Failed(reason) => {
            warn!(url = %url, reason = %reason, "Remote asset deletion failed, continuing")
        }
    }
}

// =============================================================================
// Pipeline steps
// =============================================================================

fn split_payload(
    payload: IngestPayload,
    desc: &EntityDescriptor,
) -> (Value, Option<crate::assets::AssetUpload>) {
    match payload {
        IngestPayload::Json(value) => (normalize_json(value), None),
        IngestPayload::Multipart { fields, file } => (reassemble(&fields, desc), file),
    }
}

/// Drop fields the client has no business supplying
fn strip_server_fields(fields: &mut Value) {
    if let Value::Object(map) = fields {
        map.remove("_id");
        map.remove("metadata");
        map.remove("createdBy");
    }
}

/// An optional reference submitted as an empty string is no reference
fn drop_blank_refs(fields: &mut Value, desc: &EntityDescriptor) {
    if let Value::Object(map) = fields {
        for rf in desc.ref_fields {
            let blank = matches!(map.get(rf.field), Some(Value::String(s)) if s.trim().is_empty());
            if blank {
                map.remove(rf.field);
            }
        }
    }
}

/// Derive the slug from the name when the submission carries none
fn ensure_slug(fields: &mut Value) {
    let missing = field_str(fields, "slug").map(str::trim).unwrap_or("").is_empty();
    if missing {
        if let Some(name) = field_str(fields, "name") {
            let derived = slugify(name);
            if !derived.is_empty() {
                set_field(fields, "slug", Value::String(derived));
            }
        }
    }
}

/// Reject a coordinates object carrying only one of lat/lng; they are only
/// ever persisted together
fn check_partial_coordinates(fields: &Value) -> Result<()> {
    let Some(coords) = fields.get("coordinates") else {
        return Ok(());
    };

    let lat = coords.get("lat").and_then(Value::as_f64);
    let lng = coords.get("lng").and_then(Value::as_f64);

    let mut errors = ErrorMap::new();
    match (lat, lng) {
        (Some(_), Some(_)) => return Ok(()),
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
        (None, None) => {
            errors.insert(
                "coordinates.lat".to_string(),
                "Latitude and longitude must be provided together".to_string(),
            );
            errors.insert(
                "coordinates.lng".to_string(),
                "Latitude and longitude must be provided together".to_string(),
            );
        }
    }
    Err(DarshanError::Validation(errors))
}

/// Validate syntax and existence of every reference the submission carries
async fn check_ref_fields(
    mongo: &MongoClient,
    fields: &Value,
    desc: &EntityDescriptor,
) -> Result<()> {
    for rf in desc.ref_fields {
        let Some(raw) = field_str(fields, rf.field).filter(|s| !s.trim().is_empty()) else {
            // Required-but-missing is already a validation failure
            continue;
        };

        let oid = ObjectId::parse_str(raw).map_err(|_| {
            DarshanError::BadRequest(format!("Invalid {} id '{}'", rf.field, raw))
        })?;

        let found = mongo
            .raw_collection(rf.collection)
            .find_one(doc! { "_id": oid })
            .await
            .map_err(|e| DarshanError::Database(format!("Reference lookup failed: {}", e)))?;

        if found.is_none() {
            return Err(DarshanError::NotFound(format!(
                "Referenced {} does not exist",
                rf.field
            )));
        }
    }
    Ok(())
}

/// rtc actors may only place records in districts assigned to them
fn check_scope(actor: &Actor, fields: &Value) -> Result<()> {
    if let Some(district) = field_str(fields, "district").filter(|s| !s.trim().is_empty()) {
        if !actor.can_manage_district(district) {
            return Err(DarshanError::Forbidden(
                "You are not assigned to this district".to_string(),
            ));
        }
    }
    Ok(())
}

/// Application-level uniqueness check. The unique index remains the final
/// arbiter under concurrent creates.
async fn check_slug_unique(
    mongo: &MongoClient,
    desc: &EntityDescriptor,
    fields: &Value,
    scope_override: Option<&str>,
    exclude: Option<&ObjectId>,
) -> Result<()> {
    let Some(slug) = field_str(fields, "slug").filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let mut filter = doc! { "slug": slug };
    if let SlugScope::WithinField(scope_field) = desc.slug_scope {
        let scope = scope_override.or_else(|| field_str(fields, scope_field));
        if let Some(scope) = scope {
            filter.insert(scope_field, scope);
        }
    }
    if let Some(id) = exclude {
        filter.insert("_id", doc! { "$ne": *id });
    }

    let count = mongo
        .raw_collection(desc.collection)
        .count_documents(filter)
        .await
        .map_err(|e| DarshanError::Database(format!("Uniqueness check failed: {}", e)))?;

    if count > 0 {
        return Err(slug_conflict(desc));
    }
    Ok(())
}

fn build_set_document(fields: &Value) -> Result<Document> {
    let Value::Object(map) = fields else {
        return Err(DarshanError::BadRequest("Malformed record".to_string()));
    };

    let mut set_doc = Document::new();
    for (key, value) in map {
        let bson_value = bson::to_bson(value)
            .map_err(|e| DarshanError::Internal(format!("Field conversion failed: {}", e)))?;
        set_doc.insert(key.clone(), bson_value);
    }
    set_doc.insert("metadata.updated_at", DateTime::now());
    Ok(set_doc)
}

/// Reload a record and attach referenced display names for the response
async fn load_populated<T: IngestRecord>(
    mongo: &MongoClient,
    desc: &EntityDescriptor,
    id: &ObjectId,
) -> Result<Value> {
    let collection = mongo.collection::<T>(desc.collection).await?;
    let stored = collection
        .find_by_id(id)
        .await?
        .ok_or_else(|| DarshanError::Internal("Record vanished after write".to_string()))?;

    let mut value = to_api_json(&stored)?;
    populate_refs(mongo, desc, &mut value).await;
    Ok(value)
}

/// Attach `<field>Name` entries for every resolvable reference.
/// Best-effort: a missing or unreadable target just leaves the name out.
pub async fn populate_refs(mongo: &MongoClient, desc: &EntityDescriptor, record: &mut Value) {
    for rf in desc.ref_fields {
        let Some(raw) = record.get(rf.field).and_then(Value::as_str) else {
            continue;
        };
        let Ok(oid) = ObjectId::parse_str(raw) else {
            continue;
        };

        match mongo
            .raw_collection(rf.collection)
            .find_one(doc! { "_id": oid })
            .await
        {
            Ok(Some(target)) => {
                if let Ok(name) = target.get_str("name") {
                    record[format!("{}Name", rf.field)] = Value::String(name.to_string());
                }
            }
            Ok(None) => {}
            Err(e) => debug!(field = rf.field, error = %e, "Reference population failed"),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn field_str<'a>(fields: &'a Value, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn set_field(fields: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = fields {
        map.insert(key.to_string(), value);
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn not_found(desc: &EntityDescriptor) -> DarshanError {
    DarshanError::NotFound(format!("{} not found", capitalize(desc.entity_name)))
}

fn slug_conflict(desc: &EntityDescriptor) -> DarshanError {
    DarshanError::Conflict(format!(
        "A {} with this slug already exists",
        desc.entity_name
    ))
}

/// Parse a path id, rejecting malformed identifiers before they reach a query
pub fn parse_object_id(id: &str, desc: &EntityDescriptor) -> Result<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|_| DarshanError::BadRequest(format!("Invalid {} id '{}'", desc.entity_name, id)))
}

/// A duplicate-key write means the slug race was lost, not a server fault
fn map_duplicate_key(err: DarshanError, desc: &EntityDescriptor) -> DarshanError {
    match err {
        DarshanError::Database(ref msg) if msg.contains("E11000") => slug_conflict(desc),
        other => other,
    }
}

/// Serialize a stored document for API responses, flattening Mongo's
/// extended JSON (`$oid`, `$date`) into plain strings
pub fn to_api_json<T: Serialize>(doc: &T) -> Result<Value> {
    let value = serde_json::to_value(doc)
        .map_err(|e| DarshanError::Internal(format!("Response serialization failed: {}", e)))?;
    Ok(flatten_extended_json(value))
}

fn flatten_extended_json(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(oid)) = map.get("$oid") {
                    return Value::String(oid.clone());
                }
                if let Some(date) = map.get("$date") {
                    if let Some(flat) = flatten_date(date) {
                        return flat;
                    }
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, flatten_extended_json(v)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(flatten_extended_json).collect())
        }
        other => other,
    }
}

fn flatten_date(date: &Value) -> Option<Value> {
    match date {
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Object(inner) => {
            let millis: i64 = inner.get("$numberLong")?.as_str()?.parse().ok()?;
            let ts = chrono::DateTime::from_timestamp_millis(millis)?;
            Some(Value::String(ts.to_rfc3339()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetUpload, AssetStore, UploadConstraints};
    use crate::ingest::descriptor::DISTRICT;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingStore;

    #[async_trait]
    impl AssetStore for FailingStore {
        async fn upload(
            &self,
            _file: &AssetUpload,
            _folder: &str,
            _constraints: &UploadConstraints,
        ) -> crate::types::Result<String> {
            Err(DarshanError::AssetHost("host unreachable".to_string()))
        }

        async fn delete(&self, _url: &str) -> DeleteOutcome {
            DeleteOutcome::Failed("host unreachable".to_string())
        }
    }

    #[tokio::test]
    async fn test_asset_cleanup_failure_is_swallowed() {
        // A host that always fails must not propagate anything to the
        // deletion flow
        let store = FailingStore;
        cleanup_remote_asset(&store, "https://res.cloudinary.com/d/image/upload/v1/x.jpg").await;
        cleanup_remote_asset(&store, "").await;
    }

    #[test]
    fn test_ensure_slug_derives_from_name() {
        let mut fields = json!({"name": "Bhopal"});
        ensure_slug(&mut fields);
        assert_eq!(fields["slug"], json!("bhopal"));
    }

    #[test]
    fn test_ensure_slug_keeps_explicit_value() {
        let mut fields = json!({"name": "Bhopal", "slug": "custom-slug"});
        ensure_slug(&mut fields);
        assert_eq!(fields["slug"], json!("custom-slug"));
    }

    #[test]
    fn test_strip_server_fields() {
        let mut fields = json!({
            "name": "X",
            "_id": "abc",
            "metadata": {"created_at": 1},
            "createdBy": "attacker",
        });
        strip_server_fields(&mut fields);
        assert_eq!(fields, json!({"name": "X"}));
    }

    #[test]
    fn test_partial_coordinates_rejected() {
        assert!(check_partial_coordinates(&json!({"coordinates": {"lat": 1.0}})).is_err());
        assert!(check_partial_coordinates(&json!({"coordinates": {"lng": 1.0}})).is_err());
        assert!(
            check_partial_coordinates(&json!({"coordinates": {"lat": 1.0, "lng": 2.0}})).is_ok()
        );
        assert!(check_partial_coordinates(&json!({"name": "X"})).is_ok());
    }

    #[test]
    fn test_duplicate_key_mapped_to_conflict() {
        let err = DarshanError::Database(
            "Insert failed: E11000 duplicate key error collection: darshan.districts".to_string(),
        );
        match map_duplicate_key(err, &DISTRICT) {
            DarshanError::Conflict(msg) => assert!(msg.contains("slug")),
            other => panic!("expected conflict, got {other:?}"),
        }

        let err = DarshanError::Database("connection reset".to_string());
        assert!(matches!(
            map_duplicate_key(err, &DISTRICT),
            DarshanError::Database(_)
        ));
    }

    #[test]
    fn test_flatten_extended_json() {
        let value = json!({
            "_id": {"$oid": "64ab00000000000000000001"},
            "metadata": {
                "created_at": {"$date": {"$numberLong": "1712000000000"}},
            },
            "tags": ["a", "b"],
        });
        let flat = flatten_extended_json(value);
        assert_eq!(flat["_id"], json!("64ab00000000000000000001"));
        assert!(flat["metadata"]["created_at"]
            .as_str()
            .unwrap()
            .starts_with("2024-04-01T"));
        assert_eq!(flat["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_parse_object_id_rejects_malformed() {
        assert!(parse_object_id("not-an-id", &DISTRICT).is_err());
        assert!(parse_object_id("64ab00000000000000000001", &DISTRICT).is_ok());
    }

    #[test]
    fn test_rtc_scope_enforced_against_target_district() {
        let actor = crate::auth::Actor {
            id: "u-rtc".to_string(),
            role: crate::auth::Role::Rtc,
            assigned_districts: vec!["64ab0000000000000000000a".to_string()],
        };

        // Assigned district passes, any other is forbidden regardless of
        // payload validity
        assert!(check_scope(&actor, &json!({"district": "64ab0000000000000000000a"})).is_ok());
        assert!(matches!(
            check_scope(&actor, &json!({"district": "64ab0000000000000000000b"})),
            Err(DarshanError::Forbidden(_))
        ));
        // No district in the payload means nothing to scope-check
        assert!(check_scope(&actor, &json!({"name": "X"})).is_ok());
    }

    #[test]
    fn test_drop_blank_refs() {
        let mut fields = json!({"district": "  ", "name": "X"});
        drop_blank_refs(&mut fields, &crate::ingest::descriptor::PANCHAYAT);
        assert!(fields.get("district").is_none());
        assert_eq!(fields["name"], json!("X"));
    }
}
