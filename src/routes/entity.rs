//! Content API endpoints
//!
//! ## Endpoints (per entity: districts, panchayats, media)
//!
//! - `GET /api/{entity}` - List with pagination, search, filters
//! - `GET /api/{entity}/{id}` - Get one record
//! - `POST /api/{entity}` - Create (admin or rtc)
//! - `PUT /api/{entity}/{id}` - Update (admin, or the owning rtc)
//! - `DELETE /api/{entity}/{id}` - Delete (admin only)
//!
//! One generic handler covers all three entities; the differences live in
//! the `EntityDescriptor` and the schema type parameter.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use crate::db::MongoClient;
use crate::ingest::descriptor::EntityDescriptor;
use crate::ingest::handler::{
    capitalize, create_record, delete_record, parse_object_id, populate_refs, to_api_json,
    update_record, IngestRecord,
};
use crate::ingest::payload::IngestPayload;
use crate::routes::helpers::{
    failure_response, json_response, read_body, require_actor, success_response, FullBody,
};
use crate::server::AppState;
use crate::types::DarshanError;

/// Query parameters for list endpoints
#[derive(Debug)]
struct ListQuery {
    page: u64,
    limit: u64,
    search: Option<String>,
    status: Option<String>,
    district: Option<String>,
    sort_by: String,
    sort_dir: String,
}

impl ListQuery {
    fn from_query_string(query: Option<&str>) -> Self {
        let mut params = Self {
            page: 1,
            limit: 20,
            search: None,
            status: None,
            district: None,
            sort_by: "createdAt".to_string(),
            sort_dir: "desc".to_string(),
        };

        if let Some(q) = query {
            for pair in q.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    let value = urlencoding::decode(value).unwrap_or_default();
                    match key {
                        "page" => params.page = value.parse().unwrap_or(1).max(1),
                        "limit" => params.limit = value.parse().unwrap_or(20).clamp(1, 100),
                        "search" => params.search = Some(value.to_string()),
                        "status" => params.status = Some(value.to_string()),
                        "district" => params.district = Some(value.to_string()),
                        "sort" => params.sort_by = value.to_string(),
                        "order" => params.sort_dir = value.to_string(),
                        _ => {}
                    }
                }
            }
        }

        params
    }

    fn sort_document(&self) -> bson::Document {
        let field = match self.sort_by.as_str() {
            "name" => "name",
            "status" => "status",
            "slug" => "slug",
            _ => "metadata.created_at",
        };
        let direction = if self.sort_dir == "asc" { 1 } else { -1 };
        doc! { field: direction }
    }
}

fn require_mongo<'a>(state: &'a AppState) -> Result<&'a MongoClient, Response<FullBody>> {
    state.mongo.as_ref().ok_or_else(|| {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({ "success": false, "message": "Database not available" }),
        )
    })
}

/// Main handler for one entity's /api/{entity}/* routes
pub async fn handle<T: IngestRecord>(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
    prefix: &str,
    desc: &'static EntityDescriptor,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path
        .strip_prefix(prefix)
        .unwrap_or("")
        .trim_start_matches('/')
        .to_string();

    match (method, subpath.as_str()) {
        (Method::GET, "") => handle_list::<T>(req, state, desc).await,
        (Method::POST, "") => handle_create::<T>(req, state, desc).await,
        (Method::GET, id) if !id.contains('/') => handle_get::<T>(state, desc, id).await,
        (Method::PUT, id) if !id.contains('/') => handle_update::<T>(req, state, desc, id).await,
        (Method::DELETE, id) if !id.contains('/') => {
            handle_delete::<T>(req, state, desc, id).await
        }
        _ => failure_response(&DarshanError::NotFound("Not found".to_string())),
    }
}

/// GET /api/{entity} - public listing with pagination and filters
async fn handle_list<T: IngestRecord>(
    req: Request<Incoming>,
    state: Arc<AppState>,
    desc: &'static EntityDescriptor,
) -> Response<FullBody> {
    let mongo = match require_mongo(&state) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let params = ListQuery::from_query_string(req.uri().query());

    let mut filter = doc! {};

    if let Some(ref status) = params.status {
        filter.insert("status", status.clone());
    }

    // A district filter must be a well-formed id before it reaches the query
    if let Some(ref district) = params.district {
        if bson::oid::ObjectId::parse_str(district).is_err() {
            return failure_response(&DarshanError::BadRequest(format!(
                "Invalid district filter '{}'",
                district
            )));
        }
        if desc.ref_fields.iter().any(|rf| rf.field == "district") {
            filter.insert("district", district.clone());
        }
    }

    if let Some(ref search) = params.search {
        filter.insert("name", doc! { "$regex": search.clone(), "$options": "i" });
    }

    let collection = match mongo.collection::<T>(desc.collection).await {
        Ok(c) => c,
        Err(e) => return failure_response(&e),
    };

    let total = match collection.count_documents(filter.clone()).await {
        Ok(t) => t,
        Err(e) => return failure_response(&e),
    };

    let skip = (params.page - 1) * params.limit;
    let records = match collection
        .find_page(filter, params.sort_document(), skip, params.limit as i64)
        .await
    {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };

    let mut items = Vec::with_capacity(records.len());
    for record in &records {
        match to_api_json(record) {
            Ok(mut value) => {
                populate_refs(mongo, desc, &mut value).await;
                items.push(value);
            }
            Err(e) => return failure_response(&e),
        }
    }

    let total_pages = total.div_ceil(params.limit);

    json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            desc.list_key: items,
            "total": total,
            "page": params.page,
            "limit": params.limit,
            "totalPages": total_pages,
        }),
    )
}

/// GET /api/{entity}/{id} - public single-record read
async fn handle_get<T: IngestRecord>(
    state: Arc<AppState>,
    desc: &'static EntityDescriptor,
    id: &str,
) -> Response<FullBody> {
    let mongo = match require_mongo(&state) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let oid = match parse_object_id(id, desc) {
        Ok(oid) => oid,
        Err(e) => return failure_response(&e),
    };

    let collection = match mongo.collection::<T>(desc.collection).await {
        Ok(c) => c,
        Err(e) => return failure_response(&e),
    };

    match collection.find_by_id(&oid).await {
        Ok(Some(record)) => match to_api_json(&record) {
            Ok(mut value) => {
                populate_refs(mongo, desc, &mut value).await;
                json_response(
                    StatusCode::OK,
                    &json!({ "success": true, desc.response_key: value }),
                )
            }
            Err(e) => failure_response(&e),
        },
        Ok(None) => failure_response(&DarshanError::NotFound(format!(
            "{} not found",
            capitalize(desc.entity_name)
        ))),
        Err(e) => failure_response(&e),
    }
}

/// POST /api/{entity} - create a record (admin or rtc)
async fn handle_create<T: IngestRecord>(
    req: Request<Incoming>,
    state: Arc<AppState>,
    desc: &'static EntityDescriptor,
) -> Response<FullBody> {
    let actor = match require_actor(&req, &state) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let mongo = match require_mongo(&state) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let (content_type, body) = match read_body(req).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    let payload = match IngestPayload::from_body(content_type.as_deref(), body).await {
        Ok(p) => p,
        Err(e) => return failure_response(&e),
    };

    match create_record::<T>(mongo, state.assets.as_ref(), &actor, payload, desc).await {
        Ok(record) => success_response(
            StatusCode::CREATED,
            &format!("{} created successfully", capitalize(desc.entity_name)),
            desc.response_key,
            record,
        ),
        Err(e) => failure_response(&e),
    }
}

/// PUT /api/{entity}/{id} - update a record (admin, or the owning rtc)
async fn handle_update<T: IngestRecord>(
    req: Request<Incoming>,
    state: Arc<AppState>,
    desc: &'static EntityDescriptor,
    id: &str,
) -> Response<FullBody> {
    let actor = match require_actor(&req, &state) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let mongo = match require_mongo(&state) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let (content_type, body) = match read_body(req).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    let payload = match IngestPayload::from_body(content_type.as_deref(), body).await {
        Ok(p) => p,
        Err(e) => return failure_response(&e),
    };

    match update_record::<T>(mongo, state.assets.as_ref(), &actor, payload, desc, id).await {
        Ok(record) => success_response(
            StatusCode::OK,
            &format!("{} updated successfully", capitalize(desc.entity_name)),
            desc.response_key,
            record,
        ),
        Err(e) => failure_response(&e),
    }
}

/// DELETE /api/{entity}/{id} - delete a record (admin only)
async fn handle_delete<T: IngestRecord>(
    req: Request<Incoming>,
    state: Arc<AppState>,
    desc: &'static EntityDescriptor,
    id: &str,
) -> Response<FullBody> {
    let actor = match require_actor(&req, &state) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let mongo = match require_mongo(&state) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match delete_record::<T>(mongo, state.assets.as_ref(), &actor, desc, id).await {
        Ok(confirmation) => success_response(
            StatusCode::OK,
            &format!("{} deleted successfully", capitalize(desc.entity_name)),
            desc.deleted_key,
            confirmation,
        ),
        Err(e) => failure_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let params = ListQuery::from_query_string(None);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 20);
        assert_eq!(params.sort_document(), doc! { "metadata.created_at": -1 });
    }

    #[test]
    fn test_list_query_parsing() {
        let params = ListQuery::from_query_string(Some(
            "page=3&limit=50&search=bho%20pal&status=active&district=64ab00000000000000000001&sort=name&order=asc",
        ));
        assert_eq!(params.page, 3);
        assert_eq!(params.limit, 50);
        assert_eq!(params.search.as_deref(), Some("bho pal"));
        assert_eq!(params.status.as_deref(), Some("active"));
        assert_eq!(
            params.district.as_deref(),
            Some("64ab00000000000000000001")
        );
        assert_eq!(params.sort_document(), doc! { "name": 1 });
    }

    #[test]
    fn test_list_query_clamps_bad_values() {
        let params = ListQuery::from_query_string(Some("page=0&limit=9999&sort=bogus"));
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 100);
        assert_eq!(params.sort_document(), doc! { "metadata.created_at": -1 });
    }
}
