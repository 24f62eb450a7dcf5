//! District document schema
//!
//! Top-level scoping entity; panchayat slugs are unique within a district
//! and media items may reference one.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Coordinates, Metadata};

/// Collection name for districts
pub const DISTRICT_COLLECTION: &str = "districts";

/// District document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DistrictDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Display name
    pub name: String,

    /// URL slug, unique across all districts
    pub slug: String,

    #[serde(default)]
    pub description: String,

    /// Canonical URL of the header image (hosted or user-pasted)
    #[serde(default)]
    pub header_image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    /// Free-text tag lists; insertion order preserved, duplicates allowed
    #[serde(default)]
    pub rivers: Vec<String>,

    #[serde(default)]
    pub hills: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// "active" or "draft"
    #[serde(default)]
    pub status: String,

    /// Creating actor's user id; set once, never mutated
    #[serde(default)]
    pub created_by: String,
}

impl IntoIndexes for DistrictDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on slug - the real guard against concurrent
            // creates racing past the application-level uniqueness check
            (
                doc! { "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("slug_unique".to_string())
                        .build(),
                ),
            ),
            // Index on status for list filtering
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for DistrictDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
