//! Media item document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Coordinates, Metadata};

/// Collection name for media items
pub const MEDIA_COLLECTION: &str = "media_items";

/// Media item document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// URL slug, unique across all media items
    pub slug: String,

    #[serde(default)]
    pub description: String,

    /// Canonical URL of the asset (hosted or user-pasted)
    #[serde(default)]
    pub header_image: String,

    /// "image" or "video"
    #[serde(default)]
    pub media_type: String,

    /// Optional owning district id (ObjectId hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    /// Optional owning gram panchayat id (ObjectId hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gram_panchayat: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// "verified", "pending" or "draft"
    #[serde(default)]
    pub status: String,

    /// Creating actor's user id; set once, never mutated
    #[serde(default)]
    pub created_by: String,
}

impl IntoIndexes for MediaDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("slug_unique".to_string())
                        .build(),
                ),
            ),
            // Reference indexes back the cascade unsets on district and
            // panchayat deletion
            (
                doc! { "district": 1 },
                Some(IndexOptions::builder().name("district_index".to_string()).build()),
            ),
            (
                doc! { "gramPanchayat": 1 },
                Some(
                    IndexOptions::builder()
                        .name("gram_panchayat_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for MediaDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
