//! Gram panchayat document schema
//!
//! Each panchayat belongs to exactly one district; its slug is unique
//! within that district only.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{Coordinates, Metadata};

/// Collection name for gram panchayats
pub const PANCHAYAT_COLLECTION: &str = "gram_panchayats";

/// One entry of a panchayat's elected-representative overview
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoliticalEntry {
    /// Office held, e.g. "Sarpanch"
    pub position: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
}

/// Gram panchayat document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PanchayatDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// URL slug, unique within the owning district
    pub slug: String,

    /// Owning district id (ObjectId hex); required, validated to exist
    pub district: String,

    /// Administrative block the panchayat falls under
    pub block: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub header_image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,

    #[serde(default)]
    pub rivers: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Elected-representative entries, shipped as a JSON-stringified list
    /// in multipart submissions
    #[serde(default)]
    pub political_overview: Vec<PoliticalEntry>,

    /// "active" or "draft"
    #[serde(default)]
    pub status: String,

    /// Creating actor's user id; set once, never mutated
    #[serde(default)]
    pub created_by: String,
}

impl IntoIndexes for PanchayatDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Slug is unique per district, not globally
            (
                doc! { "district": 1, "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("district_slug_unique".to_string())
                        .build(),
                ),
            ),
            // Index on district for scoped listing and cascade updates
            (
                doc! { "district": 1 },
                Some(IndexOptions::builder().name("district_index".to_string()).build()),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for PanchayatDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
