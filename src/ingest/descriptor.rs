//! Entity descriptors for the generic ingest pipeline
//!
//! Districts, panchayats and media items all move through the same
//! create/update/delete pipeline; everything entity-specific lives in these
//! static tables rather than in per-entity handler copies.

use crate::assets::UploadConstraints;
use crate::db::schemas::{DISTRICT_COLLECTION, MEDIA_COLLECTION, PANCHAYAT_COLLECTION};

/// Where an entity's slug must be unique
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    /// Unique across the whole collection
    Global,
    /// Unique among records sharing the same value of this field
    WithinField(&'static str),
}

/// A foreign-key field and the collection it points into.
/// Requiredness is expressed through `required_fields`.
#[derive(Debug, Clone, Copy)]
pub struct RefField {
    pub field: &'static str,
    pub collection: &'static str,
}

/// A collection holding references to this entity, unset on delete
#[derive(Debug, Clone, Copy)]
pub struct Dependent {
    pub collection: &'static str,
    pub field: &'static str,
}

/// Everything the pipeline needs to know about one entity type
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    /// Lowercase singular name used in messages ("district")
    pub entity_name: &'static str,
    /// Key holding the record in success responses ("district")
    pub response_key: &'static str,
    /// Key holding the page of records in list responses ("districts")
    pub list_key: &'static str,
    /// Key holding the confirmation in delete responses ("deletedDistrict")
    pub deleted_key: &'static str,
    pub collection: &'static str,
    /// Folder on the asset host for uploaded files
    pub asset_folder: &'static str,
    pub constraints: UploadConstraints,
    /// Entity-specific required fields beyond name/slug/image
    pub required_fields: &'static [&'static str],
    /// Whether lat/lng are mandatory at create
    pub requires_coordinates: bool,
    /// Foreign keys to validate (syntax + existence)
    pub ref_fields: &'static [RefField],
    pub slug_scope: SlugScope,
    /// Applied at create when the submission carries no status
    pub default_status: &'static str,
    pub dependents: &'static [Dependent],
    /// Flat string arrays shipped comma-joined in multipart submissions
    pub string_list_fields: &'static [&'static str],
    /// Arrays of structured objects shipped JSON-stringified in multipart
    pub structured_list_fields: &'static [&'static str],
    /// Integer fields shipped as decimal strings in multipart
    pub int_fields: &'static [&'static str],
}

/// Descriptor for districts
pub const DISTRICT: EntityDescriptor = EntityDescriptor {
    entity_name: "district",
    response_key: "district",
    list_key: "districts",
    deleted_key: "deletedDistrict",
    collection: DISTRICT_COLLECTION,
    asset_folder: "tourism/districts",
    constraints: UploadConstraints::images(),
    required_fields: &[],
    requires_coordinates: true,
    ref_fields: &[],
    slug_scope: SlugScope::Global,
    default_status: "draft",
    dependents: &[
        Dependent {
            collection: PANCHAYAT_COLLECTION,
            field: "district",
        },
        Dependent {
            collection: MEDIA_COLLECTION,
            field: "district",
        },
    ],
    string_list_fields: &["rivers", "hills", "tags"],
    structured_list_fields: &[],
    int_fields: &[],
};

/// Descriptor for gram panchayats
pub const PANCHAYAT: EntityDescriptor = EntityDescriptor {
    entity_name: "panchayat",
    response_key: "panchayat",
    list_key: "panchayats",
    deleted_key: "deletedPanchayat",
    collection: PANCHAYAT_COLLECTION,
    asset_folder: "tourism/panchayats",
    constraints: UploadConstraints::images(),
    required_fields: &["district", "block"],
    requires_coordinates: true,
    ref_fields: &[RefField {
        field: "district",
        collection: DISTRICT_COLLECTION,
    }],
    slug_scope: SlugScope::WithinField("district"),
    default_status: "draft",
    dependents: &[Dependent {
        collection: MEDIA_COLLECTION,
        field: "gramPanchayat",
    }],
    string_list_fields: &["rivers", "tags"],
    structured_list_fields: &["politicalOverview"],
    int_fields: &["population"],
};

/// Descriptor for media items
pub const MEDIA: EntityDescriptor = EntityDescriptor {
    entity_name: "media item",
    response_key: "mediaItem",
    list_key: "mediaItems",
    deleted_key: "deletedMediaItem",
    collection: MEDIA_COLLECTION,
    asset_folder: "tourism/media",
    constraints: UploadConstraints::media(),
    required_fields: &["mediaType"],
    requires_coordinates: false,
    ref_fields: &[
        RefField {
            field: "district",
            collection: DISTRICT_COLLECTION,
        },
        RefField {
            field: "gramPanchayat",
            collection: PANCHAYAT_COLLECTION,
        },
    ],
    slug_scope: SlugScope::Global,
    default_status: "pending",
    dependents: &[],
    string_list_fields: &["tags"],
    structured_list_fields: &[],
    int_fields: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_delete_unsets_panchayat_and_media_references() {
        let targets: Vec<(&str, &str)> = DISTRICT
            .dependents
            .iter()
            .map(|d| (d.collection, d.field))
            .collect();
        assert_eq!(
            targets,
            vec![
                (PANCHAYAT_COLLECTION, "district"),
                (MEDIA_COLLECTION, "district"),
            ]
        );
    }

    #[test]
    fn test_panchayat_delete_unsets_media_references() {
        assert_eq!(PANCHAYAT.dependents.len(), 1);
        assert_eq!(PANCHAYAT.dependents[0].collection, MEDIA_COLLECTION);
        assert_eq!(PANCHAYAT.dependents[0].field, "gramPanchayat");
        // Media items themselves have no dependents
        assert!(MEDIA.dependents.is_empty());
    }

    #[test]
    fn test_panchayat_slug_scoped_to_district() {
        assert_eq!(PANCHAYAT.slug_scope, SlugScope::WithinField("district"));
        assert_eq!(DISTRICT.slug_scope, SlugScope::Global);
        assert_eq!(MEDIA.slug_scope, SlugScope::Global);
    }
}
