//! Document schemas for the content collections

pub mod district;
pub mod media;
pub mod metadata;
pub mod panchayat;

pub use district::{DistrictDoc, DISTRICT_COLLECTION};
pub use media::{MediaDoc, MEDIA_COLLECTION};
pub use metadata::Metadata;
pub use panchayat::{PanchayatDoc, PoliticalEntry, PANCHAYAT_COLLECTION};

use serde::{Deserialize, Serialize};

/// Geographic point attached to a record.
/// Latitude and longitude are only ever persisted together.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Field access shared by all content documents; lets the ingest pipeline
/// run ownership checks, asset cleanup and delete confirmations without
/// knowing the concrete schema.
pub trait RecordFields {
    fn record_name(&self) -> &str;
    fn record_slug(&self) -> &str;
    fn record_created_by(&self) -> &str;
    fn record_header_image(&self) -> &str;
    /// The district this record is scoped to, when any
    fn record_scope_ref(&self) -> Option<&str>;
}

impl RecordFields for DistrictDoc {
    fn record_name(&self) -> &str {
        &self.name
    }
    fn record_slug(&self) -> &str {
        &self.slug
    }
    fn record_created_by(&self) -> &str {
        &self.created_by
    }
    fn record_header_image(&self) -> &str {
        &self.header_image
    }
    fn record_scope_ref(&self) -> Option<&str> {
        None
    }
}

impl RecordFields for PanchayatDoc {
    fn record_name(&self) -> &str {
        &self.name
    }
    fn record_slug(&self) -> &str {
        &self.slug
    }
    fn record_created_by(&self) -> &str {
        &self.created_by
    }
    fn record_header_image(&self) -> &str {
        &self.header_image
    }
    fn record_scope_ref(&self) -> Option<&str> {
        Some(&self.district)
    }
}

impl RecordFields for MediaDoc {
    fn record_name(&self) -> &str {
        &self.name
    }
    fn record_slug(&self) -> &str {
        &self.slug
    }
    fn record_created_by(&self) -> &str {
        &self.created_by
    }
    fn record_header_image(&self) -> &str {
        &self.header_image
    }
    fn record_scope_ref(&self) -> Option<&str> {
        self.district.as_deref()
    }
}
