//! Server-side record ingest
//!
//! Decodes submissions (JSON or multipart), validates them, routes uploads
//! to the asset host and persists records through one generic pipeline.

pub mod descriptor;
pub mod handler;
pub mod payload;
pub mod validate;

pub use descriptor::{EntityDescriptor, SlugScope, DISTRICT, MEDIA, PANCHAYAT};
pub use handler::{create_record, delete_record, update_record};
pub use payload::{IngestPayload, UploadMethod, FILE_FIELD, UPLOAD_METHOD_FIELD};
pub use validate::{slugify, validate_record};
