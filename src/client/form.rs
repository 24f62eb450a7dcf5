//! Form state and payload encoding for admin submission tooling
//!
//! A `DraftRecord` holds everything the user has typed. Exactly one image
//! source is active at a time: switching the upload method clears the other
//! source's state. `build_payload` encodes the draft for transport; the two
//! encodings must decode to the same logical record server-side, which the
//! tests check by feeding the multipart parts straight back through the
//! ingest reassembly.

use serde_json::{json, Map, Value};

use crate::assets::AssetUpload;
use crate::db::schemas::PoliticalEntry;
use crate::ingest::descriptor::EntityDescriptor;
use crate::ingest::payload::{UploadMethod, UPLOAD_METHOD_FIELD};
use crate::ingest::validate::validate_record;
use crate::types::ErrorMap;

/// Encoded submission ready for the wire
#[derive(Debug)]
pub enum TransportPayload {
    /// `application/json` body
    Json(Value),
    /// `multipart/form-data` parts plus the optional binary
    Multipart {
        parts: Vec<(String, String)>,
        file: Option<AssetUpload>,
    },
}

/// In-memory form state for one record being created or edited
#[derive(Debug, Clone, Default)]
pub struct DraftRecord {
    pub name: String,
    pub slug: String,
    pub description: String,

    /// Active image source
    pub upload_method: UploadMethodState,

    pub lat: Option<f64>,
    pub lng: Option<f64>,

    pub district: Option<String>,
    pub gram_panchayat: Option<String>,
    pub block: Option<String>,
    pub media_type: Option<String>,
    pub population: Option<i64>,
    pub status: Option<String>,

    pub rivers: Vec<String>,
    pub hills: Vec<String>,
    pub tags: Vec<String>,
    pub political_overview: Vec<PoliticalEntry>,
}

/// Which image source the form currently holds
#[derive(Debug, Clone)]
pub enum UploadMethodState {
    /// A binary file picked from disk
    File(Option<AssetUpload>),
    /// A pasted external URL
    Url(String),
}

impl Default for UploadMethodState {
    fn default() -> Self {
        UploadMethodState::Url(String::new())
    }
}

impl UploadMethodState {
    pub fn method(&self) -> UploadMethod {
        match self {
            UploadMethodState::File(_) => UploadMethod::File,
            UploadMethodState::Url(_) => UploadMethod::Url,
        }
    }
}

impl DraftRecord {
    /// Switch the image source. The inactive source's state is discarded so
    /// stale input can never ride along on submission.
    pub fn set_upload_method(&mut self, method: UploadMethod) {
        if self.upload_method.method() == method {
            return;
        }
        self.upload_method = match method {
            UploadMethod::File => UploadMethodState::File(None),
            UploadMethod::Url => UploadMethodState::Url(String::new()),
        };
    }

    pub fn attach_file(&mut self, file: AssetUpload) {
        self.upload_method = UploadMethodState::File(Some(file));
    }

    pub fn set_image_url(&mut self, url: String) {
        self.upload_method = UploadMethodState::Url(url);
    }

    /// Append a tag to one of the ordered lists. No deduplication: entries
    /// keep insertion order and repeat if entered twice.
    pub fn add_tag(list: &mut Vec<String>, value: &str) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            list.push(trimmed.to_string());
        }
    }

    /// Remove a single entry by position
    pub fn remove_tag(list: &mut Vec<String>, index: usize) {
        if index < list.len() {
            list.remove(index);
        }
    }

    fn attached_file(&self) -> Option<&AssetUpload> {
        match &self.upload_method {
            UploadMethodState::File(file) => file.as_ref(),
            UploadMethodState::Url(_) => None,
        }
    }

    /// The draft as a logical record, the shape the server reassembles to.
    /// `headerImage` is present only for the URL method; the file rides
    /// separately.
    pub fn logical_fields(&self) -> Value {
        let mut out = Map::new();

        out.insert("name".to_string(), json!(self.name));
        if !self.slug.trim().is_empty() {
            out.insert("slug".to_string(), json!(self.slug));
        }
        out.insert("description".to_string(), json!(self.description));

        if let UploadMethodState::Url(url) = &self.upload_method {
            if !url.trim().is_empty() {
                out.insert("headerImage".to_string(), json!(url));
            }
        }

        if let (Some(lat), Some(lng)) = (self.lat, self.lng) {
            out.insert("coordinates".to_string(), json!({ "lat": lat, "lng": lng }));
        }

        if let Some(district) = &self.district {
            out.insert("district".to_string(), json!(district));
        }
        if let Some(panchayat) = &self.gram_panchayat {
            out.insert("gramPanchayat".to_string(), json!(panchayat));
        }
        if let Some(block) = &self.block {
            out.insert("block".to_string(), json!(block));
        }
        if let Some(media_type) = &self.media_type {
            out.insert("mediaType".to_string(), json!(media_type));
        }
        if let Some(population) = self.population {
            out.insert("population".to_string(), json!(population));
        }
        if let Some(status) = &self.status {
            out.insert("status".to_string(), json!(status));
        }

        // Empty lists are omitted rather than sent as empty markers so both
        // encodings stay field-for-field identical
        if !self.rivers.is_empty() {
            out.insert("rivers".to_string(), json!(self.rivers));
        }
        if !self.hills.is_empty() {
            out.insert("hills".to_string(), json!(self.hills));
        }
        if !self.tags.is_empty() {
            out.insert("tags".to_string(), json!(self.tags));
        }
        if !self.political_overview.is_empty() {
            out.insert(
                "politicalOverview".to_string(),
                serde_json::to_value(&self.political_overview).unwrap_or_else(|_| json!([])),
            );
        }

        Value::Object(out)
    }

    /// Run the shared validation rules against this draft
    pub fn validate(&self, desc: &EntityDescriptor) -> ErrorMap {
        validate_record(
            &self.logical_fields(),
            self.upload_method.method(),
            self.attached_file().is_some(),
            desc,
        )
    }

    /// Encode the draft for transport. File method produces multipart with
    /// flattened fields; URL method produces a JSON body. Both decode to the
    /// same logical record on the other end.
    pub fn build_payload(&self) -> TransportPayload {
        let logical = self.logical_fields();

        match &self.upload_method {
            UploadMethodState::Url(_) => {
                let mut body = logical;
                if let Value::Object(map) = &mut body {
                    map.insert(UPLOAD_METHOD_FIELD.to_string(), json!("url"));
                }
                TransportPayload::Json(body)
            }
            UploadMethodState::File(file) => {
                let mut parts = flatten_fields(&logical);
                parts.push((UPLOAD_METHOD_FIELD.to_string(), "file".to_string()));
                TransportPayload::Multipart {
                    parts,
                    file: file.clone(),
                }
            }
        }
    }
}

/// Flatten a logical record into multipart text parts: nested objects in
/// bracket notation, string arrays comma-joined, structured arrays
/// JSON-stringified.
fn flatten_fields(logical: &Value) -> Vec<(String, String)> {
    let mut parts = Vec::new();

    let Value::Object(map) = logical else {
        return parts;
    };

    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                for (child, child_value) in inner {
                    parts.push((format!("{}[{}]", key, child), scalar_to_string(child_value)));
                }
            }
            Value::Array(items) if items.iter().all(Value::is_string) => {
                let joined = items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                parts.push((key.clone(), joined));
            }
            Value::Array(_) => {
                parts.push((key.clone(), value.to_string()));
            }
            other => parts.push((key.clone(), scalar_to_string(other))),
        }
    }

    parts
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::descriptor::{DISTRICT, PANCHAYAT};
    use crate::ingest::payload::reassemble;

    fn sample_panchayat_draft() -> DraftRecord {
        DraftRecord {
            name: "Amla".to_string(),
            slug: "amla".to_string(),
            description: "Panchayat on the Betwa".to_string(),
            upload_method: UploadMethodState::Url("https://example.com/amla.jpg".to_string()),
            lat: Some(23.25),
            lng: Some(77.5),
            district: Some("64ab00000000000000000001".to_string()),
            block: Some("Berasia".to_string()),
            population: Some(4521),
            rivers: vec!["Betwa".to_string(), "Betwa".to_string()],
            tags: vec!["riverside".to_string()],
            political_overview: vec![PoliticalEntry {
                position: "Sarpanch".to_string(),
                name: "A. Verma".to_string(),
                party: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_switching_method_clears_other_state() {
        let mut draft = DraftRecord::default();
        draft.set_image_url("https://example.com/x.jpg".to_string());

        draft.set_upload_method(UploadMethod::File);
        draft.attach_file(AssetUpload {
            bytes: vec![1],
            filename: "x.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        });

        // Back to URL: the file is gone and the URL starts blank
        draft.set_upload_method(UploadMethod::Url);
        assert!(draft.attached_file().is_none());
        assert!(draft.logical_fields().get("headerImage").is_none());
    }

    #[test]
    fn test_switching_to_same_method_keeps_state() {
        let mut draft = DraftRecord::default();
        draft.set_image_url("https://example.com/x.jpg".to_string());
        draft.set_upload_method(UploadMethod::Url);
        assert_eq!(
            draft.logical_fields()["headerImage"],
            json!("https://example.com/x.jpg")
        );
    }

    #[test]
    fn test_tag_list_preserves_order_and_duplicates() {
        let mut list = Vec::new();
        DraftRecord::add_tag(&mut list, "Betwa");
        DraftRecord::add_tag(&mut list, " Narmada ");
        DraftRecord::add_tag(&mut list, "Betwa");
        DraftRecord::add_tag(&mut list, "  ");
        assert_eq!(list, vec!["Betwa", "Narmada", "Betwa"]);

        DraftRecord::remove_tag(&mut list, 1);
        assert_eq!(list, vec!["Betwa", "Betwa"]);
        DraftRecord::remove_tag(&mut list, 10);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_url_payload_is_json_with_marker() {
        let draft = sample_panchayat_draft();
        match draft.build_payload() {
            TransportPayload::Json(body) => {
                assert_eq!(body["uploadMethod"], json!("url"));
                assert_eq!(body["headerImage"], json!("https://example.com/amla.jpg"));
            }
            _ => panic!("expected JSON payload"),
        }
    }

    #[test]
    fn test_file_payload_is_multipart_with_marker() {
        let mut draft = sample_panchayat_draft();
        draft.set_upload_method(UploadMethod::File);
        draft.attach_file(AssetUpload {
            bytes: vec![1, 2],
            filename: "amla.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        });

        match draft.build_payload() {
            TransportPayload::Multipart { parts, file } => {
                assert!(parts
                    .iter()
                    .any(|(k, v)| k == "uploadMethod" && v == "file"));
                assert!(parts.iter().any(|(k, v)| k == "coordinates[lat]" && v == "23.25"));
                assert!(parts.iter().any(|(k, v)| k == "rivers" && v == "Betwa,Betwa"));
                assert!(file.is_some());
            }
            _ => panic!("expected multipart payload"),
        }
    }

    #[test]
    fn test_encodings_decode_to_same_logical_record() {
        // Hold every field constant except the image source and check the
        // server-side decode of both encodings agrees
        let url_draft = sample_panchayat_draft();

        let mut file_draft = sample_panchayat_draft();
        file_draft.set_upload_method(UploadMethod::File);
        file_draft.attach_file(AssetUpload {
            bytes: vec![1, 2, 3],
            filename: "amla.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
        });

        let mut from_json = match url_draft.build_payload() {
            TransportPayload::Json(body) => {
                crate::ingest::payload::normalize_json(body)
            }
            _ => panic!("expected JSON payload"),
        };

        let from_multipart = match file_draft.build_payload() {
            TransportPayload::Multipart { parts, .. } => reassemble(&parts, &PANCHAYAT),
            _ => panic!("expected multipart payload"),
        };

        // The image source legitimately differs between the two methods
        if let Value::Object(map) = &mut from_json {
            map.remove("headerImage");
        }

        assert_eq!(from_json, from_multipart);
    }

    #[test]
    fn test_valid_draft_passes_shared_validation() {
        let draft = sample_panchayat_draft();
        let errors = draft.validate(&PANCHAYAT);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_file_method_without_attachment_fails_validation() {
        let mut draft = sample_panchayat_draft();
        draft.set_upload_method(UploadMethod::File);
        let errors = draft.validate(&PANCHAYAT);
        assert!(errors.contains_key("headerImage"));
    }

    #[test]
    fn test_district_draft_validation() {
        let mut draft = DraftRecord {
            name: "Bhopal".to_string(),
            slug: "bhopal".to_string(),
            lat: Some(23.2599),
            lng: Some(77.4126),
            ..Default::default()
        };
        draft.set_image_url("https://example.com/x.jpg".to_string());
        assert!(draft.validate(&DISTRICT).is_empty());
    }
}
