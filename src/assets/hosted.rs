//! Cloudinary-compatible asset host client
//!
//! Uploads go through the signed upload endpoint with a bounded-dimension,
//! auto-quality transformation. Deletion recovers the host's public id from
//! the stored delivery URL: the path segment after the fixed `upload` marker,
//! minus an optional `v<digits>` version segment and the file extension.
//! URL formats drift, so the parser falls back to "last segment minus
//! extension" rather than giving up.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, warn};

use crate::assets::{check_constraints, AssetStore, AssetUpload, DeleteOutcome, UploadConstraints};
use crate::config::AssetHostArgs;
use crate::types::{DarshanError, Result};

/// Transformation applied to every upload: cap dimensions, auto quality
const UPLOAD_TRANSFORMATION: &str = "c_limit,h_1600,w_1600,q_auto";

/// Connection settings for the asset host
#[derive(Debug, Clone)]
pub struct AssetHostConfig {
    /// API base, e.g. "https://api.cloudinary.com"
    pub api_base: String,
    /// Hostname of delivery URLs; used to recognize managed assets
    pub delivery_host: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl AssetHostConfig {
    pub fn from_args(args: &AssetHostArgs) -> Self {
        Self {
            api_base: args.asset_api_base.clone(),
            delivery_host: args.asset_delivery_host.clone(),
            cloud_name: args.asset_cloud_name.clone(),
            api_key: args.asset_api_key.clone(),
            api_secret: args.asset_api_secret.clone(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the external image/video host
pub struct AssetHost {
    config: AssetHostConfig,
    client: reqwest::Client,
}

/// Subset of the host's upload response we care about
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Subset of the host's destroy response
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl AssetHost {
    pub fn new(config: AssetHostConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Does this URL point at an asset we manage?
    fn is_managed_url(&self, url: &str) -> bool {
        url.contains(&self.config.delivery_host)
    }

    /// Sign request params: sorted `k=v` pairs joined with `&`, secret
    /// appended, SHA-256 hex digest.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Destroy endpoints are split by resource type on the host side
    fn resource_type_for(url: &str) -> &'static str {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".mp4") || path.ends_with(".webm") || path.ends_with(".mov") {
            "video"
        } else {
            "image"
        }
    }
}

/// Recover the host's public id from a delivery URL.
///
/// Primary shape: `.../upload/v1712345678/folder/name.jpg` - everything
/// after the `upload` marker, version segment dropped, extension stripped.
/// Fallback for unrecognized shapes: last path segment minus extension.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(marker) = segments.iter().position(|s| *s == "upload") {
        let mut rest: &[&str] = &segments[marker + 1..];

        // Optional version segment: "v" followed by digits only
        if let Some(first) = rest.first() {
            let is_version = first.len() > 1
                && first.starts_with('v')
                && first[1..].chars().all(|c| c.is_ascii_digit());
            if is_version {
                rest = &rest[1..];
            }
        }

        if !rest.is_empty() {
            let joined = rest.join("/");
            return Some(strip_extension(&joined));
        }
    }

    // Fallback: last path segment minus extension
    let last = segments.last()?;
    if last.is_empty() {
        return None;
    }
    Some(strip_extension(last))
}

fn strip_extension(path: &str) -> String {
    match path.rfind('.') {
        // Only strip when the dot is inside the final segment
        Some(idx) if !path[idx..].contains('/') => path[..idx].to_string(),
        _ => path.to_string(),
    }
}

#[async_trait]
impl AssetStore for AssetHost {
    async fn upload(
        &self,
        file: &AssetUpload,
        folder: &str,
        constraints: &UploadConstraints,
    ) -> Result<String> {
        check_constraints(file, constraints)?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", folder),
            ("timestamp", &timestamp),
            ("transformation", UPLOAD_TRANSFORMATION),
        ]);

        let endpoint = format!(
            "{}/v1_1/{}/auto/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        );

        let file_part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|e| DarshanError::AssetHost(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("signature", signature)
            .part("file", file_part);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| DarshanError::AssetHost(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DarshanError::AssetHost(format!(
                "Upload failed: {} - {}",
                status, body
            )));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| DarshanError::AssetHost(format!("Malformed upload response: {}", e)))?;

        info!(folder = %folder, url = %parsed.secure_url, "Asset uploaded");
        Ok(parsed.secure_url)
    }

    async fn delete(&self, url: &str) -> DeleteOutcome {
        if !self.is_managed_url(url) {
            return DeleteOutcome::Skipped("not a managed asset URL".to_string());
        }

        let public_id = match public_id_from_url(url) {
            Some(id) => id,
            None => {
                warn!(url = %url, "Could not recover public id from asset URL");
                return DeleteOutcome::Failed("unrecognized asset URL".to_string());
            }
        };

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("invalidate", "true"),
            ("public_id", &public_id),
            ("timestamp", &timestamp),
        ]);

        let endpoint = format!(
            "{}/v1_1/{}/{}/destroy",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            Self::resource_type_for(url)
        );

        let form = reqwest::multipart::Form::new()
            .text("public_id", public_id.clone())
            .text("invalidate", "true")
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let result = self
            .client
            .post(&endpoint)
            .multipart(form)
            .timeout(self.config.timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<DestroyResponse>().await {
                    Ok(parsed) if parsed.result == "ok" => {
                        info!(public_id = %public_id, "Asset deleted");
                        DeleteOutcome::Deleted
                    }
                    Ok(parsed) => {
                        warn!(public_id = %public_id, result = %parsed.result, "Asset host declined deletion");
                        DeleteOutcome::Failed(parsed.result)
                    }
                    Err(e) => {
                        warn!(public_id = %public_id, error = %e, "Malformed destroy response");
                        DeleteOutcome::Failed(e.to_string())
                    }
                }
            }
            Ok(response) => {
                warn!(public_id = %public_id, status = %response.status(), "Asset deletion failed");
                DeleteOutcome::Failed(format!("host returned {}", response.status()))
            }
            Err(e) => {
                warn!(public_id = %public_id, error = %e, "Asset deletion request failed");
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_with_version_segment() {
        let url =
            "https://res.cloudinary.com/demo/image/upload/v1712345678/tourism/districts/bhopal.jpg";
        assert_eq!(
            public_id_from_url(url).unwrap(),
            "tourism/districts/bhopal"
        );
    }

    #[test]
    fn test_public_id_without_version_segment() {
        let url = "https://res.cloudinary.com/demo/image/upload/tourism/districts/bhopal.jpg";
        assert_eq!(
            public_id_from_url(url).unwrap(),
            "tourism/districts/bhopal"
        );
    }

    #[test]
    fn test_public_id_single_segment() {
        let url = "https://res.cloudinary.com/demo/image/upload/v99/bhopal.webp";
        assert_eq!(public_id_from_url(url).unwrap(), "bhopal");
    }

    #[test]
    fn test_public_id_fallback_without_marker() {
        // Unrecognized shape: take the last segment, extension stripped
        let url = "https://cdn.example.com/a/b/photo.png";
        assert_eq!(public_id_from_url(url).unwrap(), "photo");
    }

    #[test]
    fn test_public_id_strips_query_string() {
        let url = "https://res.cloudinary.com/demo/image/upload/v1/t/x.jpg?_a=BAMClk";
        assert_eq!(public_id_from_url(url).unwrap(), "t/x");
    }

    #[test]
    fn test_public_id_version_like_folder_kept() {
        // "v2beta" is not a pure version segment and must be kept
        let url = "https://res.cloudinary.com/demo/image/upload/v2beta/x.jpg";
        assert_eq!(public_id_from_url(url).unwrap(), "v2beta/x");
    }

    #[test]
    fn test_extension_only_stripped_from_last_segment() {
        let url = "https://res.cloudinary.com/demo/image/upload/v1/img.2024/raw";
        assert_eq!(public_id_from_url(url).unwrap(), "img.2024/raw");
    }

    #[test]
    fn test_resource_type_routing() {
        assert_eq!(AssetHost::resource_type_for("https://h/u/v1/a.mp4"), "video");
        assert_eq!(AssetHost::resource_type_for("https://h/u/v1/a.webm"), "video");
        assert_eq!(AssetHost::resource_type_for("https://h/u/v1/a.jpg"), "image");
        assert_eq!(
            AssetHost::resource_type_for("https://h/u/v1/a.mp4?x=1"),
            "video"
        );
    }

    #[test]
    fn test_signature_is_param_order_independent() {
        let host = AssetHost::new(AssetHostConfig {
            api_base: "https://api.example.com".to_string(),
            delivery_host: "res.example.com".to_string(),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            timeout: Duration::from_secs(5),
        });

        let a = host.sign(&[("folder", "t"), ("timestamp", "1")]);
        let b = host.sign(&[("timestamp", "1"), ("folder", "t")]);
        assert_eq!(a, b);
    }
}
