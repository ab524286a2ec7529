//! Media storage client.
//!
//! Uploads a file to an external object-storage API (Cloudinary wire
//! format: unsigned upload of a base64 data URI) and returns the public URL
//! the store assigned. The file bytes never touch local disk.

use base64::Engine as _;

use super::ServiceError;

#[derive(Debug, Clone)]
pub struct MediaClient {
    upload_url: String,
    upload_preset: String,
}

impl MediaClient {
    pub fn new(upload_url: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
        }
    }

    /// Upload file bytes, returning the public URL of the stored object.
    pub fn upload(&self, data: &[u8], content_type: &str) -> Result<String, ServiceError> {
        let data_uri = format!(
            "data:{};base64,{}",
            content_type,
            base64::engine::general_purpose::STANDARD.encode(data)
        );
        let body = serde_json::json!({
            "file": data_uri,
            "upload_preset": self.upload_preset,
        });

        let response = ureq::post(&self.upload_url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())?;

        let json: serde_json::Value = response.into_json()?;
        json.get("secure_url")
            .and_then(|u| u.as_str())
            .map(|u| u.to_string())
            .ok_or_else(|| ServiceError::Provider("upload response missing secure_url".to_string()))
    }
}
