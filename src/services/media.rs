use crate::{config::AppConfig, errors::ServiceError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted upload size: 5 MB
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct MediaHostResponse {
    secure_url: String,
    public_id: String,
}

/// Passthrough to the external media host; the service never stores image
/// bytes itself.
#[derive(Clone)]
pub struct MediaService {
    client: reqwest::Client,
    config: Arc<AppConfig>,
}

impl MediaService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
            config,
        }
    }

    /// Uploads image bytes to the media host and returns the hosted URL.
    /// Size and content-type are validated by the handler before the bytes
    /// reach this call.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: String,
    ) -> Result<UploadedImage, ServiceError> {
        let (upload_url, api_key, api_secret) = match (
            self.config.media_upload_url.as_deref(),
            self.config.media_api_key.as_deref(),
            self.config.media_api_secret.as_deref(),
        ) {
            (Some(url), Some(key), Some(secret)) => (url, key, secret),
            _ => {
                return Err(ServiceError::InvalidOperation(
                    "Media uploads are not configured".to_string(),
                ))
            }
        };

        let timestamp = chrono::Utc::now().timestamp();
        let folder = self.config.media_folder.clone();
        let signature = sign_upload(&folder, timestamp, api_secret);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            )
            .text("api_key", api_key.to_string())
            .text("timestamp", timestamp.to_string())
            .text("folder", folder)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Media host unreachable: {}", e);
                ServiceError::ExternalServiceError(format!("media host unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Media host rejected upload");
            return Err(ServiceError::ExternalServiceError(format!(
                "media host returned {}",
                status
            )));
        }

        let body: MediaHostResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("unparseable media host response: {}", e))
        })?;

        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }
}

/// Signs the upload parameters (sorted, ampersand-joined, secret appended).
fn sign_upload(folder: &str, timestamp: i64, api_secret: &str) -> String {
    let to_sign = format!("folder={}&timestamp={}{}", folder, timestamp, api_secret);
    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hex::encode(hasher.finalize())
}
