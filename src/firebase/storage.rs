use async_trait::async_trait;
use serde_json::Value;

use crate::controller::MediaUrlResolver;
use crate::definitions::VideoRecord;
use crate::firebase::RemoteError;

const STORAGE_API_BASE: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Resolves catalog entries to playable download URLs via the storage
/// bucket's REST metadata endpoint.
pub struct StorageBucket {
    client: reqwest::Client,
    bucket: String,
}

impl StorageBucket {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, file_path: &str) -> String {
        format!(
            "{STORAGE_API_BASE}/{}/o/{}",
            self.bucket,
            encode_object_path(file_path)
        )
    }

    async fn fetch_download_token(&self, file_path: &str) -> Result<String, RemoteError> {
        let response = self
            .client
            .get(self.object_url(file_path))
            .send()
            .await?
            .error_for_status()?;
        let metadata: Value = response.json().await?;
        token_from_metadata(&metadata, file_path)
    }
}

#[async_trait]
impl MediaUrlResolver for StorageBucket {
    async fn resolve_url(&self, record: &VideoRecord) -> Result<String, RemoteError> {
        let token = self.fetch_download_token(&record.file_path).await?;
        Ok(format!(
            "{}?alt=media&token={token}",
            self.object_url(&record.file_path)
        ))
    }
}

/// Object paths are a single URL segment in the storage REST API, so the
/// separators must be escaped.
fn encode_object_path(file_path: &str) -> String {
    file_path.replace('/', "%2F")
}

fn token_from_metadata(metadata: &Value, file_path: &str) -> Result<String, RemoteError> {
    // downloadTokens is a comma-separated list; any one of them is valid.
    metadata["downloadTokens"]
        .as_str()
        .and_then(|tokens| tokens.split(',').next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RemoteError::MissingDownloadToken { path: file_path.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_path_separators_are_escaped() {
        assert_eq!(encode_object_path("videos/clip.mp4"), "videos%2Fclip.mp4");
        assert_eq!(encode_object_path("clip.mp4"), "clip.mp4");
    }

    #[test]
    fn first_download_token_is_used() {
        let metadata = json!({"downloadTokens": "tok-1,tok-2"});
        assert_eq!(token_from_metadata(&metadata, "a.mp4").unwrap(), "tok-1");
    }

    #[test]
    fn missing_token_is_a_resolution_error() {
        for metadata in [json!({}), json!({"downloadTokens": ""})] {
            let err = token_from_metadata(&metadata, "a.mp4").unwrap_err();
            assert!(matches!(err, RemoteError::MissingDownloadToken { ref path } if path == "a.mp4"));
        }
    }

    #[test]
    fn resolved_url_shape() {
        let bucket = StorageBucket::new("kiosk-media.appspot.com");
        assert_eq!(
            bucket.object_url("videos/clip.mp4"),
            "https://firebasestorage.googleapis.com/v0/b/kiosk-media.appspot.com/o/videos%2Fclip.mp4"
        );
    }
}
