use async_trait::async_trait;
use log::{info, warn};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::catalog_watch::CatalogSource;
use crate::controller::StatusPublisher;
use crate::definitions::{Catalog, PlaybackStatus, VideoRecord};
use crate::firebase::RemoteError;

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";
const VIDEOS_COLLECTION: &str = "videos";

/// Minimal Firestore REST document client, scoped to the documents this
/// service reads and writes.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    documents_base: String,
}

impl FirestoreClient {
    pub fn new(project_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            documents_base: format!(
                "{FIRESTORE_API_BASE}/projects/{project_id}/databases/(default)/documents"
            ),
        }
    }

    fn document_url(&self, path: &str) -> String {
        format!("{}/{path}", self.documents_base)
    }

    async fn get_document(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        let response = self.client.get(self.document_url(path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: Value = response.error_for_status()?.json().await?;
        Ok(Some(document))
    }

    /// PATCH a document, creating it when absent. With a field mask only the
    /// named fields are replaced.
    async fn set_document(
        &self,
        path: &str,
        fields: Value,
        mask: Option<&[&str]>,
    ) -> Result<(), RemoteError> {
        let mut request = self
            .client
            .patch(self.document_url(path))
            .json(&json!({ "fields": fields }));
        if let Some(mask) = mask {
            for field in mask {
                request = request.query(&[("updateMask.fieldPaths", *field)]);
            }
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> Result<Value, RemoteError> {
        let response = self
            .client
            .get(self.document_url(collection))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Ensure the device's room record exists and carries the current push
    /// registration token, seed the status document with its initial state,
    /// and return the status document path.
    pub async fn get_or_create_room(
        &self,
        room_id: &str,
        token: &str,
    ) -> Result<String, RemoteError> {
        let room_path = format!("rooms/{room_id}");
        match self.get_document(&room_path).await? {
            Some(room) => {
                if field_str(&room, "token") != Some(token) {
                    info!("Push token rotated, updating room record {room_id}");
                    self.set_document(
                        &room_path,
                        json!({ "token": { "stringValue": token } }),
                        Some(&["token"]),
                    )
                    .await?;
                }
            }
            None => {
                info!("Creating room record {room_id}");
                self.set_document(
                    &room_path,
                    json!({
                        "roomName": { "stringValue": room_id },
                        "token": { "stringValue": token },
                    }),
                    None,
                )
                .await?;
            }
        }

        let status_path = format!("rooms/{room_id}/currently_playing/current");
        let initial = PlaybackStatus { is_paused: true, ..PlaybackStatus::loading() };
        self.set_document(&status_path, encode_status(&initial)?, None).await?;
        Ok(status_path)
    }

    pub fn status_writer(&self, document_path: impl Into<String>) -> FirestoreStatusWriter {
        FirestoreStatusWriter {
            client: self.clone(),
            document_path: document_path.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for FirestoreClient {
    async fn fetch_catalog(&self) -> Result<Catalog, RemoteError> {
        let listing = self.list_collection(VIDEOS_COLLECTION).await?;
        Ok(decode_catalog(&listing))
    }
}

/// Writes playback status transitions to one Firestore document.
pub struct FirestoreStatusWriter {
    client: FirestoreClient,
    document_path: String,
}

#[async_trait]
impl StatusPublisher for FirestoreStatusWriter {
    async fn publish(&self, status: &PlaybackStatus) -> Result<(), RemoteError> {
        self.client
            .set_document(&self.document_path, encode_status(status)?, None)
            .await
    }
}

/// Encode a status into Firestore typed field values, going through the
/// serde representation so the wire field names stay in one place.
fn encode_status(status: &PlaybackStatus) -> Result<Value, RemoteError> {
    let plain = serde_json::to_value(status).map_err(|e| RemoteError::Malformed {
        context: "status document",
        detail: e.to_string(),
    })?;
    let Value::Object(entries) = plain else {
        return Err(RemoteError::Malformed {
            context: "status document",
            detail: "status did not serialize to an object".to_string(),
        });
    };
    let mut fields = serde_json::Map::new();
    for (name, value) in entries {
        let typed = match value {
            Value::Null => json!({ "nullValue": null }),
            Value::Bool(b) => json!({ "booleanValue": b }),
            Value::String(s) => json!({ "stringValue": s }),
            other => {
                return Err(RemoteError::Malformed {
                    context: "status document",
                    detail: format!("unsupported field value for {name}: {other}"),
                })
            }
        };
        fields.insert(name, typed);
    }
    Ok(Value::Object(fields))
}

fn field_str<'a>(document: &'a Value, name: &str) -> Option<&'a str> {
    document["fields"][name]["stringValue"].as_str()
}

fn document_id(document: &Value) -> Option<&str> {
    document["name"].as_str()?.rsplit('/').next()
}

/// Decode a collection listing into a catalog snapshot. Documents without a
/// file path cannot be played and are dropped from the snapshot.
fn decode_catalog(listing: &Value) -> Catalog {
    let Some(documents) = listing["documents"].as_array() else {
        // An empty collection lists as a body without a documents array.
        return Catalog::default();
    };
    documents
        .iter()
        .filter_map(|document| {
            let id = document_id(document)?;
            let Some(file_path) = field_str(document, "file_path") else {
                warn!("Catalog entry {id} has no file_path, skipping");
                return None;
            };
            let record = VideoRecord {
                file_path: file_path.to_string(),
                thumbnail_path: field_str(document, "thumbnail_path").map(str::to_string),
            };
            Some((id.to_string(), record))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_encodes_to_typed_fields() {
        let record = VideoRecord {
            file_path: "clips/a.mp4".into(),
            thumbnail_path: None,
        };
        let fields = encode_status(&PlaybackStatus::playing("v1", &record)).unwrap();
        assert_eq!(fields["playingRef"]["stringValue"], "videos/v1");
        assert_eq!(fields["fileName"]["stringValue"], "clips/a.mp4");
        assert!(fields["thumbnailLink"].get("nullValue").is_some());
        assert_eq!(fields["isPaused"]["booleanValue"], false);
        assert_eq!(fields["isLoading"]["booleanValue"], false);
    }

    #[test]
    fn loading_status_encodes_null_reference() {
        let fields = encode_status(&PlaybackStatus::loading()).unwrap();
        assert!(fields["playingRef"].get("nullValue").is_some());
        assert_eq!(fields["isLoading"]["booleanValue"], true);
    }

    fn sample_listing() -> Value {
        json!({
            "documents": [
                {
                    "name": "projects/p/databases/(default)/documents/videos/v1",
                    "fields": {
                        "file_path": { "stringValue": "clips/a.mp4" },
                        "thumbnail_path": { "stringValue": "thumbs/a.png" }
                    }
                },
                {
                    "name": "projects/p/databases/(default)/documents/videos/v2",
                    "fields": {
                        "file_path": { "stringValue": "clips/b.mp4" }
                    }
                },
                {
                    "name": "projects/p/databases/(default)/documents/videos/broken",
                    "fields": {}
                }
            ]
        })
    }

    #[test]
    fn catalog_decodes_documents_and_drops_unplayable_entries() {
        let catalog = decode_catalog(&sample_listing());
        assert_eq!(catalog.len(), 2);
        let v1 = catalog.get("v1").unwrap();
        assert_eq!(v1.file_path, "clips/a.mp4");
        assert_eq!(v1.thumbnail_path.as_deref(), Some("thumbs/a.png"));
        let v2 = catalog.get("v2").unwrap();
        assert_eq!(v2.thumbnail_path, None);
        assert!(catalog.get("broken").is_none());
    }

    #[test]
    fn empty_collection_decodes_to_empty_catalog() {
        assert!(decode_catalog(&json!({})).is_empty());
    }
}
