//! REST adapters for the remote collaborators: the Firestore document store
//! (catalog snapshots, room record, status document) and the storage bucket
//! that serves the media files.

pub mod firestore;
pub mod storage;

use thiserror::Error;

pub use firestore::{FirestoreClient, FirestoreStatusWriter};
pub use storage::StorageBucket;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("media file has no download token: {path}")]
    MissingDownloadToken { path: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from {context}: {detail}")]
    Malformed {
        context: &'static str,
        detail: String,
    },
}
