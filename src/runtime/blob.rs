//! In-process blob URL storage
//!
//! Worker programs are not written to disk. The host stores the program text
//! under an opaque `blob:strand/<n>` URL, workers load it back through the
//! [`ScriptLoader`](super::loader::ScriptLoader), and the owning thread revokes
//! the URL when it is killed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub const BLOB_SCHEME: &str = "blob:";

const BLOB_PREFIX: &str = "blob:strand/";

/// Stored blob: content plus MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
    pub content_type: String,
}

/// Store of object URLs, shared between the host and its workers
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<String, Blob>>,
    counter: AtomicU64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` and return a fresh URL for it
    pub fn create_object_url(&self, content: String, content_type: &str) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let url = format!("{}{}", BLOB_PREFIX, id);

        self.blobs.lock().insert(
            url.clone(),
            Blob {
                content,
                content_type: content_type.to_string(),
            },
        );

        url
    }

    pub fn get(&self, url: &str) -> Option<Blob> {
        self.blobs.lock().get(url).cloned()
    }

    /// Release the blob behind `url`. Returns `false` if it was already revoked.
    pub fn revoke_object_url(&self, url: &str) -> bool {
        self.blobs.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored blob
    pub fn clear(&self) {
        self.blobs.lock().clear();
    }
}
