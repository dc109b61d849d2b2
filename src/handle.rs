//! Handle Registry: a registry of many concurrently-open handles, each
//! wrapped in an `Arc<Mutex<...>>` the way per-session state gets wrapped
//! for concurrent access from multiple async callers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bol::Bol;

pub type HandleId = u64;

/// Per-handle open-file state.
pub struct OpenFile {
    pub path: String,
    pub bol: Bol,
    pub known_etag: Option<String>,
}

/// Maps `HandleId -> Arc<Mutex<OpenFile>>`. Mutation of a given handle's BOL
/// (write, truncate, flush) is serialized by holding that handle's mutex for
/// the duration of the call; the
/// registry itself only ever needs its own lock briefly, to look up or
/// insert/remove an entry.
pub struct HandleRegistry {
    next_id: std::sync::atomic::AtomicU64,
    handles: Mutex<HashMap<HandleId, Arc<Mutex<OpenFile>>>>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            next_id: std::sync::atomic::AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Register a newly-constructed `OpenFile` and return its handle id.
    pub async fn open(&self, path: String, bol: Bol, known_etag: Option<String>) -> HandleId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let open_file = OpenFile {
            path,
            bol,
            known_etag,
        };
        self.handles
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(open_file)));
        id
    }

    /// Borrow the mutex guarding a handle's state, for the caller to lock
    /// across a write/truncate/flush call.
    pub async fn get(&self, id: HandleId) -> Option<Arc<Mutex<OpenFile>>> {
        self.handles.lock().await.get(&id).cloned()
    }

    /// Destroy a handle. Callers are expected to have
    /// flushed first; this method does not flush on their behalf.
    pub async fn close(&self, id: HandleId) -> Option<Arc<Mutex<OpenFile>>> {
        self.handles.lock().await.remove(&id)
    }
}
