//! Object Store capability layer: a capability-set trait with concrete
//! structs per backend and dispatch on a discriminant, never an
//! inheritance hierarchy, generalized to an async network boundary since
//! every operation here is a suspension point.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::block_id::BlockId;
use crate::config::CustomerKey;
use crate::error::StoreError;

/// Desired properties of a commit, carried from [`crate::config::Config`]
/// and any per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub content_type: Option<String>,
    pub access_tier: Option<String>,
    /// Conditional ETag for optimistic concurrency.
    pub if_match_etag: Option<String>,
}

/// Result of `get_properties`.
#[derive(Debug, Clone)]
pub struct ObjectProperties {
    pub size: u64,
    pub etag: String,
    /// `None` when the object is stored as a single whole-object put
    /// (`small_file` mode); `Some` gives the ordered `(id, size)` pairs
    /// making up the committed block list.
    pub block_list: Option<Vec<(BlockId, u64)>>,
}

/// Opaque ACL representation, round-tripped unexamined by this crate.
#[derive(Debug, Clone, Default)]
pub struct Acl(pub Vec<u8>);

/// Capability set a backend must provide.
/// Variant-specific non-support (e.g. ACLs on a block-blob backend) is
/// expressed by returning `StoreError::Unsupported`, never by a reduced
/// trait surface.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `cpk` is customer-provided encryption key material, forwarded
    /// opaquely to the backend: this trait and its implementations never
    /// inspect or use the bytes themselves.
    async fn stage_block(
        &self,
        path: &str,
        id: &BlockId,
        bytes: Bytes,
        cpk: Option<&CustomerKey>,
    ) -> Result<(), StoreError>;

    /// Whole-object put: writes `bytes` as the entire object in one call,
    /// with no block list left on the server. Used for `small_file` mode,
    /// where `get_properties` must report `block_list: None`.
    async fn put_object(
        &self,
        path: &str,
        bytes: Bytes,
        opts: &CommitOptions,
        cpk: Option<&CustomerKey>,
    ) -> Result<String, StoreError>;

    async fn commit_block_list(
        &self,
        path: &str,
        ids: &[BlockId],
        opts: &CommitOptions,
    ) -> Result<String, StoreError>;

    async fn download_range(&self, path: &str, start: u64, end: u64) -> Result<Bytes, StoreError>;

    async fn get_properties(&self, path: &str) -> Result<ObjectProperties, StoreError>;

    async fn get_acl(&self, path: &str) -> Result<Acl, StoreError>;

    async fn set_acl(&self, path: &str, acl: &Acl) -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Classic block-blob backend: no hierarchical namespace, no ACLs.
///
/// The `transport` field is the non-goaled seam: this repo never implements it.
pub struct BlockBlobStore {
    #[allow(dead_code)]
    transport: Arc<dyn std::any::Any + Send + Sync>,
}

impl BlockBlobStore {
    pub fn new(transport: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ObjectStore for BlockBlobStore {
    async fn stage_block(
        &self,
        _path: &str,
        _id: &BlockId,
        _bytes: Bytes,
        _cpk: Option<&CustomerKey>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }

    async fn put_object(
        &self,
        _path: &str,
        _bytes: Bytes,
        _opts: &CommitOptions,
        _cpk: Option<&CustomerKey>,
    ) -> Result<String, StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }

    async fn commit_block_list(
        &self,
        _path: &str,
        _ids: &[BlockId],
        _opts: &CommitOptions,
    ) -> Result<String, StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }

    async fn download_range(&self, _path: &str, _start: u64, _end: u64) -> Result<Bytes, StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }

    async fn get_properties(&self, _path: &str) -> Result<ObjectProperties, StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }

    async fn get_acl(&self, _path: &str) -> Result<Acl, StoreError> {
        Err(StoreError::Unsupported("block-blob backend has no ACL support".into()))
    }

    async fn set_acl(&self, _path: &str, _acl: &Acl) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("block-blob backend has no ACL support".into()))
    }

    async fn delete(&self, _path: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("transport not wired for BlockBlobStore".into()))
    }
}

/// Hierarchical-namespace (ADLS Gen2) backend: supports ACL round-trip.
pub struct AdlsStore {
    #[allow(dead_code)]
    transport: Arc<dyn std::any::Any + Send + Sync>,
}

impl AdlsStore {
    pub fn new(transport: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ObjectStore for AdlsStore {
    async fn stage_block(
        &self,
        _path: &str,
        _id: &BlockId,
        _bytes: Bytes,
        _cpk: Option<&CustomerKey>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn put_object(
        &self,
        _path: &str,
        _bytes: Bytes,
        _opts: &CommitOptions,
        _cpk: Option<&CustomerKey>,
    ) -> Result<String, StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn commit_block_list(
        &self,
        _path: &str,
        _ids: &[BlockId],
        _opts: &CommitOptions,
    ) -> Result<String, StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn download_range(&self, _path: &str, _start: u64, _end: u64) -> Result<Bytes, StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn get_properties(&self, _path: &str) -> Result<ObjectProperties, StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn get_acl(&self, _path: &str) -> Result<Acl, StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn set_acl(&self, _path: &str, _acl: &Acl) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }

    async fn delete(&self, _path: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("transport not wired for AdlsStore".into()))
    }
}

#[derive(Debug, Clone)]
struct MockObject {
    etag: u64,
    committed: Option<Vec<(BlockId, u64)>>,
    small_file_content: Option<Bytes>,
    acl: Acl,
}

/// Injectable failure for exercising [`crate::error::StageError::Transient`]/
/// `Fatal` paths without a real network.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultInjection {
    pub fail_next_stage: bool,
    pub fail_next_commit: bool,
}

/// In-memory `ObjectStore` test double. Models staged
/// but uncommitted blocks, a committed block list per path, and injectable
/// failure. Used only by `#[cfg(test)]` code and `tests/`.
pub struct MockStore {
    staged: tokio::sync::Mutex<HashMap<(String, String), Bytes>>,
    objects: tokio::sync::Mutex<HashMap<String, MockObject>>,
    faults: tokio::sync::Mutex<FaultInjection>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            staged: tokio::sync::Mutex::new(HashMap::new()),
            objects: tokio::sync::Mutex::new(HashMap::new()),
            faults: tokio::sync::Mutex::new(FaultInjection::default()),
        }
    }

    pub async fn inject(&self, faults: FaultInjection) {
        *self.faults.lock().await = faults;
    }

    /// Seed a path as pre-existing, committed small-file content (for test
    /// setup only).
    pub async fn seed_small_file(&self, path: &str, content: Bytes) {
        self.objects.lock().await.insert(
            path.to_string(),
            MockObject {
                etag: 0,
                committed: None,
                small_file_content: Some(content),
                acl: Acl::default(),
            },
        );
    }

    /// Seed a path as pre-existing, committed block-list content (for test
    /// setup only).
    pub async fn seed_block_list(&self, path: &str, blocks: Vec<(BlockId, Bytes)>) {
        let mut staged = self.staged.lock().await;
        let mut committed = Vec::with_capacity(blocks.len());
        for (id, bytes) in blocks {
            committed.push((id.clone(), bytes.len() as u64));
            staged.insert((path.to_string(), id.encoded()), bytes);
        }
        self.objects.lock().await.insert(
            path.to_string(),
            MockObject {
                etag: 0,
                committed: Some(committed),
                small_file_content: None,
                acl: Acl::default(),
            },
        );
    }

    /// Reconstruct the full committed content of `path` for test
    /// assertions.
    pub async fn read_committed(&self, path: &str) -> Option<Bytes> {
        let objects = self.objects.lock().await;
        let obj = objects.get(path)?;
        if let Some(content) = &obj.small_file_content {
            return Some(content.clone());
        }
        let ids = obj.committed.as_ref()?;
        let staged = self.staged.lock().await;
        let mut out = Vec::new();
        for (id, size) in ids {
            match staged.get(&(path.to_string(), id.encoded())) {
                Some(bytes) => out.extend_from_slice(bytes),
                None => out.resize(out.len() + *size as usize, 0),
            }
        }
        Some(Bytes::from(out))
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn stage_block(
        &self,
        path: &str,
        id: &BlockId,
        bytes: Bytes,
        _cpk: Option<&CustomerKey>,
    ) -> Result<(), StoreError> {
        {
            let mut faults = self.faults.lock().await;
            if faults.fail_next_stage {
                faults.fail_next_stage = false;
                return Err(StoreError::Transient("injected stage failure".into()));
            }
        }
        self.staged
            .lock()
            .await
            .insert((path.to_string(), id.encoded()), bytes);
        Ok(())
    }

    async fn put_object(
        &self,
        path: &str,
        bytes: Bytes,
        opts: &CommitOptions,
        _cpk: Option<&CustomerKey>,
    ) -> Result<String, StoreError> {
        {
            let mut faults = self.faults.lock().await;
            if faults.fail_next_stage {
                faults.fail_next_stage = false;
                return Err(StoreError::Transient("injected stage failure".into()));
            }
        }
        let mut objects = self.objects.lock().await;
        let existing_etag = objects.get(path).map(|o| o.etag);
        if let Some(expected) = &opts.if_match_etag {
            match existing_etag {
                Some(etag) if etag.to_string() == *expected => {}
                None => {}
                _ => return Err(StoreError::ConditionFailed),
            }
        }
        let new_etag = existing_etag.unwrap_or(0) + 1;
        let acl = objects.get(path).map(|o| o.acl.clone()).unwrap_or_default();
        objects.insert(
            path.to_string(),
            MockObject {
                etag: new_etag,
                committed: None,
                small_file_content: Some(bytes),
                acl,
            },
        );
        Ok(new_etag.to_string())
    }

    async fn commit_block_list(
        &self,
        path: &str,
        ids: &[BlockId],
        opts: &CommitOptions,
    ) -> Result<String, StoreError> {
        {
            let mut faults = self.faults.lock().await;
            if faults.fail_next_commit {
                faults.fail_next_commit = false;
                return Err(StoreError::Transient("injected commit failure".into()));
            }
        }
        let mut objects = self.objects.lock().await;
        let existing_etag = objects.get(path).map(|o| o.etag);
        if let Some(expected) = &opts.if_match_etag {
            match existing_etag {
                Some(etag) if etag.to_string() == *expected => {}
                None => {}
                _ => return Err(StoreError::ConditionFailed),
            }
        }
        let new_etag = existing_etag.unwrap_or(0) + 1;
        let acl = objects.get(path).map(|o| o.acl.clone()).unwrap_or_default();
        objects.insert(
            path.to_string(),
            MockObject {
                etag: new_etag,
                committed: Some(
                    ids.iter()
                        .map(|id| (id.clone(), 0u64)) // sizes resolved lazily via staged map at read time
                        .collect(),
                ),
                small_file_content: None,
                acl,
            },
        );
        drop(objects);
        // Re-resolve committed sizes from the staged map now that we hold
        // no lock (avoids a self-deadlock on `staged`).
        let staged = self.staged.lock().await;
        let mut objects = self.objects.lock().await;
        if let Some(obj) = objects.get_mut(path) {
            if let Some(committed) = &mut obj.committed {
                for (id, size) in committed.iter_mut() {
                    if let Some(bytes) = staged.get(&(path.to_string(), id.encoded())) {
                        *size = bytes.len() as u64;
                    }
                }
            }
        }
        Ok(new_etag.to_string())
    }

    async fn download_range(&self, path: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        let content = self
            .read_committed(path)
            .await
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let start = start as usize;
        let end = (end as usize).min(content.len());
        if start > end {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "range start past end",
            )));
        }
        Ok(content.slice(start..end))
    }

    async fn get_properties(&self, path: &str) -> Result<ObjectProperties, StoreError> {
        let objects = self.objects.lock().await;
        let obj = objects
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let size = if let Some(content) = &obj.small_file_content {
            content.len() as u64
        } else {
            obj.committed
                .as_ref()
                .map(|ids| ids.iter().map(|(_, s)| *s).sum())
                .unwrap_or(0)
        };
        Ok(ObjectProperties {
            size,
            etag: obj.etag.to_string(),
            block_list: obj.committed.clone(),
        })
    }

    async fn get_acl(&self, path: &str) -> Result<Acl, StoreError> {
        let objects = self.objects.lock().await;
        objects
            .get(path)
            .map(|o| o.acl.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn set_acl(&self, path: &str, acl: &Acl) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().await;
        let obj = objects
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        obj.acl = acl.clone();
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().await;
        objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}
