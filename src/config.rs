//! Typed, in-process configuration: a validated options bag with a
//! sensible `Default`, never itself responsible for parsing a config file
//! (that remains the embedding application's job).

use std::num::{NonZeroU64, NonZeroUsize};

/// Default `MaxBlockSize`: 8 MiB, matching `block-size-mb` default of 8.
pub const DEFAULT_BLOCK_SIZE: u64 = 8 * 1024 * 1024;
/// Default `MaxConcurrency`.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;
/// Default raw byte length of a newly-minted block id.
pub const DEFAULT_BLOCK_ID_LENGTH: u16 = 16;

/// Customer-provided encryption key material, forwarded opaquely to the
/// object store. This crate never inspects or uses the bytes itself.
#[derive(Debug, Clone)]
pub struct CustomerKey {
    pub key_sha256: [u8; 32],
    pub encryption_key: Vec<u8>,
}

/// Recognized configuration surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub block_size: NonZeroU64,
    pub max_concurrency: NonZeroUsize,
    pub preserve_acl: bool,
    pub default_tier: Option<String>,
    /// Forwarded opaquely to every `ObjectStore::stage_block`/`put_object`
    /// call; this crate never reads or derives from the key material itself.
    pub cpk: Option<CustomerKey>,
    /// When `true`, an `Unsupported` result from an ACL call during flush
    /// propagates as a `FlushError` instead of being logged and ignored.
    pub fail_unsupported_op: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: NonZeroU64::new(DEFAULT_BLOCK_SIZE).unwrap(),
            max_concurrency: NonZeroUsize::new(DEFAULT_MAX_CONCURRENCY).unwrap(),
            preserve_acl: false,
            default_tier: None,
            cpk: None,
            fail_unsupported_op: false,
        }
    }
}

impl Config {
    /// Build a config from `block-size-mb` / `max-concurrency`, validating
    /// that both are at least 1.
    pub fn new(block_size_mb: u64, max_concurrency: usize) -> Self {
        Self {
            block_size: NonZeroU64::new((block_size_mb.max(1)) * 1024 * 1024).unwrap(),
            max_concurrency: NonZeroUsize::new(max_concurrency.max(1)).unwrap(),
            ..Self::default()
        }
    }

    pub fn max_block_size(&self) -> u64 {
        self.block_size.get()
    }
}
