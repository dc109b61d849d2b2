//! Flush/Commit Protocol: drives staging then issues one atomic remote
//! commit, the way a packer drives several subordinate steps into a single
//! atomic-looking operation over an options bag.

use std::sync::Arc;

use log::{debug, warn};

use crate::block_id::BlockIdSource;
use crate::bol::Bol;
use crate::config::Config;
use crate::error::{FlushError, StoreError};
use crate::object_store::{CommitOptions, ObjectStore};
use crate::staging;

/// Apply `fail_unsupported_op` gating to an ACL call's result: an
/// `Unsupported` backend is always a silent success unless the caller
/// opted into `ENOTSUP`-style strictness, in which case it propagates.
/// Any other error is logged and swallowed — ACL preservation is a
/// best-effort courtesy around the commit, never a reason to abort it.
fn gate_acl_result<T>(op: &str, path: &str, config: &Config, result: Result<T, StoreError>) -> Result<Option<T>, FlushError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(StoreError::Unsupported(msg)) if config.fail_unsupported_op => {
            Err(FlushError::Store(StoreError::Unsupported(msg)))
        }
        Err(e) => {
            warn!("flush({path}): {op} failed: {e}");
            Ok(None)
        }
    }
}

/// Drive a full flush of `bol` at `path` against `store`.
///
/// `known_etag` is the handle's last-observed ETag, forwarded as an
/// `if-match` condition on commit when present.
/// `ids` mints the single block id needed when flushing a still-small-file
/// BOL. On success, returns the new ETag to store
/// back on the handle.
pub async fn flush(
    bol: &mut Bol,
    store: &Arc<dyn ObjectStore>,
    path: &str,
    config: &Config,
    known_etag: Option<&str>,
    ids: &dyn BlockIdSource,
) -> Result<String, FlushError> {
    // Step 1: small-file precondition check.
    if bol.is_small_file() {
        return flush_small_file(bol, store, path, config, known_etag, ids).await;
    }

    if !bol.is_dirty() && bol.consistent() {
        debug!("flush({path}): no-op, nothing dirty and already consistent");
        return Ok(known_etag.unwrap_or_default().to_string());
    }

    // ACL preservation: fetch before commit.
    let preserved_acl = if config.preserve_acl {
        gate_acl_result("get_acl before commit", path, config, store.get_acl(path).await)?
    } else {
        None
    };

    // Step 2: stage every dirty block.
    staging::stage(bol, store, path, config.max_concurrency.get(), config.cpk.as_ref()).await?;

    // Step 3: compose the commit list — every block, not just those staged
    // this flush.
    let ids = bol.committed_id_list();

    // Step 4: commit.
    let opts = CommitOptions {
        content_type: None,
        access_tier: config.default_tier.clone(),
        if_match_etag: known_etag.map(str::to_string),
    };
    let new_etag = store.commit_block_list(path, &ids, &opts).await?;

    // ACL preservation: re-apply after commit.
    if let Some(acl) = preserved_acl {
        gate_acl_result("set_acl after commit", path, config, store.set_acl(path, &acl).await)?;
    }

    // Step 5: post-commit bookkeeping.
    bol.mark_consistent(true);
    debug!("flush({path}): committed {} blocks, new etag {new_etag}", ids.len());
    Ok(new_etag)
}

async fn flush_small_file(
    bol: &mut Bol,
    store: &Arc<dyn ObjectStore>,
    path: &str,
    config: &Config,
    known_etag: Option<&str>,
    _ids: &dyn BlockIdSource,
) -> Result<String, FlushError> {
    let Some(buffer) = bol.small_file_buffer().cloned() else {
        debug!("flush({path}): small-file, not dirty, no-op");
        return Ok(known_etag.unwrap_or_default().to_string());
    };

    let preserved_acl = if config.preserve_acl {
        gate_acl_result("get_acl before commit", path, config, store.get_acl(path).await)?
    } else {
        None
    };

    let opts = CommitOptions {
        content_type: None,
        access_tier: config.default_tier.clone(),
        if_match_etag: known_etag.map(str::to_string),
    };
    let new_etag = store.put_object(path, buffer, &opts, config.cpk.as_ref()).await?;

    if let Some(acl) = preserved_acl {
        gate_acl_result("set_acl after commit", path, config, store.set_acl(path, &acl).await)?;
    }

    bol.mark_consistent(true);
    Ok(new_etag)
}
