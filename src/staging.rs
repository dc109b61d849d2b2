//! Staging Engine: a read-modify-write pre-fetch pass followed by a
//! bounded-concurrency parallel upload fan-out, the same `par_iter`
//! fan-out-with-first-error-propagation shape used for CPU-bound chunk
//! compression elsewhere, generalized to I/O-bound work since every
//! `stage_block` call is a network suspension point. Concurrency is bounded
//! by a `tokio::sync::Semaphore` sized to `MaxConcurrency` rather than a
//! thread pool.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::bol::Bol;
use crate::config::CustomerKey;
use crate::error::StageError;
use crate::object_store::ObjectStore;

/// Stage every dirty block of `bol` against `store` at `path`, bounded by
/// `max_concurrency`. `cpk` is forwarded opaquely to every `stage_block`
/// call.
///
/// On a transient per-block failure, blocks that completed staging remain
/// clean; blocks that did not are left `dirty` so a retried call picks them
/// back up. The first error encountered
/// is returned to the caller once all in-flight uploads for this call have
/// settled.
pub async fn stage(
    bol: &mut Bol,
    store: &Arc<dyn ObjectStore>,
    path: &str,
    max_concurrency: usize,
    cpk: Option<&CustomerKey>,
) -> Result<(), StageError> {
    // Phase 1: read-modify-write pre-fetch and truncated-zero synthesis,
    // sequentially per block (in-memory only except the RMW fetch itself,
    // so this phase is the one place a per-block network call happens
    // outside the upload fan-out).
    for block in bol.iter_dirty() {
        if block.flags.truncated && block.data.is_none() {
            block.data = Some(Bytes::from(vec![0u8; block.size() as usize]));
            continue;
        }
        if block.needs_read_modify_write() {
            let fetched = store
                .download_range(path, block.start, block.end)
                .await
                .map_err(StageError::from)?;
            let base = if fetched.len() as u64 == block.size() {
                fetched.to_vec()
            } else {
                let mut buf = vec![0u8; block.size() as usize];
                let n = fetched.len().min(buf.len());
                buf[..n].copy_from_slice(&fetched[..n]);
                buf
            };
            block.data = Some(block.merge_patches_into(base));
        }
    }

    // Phase 2: bounded-concurrency upload fan-out.
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut in_flight = FuturesUnordered::new();

    for (idx, block) in bol.blocks().iter().enumerate() {
        if !block.flags.dirty {
            continue;
        }
        let bytes = block
            .data
            .clone()
            .expect("every dirty block is resident by the end of phase 1");
        let id = block.id.clone();
        let store = Arc::clone(store);
        let path = path.to_string();
        let permit = Arc::clone(&semaphore);
        in_flight.push(async move {
            let _permit = permit
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            store
                .stage_block(&path, &id, bytes, cpk)
                .await
                .map(|_| idx)
                .map_err(|e| (idx, e))
        });
    }

    let mut first_error: Option<StageError> = None;
    let mut succeeded = Vec::new();
    while let Some(result) = in_flight.next().await {
        match result {
            Ok(idx) => succeeded.push(idx),
            Err((_, e)) => {
                if first_error.is_none() {
                    first_error = Some(StageError::from(e));
                }
            }
        }
    }

    for idx in succeeded {
        let block = &mut bol.blocks_mut()[idx];
        block.flags.dirty = false;
        block.data = None;
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
