//! The [`Block`] type: a contiguous byte range of a file and the unit of
//! upload.
//!
//! A small, self-describing record carrying identity, extent, and a set of
//! flags, held purely in memory — this crate's "container" is the remote
//! object store's own block list, not a local framed file.

use crate::block_id::BlockId;
use bytes::Bytes;

/// Mutable state flags carried by a [`Block`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFlags {
    /// Must be staged on the next flush.
    pub dirty: bool,
    /// This block represents a zero-filled ("hole") region that must exist
    /// in the final object; materialized as zeros of size `end - start` at
    /// stage time.
    pub truncated: bool,
    /// Marks a block that stands in for an entire small-file object during
    /// [`crate::bol::Bol::small_file_promote`], rather than a block that was
    /// ever part of a committed block list under its own id.
    pub small_file_sentinel: bool,
}

/// A byte-range write that has not yet been merged into a block's resident
/// `data` because the block was not resident at write time and the write
/// did not cover the whole block. Merged during the staging engine's
/// read-modify-write pre-fetch.
#[derive(Debug, Clone)]
pub struct PendingPatch {
    pub offset_in_block: usize,
    pub bytes: Bytes,
}

/// A contiguous byte range of the file and the unit of upload.
#[derive(Debug, Clone)]
pub struct Block {
    pub start: u64,
    pub end: u64,
    pub id: BlockId,
    /// Present only while the block is resident in memory. A block already
    /// committed to the store and not currently modified has `data = None`.
    pub data: Option<Bytes>,
    pub flags: BlockFlags,
    /// Writes awaiting a read-modify-write pre-fetch; see [`PendingPatch`].
    pub(crate) pending_patches: Vec<PendingPatch>,
}

impl Block {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }

    pub fn is_resident(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_pending_patches(&self) -> bool {
        !self.pending_patches.is_empty()
    }

    /// This block is dirty, not a zero-filled hole, and not currently
    /// resident: the normative trigger for a read-modify-write pre-fetch in
    /// C3. Covers both a queued partial write against a non-resident block
    /// and a truncate-shrink that narrowed a previously clean, non-resident
    /// block's range without fetching its bytes.
    pub fn needs_read_modify_write(&self) -> bool {
        self.data.is_none() && !self.flags.truncated && self.flags.dirty
    }

    /// Apply every outstanding pending patch to freshly-fetched (or
    /// synthesized-zero) bytes, leaving the block fully resident. Called by
    /// the staging engine after its pre-fetch, never by [`crate::bol::Bol`]
    /// directly.
    pub(crate) fn merge_patches_into(&mut self, mut base: Vec<u8>) -> Bytes {
        for patch in self.pending_patches.drain(..) {
            let start = patch.offset_in_block;
            let end = start + patch.bytes.len();
            if end > base.len() {
                base.resize(end, 0);
            }
            base[start..end].copy_from_slice(&patch.bytes);
        }
        Bytes::from(base)
    }

    /// Debug-only invariant check: a dirty, non-truncated
    /// block either carries resident data of exactly the block's size, or
    /// is absent pending a read-modify-write pre-fetch (see
    /// [`Self::needs_read_modify_write`]).
    pub(crate) fn debug_check_invariants(&self) {
        debug_assert!(self.start < self.end, "block start must be < end");
        if let Some(data) = &self.data {
            debug_assert!(
                !(self.flags.dirty && !self.flags.truncated) || data.len() as u64 == self.size(),
                "resident dirty block's data length must equal its byte range"
            );
        }
    }
}
