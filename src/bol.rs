//! The Block Offset List: an ordered, contiguous, reconstructible-from-its-
//! blocks sequence covering a file's content, generalized from append-only
//! fixed-boundary chunking of a single upload to a full random-access write
//! model — lookup by offset, in-place overwrite, read-modify-write
//! planning, sparse "truncated block" gap-filling, and
//! truncate-up/truncate-down.

use bytes::Bytes;

use crate::block::{Block, BlockFlags, PendingPatch};
use crate::block_id::{BlockId, BlockIdSource};

/// Index of a block within [`Bol::blocks`].
pub type BlockIndex = usize;

/// One step of a planned write, as enumerated by [`Bol::apply_write`].
/// All bytes described here have already been copied into
/// the affected block's resident data or queued as a [`PendingPatch`] by
/// the time [`Bol::apply_write`] returns — no I/O has occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStep {
    /// The write fully replaces an existing block's bytes, aligned at both
    /// boundaries.
    WholeBlockReplace { block_index: BlockIndex },
    /// A pure in-memory overwrite of a portion of an already-resident,
    /// dirty block.
    InMemoryOverwrite { block_index: BlockIndex },
    /// The affected block was not resident and the write does not cover it
    /// entirely; a read-modify-write pre-fetch is required before staging.
    ReadModifyWrite { block_index: BlockIndex },
    /// A fresh block was appended past the prior end of file.
    Append { block_index: BlockIndex },
    /// A zero-filled block was prepended/appended to cover a sparse gap
    /// produced by a write (or truncate) past the prior end of file.
    GapFill { block_index: BlockIndex },
}

/// The result of [`Bol::apply_write`] or [`Bol::truncate`]: an ordered
/// description of what happened, in `start` order.
#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    pub steps: Vec<WriteStep>,
}

/// BOL-level flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct BolFlags {
    /// Object is stored as a single whole-object put with no block list on
    /// the server. `blocks` is empty while this is set.
    pub small_file: bool,
    /// Cleared on any mutation, set again after a successful flush.
    pub consistent: bool,
}

/// In-memory representation of an open file as an ordered, contiguous
/// sequence of blocks.
#[derive(Debug)]
pub struct Bol {
    blocks: Vec<Block>,
    block_id_length: u16,
    flags: BolFlags,
    /// Tracked separately in small-file mode, where `blocks` is empty.
    small_file_size: u64,
    /// The in-memory buffer backing small-file mode, when dirty.
    small_file_buffer: Option<Bytes>,
}

impl Bol {
    /// Construct an empty BOL for a newly-created file, in block mode.
    pub fn new_empty(block_id_length: u16) -> Self {
        Self {
            blocks: Vec::new(),
            block_id_length,
            flags: BolFlags {
                small_file: false,
                consistent: true,
            },
            small_file_size: 0,
            small_file_buffer: None,
        }
    }

    /// Construct an empty BOL for a newly-created file, in small-file mode.
    pub fn new_small_file() -> Self {
        Self {
            blocks: Vec::new(),
            block_id_length: crate::config::DEFAULT_BLOCK_ID_LENGTH,
            flags: BolFlags {
                small_file: true,
                consistent: true,
            },
            small_file_size: 0,
            small_file_buffer: None,
        }
    }

    /// Reconstruct a BOL from an existing object's committed block list.
    /// Blocks are clean and non-resident;
    /// `block_id_length` is fixed to the observed encoded id length.
    pub fn from_block_list(committed: Vec<(BlockId, u64)>, block_id_length: u16) -> Self {
        let mut blocks = Vec::with_capacity(committed.len());
        let mut pos = 0u64;
        for (id, size) in committed {
            blocks.push(Block {
                start: pos,
                end: pos + size,
                id,
                data: None,
                flags: BlockFlags::default(),
                pending_patches: Vec::new(),
            });
            pos += size;
        }
        Self {
            blocks,
            block_id_length,
            flags: BolFlags {
                small_file: false,
                consistent: true,
            },
            small_file_size: 0,
            small_file_buffer: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn is_small_file(&self) -> bool {
        self.flags.small_file
    }

    pub fn block_id_length(&self) -> u16 {
        self.block_id_length
    }

    pub fn consistent(&self) -> bool {
        self.flags.consistent
    }

    pub fn mark_consistent(&mut self, value: bool) {
        self.flags.consistent = value;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn file_size(&self) -> u64 {
        if self.flags.small_file {
            self.small_file_size
        } else {
            self.blocks.last().map(|b| b.end).unwrap_or(0)
        }
    }

    pub fn small_file_buffer(&self) -> Option<&Bytes> {
        self.small_file_buffer.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        if self.flags.small_file {
            self.small_file_buffer.is_some()
        } else {
            self.blocks.iter().any(|b| b.flags.dirty)
        }
    }

    /// Iterate dirty blocks in `start` order, as consumed by the staging
    /// engine.
    pub fn iter_dirty(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.iter_mut().filter(|b| b.flags.dirty)
    }

    /// The ordered id list defining the object's content, for commit.
    /// Includes every block, staged this flush or not.
    pub fn committed_id_list(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id.clone()).collect()
    }

    // ── Lookup ───────────────────────────────────────────────────────────

    /// Binary search for the block containing `offset`.
    /// Half-open ranges: if `offset == b.end` and a next block exists, the
    /// next block is returned instead.
    pub fn find(&self, offset: u64) -> Option<BlockIndex> {
        debug_assert!(!self.flags.small_file, "find() is block-mode only");
        let idx = self.blocks.partition_point(|b| b.end <= offset);
        if idx < self.blocks.len() {
            Some(idx)
        } else {
            None
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Plan and apply a write at `offset`. No I/O is
    /// performed; partial writes against non-resident blocks are recorded
    /// as [`PendingPatch`]es for the staging engine to resolve later.
    ///
    /// Panics (debug builds) if called while in small-file mode — callers
    /// must promote via [`Self::small_file_promote`] first.
    pub fn apply_write(
        &mut self,
        offset: u64,
        data: &[u8],
        max_block_size: u64,
        ids: &dyn BlockIdSource,
    ) -> WritePlan {
        assert!(
            !self.flags.small_file,
            "apply_write called on a small-file BOL; promote first"
        );
        let mut plan = WritePlan::default();
        if data.is_empty() {
            return plan;
        }

        let write_end = offset + data.len() as u64;

        if offset > self.file_size() {
            self.append_truncated_gap(offset, max_block_size, ids, &mut plan);
        }

        let mut pos = offset;
        let mut consumed = 0usize;
        let existing_end = self.file_size();

        while pos < write_end && pos < existing_end {
            let idx = self
                .find(pos)
                .expect("contiguous coverage guarantees a block at pos < file_size");
            let (block_start, block_end) = {
                let b = &self.blocks[idx];
                (b.start, b.end)
            };
            let seg_end = write_end.min(block_end).min(existing_end);
            let in_block_start = (pos - block_start) as usize;
            let seg_len = (seg_end - pos) as usize;
            let whole = in_block_start == 0 && seg_end == block_end;
            let segment = &data[consumed..consumed + seg_len];

            let block = &mut self.blocks[idx];
            // A block already committed (or never staged under a prior id)
            // must get a fresh id before its bytes change: re-staging the
            // same id with different bytes is a programming error, since an
            // id is only ever trusted to name one fixed byte sequence. A
            // block that is already dirty this generation hasn't been
            // staged yet under its current id, so it's safe to keep
            // mutating it in place.
            if !block.flags.dirty {
                block.id = ids.next_id(self.block_id_length);
            }
            if whole {
                block.data = Some(Bytes::copy_from_slice(segment));
                block.flags.dirty = true;
                block.flags.truncated = false;
                block.pending_patches.clear();
                plan.steps.push(WriteStep::WholeBlockReplace { block_index: idx });
            } else if let Some(existing) = block.data.clone() {
                let mut buf = existing.to_vec();
                buf[in_block_start..in_block_start + seg_len].copy_from_slice(segment);
                block.data = Some(Bytes::from(buf));
                block.flags.dirty = true;
                plan.steps.push(WriteStep::InMemoryOverwrite { block_index: idx });
            } else {
                block.pending_patches.push(PendingPatch {
                    offset_in_block: in_block_start,
                    bytes: Bytes::copy_from_slice(segment),
                });
                block.flags.dirty = true;
                plan.steps.push(WriteStep::ReadModifyWrite { block_index: idx });
            }
            block.debug_check_invariants();

            pos = seg_end;
            consumed += seg_len;
        }

        // Append fresh blocks for bytes past the (possibly gap-filled)
        // prior end of file.
        while pos < write_end {
            let remaining = (write_end - pos) as usize;
            let seg_len = remaining.min(max_block_size as usize);
            let segment = &data[consumed..consumed + seg_len];
            let id = ids.next_id(self.block_id_length);
            self.blocks.push(Block {
                start: pos,
                end: pos + seg_len as u64,
                id,
                data: Some(Bytes::copy_from_slice(segment)),
                flags: BlockFlags {
                    dirty: true,
                    truncated: false,
                    small_file_sentinel: false,
                },
                pending_patches: Vec::new(),
            });
            plan.steps.push(WriteStep::Append {
                block_index: self.blocks.len() - 1,
            });
            pos += seg_len as u64;
            consumed += seg_len;
        }

        self.flags.consistent = false;
        plan
    }

    /// Append zero-filled, dirty, `truncated` blocks covering
    /// `[file_size(), target)`, splitting at `max_block_size` boundaries
    /// (all but the last may be a full `max_block_size`).
    fn append_truncated_gap(
        &mut self,
        target: u64,
        max_block_size: u64,
        ids: &dyn BlockIdSource,
        plan: &mut WritePlan,
    ) {
        let mut pos = self.file_size();
        while pos < target {
            let remaining = target - pos;
            let seg_len = remaining.min(max_block_size);
            let id = ids.next_id(self.block_id_length);
            self.blocks.push(Block {
                start: pos,
                end: pos + seg_len,
                id,
                data: None,
                flags: BlockFlags {
                    dirty: true,
                    truncated: true,
                    small_file_sentinel: false,
                },
                pending_patches: Vec::new(),
            });
            plan.steps.push(WriteStep::GapFill {
                block_index: self.blocks.len() - 1,
            });
            pos += seg_len;
        }
    }

    /// Truncate to `new_size`.
    pub fn truncate(&mut self, new_size: u64, max_block_size: u64, ids: &dyn BlockIdSource) -> WritePlan {
        assert!(
            !self.flags.small_file,
            "truncate called on a small-file BOL; promote first"
        );
        let mut plan = WritePlan::default();
        let current = self.file_size();

        if new_size == current {
            return plan;
        }

        if new_size > current {
            self.append_truncated_gap(new_size, max_block_size, ids, &mut plan);
            self.flags.consistent = false;
            return plan;
        }

        if new_size == 0 {
            self.blocks.clear();
            self.flags.consistent = false;
            return plan;
        }

        // First block whose end exceeds new_size — either it needs
        // shortening, or (if new_size lands exactly on its start) it and
        // everything after it is simply dropped.
        let keep_idx = self.blocks.partition_point(|b| b.end <= new_size);
        debug_assert!(keep_idx < self.blocks.len());

        if self.blocks[keep_idx].start == new_size {
            self.blocks.truncate(keep_idx);
        } else {
            {
                let b = &mut self.blocks[keep_idx];
                let keep_len = (new_size - b.start) as usize;
                // Same non-reuse rule as apply_write: a block already
                // committed under its current id must get a fresh one
                // before its range/bytes change.
                if !b.flags.dirty {
                    b.id = ids.next_id(self.block_id_length);
                }
                b.end = new_size;
                b.flags.dirty = true;
                // A resident block's data always matches its pre-shrink
                // size, which is >= keep_len, so slicing never panics.
                b.data = b.data.take().map(|data| data.slice(0..keep_len));
                b.pending_patches.retain_mut(|p| {
                    if p.offset_in_block >= keep_len {
                        false
                    } else if p.offset_in_block + p.bytes.len() > keep_len {
                        p.bytes = p.bytes.slice(0..(keep_len - p.offset_in_block));
                        true
                    } else {
                        true
                    }
                });
                b.debug_check_invariants();
            }
            self.blocks.truncate(keep_idx + 1);
        }

        self.flags.consistent = false;
        plan
    }

    // ── Small-file mode ──────────────────────────────────────────────────

    /// Overwrite/extend the small-file buffer directly; no block machinery
    /// is involved — a whole-object write at arbitrary offsets within the
    /// (small, whole-object) buffer.
    pub fn small_file_write(&mut self, offset: u64, data: &[u8]) {
        assert!(self.flags.small_file, "small_file_write on a block-mode BOL");
        let mut buf = self
            .small_file_buffer
            .take()
            .map(|b| b.to_vec())
            .unwrap_or_default();
        let end = offset as usize + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[offset as usize..end].copy_from_slice(data);
        self.small_file_size = buf.len() as u64;
        self.small_file_buffer = Some(Bytes::from(buf));
        self.flags.consistent = false;
    }

    pub fn small_file_truncate(&mut self, new_size: u64) {
        assert!(self.flags.small_file, "small_file_truncate on a block-mode BOL");
        let mut buf = self
            .small_file_buffer
            .take()
            .map(|b| b.to_vec())
            .unwrap_or_default();
        buf.resize(new_size as usize, 0);
        self.small_file_size = new_size;
        self.small_file_buffer = Some(Bytes::from(buf));
        self.flags.consistent = false;
    }

    /// Transition from `small_file` to block mode.
    ///
    /// `existing_content` is the object's current bytes, already downloaded
    /// by the caller (C6/Handle layer) via `ObjectStore::download_range`.
    /// The content is represented as a single freshly-minted, **dirty**
    /// block rather than the literally "non-dirty" block the distilled
    /// spec describes — see DESIGN.md's Open Question resolution: a block
    /// id that was never staged cannot be safely included in a commit list,
    /// so the promoted block must be re-staged once before the next
    /// commit, even though its bytes are unchanged.
    pub fn small_file_promote(&mut self, existing_content: Bytes, max_block_size: u64, ids: &dyn BlockIdSource) {
        assert!(self.flags.small_file, "already in block mode");
        debug_assert!(
            existing_content.len() as u64 <= max_block_size,
            "small-file content must fit in a single block by definition"
        );
        let id = ids.next_id(self.block_id_length);
        let size = existing_content.len() as u64;
        self.blocks = vec![Block {
            start: 0,
            end: size,
            id,
            data: Some(existing_content),
            flags: BlockFlags {
                dirty: true,
                truncated: false,
                small_file_sentinel: true,
            },
            pending_patches: Vec::new(),
        }];
        self.flags.small_file = false;
        self.small_file_buffer = None;
        self.small_file_size = 0;
    }

    // ── Invariant checking ─────────────────────────────────

    /// Verify contiguity, block sizing, and id uniqueness/length. Intended
    /// for tests and `proptest` properties, not the write hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.flags.small_file {
            if !self.blocks.is_empty() {
                return Err("small_file set but blocks non-empty".into());
            }
            return Ok(());
        }
        let mut expected_start = 0u64;
        let mut seen_ids = std::collections::HashSet::new();
        for (i, b) in self.blocks.iter().enumerate() {
            if b.start != expected_start {
                return Err(format!("block {i} starts at {} expected {expected_start}", b.start));
            }
            if b.end <= b.start {
                return Err(format!("block {i} has end <= start"));
            }
            if b.size() > 0 && b.id.raw_len() != self.block_id_length as usize {
                return Err(format!("block {i} id length mismatch"));
            }
            if !seen_ids.insert(b.id.clone()) {
                return Err(format!("duplicate block id at index {i}"));
            }
            expected_start = b.end;
        }
        Ok(())
    }
}
