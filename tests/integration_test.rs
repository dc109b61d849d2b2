//! End-to-end scenarios against [`bolflow::MockStore`].

use std::sync::Arc;

use bolflow::{BlockId, BlockIdMint, Bol, Config, FixedRandom, MockStore, ObjectStore};
use bytes::Bytes;

type Mint = BlockIdMint<FixedRandom>;

fn mint(seed: u64) -> Mint {
    BlockIdMint::new(FixedRandom::new(seed))
}

/// Scenario 1: small-file overwrite.
#[tokio::test]
async fn scenario_small_file_overwrite() {
    let store: Arc<dyn ObjectStore> = Arc::new(MockStore::new());
    let config = Config::default();
    let mut bol = Bol::new_small_file();

    bol.small_file_write(0, b"test data");
    let etag = bolflow::flush::flush(&mut bol, &store, "/f", &config, None, &mint(1))
        .await
        .unwrap();
    assert!(!etag.is_empty());

    let content = store.download_range("/f", 0, 9).await.unwrap();
    assert_eq!(&content[..], b"test data");
    let props = store.get_properties("/f").await.unwrap();
    assert_eq!(props.size, 9);
    assert!(props.block_list.is_none());
}

/// Scenario 2: partial block overwrite over a 10x4-byte chunked file.
#[tokio::test]
async fn scenario_partial_block_overwrite() {
    let store = Arc::new(MockStore::new());
    let original = b"testdatates1dat1tes2dat2tes3dat3tes4dat4";
    assert_eq!(original.len(), 40); // 10 blocks of 4 bytes

    // Build the pre-existing 10-block, 4-byte-per-block committed object.
    let blocks: Vec<(BlockId, Bytes)> = original[..40]
        .chunks(4)
        .enumerate()
        .map(|(i, chunk)| {
            let id = mint(i as u64 + 10).new_id(16);
            (id, Bytes::copy_from_slice(chunk))
        })
        .collect();
    store.seed_block_list("/f", blocks.clone()).await;

    let committed: Vec<(BlockId, u64)> = blocks.iter().map(|(id, b)| (id.clone(), b.len() as u64)).collect();
    let mut bol = Bol::from_block_list(committed, 16);

    let config = Config::default();
    let ids = mint(99);
    let plan = bol.apply_write(16, b"cake", config.max_block_size(), &ids);
    assert_eq!(plan.steps.len(), 1);

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(&content[..], &b"testdatates1dat1cakedat2tes3dat3tes4dat4"[..]);
}

/// A sub-block write into the middle of a non-resident committed block
/// drives the read-modify-write pre-fetch: the block has no resident
/// `data`, so staging must `download_range` it and merge the queued patch
/// over the fetched bytes rather than just using what's already in memory.
#[tokio::test]
async fn scenario_partial_write_into_nonresident_block() {
    let store = Arc::new(MockStore::new());
    let original = b"0123456789ABCDEF";
    assert_eq!(original.len(), 16); // 2 blocks of 8 bytes

    let blocks: Vec<(BlockId, Bytes)> = original
        .chunks(8)
        .enumerate()
        .map(|(i, chunk)| (mint(i as u64 + 20).new_id(16), Bytes::copy_from_slice(chunk)))
        .collect();
    store.seed_block_list("/f", blocks.clone()).await;

    let committed: Vec<(BlockId, u64)> = blocks.iter().map(|(id, b)| (id.clone(), b.len() as u64)).collect();
    let mut bol = Bol::from_block_list(committed, 16);
    assert!(!bol.blocks()[1].flags.dirty);
    assert!(bol.blocks()[1].data.is_none());

    let config = Config::default();
    let ids = mint(101);
    let plan = bol.apply_write(10, b"xyz", config.max_block_size(), &ids);
    assert_eq!(plan.steps.len(), 1);
    assert!(matches!(plan.steps[0], bolflow::WriteStep::ReadModifyWrite { .. }));
    assert!(bol.blocks()[1].data.is_none(), "patch stays queued until staging");

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(&content[..], b"0123456789xyzDEF");
}

/// Scenario 3: append past EOF with a zero-filled gap.
#[tokio::test]
async fn scenario_append_past_eof_with_gap() {
    let store = Arc::new(MockStore::new());
    let config = Config::new(1, 8); // 1 MiB blocks, plenty of room for a 40-byte file
    let ids = mint(7);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, &vec![0x42u8; 40], config.max_block_size(), &ids);

    bol.apply_write(45, b"43211234cake", config.max_block_size(), &ids);
    assert_eq!(bol.file_size(), 57);

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(content.len(), 57);
    assert_eq!(&content[40..45], &[0u8; 5]);
    assert_eq!(&content[45..57], b"43211234cake");
}

/// Scenario 4: append new blocks to an existing chunked file via direct BOL
/// manipulation (no intervening writes through existing blocks).
#[tokio::test]
async fn scenario_append_new_blocks_to_chunked_file() {
    let store = Arc::new(MockStore::new());
    const MIB: u64 = 1024 * 1024;
    let block_size = 4 * MIB;
    let config = Config::new(4, 8);
    let ids = mint(123);

    let mut bol = Bol::new_empty(16);
    let original = vec![0x11u8; (16 * MIB) as usize];
    bol.apply_write(0, &original, block_size, &ids);
    assert_eq!(bol.file_size(), 16 * MIB);

    let appended_a = vec![0xAAu8; (2 * MIB) as usize];
    let appended_b = vec![0xBBu8; (2 * MIB) as usize];
    let appended_c = vec![0xCCu8; (2 * MIB) as usize];
    bol.apply_write(16 * MIB, &appended_a, block_size, &ids);
    bol.apply_write(18 * MIB, &appended_b, block_size, &ids);
    bol.apply_write(20 * MIB, &appended_c, block_size, &ids);
    assert_eq!(bol.file_size(), 22 * MIB);

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(content.len(), (22 * MIB) as usize);
    assert!(content[..(16 * MIB) as usize].iter().all(|&b| b == 0x11));
    assert!(content[(16 * MIB) as usize..(18 * MIB) as usize].iter().all(|&b| b == 0xAA));
    assert!(content[(18 * MIB) as usize..(20 * MIB) as usize].iter().all(|&b| b == 0xBB));
    assert!(content[(20 * MIB) as usize..].iter().all(|&b| b == 0xCC));
}

/// Scenario 5: truncate shrink in the middle of a block.
#[tokio::test]
async fn scenario_truncate_shrink_mid_block() {
    let store = Arc::new(MockStore::new());
    let config = Config::default();
    let ids = mint(5);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"test data", config.max_block_size(), &ids);
    bol.truncate(5, config.max_block_size(), &ids);
    assert_eq!(bol.file_size(), 5);

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(&content[..], b"test ");
}

/// Scenario 6: truncate extend.
#[tokio::test]
async fn scenario_truncate_extend() {
    let store = Arc::new(MockStore::new());
    let config = Config::default();
    let ids = mint(6);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"test data", config.max_block_size(), &ids);
    bol.truncate(15, config.max_block_size(), &ids);
    assert_eq!(bol.file_size(), 15);

    bolflow::flush::flush(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", &config, None, &ids)
        .await
        .unwrap();

    let content = store.read_committed("/f").await.unwrap();
    assert_eq!(content.len(), 15);
    assert_eq!(&content[..9], b"test data");
    assert_eq!(&content[9..], &[0u8; 6]);
}

/// After any successful flush, no block has `dirty` set.
#[tokio::test]
async fn flush_clears_all_dirty_flags() {
    let store: Arc<dyn ObjectStore> = Arc::new(MockStore::new());
    let config = Config::default();
    let ids = mint(77);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"some content here", config.max_block_size(), &ids);
    bolflow::flush::flush(&mut bol, &store, "/f", &config, None, &ids)
        .await
        .unwrap();

    assert!(!bol.is_dirty());
    assert!(bol.blocks().iter().all(|b| !b.flags.dirty));
}

/// A second flush with nothing dirty is a no-op (idempotence).
#[tokio::test]
async fn second_flush_is_noop() {
    let store: Arc<dyn ObjectStore> = Arc::new(MockStore::new());
    let config = Config::default();
    let ids = mint(88);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"abc", config.max_block_size(), &ids);
    let etag1 = bolflow::flush::flush(&mut bol, &store, "/f", &config, None, &ids)
        .await
        .unwrap();
    let etag2 = bolflow::flush::flush(&mut bol, &store, "/f", &config, Some(&etag1), &ids)
        .await
        .unwrap();
    assert_eq!(etag1, etag2);
}

/// An injected transient failure partway through a multi-block stage pass
/// clears `dirty` only for the blocks that actually finished uploading,
/// leaving the rest dirty (and their old bytes un-staged) so a retried
/// flush picks them back up.
#[tokio::test]
async fn partial_stage_failure_leaves_only_failed_block_dirty() {
    let store = Arc::new(MockStore::new());
    let ids = mint(55);

    let mut bol = Bol::new_empty(16);
    bol.apply_write(0, b"abcdefghijkl", 4, &ids); // 3 blocks of 4 bytes, all dirty
    assert_eq!(bol.blocks().len(), 3);
    assert_eq!(bol.blocks().iter().filter(|b| b.flags.dirty).count(), 3);

    store
        .inject(bolflow::FaultInjection {
            fail_next_stage: true,
            fail_next_commit: false,
        })
        .await;

    let result = bolflow::staging::stage(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", 4, None).await;
    assert!(result.is_err());

    let dirty: Vec<_> = bol.blocks().iter().filter(|b| b.flags.dirty).collect();
    assert_eq!(dirty.len(), 1, "exactly the one injected failure should remain dirty");
    for b in &dirty {
        assert!(b.data.is_some(), "a block that failed to stage keeps its resident data");
    }
    for b in bol.blocks().iter().filter(|b| !b.flags.dirty) {
        assert!(b.data.is_none(), "a block that finished staging drops its resident data");
    }

    // Retrying with no fault injected clears the rest.
    let retry = bolflow::staging::stage(&mut bol, &(store.clone() as Arc<dyn ObjectStore>), "/f", 4, None).await;
    assert!(retry.is_ok());
    assert!(bol.blocks().iter().all(|b| !b.flags.dirty));
}
