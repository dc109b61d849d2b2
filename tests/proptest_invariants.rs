//! Property tests for BOL invariants: contiguity, id uniqueness/equal-
//! length, and post-flush cleanliness, across arbitrary write/truncate
//! sequences.

use bolflow::{Bol, BlockIdMint, FixedRandom};
use proptest::prelude::*;

const MAX_BLOCK_SIZE: u64 = 64;

#[derive(Debug, Clone)]
enum Op {
    Write { offset: u64, len: u16 },
    Truncate { new_size: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..512, 1u16..96).prop_map(|(offset, len)| Op::Write { offset, len }),
        (0u64..512).prop_map(|new_size| Op::Truncate { new_size }),
    ]
}

proptest! {
    #[test]
    fn bol_stays_contiguous_and_well_formed(ops in proptest::collection::vec(op_strategy(), 0..40), seed in any::<u64>()) {
        let mint = BlockIdMint::new(FixedRandom::new(seed));
        let mut bol = Bol::new_empty(16);

        for op in ops {
            match op {
                Op::Write { offset, len } => {
                    let data = vec![0x5Au8; len as usize];
                    bol.apply_write(offset, &data, MAX_BLOCK_SIZE, &mint);
                }
                Op::Truncate { new_size } => {
                    bol.truncate(new_size, MAX_BLOCK_SIZE, &mint);
                }
            }
            prop_assert!(bol.check_invariants().is_ok());
        }

        // sum(size of block) == file_size
        let sum: u64 = bol.blocks().iter().map(|b| b.size()).sum();
        prop_assert_eq!(sum, bol.file_size());

        // every block <= MaxBlockSize
        for b in bol.blocks() {
            prop_assert!(b.size() <= MAX_BLOCK_SIZE);
        }

        // ids pairwise distinct and of equal encoded length
        let encoded_lens: std::collections::HashSet<usize> =
            bol.blocks().iter().map(|b| b.id.encoded().len()).collect();
        prop_assert!(encoded_lens.len() <= 1);
        let mut ids: Vec<_> = bol.blocks().iter().map(|b| b.id.clone()).collect();
        let before = ids.len();
        ids.sort_by_key(|id| id.encoded());
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
    }

    #[test]
    fn truncate_is_idempotent(new_size in 0u64..256, seed in any::<u64>()) {
        let mint = BlockIdMint::new(FixedRandom::new(seed));
        let mut bol = Bol::new_empty(16);
        bol.apply_write(0, &vec![0x11u8; 200], MAX_BLOCK_SIZE, &mint);

        bol.truncate(new_size, MAX_BLOCK_SIZE, &mint);
        let after_first = bol.file_size();
        let ids_after_first: Vec<_> = bol.blocks().iter().map(|b| b.id.clone()).collect();

        bol.truncate(new_size, MAX_BLOCK_SIZE, &mint);
        let after_second = bol.file_size();
        let ids_after_second: Vec<_> = bol.blocks().iter().map(|b| b.id.clone()).collect();

        prop_assert_eq!(after_first, after_second);
        prop_assert_eq!(ids_after_first, ids_after_second);
    }
}
