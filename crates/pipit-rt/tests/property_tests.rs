//! Property-based tests for the shared ring's cursor invariants.
//!
//! For every interleaving of writes and reads:
//! - the live token count never exceeds capacity;
//! - every reader observes a contiguous prefix of the written sequence
//!   (no gaps, no duplicates);
//! - rejected operations leave the ring untouched.

use proptest::prelude::*;
use pipit_rt::SharedRing;

proptest! {
    /// Fill never exceeds capacity, and every accepted read returns the
    /// contiguous continuation of what was written.
    #[test]
    fn prop_bounded_fill_and_fifo(
        ops in prop::collection::vec((prop::bool::ANY, 1usize..12), 1..200),
    ) {
        let capacity = 32;
        let ring = SharedRing::<u64>::new(capacity, 1);

        let mut written = 0u64;
        let mut read_back = 0u64;

        for (is_write, n) in ops {
            if is_write {
                let batch: Vec<u64> = (written..written + n as u64).collect();
                if ring.write(&batch) {
                    written += n as u64;
                }
            } else {
                let mut out = vec![0u64; n];
                if ring.read(0, &mut out) {
                    for v in out {
                        prop_assert_eq!(v, read_back, "gap or duplicate in read sequence");
                        read_back += 1;
                    }
                }
            }

            let live = (written - read_back) as usize;
            prop_assert!(live <= capacity,
                "live count {} exceeds capacity {}", live, capacity);
            prop_assert_eq!(ring.available(0), live);
        }
    }

    /// With two readers, each independently observes the same prefix.
    #[test]
    fn prop_multi_reader_contiguous_prefix(
        writes in prop::collection::vec(1usize..8, 1..50),
        drain0 in prop::collection::vec(1usize..8, 1..50),
        drain1 in prop::collection::vec(1usize..8, 1..50),
    ) {
        let ring = SharedRing::<u64>::new(64, 2);
        let mut written = 0u64;
        let mut seen = [0u64; 2];
        let mut d0 = drain0.into_iter();
        let mut d1 = drain1.into_iter();

        for n in writes {
            let batch: Vec<u64> = (written..written + n as u64).collect();
            if ring.write(&batch) {
                written += n as u64;
            }

            for (reader, iter) in [(0, &mut d0), (1, &mut d1)] {
                if let Some(want) = iter.next() {
                    let mut out = vec![0u64; want];
                    if ring.read(reader, &mut out) {
                        for v in out {
                            prop_assert_eq!(v, seen[reader], "reader {} gap", reader);
                            seen[reader] += 1;
                        }
                    }
                }
            }

            prop_assert!(seen[0] <= written);
            prop_assert!(seen[1] <= written);
        }
    }

    /// A rejected write leaves both fill and content untouched.
    #[test]
    fn prop_rejected_write_has_no_effect(prefill in 1usize..8) {
        let ring = SharedRing::<u64>::new(8, 1);
        let batch: Vec<u64> = (0..prefill as u64).collect();
        prop_assert!(ring.write(&batch));

        // This always exceeds the remaining space.
        let big: Vec<u64> = (100..100 + (9 - prefill) as u64).collect();
        prop_assert!(!ring.write(&big));

        let mut out = vec![0u64; prefill];
        prop_assert!(ring.read(0, &mut out));
        prop_assert_eq!(out, batch);
    }
}
