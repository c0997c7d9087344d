//! Property-based tests for the allocator invariants.

use proptest::prelude::*;
use tidedb_alloc::{SlabAlloc, segment};

/// Request sizes: positive multiples of 8, small enough to exercise both
/// free-list reuse and slab growth.
fn block_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec((1usize..=64).prop_map(|n| n * 8), 1..40)
}

/// A batch of allocations plus a shuffled order to free them in.
fn alloc_free_script() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    block_sizes().prop_flat_map(|sizes| {
        let order: Vec<usize> = (0..sizes.len()).collect();
        (Just(sizes), Just(order).prop_shuffle())
    })
}

proptest! {
    #[test]
    fn allocations_are_aligned_and_disjoint(sizes in block_sizes()) {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let mut live: Vec<(usize, usize)> = Vec::new();
        for size in sizes {
            let mem = alloc.alloc(size).unwrap();
            prop_assert_eq!(mem.ref_ % 8, 0);
            for &(other, other_size) in &live {
                prop_assert!(
                    mem.ref_ + size <= other || other + other_size <= mem.ref_,
                    "[{}, {}) overlaps [{}, {})",
                    mem.ref_, mem.ref_ + size, other, other + other_size
                );
            }
            live.push((mem.ref_, size));
        }
    }

    #[test]
    fn translate_round_trips_written_patterns(sizes in block_sizes()) {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let mut live = Vec::new();
        for (i, size) in sizes.into_iter().enumerate() {
            let mem = alloc.alloc(size).unwrap();
            prop_assert!(core::ptr::eq(alloc.translate(mem.ref_), mem.addr));
            unsafe { mem.addr.write_bytes(i as u8, size) };
            live.push((mem.ref_, size, i as u8));
        }

        // Every block still holds its pattern when read through a fresh
        // translation, even after later allocations grew new slabs.
        for (ref_, size, pattern) in live {
            let addr = alloc.translate(ref_);
            let bytes = unsafe { core::slice::from_raw_parts(addr, size) };
            prop_assert!(bytes.iter().all(|&b| b == pattern));
        }
    }

    #[test]
    fn frees_in_any_order_keep_chunks_inside_slabs((sizes, order) in alloc_free_script()) {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let blocks: Vec<_> = sizes
            .iter()
            .map(|&size| {
                let mem = alloc.alloc(size).unwrap();
                unsafe { segment::write_header(mem.addr, size, size) };
                mem
            })
            .collect();

        for i in order {
            let mem = blocks[i];
            alloc.free(mem.ref_, mem.addr);
            #[cfg(debug_assertions)]
            {
                alloc.verify();
            }
        }
    }

    #[test]
    fn reset_makes_every_slab_whole_again((sizes, order) in alloc_free_script()) {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        let blocks: Vec<_> = sizes
            .iter()
            .map(|&size| {
                let mem = alloc.alloc(size).unwrap();
                unsafe { segment::write_header(mem.addr, size, size) };
                mem
            })
            .collect();
        // Free an arbitrary prefix of the shuffled order, then reset.
        for &i in order.iter().take(order.len() / 2) {
            let mem = blocks[i];
            alloc.free(mem.ref_, mem.addr);
        }

        let total = alloc.get_total_size();
        alloc.reset_free_space_tracking().unwrap();
        prop_assert_eq!(alloc.get_total_size(), total);
        #[cfg(debug_assertions)]
        {
            prop_assert!(alloc.is_all_free());
            alloc.verify();
        }
    }

    #[test]
    fn slab_growth_at_least_doubles(k in 1usize..6) {
        let mut alloc = SlabAlloc::new();
        alloc.attach_empty();

        // Each request overflows the previous slab's tail, forcing a new
        // slab every time.
        alloc.alloc(8).unwrap();
        let mut size = 256;
        for _ in 1..k {
            alloc.alloc(size).unwrap();
            size *= 2;
        }

        // k slabs of 256, 512, ..., 256 * 2^(k-1) bytes.
        let slab_bytes = alloc.get_total_size() - tidedb_alloc::header::HEADER_SIZE;
        prop_assert!(slab_bytes >= 256 * ((1 << k) - 1));
    }
}
