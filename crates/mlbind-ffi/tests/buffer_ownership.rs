//! Buffer ownership tests
//!
//! Integration tests for the guarantees the bindings rely on when moving
//! native memory across the boundary:
//!
//! 1. Pinned buffers never move while alive
//! 2. Ownership transfer to a `Vec` or to foreign code never copies
//! 3. Borrowed matrices never write through to host memory

use mlbind_ffi::{
    abi::{mlbind_free_f64, mlbind_free_u64},
    pinned::PinnedBuffer,
    tensor::ColMatrix,
};
use proptest::prelude::*;

// ============================================================================
// Address stability
// ============================================================================

#[test]
fn test_many_pinned_buffers_stay_put() {
    let buffers: Vec<PinnedBuffer<f64>> = (1..200)
        .map(|n| PinnedBuffer::from_fn(n, |i| i as f64).unwrap())
        .collect();
    let addresses: Vec<usize> = buffers.iter().map(PinnedBuffer::address).collect();

    // Churn the allocator between observations.
    for round in 0..50 {
        let garbage = PinnedBuffer::<u64>::zeroed(1024 + round).unwrap();
        std::hint::black_box(&garbage);
    }

    for (buffer, addr) in buffers.iter().zip(&addresses) {
        assert_eq!(buffer.address(), *addr, "pinned buffer moved");
        assert_eq!(buffer.as_slice().last().copied(), Some((buffer.len() - 1) as f64));
    }
}

// ============================================================================
// Ownership transfer
// ============================================================================

#[test]
fn test_matrix_into_pinned_keeps_address() {
    let m = ColMatrix::from_fn(30, 30, |r, c| (r + c) as f64).unwrap();
    let addr = m.address();
    let buffer = m.into_pinned().unwrap();
    assert_eq!(buffer.address(), addr);
    let v = buffer.into_vec();
    assert_eq!(v.as_ptr() as usize, addr);
    assert_eq!(v.len(), 900);
}

#[test]
fn test_export_then_free_through_abi() {
    for n in [1usize, 7, 16, 17, 4096] {
        let (ptr, len) = PinnedBuffer::from_fn(n, |i| i as f64).unwrap().into_raw_parts();
        assert_eq!(len, n);
        unsafe { mlbind_free_f64(ptr, len) };

        let (ptr, len) = PinnedBuffer::from_fn(n, |i| i as u64).unwrap().into_raw_parts();
        unsafe { mlbind_free_u64(ptr, len) };
    }
}

#[test]
fn test_borrowed_matrix_never_writes_through() {
    let host = vec![1u64, 2, 3, 4, 5, 6];
    let mut m = ColMatrix::borrowed(&host, 3, 2).unwrap();
    for r in 0..3 {
        m.set(r, 0, 0).unwrap();
    }
    assert_eq!(host, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(m.as_slice(), &[0, 0, 0, 4, 5, 6]);
}

proptest! {
    #[test]
    fn prop_from_fn_matches_get(rows in 0usize..12, cols in 0usize..12) {
        let m = ColMatrix::from_fn(rows, cols, |r, c| (r * 100 + c) as u64).unwrap();
        for r in 0..rows {
            for c in 0..cols {
                prop_assert_eq!(m.get(r, c), Some((r * 100 + c) as u64));
            }
        }
        prop_assert_eq!(m.len(), rows * cols);
    }
}
