//! Property tests for host array layouts and views.

use mlbind_host::{HostArray, Order};
use proptest::prelude::*;

fn order_strategy() -> impl Strategy<Value = Order> {
    prop_oneof![Just(Order::RowMajor), Just(Order::ColMajor)]
}

proptest! {
    #[test]
    fn prop_row_views_match_logical_rows(
        rows in 1usize..8,
        cols in 1usize..8,
        order in order_strategy(),
    ) {
        let m = HostArray::from_fn(rows, cols, order, |r, c| (r * 31 + c) as u64).unwrap();
        for r in 0..rows {
            let view = m.row(r).unwrap();
            let expected: Vec<u64> = (0..cols).map(|c| (r * 31 + c) as u64).collect();
            prop_assert_eq!(view.to_vec(), expected);
            prop_assert_eq!(view.view().map(|v| v.backing_order), Some(order));
        }
    }

    #[test]
    fn prop_col_views_match_logical_cols(
        rows in 1usize..8,
        cols in 1usize..8,
        order in order_strategy(),
    ) {
        let m = HostArray::from_fn(rows, cols, order, |r, c| (r * 31 + c) as f64).unwrap();
        for c in 0..cols {
            let view = m.col(c).unwrap();
            let expected: Vec<f64> = (0..rows).map(|r| (r * 31 + c) as f64).collect();
            prop_assert_eq!(view.to_vec(), expected);
        }
    }

    #[test]
    fn prop_dup_preserves_values(
        rows in 0usize..8,
        cols in 0usize..8,
        from in order_strategy(),
        to in order_strategy(),
    ) {
        let m = HostArray::from_fn(rows, cols, from, |r, c| (r * 7 + c * 3) as f64).unwrap();
        let copy = m.dup(to);
        prop_assert_eq!(&copy, &m);
        prop_assert!(copy.order_matches_strides());
        prop_assert!(copy.contiguous_slice().is_some());
    }
}
