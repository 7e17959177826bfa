//! # mlbind Host Arrays
//!
//! The host runtime's array type, as seen by the bindings.
//!
//! A [`HostArray`] is a rank-1 or rank-2 array over shared storage. Like the
//! arrays of most managed numeric runtimes it records:
//!
//! - a shape and per-dimension strides into its storage,
//! - a *declared* order flag (`'c'` row-major or `'f'` column-major), which
//!   the runtime lets callers relabel independently of the strides,
//! - for single-row and single-column views, the view's provenance: its
//!   orientation and the layout of the buffer it was taken from.
//!
//! The bindings never trust the declared order blindly; they check it
//! against the strides and the view provenance before adopting memory.
//!
//! ```rust
//! use mlbind_host::{HostArray, Order};
//!
//! let m = HostArray::from_fn(3, 4, Order::RowMajor, |r, c| (r * 4 + c) as f64).unwrap();
//! let row = m.row(1).unwrap();
//! assert!(row.is_view());
//! assert_eq!(row.to_vec(), vec![4.0, 5.0, 6.0, 7.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod array;

pub use array::{col_major_strides, row_major_strides, HostArray, Order, Shape, ViewInfo};

use thiserror::Error;

/// Errors raised by host array construction and indexing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// Data length does not match the requested shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Elements implied by the shape.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },

    /// Only vectors and matrices are supported.
    #[error("unsupported rank {0}: host arrays are rank 1 or 2")]
    RankUnsupported(usize),

    /// Row or column index outside the array.
    #[error("index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Size of the indexed dimension.
        size: usize,
    },
}

/// Result type for host array operations.
pub type HostResult<T> = Result<T, HostError>;
