//! # mlbind FFI Primitives
//!
//! Native-side memory primitives shared by the computation core and the
//! host bindings.
//!
//! ## Overview
//!
//! Key components:
//!
//! - **PinnedBuffer**: an exclusively owned native allocation whose address
//!   never changes, independent of any host-side reclamation.
//! - **ColMatrix**: the canonical column-major, contiguous matrix the core
//!   computes on. It either borrows a host buffer for the duration of a call
//!   or owns a pinned copy.
//! - **C ABI**: deleters for buffers exported to foreign callers.
//!
//! ## Ownership Model
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Host runtime                            │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  (col-major)  ┌──────────────────┐           │
//! │  │  HostArray   │ ──borrow────> │ ColMatrix<'call> │           │
//! │  │  (shared)    │ ──copy──────> │ ColMatrix<'static>│          │
//! │  └──────────────┘  (row-major,  └────────┬─────────┘           │
//! │                     views)               │                     │
//! ├──────────────────────────────────────────┼─────────────────────┤
//! │                      FFI Boundary        │                     │
//! ├──────────────────────────────────────────┼─────────────────────┤
//! │  ┌───────────────────────────────────────▼──────────────────┐  │
//! │  │ Native core: reads borrowed slices, returns owned buffers │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use mlbind_ffi::{ColMatrix, PinnedBuffer};
//!
//! let data = [1.0f64, 2.0, 3.0, 4.0];
//! let borrowed = ColMatrix::borrowed(&data, 2, 2).unwrap();
//! assert_eq!(borrowed.get(1, 0), Some(2.0));
//!
//! let owned = borrowed.into_owned().unwrap();
//! assert!(!owned.is_borrowed());
//! let buffer: PinnedBuffer<f64> = owned.into_pinned().unwrap();
//! assert_eq!(buffer.into_vec(), vec![1.0, 2.0, 3.0, 4.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod abi;
pub mod pinned;
pub mod tensor;

pub use pinned::PinnedBuffer;
pub use tensor::ColMatrix;

use std::fmt;
use thiserror::Error;

/// Errors that can occur during FFI operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FfiError {
    /// Memory allocation failed.
    #[error("FFI allocation failed: {0}")]
    AllocationFailed(String),

    /// Null pointer encountered.
    #[error("null pointer in FFI call")]
    NullPointer,

    /// Size mismatch between expected and actual.
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// Alignment error.
    #[error("alignment error: address {address:#x} not aligned to {required} bytes")]
    AlignmentError {
        /// The misaligned address.
        address: usize,
        /// Required alignment.
        required: usize,
    },

    /// Index outside the matrix bounds.
    #[error("index ({row}, {col}) out of bounds for {rows}x{cols} matrix")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Matrix rows.
        rows: usize,
        /// Matrix columns.
        cols: usize,
    },
}

/// Result type for FFI operations.
pub type FfiResult<T> = Result<T, FfiError>;

/// Check if a pointer is properly aligned for a type.
#[inline]
#[must_use]
pub fn is_aligned<T>(ptr: *const T) -> bool {
    let align = std::mem::align_of::<T>();
    (ptr as usize) % align == 0
}

/// Marker trait for types that can be safely passed to FFI.
///
/// This trait indicates that a type:
/// - Has a stable memory layout (primitive)
/// - Contains no pointers into host-managed memory
/// - Is valid for the all-zero bit pattern
///
/// # Safety
///
/// Implementors must be `Copy`, have no drop glue, a well-defined C ABI
/// layout, and accept an all-zero bit pattern as a valid value.
pub unsafe trait FfiSafe: Copy + 'static {
    /// The C-equivalent type name (for documentation).
    const C_TYPE_NAME: &'static str;
}

unsafe impl FfiSafe for f64 {
    const C_TYPE_NAME: &'static str = "double";
}

unsafe impl FfiSafe for u64 {
    const C_TYPE_NAME: &'static str = "uint64_t";
}

/// Element kinds a matrix or vector can carry across the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemKind {
    /// 64-bit IEEE float.
    F64,
    /// 64-bit unsigned integer.
    U64,
}

impl ElemKind {
    /// Get the element kind name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::U64 => "u64",
        }
    }

    /// Width of one element in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::F64 => std::mem::size_of::<f64>(),
            Self::U64 => std::mem::size_of::<u64>(),
        }
    }
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orientation of a one-dimensional matrix specialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// A `1 x n` row.
    Row,
    /// An `n x 1` column.
    Column,
}

impl Orientation {
    /// Shape `(rows, cols)` of a vector of this orientation with `len` elements.
    #[inline]
    #[must_use]
    pub const fn shape(self, len: usize) -> (usize, usize) {
        match self {
            Self::Row => (1, len),
            Self::Column => (len, 1),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => f.write_str("row"),
            Self::Column => f.write_str("column"),
        }
    }
}

/// A numeric element that may live in a marshalled matrix.
pub trait Element: FfiSafe + PartialEq + fmt::Debug + Default + Send + Sync {
    /// The runtime tag for this element type.
    const KIND: ElemKind;
}

impl Element for f64 {
    const KIND: ElemKind = ElemKind::F64;
}

impl Element for u64 {
    const KIND: ElemKind = ElemKind::U64;
}
