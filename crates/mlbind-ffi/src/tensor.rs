//! The canonical matrix representation seen by the native core.
//!
//! Every matrix, vector, and row/column view that crosses the boundary is
//! presented to the core as a [`ColMatrix`]: column-major, contiguous, with a
//! fixed element width. A `ColMatrix` either borrows a host buffer that
//! already has this layout (valid only for the duration of one call) or owns
//! a [`PinnedBuffer`].

use crate::pinned::PinnedBuffer;
use crate::{Element, FfiError, FfiResult};

#[derive(Debug)]
enum Storage<'a, T: Element> {
    /// Host memory adopted without copying.
    Borrowed(&'a [T]),
    /// Native memory owned by this matrix.
    Pinned(PinnedBuffer<T>),
}

/// A 2D column-major matrix, either borrowed from the host or pinned.
///
/// Element `(row, col)` lives at `col * ld() + row`.
#[derive(Debug)]
pub struct ColMatrix<'a, T: Element> {
    data: Storage<'a, T>,
    rows: usize,
    cols: usize,
}

fn check_len(rows: usize, cols: usize, actual: usize) -> FfiResult<usize> {
    let expected = rows.checked_mul(cols).ok_or_else(|| {
        FfiError::AllocationFailed(format!("{rows}x{cols} matrix overflows usize"))
    })?;
    if expected == actual {
        Ok(expected)
    } else {
        Err(FfiError::SizeMismatch { expected, actual })
    }
}

impl<'a, T: Element> ColMatrix<'a, T> {
    /// Adopt a column-major host slice without copying.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::SizeMismatch`] if `data.len() != rows * cols`.
    pub fn borrowed(data: &'a [T], rows: usize, cols: usize) -> FfiResult<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            data: Storage::Borrowed(data),
            rows,
            cols,
        })
    }

    /// Wrap an owned pinned buffer holding column-major data.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::SizeMismatch`] if the buffer length is not `rows * cols`.
    pub fn from_pinned(data: PinnedBuffer<T>, rows: usize, cols: usize) -> FfiResult<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            data: Storage::Pinned(data),
            rows,
            cols,
        })
    }

    /// Create a new zero-initialized matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn zeros(rows: usize, cols: usize) -> FfiResult<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            FfiError::AllocationFailed(format!("{rows}x{cols} matrix overflows usize"))
        })?;
        Self::from_pinned(PinnedBuffer::zeroed(len)?, rows, cols)
    }

    /// Create an owned matrix whose element `(row, col)` is `f(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> FfiResult<Self>
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut m = Self::zeros(rows, cols)?;
        if rows > 0 {
            for (i, slot) in m.make_mut()?.iter_mut().enumerate() {
                *slot = f(i % rows, i / rows);
            }
        }
        Ok(m)
    }

    /// Create an owned matrix by copying column-major data.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails or size doesn't match.
    pub fn from_col_major(rows: usize, cols: usize, data: &[T]) -> FfiResult<Self> {
        check_len(rows, cols, data.len())?;
        Self::from_pinned(PinnedBuffer::from_slice(data)?, rows, cols)
    }

    /// Get the number of rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Get the shape as (rows, cols).
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Get the leading dimension (column stride in elements).
    ///
    /// For column-major layout, this equals the number of rows.
    #[inline]
    #[must_use]
    pub const fn ld(&self) -> usize {
        self.rows
    }

    /// Get the total number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Check if the matrix is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Whether the matrix still points at host memory.
    #[inline]
    #[must_use]
    pub const fn is_borrowed(&self) -> bool {
        matches!(self.data, Storage::Borrowed(_))
    }

    /// Get the data as a column-major slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match &self.data {
            Storage::Borrowed(s) => s,
            Storage::Pinned(b) => b.as_slice(),
        }
    }

    /// Get the memory address of the first element.
    #[must_use]
    pub fn address(&self) -> usize {
        self.as_slice().as_ptr() as usize
    }

    /// Column `col` as a contiguous slice, or `None` if out of range.
    #[must_use]
    pub fn column(&self, col: usize) -> Option<&[T]> {
        if col >= self.cols {
            return None;
        }
        let start = col * self.rows;
        self.as_slice().get(start..start + self.rows)
    }

    /// Get an element at (row, col), or `None` if out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.rows && col < self.cols {
            self.as_slice().get(col * self.rows + row).copied()
        } else {
            None
        }
    }

    /// Set an element at (row, col).
    ///
    /// A borrowed matrix is copied into native memory first.
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::OutOfBounds`] for an index outside the matrix, or
    /// an allocation error if the copy fails.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> FfiResult<()> {
        if row >= self.rows || col >= self.cols {
            return Err(FfiError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let ld = self.ld();
        self.make_mut()?[col * ld + row] = value;
        Ok(())
    }

    /// Mutable column-major data, copying out of host memory if borrowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be allocated.
    pub fn make_mut(&mut self) -> FfiResult<&mut [T]> {
        if let Storage::Borrowed(s) = self.data {
            self.data = Storage::Pinned(PinnedBuffer::from_slice(s)?);
        }
        match &mut self.data {
            Storage::Pinned(b) => Ok(b.as_mut_slice()),
            Storage::Borrowed(_) => Err(FfiError::NullPointer),
        }
    }

    /// Detach from host memory, copying if borrowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be allocated.
    pub fn into_owned(self) -> FfiResult<ColMatrix<'static, T>> {
        let data = match self.data {
            Storage::Borrowed(s) => PinnedBuffer::from_slice(s)?,
            Storage::Pinned(b) => b,
        };
        Ok(ColMatrix {
            data: Storage::Pinned(data),
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// The native buffer backing this matrix, copying if borrowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be allocated.
    pub fn into_pinned(self) -> FfiResult<PinnedBuffer<T>> {
        match self.data {
            Storage::Borrowed(s) => PinnedBuffer::from_slice(s),
            Storage::Pinned(b) => Ok(b),
        }
    }

    /// A deep, owned copy of this matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be allocated.
    pub fn try_clone(&self) -> FfiResult<ColMatrix<'static, T>> {
        ColMatrix::from_col_major(self.rows, self.cols, self.as_slice())
    }
}

impl<T: Element> PartialEq for ColMatrix<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.as_slice() == other.as_slice()
    }
}
