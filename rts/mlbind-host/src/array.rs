//! Strided host arrays and views.

use crate::{HostError, HostResult};
use mlbind_ffi::{ElemKind, Element, Orientation};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Shape and Stride
// ============================================================================

/// An array shape (list of dimension sizes).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from dimensions.
    #[must_use]
    pub fn new(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Vector shape (1 dimension).
    #[must_use]
    pub fn vector(len: usize) -> Self {
        Shape { dims: vec![len] }
    }

    /// Matrix shape (2 dimensions).
    #[must_use]
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Shape {
            dims: vec![rows, cols],
        }
    }

    /// Number of dimensions (rank).
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Get dimension at index.
    #[must_use]
    pub fn dim(&self, i: usize) -> usize {
        self.dims.get(i).copied().unwrap_or(1)
    }

    /// Get all dimensions.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Compute row-major (C-style) strides for a shape.
#[must_use]
pub fn row_major_strides(shape: &Shape) -> Vec<usize> {
    if shape.rank() == 0 {
        return vec![];
    }

    let mut strides = vec![1; shape.rank()];
    for i in (0..shape.rank() - 1).rev() {
        strides[i] = strides[i + 1] * shape.dim(i + 1);
    }
    strides
}

/// Compute column-major (Fortran-style) strides for a shape.
#[must_use]
pub fn col_major_strides(shape: &Shape) -> Vec<usize> {
    if shape.rank() == 0 {
        return vec![];
    }

    let mut strides = vec![1; shape.rank()];
    for i in 1..shape.rank() {
        strides[i] = strides[i - 1] * shape.dim(i - 1);
    }
    strides
}

/// Whether `strides` agree with `expected` on every dimension that has more
/// than one element. Size-0 and size-1 dimensions are never stepped over.
fn strides_agree(shape: &Shape, strides: &[usize], expected: &[usize]) -> bool {
    shape
        .dims()
        .iter()
        .zip(strides.iter().zip(expected))
        .all(|(&d, (&s, &e))| d <= 1 || s == e)
}

// ============================================================================
// Order and views
// ============================================================================

/// Declared memory order of a host array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// Row-major (`'c'`).
    RowMajor,
    /// Column-major (`'f'`).
    ColMajor,
}

impl Order {
    /// The host runtime's single-character ordering flag.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::RowMajor => 'c',
            Self::ColMajor => 'f',
        }
    }

    /// Canonical strides for `shape` in this order.
    #[must_use]
    pub fn strides_for(self, shape: &Shape) -> Vec<usize> {
        match self {
            Self::RowMajor => row_major_strides(shape),
            Self::ColMajor => col_major_strides(shape),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowMajor => write!(f, "row-major ('c')"),
            Self::ColMajor => write!(f, "column-major ('f')"),
        }
    }
}

/// Provenance of a single-row or single-column view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewInfo {
    /// Whether this is a row or a column of the backing matrix.
    pub orientation: Orientation,
    /// Which row or column.
    pub index: usize,
    /// Declared order of the backing matrix when the view was taken.
    pub backing_order: Order,
    /// Shape of the backing matrix.
    pub backing_shape: Shape,
}

// ============================================================================
// Storage
// ============================================================================

/// Array data storage (shared via Arc for cheap cloning).
#[derive(Clone, Debug)]
struct Storage<T> {
    data: Arc<Vec<T>>,
    offset: usize,
}

impl<T: Copy> Storage<T> {
    fn new(data: Vec<T>) -> Self {
        Storage {
            data: Arc::new(data),
            offset: 0,
        }
    }

    fn get(&self, index: usize) -> Option<T> {
        self.data.get(self.offset + index).copied()
    }

    fn as_slice(&self) -> &[T] {
        self.data.get(self.offset..).unwrap_or(&[])
    }
}

// ============================================================================
// HostArray
// ============================================================================

/// A rank-1 or rank-2 host array with shape, strides, and a declared order.
#[derive(Clone, Debug)]
pub struct HostArray<T> {
    storage: Storage<T>,
    shape: Shape,
    strides: Vec<usize>,
    order: Order,
    view: Option<ViewInfo>,
}

impl<T: Element> HostArray<T> {
    /// Create an array whose data is laid out in `order`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::RankUnsupported`] unless `dims` has one or two
    /// entries, and [`HostError::ShapeMismatch`] if `data` has the wrong length.
    pub fn from_vec(data: Vec<T>, dims: &[usize], order: Order) -> HostResult<Self> {
        if !(1..=2).contains(&dims.len()) {
            return Err(HostError::RankUnsupported(dims.len()));
        }
        let shape = Shape::new(dims);
        if shape.num_elements() != data.len() {
            return Err(HostError::ShapeMismatch {
                expected: shape.num_elements(),
                actual: data.len(),
            });
        }
        let strides = order.strides_for(&shape);
        Ok(Self {
            storage: Storage::new(data),
            shape,
            strides,
            order,
            view: None,
        })
    }

    /// A 1-D array.
    #[must_use]
    pub fn vector(data: Vec<T>) -> Self {
        let shape = Shape::vector(data.len());
        Self {
            storage: Storage::new(data),
            shape,
            strides: vec![1],
            order: Order::ColMajor,
            view: None,
        }
    }

    /// A `rows x cols` matrix whose element `(r, c)` is `f(r, c)`, stored in `order`.
    ///
    /// # Errors
    ///
    /// Never fails for in-range shapes; the `Result` mirrors [`HostArray::from_vec`].
    pub fn from_fn<F>(rows: usize, cols: usize, order: Order, mut f: F) -> HostResult<Self>
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(rows * cols);
        match order {
            Order::RowMajor => {
                for r in 0..rows {
                    for c in 0..cols {
                        data.push(f(r, c));
                    }
                }
            }
            Order::ColMajor => {
                for c in 0..cols {
                    for r in 0..rows {
                        data.push(f(r, c));
                    }
                }
            }
        }
        Self::from_vec(data, &[rows, cols], order)
    }

    /// An empty `0 x 0` column-major matrix.
    #[must_use]
    pub fn empty_matrix() -> Self {
        Self {
            storage: Storage::new(Vec::new()),
            shape: Shape::matrix(0, 0),
            strides: vec![1, 0],
            order: Order::ColMajor,
            view: None,
        }
    }

    /// The shape.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Dimension sizes.
    #[inline]
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of dimensions.
    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// `(rows, cols)`, treating a 1-D array as a column.
    #[inline]
    #[must_use]
    pub fn dims2(&self) -> (usize, usize) {
        (self.shape.dim(0), self.shape.dim(1))
    }

    /// Total number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    /// Whether the array has no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-dimension strides into storage, in elements.
    #[inline]
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Offset of element `(0, ..)` into the shared storage.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.storage.offset
    }

    /// The declared order flag.
    #[inline]
    #[must_use]
    pub fn order(&self) -> Order {
        self.order
    }

    /// Runtime element kind.
    #[inline]
    #[must_use]
    pub fn elem_kind(&self) -> ElemKind {
        T::KIND
    }

    /// Whether this array is a row or column view into another array.
    #[inline]
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.view.is_some()
    }

    /// View provenance, if this array is a view.
    #[inline]
    #[must_use]
    pub fn view(&self) -> Option<&ViewInfo> {
        self.view.as_ref()
    }

    /// Whether the strides describe a dense block in the given order.
    #[must_use]
    pub fn is_contiguous_in(&self, order: Order) -> bool {
        strides_agree(&self.shape, &self.strides, &order.strides_for(&self.shape))
    }

    /// Whether the elements occupy one dense block of storage.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.is_contiguous_in(Order::RowMajor) || self.is_contiguous_in(Order::ColMajor)
    }

    /// Whether the declared order agrees with the physical strides.
    #[must_use]
    pub fn order_matches_strides(&self) -> bool {
        self.is_contiguous_in(self.order)
    }

    /// The dense block of storage holding this array, if it is contiguous.
    #[must_use]
    pub fn contiguous_slice(&self) -> Option<&[T]> {
        if self.is_contiguous() {
            self.storage.as_slice().get(..self.len())
        } else {
            None
        }
    }

    /// Raw element access by storage index, relative to this array's offset.
    #[inline]
    #[must_use]
    pub fn raw(&self, index: usize) -> Option<T> {
        self.storage.get(index)
    }

    fn physical_index(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i * s)
            .sum()
    }

    /// Element at a multi-dimensional index.
    #[must_use]
    pub fn get(&self, indices: &[usize]) -> Option<T> {
        if indices.len() != self.rank() {
            return None;
        }
        if indices
            .iter()
            .zip(self.dims())
            .any(|(&idx, &dim)| idx >= dim)
        {
            return None;
        }
        self.storage.get(self.physical_index(indices))
    }

    /// Element at `(row, col)`; a 1-D array is addressed as a column.
    #[inline]
    #[must_use]
    pub fn get2(&self, row: usize, col: usize) -> Option<T> {
        match self.rank() {
            1 if col == 0 => self.get(&[row]),
            2 => self.get(&[row, col]),
            _ => None,
        }
    }

    /// All elements in logical row-major order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let (rows, cols) = self.dims2();
        let mut out = Vec::with_capacity(self.len());
        for r in 0..rows {
            for c in 0..cols {
                if let Some(v) = self.get2(r, c) {
                    out.push(v);
                }
            }
        }
        out
    }

    fn check_rank2(&self) -> HostResult<(usize, usize)> {
        if self.rank() == 2 {
            Ok(self.dims2())
        } else {
            Err(HostError::RankUnsupported(self.rank()))
        }
    }

    /// A `1 x cols` view of row `index`, sharing storage.
    ///
    /// # Errors
    ///
    /// Fails for 1-D arrays and out-of-range rows.
    pub fn row(&self, index: usize) -> HostResult<Self> {
        let (rows, cols) = self.check_rank2()?;
        if index >= rows {
            return Err(HostError::IndexOutOfBounds { index, size: rows });
        }
        Ok(self.view_at(
            index * self.strides[0],
            Shape::matrix(1, cols),
            Orientation::Row,
            index,
        ))
    }

    /// A `rows x 1` view of column `index`, sharing storage.
    ///
    /// # Errors
    ///
    /// Fails for 1-D arrays and out-of-range columns.
    pub fn col(&self, index: usize) -> HostResult<Self> {
        let (rows, cols) = self.check_rank2()?;
        if index >= cols {
            return Err(HostError::IndexOutOfBounds { index, size: cols });
        }
        Ok(self.view_at(
            index * self.strides[1],
            Shape::matrix(rows, 1),
            Orientation::Column,
            index,
        ))
    }

    fn view_at(&self, delta: usize, shape: Shape, orientation: Orientation, index: usize) -> Self {
        Self {
            storage: Storage {
                data: Arc::clone(&self.storage.data),
                offset: self.storage.offset + delta,
            },
            shape,
            strides: self.strides.clone(),
            order: self.order,
            view: Some(ViewInfo {
                orientation,
                index,
                backing_order: self.order,
                backing_shape: self.shape.clone(),
            }),
        }
    }

    /// Relabel the declared order without touching memory or strides.
    pub fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    /// A fresh, non-view, contiguous copy laid out in `order`.
    #[must_use]
    pub fn dup(&self, order: Order) -> Self {
        let (rows, cols) = self.dims2();
        let mut data = Vec::with_capacity(self.len());
        match order {
            Order::RowMajor => data.extend(self.to_vec()),
            Order::ColMajor => {
                for c in 0..cols {
                    for r in 0..rows {
                        data.extend(self.get2(r, c));
                    }
                }
            }
        }
        let shape = self.shape.clone();
        let strides = order.strides_for(&shape);
        Self {
            storage: Storage::new(data),
            shape,
            strides,
            order,
            view: None,
        }
    }

    /// Whether two arrays share the same storage allocation.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage.data, &other.storage.data)
    }

    /// Number of live arrays (including views) sharing this storage.
    #[must_use]
    pub fn storage_refs(&self) -> usize {
        Arc::strong_count(&self.storage.data)
    }

    /// Address of the first element of the shared storage.
    #[must_use]
    pub fn storage_address(&self) -> usize {
        self.storage.data.as_ptr() as usize
    }
}

impl<T: Element> PartialEq for HostArray<T> {
    /// Logical equality: same shape and same elements, regardless of layout.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.to_vec() == other.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(order: Order) -> HostArray<f64> {
        HostArray::from_fn(3, 4, order, |r, c| (r * 10 + c) as f64).unwrap()
    }

    #[test]
    fn test_strides() {
        let s = Shape::matrix(3, 4);
        assert_eq!(row_major_strides(&s), vec![4, 1]);
        assert_eq!(col_major_strides(&s), vec![1, 3]);
        assert_eq!(s.to_string(), "[3, 4]");
    }

    #[test]
    fn test_from_vec_validates() {
        assert_eq!(
            HostArray::from_vec(vec![1.0f64; 5], &[2, 3], Order::RowMajor).unwrap_err(),
            HostError::ShapeMismatch {
                expected: 6,
                actual: 5
            }
        );
        assert_eq!(
            HostArray::from_vec(vec![1u64; 8], &[2, 2, 2], Order::RowMajor).unwrap_err(),
            HostError::RankUnsupported(3)
        );
    }

    #[test]
    fn test_layouts_agree_logically() {
        let c = grid(Order::RowMajor);
        let f = grid(Order::ColMajor);
        assert_eq!(c, f);
        assert_eq!(c.get2(2, 3), Some(23.0));
        assert_eq!(f.get2(2, 3), Some(23.0));
        assert_eq!(c.raw(1), Some(1.0));
        assert_eq!(f.raw(1), Some(10.0));
        assert!(c.order_matches_strides());
        assert!(f.order_matches_strides());
    }

    #[test]
    fn test_row_view_of_row_major_is_contiguous() {
        let c = grid(Order::RowMajor);
        let row = c.row(1).unwrap();
        assert!(row.is_view());
        assert!(row.is_contiguous());
        assert!(row.shares_storage(&c));
        assert_eq!(row.contiguous_slice(), Some(&[10.0, 11.0, 12.0, 13.0][..]));
        let info = row.view().unwrap();
        assert_eq!(info.orientation, Orientation::Row);
        assert_eq!(info.backing_order, Order::RowMajor);
    }

    #[test]
    fn test_row_view_of_col_major_is_strided() {
        let f = grid(Order::ColMajor);
        let row = f.row(2).unwrap();
        assert!(!row.is_contiguous());
        assert_eq!(row.strides(), &[1, 3]);
        assert_eq!(row.contiguous_slice(), None);
        assert_eq!(row.to_vec(), vec![20.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_col_view() {
        let f = grid(Order::ColMajor);
        let col = f.col(3).unwrap();
        assert!(col.is_contiguous());
        assert_eq!(col.to_vec(), vec![3.0, 13.0, 23.0]);
        assert!(grid(Order::RowMajor).col(4).is_err());
    }

    #[test]
    fn test_set_order_relabels_only() {
        let mut c = grid(Order::RowMajor);
        let before = c.to_vec();
        c.set_order(Order::ColMajor);
        assert_eq!(c.order(), Order::ColMajor);
        assert_eq!(c.strides(), &[4, 1]);
        assert!(!c.order_matches_strides());
        assert_eq!(c.to_vec(), before);
    }

    #[test]
    fn test_unit_dims_match_any_order() {
        let mut v = HostArray::from_vec(vec![1u64, 2, 3], &[3, 1], Order::RowMajor).unwrap();
        v.set_order(Order::ColMajor);
        assert!(v.order_matches_strides());
    }

    #[test]
    fn test_dup_is_independent() {
        let c = grid(Order::RowMajor);
        let f = c.dup(Order::ColMajor);
        assert_eq!(c, f);
        assert!(!f.shares_storage(&c));
        assert_eq!(f.order(), Order::ColMajor);
        assert_eq!(f.raw(1), Some(10.0));
    }

    #[test]
    fn test_empty_matrix() {
        let e = HostArray::<f64>::empty_matrix();
        assert!(e.is_empty());
        assert_eq!(e.dims(), &[0, 0]);
        assert_eq!(e.contiguous_slice(), Some(&[][..]));
        assert_eq!(e.elem_kind(), ElemKind::F64);
    }

    #[test]
    fn test_vector() {
        let v = HostArray::vector(vec![3u64, 4, 5]);
        assert_eq!(v.rank(), 1);
        assert_eq!(v.dims2(), (3, 1));
        assert_eq!(v.get2(1, 0), Some(4));
        assert_eq!(v.get2(1, 1), None);
        assert!(v.row(0).is_err());
    }
}
