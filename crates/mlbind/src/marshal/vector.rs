//! Row and column vector marshalling.
//!
//! A vector parameter accepts a 1-D host array of any length, or a 2-D
//! array already shaped `1 x n` (row) or `n x 1` (column). Results always
//! come back as fresh 1-D host arrays.

use super::matrix::{canonicalize, export};
use crate::config::BindingConfig;
use crate::{BindError, BindResult};
use mlbind_ffi::{ColMatrix, Element, Orientation};
use mlbind_host::HostArray;

fn expected_shape(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Row => "[1, n] or [n]",
        Orientation::Column => "[n, 1] or [n]",
    }
}

/// Marshal a vector parameter into an `orientation`-shaped native matrix.
///
/// # Errors
///
/// Returns [`BindError::ShapeMismatch`] for a 2-D array of the wrong
/// orientation, plus any layout violation.
pub fn to_native<'a, T: Element>(
    key: &str,
    array: &'a HostArray<T>,
    orientation: Orientation,
    config: &BindingConfig,
) -> BindResult<ColMatrix<'a, T>> {
    let (rows, cols) = orientation.shape(array.len());
    if array.rank() == 2 && !array.is_empty() && array.dims2() != (rows, cols) {
        return Err(BindError::ShapeMismatch {
            key: key.to_string(),
            expected: expected_shape(orientation).to_string(),
            found: array.shape().to_string(),
        });
    }
    let (m, path) = canonicalize(key, array, rows, cols, config.view_policy)?;
    tracing::debug!(param = key, len = array.len(), %orientation, %path, "vector in");
    Ok(m)
}

/// Marshal a native vector into a fresh 1-D host array.
///
/// # Errors
///
/// Returns [`BindError::ShapeMismatch`] if the native result has more than
/// one row and more than one column.
pub fn from_native<T: Element>(
    key: &str,
    m: ColMatrix<'_, T>,
    orientation: Orientation,
    config: &BindingConfig,
) -> BindResult<HostArray<T>> {
    let (rows, cols) = m.shape();
    if rows > 1 && cols > 1 {
        return Err(BindError::ShapeMismatch {
            key: key.to_string(),
            expected: expected_shape(orientation).to_string(),
            found: format!("[{rows}, {cols}]"),
        });
    }
    let (data, path) = export(m, config)?;
    tracing::debug!(param = key, len = data.len(), %orientation, %path, "vector out");
    Ok(HostArray::vector(data))
}
