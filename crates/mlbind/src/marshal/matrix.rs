//! Dense matrix marshalling.
//!
//! Inbound, every host array becomes a column-major [`ColMatrix`]:
//!
//! | Host layout                         | Path        | Copy |
//! |-------------------------------------|-------------|------|
//! | contiguous column-major             | adopt       | no   |
//! | contiguous row-major                | transpose   | yes  |
//! | strided view                        | gather      | yes  |
//!
//! Before any of that the declared order is checked against the memory
//! layout; disagreements are layout violations unless the configured
//! [`ViewPolicy`] says to trust the strides.
//!
//! Outbound, the native matrix becomes a fresh column-major host array.
//! Small or borrowed results are copied; large owned buffers are handed
//! over without copying.

use crate::config::{BindingConfig, ViewPolicy};
use crate::{BindError, BindResult};
use mlbind_ffi::{ColMatrix, Element};
use mlbind_host::{HostArray, Order};
use std::fmt;

/// How a buffer crossed the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Path {
    /// Host memory used in place.
    Adopted,
    /// Row-major data copied into column-major order.
    Transposed,
    /// Strided data gathered element by element.
    Gathered,
    /// Native data copied into a new host buffer.
    Copied,
    /// Native buffer handed to the host without copying.
    Transferred,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Adopted => "adopted",
            Self::Transposed => "transposed",
            Self::Gathered => "gathered",
            Self::Copied => "copied",
            Self::Transferred => "transferred",
        };
        f.write_str(name)
    }
}

/// Check the declared order against the memory layout.
///
/// # Errors
///
/// Returns [`BindError::LayoutViolation`] under [`ViewPolicy::Reject`] when a
/// plain array's strides contradict its order flag, or when a view's order
/// flag differs from the order of the array it was taken from.
pub fn validate_layout<T: Element>(
    key: &str,
    array: &HostArray<T>,
    policy: ViewPolicy,
) -> BindResult<()> {
    let reason = match array.view() {
        None if !array.order_matches_strides() => Some(format!(
            "declared {} order but strides {:?} describe another layout",
            array.order(),
            array.strides()
        )),
        Some(view) if view.backing_order != array.order() => Some(format!(
            "{} view declared {} order over a {} buffer",
            view.orientation,
            array.order(),
            view.backing_order
        )),
        _ => None,
    };
    match (reason, policy) {
        (None, _) => Ok(()),
        (Some(reason), ViewPolicy::Reject) => Err(BindError::LayoutViolation {
            key: key.to_string(),
            reason,
        }),
        (Some(reason), ViewPolicy::Gather) => {
            tracing::warn!(param = key, %reason, "ignoring order flag; reading by strides");
            Ok(())
        }
    }
}

/// Bring a host array into native form with the given target shape.
///
/// `rows * cols` must equal the array's length, and the array's logical
/// row-major order must match the target's.
pub(crate) fn canonicalize<'a, T: Element>(
    key: &str,
    array: &'a HostArray<T>,
    rows: usize,
    cols: usize,
    policy: ViewPolicy,
) -> BindResult<(ColMatrix<'a, T>, Path)> {
    validate_layout(key, array, policy)?;

    if array.rank() == 1 || array.is_contiguous_in(Order::ColMajor) {
        if let Some(slice) = array.contiguous_slice() {
            return Ok((ColMatrix::borrowed(slice, rows, cols)?, Path::Adopted));
        }
    }

    if array.is_contiguous_in(Order::RowMajor) {
        if let Some(slice) = array.contiguous_slice() {
            let m = ColMatrix::from_fn(rows, cols, |r, c| {
                slice.get(r * cols + c).copied().unwrap_or_default()
            })?;
            return Ok((m, Path::Transposed));
        }
    }

    let logical = array.to_vec();
    let m = ColMatrix::from_fn(rows, cols, |r, c| {
        logical.get(r * cols + c).copied().unwrap_or_default()
    })?;
    Ok((m, Path::Gathered))
}

/// Marshal a matrix parameter into native form.
///
/// # Errors
///
/// Layout violations, and FFI errors from the buffer constructors.
pub fn to_native<'a, T: Element>(
    key: &str,
    array: &'a HostArray<T>,
    config: &BindingConfig,
) -> BindResult<ColMatrix<'a, T>> {
    let (rows, cols) = array.dims2();
    let (m, path) = canonicalize(key, array, rows, cols, config.view_policy)?;
    tracing::debug!(param = key, rows, cols, %path, "matrix in");
    Ok(m)
}

/// Take a native buffer's elements for a new host array.
pub(crate) fn export<T: Element>(
    m: ColMatrix<'_, T>,
    config: &BindingConfig,
) -> BindResult<(Vec<T>, Path)> {
    if m.is_borrowed() || m.len() <= config.inline_copy_threshold {
        Ok((m.as_slice().to_vec(), Path::Copied))
    } else {
        let bytes = m.len() * T::KIND.width();
        let data = m.into_pinned()?.into_vec();
        tracing::trace!(elem = %T::KIND, bytes, "native buffer handed to host");
        Ok((data, Path::Transferred))
    }
}

/// Marshal a native matrix into a fresh column-major host array.
///
/// # Errors
///
/// FFI errors from the buffer hand-over.
pub fn from_native<T: Element>(
    key: &str,
    m: ColMatrix<'_, T>,
    config: &BindingConfig,
) -> BindResult<HostArray<T>> {
    let (rows, cols) = m.shape();
    let (data, path) = export(m, config)?;
    tracing::debug!(param = key, rows, cols, %path, "matrix out");
    Ok(HostArray::from_vec(data, &[rows, cols], Order::ColMajor)?)
}
