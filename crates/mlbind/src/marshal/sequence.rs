//! Integer and string sequence marshalling.
//!
//! Sequences are copied element by element in both directions; order and
//! length are preserved exactly.

/// Copy a host sequence into native form.
#[must_use]
pub fn to_native<T: Clone>(key: &str, values: &[T]) -> Vec<T> {
    tracing::debug!(param = key, len = values.len(), "sequence in");
    values.to_vec()
}

/// Hand a native sequence back to the host.
#[must_use]
pub fn from_native<T>(key: &str, values: Vec<T>) -> Vec<T> {
    tracing::debug!(param = key, len = values.len(), "sequence out");
    values
}
