//! C ABI deleters for buffers exported to foreign code.
//!
//! A buffer handed out with [`PinnedBuffer::into_raw_parts`] must come back
//! through exactly one of these functions. Null pointers are ignored so that
//! a foreign finalizer may call a deleter unconditionally.

use crate::pinned::PinnedBuffer;
use crate::FfiSafe;

/// Release an exported buffer, returning whether memory was freed.
///
/// # Safety
///
/// See [`PinnedBuffer::from_raw_parts`].
unsafe fn release<T: FfiSafe>(ptr: *mut T, len: usize) -> bool {
    if ptr.is_null() {
        return false;
    }
    match PinnedBuffer::from_raw_parts(ptr, len) {
        Ok(buffer) => {
            tracing::trace!(
                elem = T::C_TYPE_NAME,
                len,
                "releasing exported buffer"
            );
            drop(buffer);
            true
        }
        Err(err) => {
            tracing::warn!(elem = T::C_TYPE_NAME, %err, "refusing to free exported buffer");
            false
        }
    }
}

/// Free an `f64` buffer exported with `PinnedBuffer::into_raw_parts`.
///
/// # Safety
///
/// `ptr`/`len` must be an unreleased pair from `into_raw_parts`, or `ptr`
/// must be null.
#[no_mangle]
pub unsafe extern "C" fn mlbind_free_f64(ptr: *mut f64, len: usize) {
    release(ptr, len);
}

/// Free a `u64` buffer exported with `PinnedBuffer::into_raw_parts`.
///
/// # Safety
///
/// `ptr`/`len` must be an unreleased pair from `into_raw_parts`, or `ptr`
/// must be null.
#[no_mangle]
pub unsafe extern "C" fn mlbind_free_u64(ptr: *mut u64, len: usize) {
    release(ptr, len);
}
