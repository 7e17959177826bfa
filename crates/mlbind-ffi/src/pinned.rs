//! Pinned memory buffers for FFI.
//!
//! A [`PinnedBuffer`] is an exclusively owned native allocation that stays at
//! a fixed address for its whole lifetime. Its lifetime is independent of the
//! host runtime: once a value has been copied into a pinned buffer, host-side
//! reclamation of the source can no longer affect it.
//!
//! ## Ownership transfer
//!
//! Buffers are allocated with the global allocator using
//! `Layout::array::<T>(len)`, which is the same layout `Vec<T>` uses for a
//! vector of capacity `len`. That lets [`PinnedBuffer::into_vec`] hand the
//! allocation to a `Vec` without copying, and lets
//! [`PinnedBuffer::into_raw_parts`] export it to foreign code that later
//! returns it through the deleters in [`crate::abi`].

use crate::{is_aligned, FfiError, FfiResult, FfiSafe};
use std::alloc::Layout;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A buffer that is guaranteed to remain at a fixed memory address.
///
/// Every element of a `PinnedBuffer` is initialized; the length equals the
/// allocated capacity. Zero-length buffers do not allocate.
///
/// # Example
///
/// ```rust
/// use mlbind_ffi::PinnedBuffer;
///
/// let buffer = PinnedBuffer::from_fn(4, |i| i as f64 * 0.5).unwrap();
/// assert_eq!(buffer.as_slice(), &[0.0, 0.5, 1.0, 1.5]);
/// ```
#[derive(Debug)]
pub struct PinnedBuffer<T: FfiSafe> {
    /// Pointer to the pinned memory.
    ptr: NonNull<T>,
    /// Number of elements.
    len: usize,
    /// Phantom data for T.
    _marker: PhantomData<T>,
}

impl<T: FfiSafe> PinnedBuffer<T> {
    fn layout(len: usize) -> FfiResult<Layout> {
        Layout::array::<T>(len)
            .map_err(|e| FfiError::AllocationFailed(format!("invalid layout: {e}")))
    }

    /// An empty buffer. Does not allocate.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Create a new pinned buffer initialized with zeros.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn zeroed(len: usize) -> FfiResult<Self> {
        if len == 0 || std::mem::size_of::<T>() == 0 {
            return Ok(Self {
                len,
                ..Self::empty()
            });
        }

        let layout = Self::layout(len)?;
        // SAFETY: layout has non-zero size; `FfiSafe` guarantees the zero bit
        // pattern is a valid `T`.
        let ptr = unsafe {
            let raw = std::alloc::alloc_zeroed(layout);
            if raw.is_null() {
                return Err(FfiError::AllocationFailed(format!(
                    "failed to allocate {} bytes",
                    layout.size()
                )));
            }
            NonNull::new_unchecked(raw.cast::<T>())
        };

        Ok(Self {
            ptr,
            len,
            _marker: PhantomData,
        })
    }

    /// Create a pinned buffer whose element `i` is `f(i)`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn from_fn<F>(len: usize, mut f: F) -> FfiResult<Self>
    where
        F: FnMut(usize) -> T,
    {
        let mut buffer = Self::zeroed(len)?;
        for (i, slot) in buffer.as_mut_slice().iter_mut().enumerate() {
            *slot = f(i);
        }
        Ok(buffer)
    }

    /// Create a pinned buffer from existing data by copying.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn from_slice(data: &[T]) -> FfiResult<Self> {
        let mut buffer = Self::zeroed(data.len())?;
        buffer.as_mut_slice().copy_from_slice(data);
        Ok(buffer)
    }

    /// Get the raw pointer to the buffer.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Get the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the size in bytes.
    #[inline]
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Get a slice of the elements.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr is valid for `len` initialized elements (or dangling
        // with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Get a mutable slice of the elements.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Verify that the pointer address hasn't changed (for testing).
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    fn owns_allocation(&self) -> bool {
        self.len > 0 && std::mem::size_of::<T>() > 0
    }

    /// Transfer the allocation to a `Vec` without copying.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        if !self.owns_allocation() {
            return Vec::new();
        }
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: allocated by the global allocator with
        // `Layout::array::<T>(len)`, fully initialized, and `this` will not
        // be dropped.
        unsafe { Vec::from_raw_parts(this.ptr.as_ptr(), this.len, this.len) }
    }

    /// Export the allocation as a raw pointer and length.
    ///
    /// The caller becomes responsible for returning the pair to
    /// [`PinnedBuffer::from_raw_parts`] (or to a deleter in [`crate::abi`])
    /// exactly once. An empty buffer exports a null pointer.
    #[must_use]
    pub fn into_raw_parts(self) -> (*mut T, usize) {
        if !self.owns_allocation() {
            return (std::ptr::null_mut(), 0);
        }
        let this = std::mem::ManuallyDrop::new(self);
        (this.ptr.as_ptr(), this.len)
    }

    /// Reclaim a buffer exported with [`PinnedBuffer::into_raw_parts`].
    ///
    /// # Errors
    ///
    /// Returns [`FfiError::NullPointer`] for a null pointer with a non-zero
    /// length, and [`FfiError::AlignmentError`] for a misaligned pointer.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must come from one call to `into_raw_parts` and must
    /// not have been reclaimed before.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> FfiResult<Self> {
        if ptr.is_null() {
            return if len == 0 {
                Ok(Self::empty())
            } else {
                Err(FfiError::NullPointer)
            };
        }
        if !is_aligned(ptr.cast_const()) {
            return Err(FfiError::AlignmentError {
                address: ptr as usize,
                required: std::mem::align_of::<T>(),
            });
        }
        Ok(Self {
            ptr: NonNull::new_unchecked(ptr),
            len,
            _marker: PhantomData,
        })
    }
}

impl<T: FfiSafe> Clone for PinnedBuffer<T> {
    fn clone(&self) -> Self {
        match Self::from_slice(self.as_slice()) {
            Ok(buffer) => buffer,
            Err(_) => std::alloc::handle_alloc_error(
                Layout::array::<T>(self.len).unwrap_or_else(|_| Layout::new::<T>()),
            ),
        }
    }
}

impl<T: FfiSafe> Drop for PinnedBuffer<T> {
    fn drop(&mut self) {
        if self.owns_allocation() {
            if let Ok(layout) = Layout::array::<T>(self.len) {
                // SAFETY: allocated with this exact layout in `zeroed`.
                unsafe {
                    std::alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
                }
            }
        }
    }
}

// Exclusively owned plain-old-data.
unsafe impl<T: FfiSafe + Send> Send for PinnedBuffer<T> {}
unsafe impl<T: FfiSafe + Sync> Sync for PinnedBuffer<T> {}
