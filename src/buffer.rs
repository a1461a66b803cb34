//! Owned native memory handed to OS calls that fill variable-length data.

use core::alloc::Layout;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;
use core::slice;
use std::alloc;

use tracing::trace;

use crate::{Error, Result};

/// Alignment of every buffer, enough for the pointer-bearing structures the
/// OS writes into it.
const BUFFER_ALIGN: usize = align_of::<usize>();

/// A block of zero-initialised native memory with a known size.
///
/// The distinguished [`NativeBuffer::null`] value owns nothing, has length
/// zero, and is what a size probe passes to the OS. The memory is freed
/// exactly once: on [`NativeBuffer::release`] or on drop, whichever comes
/// first.
pub struct NativeBuffer {
    ptr: Option<NonNull<u8>>,
    layout: Layout,
    len: usize,
}

impl NativeBuffer {
    /// The empty sentinel. Releasing it is a no-op.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            layout: Layout::new::<()>(),
            len: 0,
        }
    }

    /// Allocates `size` zeroed bytes. A zero size yields the null sentinel.
    ///
    /// # Errors
    /// [`Error::ResourceExhausted`] if the allocator cannot satisfy the request.
    pub fn acquire(size: usize) -> Result<Self> {
        if size == 0 {
            return Ok(Self::null());
        }
        let layout = Layout::from_size_align(size, BUFFER_ALIGN)
            .map_err(|_| Error::ResourceExhausted { size })?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(Error::ResourceExhausted { size })?;
        trace!(size, "acquired native buffer");
        Ok(Self {
            ptr: Some(ptr),
            layout,
            len: size,
        })
    }

    /// Allocates a buffer holding a copy of `bytes`.
    ///
    /// # Errors
    /// [`Error::ResourceExhausted`] if the allocation fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buffer = Self::acquire(bytes.len())?;
        buffer.as_bytes_mut().copy_from_slice(bytes);
        Ok(buffer)
    }

    /// Returns `true` for the null sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Number of meaningful bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shrinks the meaningful length, e.g. to the size the OS reports as written.
    /// Lengths beyond the current one are ignored.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Length to report to the OS, saturated to its 32-bit size fields.
    #[inline]
    #[must_use]
    pub fn len_u32(&self) -> u32 {
        u32::try_from(self.len).unwrap_or(u32::MAX)
    }

    /// Start of the memory, null for the sentinel.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
            .map_or(core::ptr::null(), |ptr| ptr.as_ptr().cast_const())
    }

    /// Mutable start of the memory, null for the sentinel.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }

    /// The meaningful bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: the allocation holds at least `len` initialised bytes and
            // lives as long as `self`.
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// The meaningful bytes, mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self.ptr {
            // SAFETY: as in `as_bytes`, and `&mut self` guarantees exclusivity.
            Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Reads a native-endian `u32` at `offset`.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.as_bytes().get(offset..offset.checked_add(4)?)?;
        Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a pointer-sized value at `offset`.
    #[must_use]
    pub fn read_usize(&self, offset: usize) -> Option<usize> {
        let bytes = self
            .as_bytes()
            .get(offset..offset.checked_add(size_of::<usize>())?)?;
        let mut raw = [0u8; size_of::<usize>()];
        raw.copy_from_slice(bytes);
        Some(usize::from_ne_bytes(raw))
    }

    /// Bytes from `address` to the end of the buffer, if `address` points inside it.
    ///
    /// The OS stores structures whose pointer fields refer to data placed
    /// later in the same buffer; this resolves such a pointer without
    /// dereferencing anything outside the allocation.
    #[must_use]
    pub fn tail_at_address(&self, address: usize) -> Option<&[u8]> {
        let offset = address.checked_sub(self.as_ptr() as usize)?;
        self.as_bytes().get(offset..).filter(|tail| !tail.is_empty())
    }

    /// Frees the memory now. Later calls, and the eventual drop, do nothing.
    pub fn release(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: `ptr` came from `alloc_zeroed` with `self.layout` and is
            // taken out of `self`, so it is freed only once.
            unsafe { alloc::dealloc(ptr.as_ptr(), self.layout) };
            self.len = 0;
        }
    }
}

impl Default for NativeBuffer {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl Drop for NativeBuffer {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}

impl core::fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}
