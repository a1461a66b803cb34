use std::os::windows::io::{AsRawHandle, FromRawHandle, IntoRawHandle, OwnedHandle, RawHandle};

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};

use crate::error::NativeErrorCode;

#[derive(Debug)]
enum Inner {
    Owned(OwnedHandle),
    /// `GetCurrentProcess` / `GetCurrentThread` values, never closed.
    Pseudo(RawHandle),
}

/// A kernel object handle, either owned or a pseudo-handle.
///
/// An owned handle is closed exactly once, by [`NativeHandle::close`] or on
/// drop. Closing a pseudo-handle does nothing.
#[derive(Debug)]
pub struct NativeHandle {
    inner: Inner,
}

impl NativeHandle {
    /// Takes ownership of `handle`.
    ///
    /// # Safety
    /// `handle` must be an open handle that nothing else closes.
    #[inline]
    #[must_use]
    pub unsafe fn from_raw_owned(handle: HANDLE) -> Self {
        // SAFETY: guaranteed by the caller.
        let owned = unsafe { OwnedHandle::from_raw_handle(handle) };
        Self {
            inner: Inner::Owned(owned),
        }
    }

    /// Wraps a pseudo-handle.
    #[inline]
    #[must_use]
    pub(crate) const fn pseudo(handle: HANDLE) -> Self {
        Self {
            inner: Inner::Pseudo(handle),
        }
    }

    /// Whether closing the handle releases a kernel object reference.
    #[inline]
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self.inner, Inner::Owned(_))
    }

    /// The raw `HANDLE`, still owned by `self`.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> HANDLE {
        match &self.inner {
            Inner::Owned(handle) => handle.as_raw_handle(),
            Inner::Pseudo(handle) => *handle,
        }
    }

    /// Closes the handle and reports the outcome.
    ///
    /// # Errors
    /// The error of `CloseHandle`, for example on a handle protected from close.
    pub fn close(self) -> Result<(), NativeErrorCode> {
        match self.inner {
            Inner::Pseudo(_) => Ok(()),
            Inner::Owned(handle) => {
                let raw = handle.into_raw_handle();
                // SAFETY: `raw` is owned and is not used after this call.
                if unsafe { CloseHandle(raw) } == 0 {
                    Err(NativeErrorCode::last())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The owned handle, or `None` for a pseudo-handle.
    #[inline]
    #[must_use]
    pub fn into_owned(self) -> Option<OwnedHandle> {
        match self.inner {
            Inner::Owned(handle) => Some(handle),
            Inner::Pseudo(_) => None,
        }
    }
}

impl From<OwnedHandle> for NativeHandle {
    #[inline]
    fn from(value: OwnedHandle) -> Self {
        Self {
            inner: Inner::Owned(value),
        }
    }
}

impl AsRawHandle for NativeHandle {
    #[inline]
    fn as_raw_handle(&self) -> RawHandle {
        self.as_raw()
    }
}
