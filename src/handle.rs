//! Handle flags and the operations that read and change them.

use bitflags::bitflags;
use tracing::debug;

use crate::native::NativeApi;
use crate::{Error, Result};

bitflags! {
    /// `HANDLE_FLAG_*` values.
    #[derive(Default)]
    pub struct HandleFlags: u32 {
        /// Child processes inherit the handle.
        const INHERIT = 0x1;
        /// `CloseHandle` fails on the handle.
        const PROTECT_FROM_CLOSE = 0x2;
    }
}

/// Reads the flags of `handle`.
///
/// # Errors
/// [`Error::Native`] naming `GetHandleInformation`.
pub fn handle_information<A: NativeApi + ?Sized>(api: &A, handle: &A::Handle) -> Result<HandleFlags> {
    api.get_handle_information(handle)
        .map_err(|code| Error::native("GetHandleInformation", code))
}

/// Sets `flags` on `handle`.
///
/// Only the flags named in `flags` are touched, unless `clear` is set, in
/// which case every flag is written and those not in `flags` are cleared.
///
/// # Errors
/// [`Error::Native`] naming `SetHandleInformation`.
pub fn set_handle_information<A: NativeApi + ?Sized>(
    api: &A,
    handle: &A::Handle,
    flags: HandleFlags,
    clear: bool,
) -> Result<()> {
    let mask = if clear { HandleFlags::all() } else { flags };
    debug!(?mask, ?flags, "setting handle information");
    api.set_handle_information(handle, mask, flags)
        .map_err(|code| Error::native("SetHandleInformation", code))
}
