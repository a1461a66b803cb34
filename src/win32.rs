//! [`NativeApi`] backed by the Win32 API.

mod handle;
mod lookup;
mod security;

use core::mem::size_of;
use core::ptr::null_mut;

pub use handle::NativeHandle;
use windows_sys::Win32::Foundation::{GetHandleInformation, HANDLE, SetHandleInformation};
use windows_sys::Win32::Security::{
    DuplicateTokenEx, GetTokenInformation, ImpersonateLoggedOnUser, RevertToSelf, SECURITY_ATTRIBUTES,
};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentThread, OpenProcess, OpenProcessToken, OpenThread, OpenThreadToken,
};

use crate::buffer::NativeBuffer;
use crate::descriptor::AccessControlSections;
use crate::error::NativeErrorCode;
use crate::handle::HandleFlags;
use crate::native::{AccountLookup, DuplicateRequest, NativeApi, NativeResult, ObjectSecurity, SecurityUpdate};
use crate::rights::{ProcessAccessRights, ThreadAccessRights, TokenAccessRights};
use crate::token_info::TokenInformationClass;
use crate::{DisplayAccount, SecurityIdentifier};
use lookup::SidLookupOperation;
use security::AbsoluteDescriptor;

fn check(result: i32) -> NativeResult<()> {
    if result == 0 { Err(NativeErrorCode::last()) } else { Ok(()) }
}

/// Takes ownership of the handle an open call wrote to `raw`.
fn opened(result: i32, raw: HANDLE) -> NativeResult<NativeHandle> {
    check(result)?;
    // SAFETY: the call succeeded, so `raw` is a new handle owned by the caller.
    Ok(unsafe { NativeHandle::from_raw_owned(raw) })
}

/// The Win32 implementation of [`NativeApi`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Api;

impl NativeApi for Win32Api {
    type Handle = NativeHandle;

    #[inline]
    fn current_process(&self) -> NativeHandle {
        // SAFETY: GetCurrentProcess is side-effect free and can be called unconditionally.
        NativeHandle::pseudo(unsafe { GetCurrentProcess() })
    }

    #[inline]
    fn current_thread(&self) -> NativeHandle {
        // SAFETY: GetCurrentThread is side-effect free and can be called unconditionally.
        NativeHandle::pseudo(unsafe { GetCurrentThread() })
    }

    fn open_process(&self, pid: u32, access: ProcessAccessRights) -> NativeResult<NativeHandle> {
        // SAFETY: plain FFI call; the result is checked below.
        let raw = unsafe { OpenProcess(access.bits(), 0, pid) };
        if raw.is_null() {
            return Err(NativeErrorCode::last());
        }
        // SAFETY: OpenProcess returned a new handle owned by the caller.
        Ok(unsafe { NativeHandle::from_raw_owned(raw) })
    }

    fn open_thread(&self, tid: u32, access: ThreadAccessRights) -> NativeResult<NativeHandle> {
        // SAFETY: plain FFI call; the result is checked below.
        let raw = unsafe { OpenThread(access.bits(), 0, tid) };
        if raw.is_null() {
            return Err(NativeErrorCode::last());
        }
        // SAFETY: OpenThread returned a new handle owned by the caller.
        Ok(unsafe { NativeHandle::from_raw_owned(raw) })
    }

    fn open_process_token(&self, process: &NativeHandle, access: TokenAccessRights) -> NativeResult<NativeHandle> {
        let mut raw: HANDLE = null_mut();
        // SAFETY: `raw` is a valid output location.
        let result = unsafe { OpenProcessToken(process.as_raw(), access.bits(), &raw mut raw) };
        opened(result, raw)
    }

    fn open_thread_token(
        &self,
        thread: &NativeHandle,
        access: TokenAccessRights,
        open_as_self: bool,
    ) -> NativeResult<NativeHandle> {
        let mut raw: HANDLE = null_mut();
        // SAFETY: `raw` is a valid output location.
        let result =
            unsafe { OpenThreadToken(thread.as_raw(), access.bits(), i32::from(open_as_self), &raw mut raw) };
        opened(result, raw)
    }

    fn get_token_information(
        &self,
        token: &NativeHandle,
        class: TokenInformationClass,
        buffer: &mut NativeBuffer,
        return_length: &mut u32,
    ) -> NativeResult<()> {
        #[expect(clippy::cast_possible_wrap, reason = "information classes are below 64")]
        let class = u32::from(class) as i32;
        let len = buffer.len_u32();
        // SAFETY: the buffer pointer is null with length zero or valid for `len` bytes.
        let result = unsafe {
            GetTokenInformation(token.as_raw(), class, buffer.as_mut_ptr().cast(), len, return_length)
        };
        check(result)
    }

    fn lookup_account_sid(&self, sid: &SecurityIdentifier) -> NativeResult<AccountLookup> {
        SidLookupOperation::new(sid)?.process()
    }

    fn lookup_account_name(&self, account: &DisplayAccount) -> NativeResult<SecurityIdentifier> {
        lookup::lookup_account_name(account)
    }

    fn get_object_security(
        &self,
        handle: &NativeHandle,
        sections: AccessControlSections,
    ) -> NativeResult<ObjectSecurity> {
        security::get_object_security(handle, sections)
    }

    fn set_object_security(&self, handle: &NativeHandle, update: &SecurityUpdate<'_>) -> NativeResult<()> {
        security::set_object_security(handle, update)
    }

    fn duplicate_token(&self, token: &NativeHandle, request: &DuplicateRequest<'_>) -> NativeResult<NativeHandle> {
        let mut descriptor = request.descriptor.map(AbsoluteDescriptor::new).transpose()?;
        let attributes = SECURITY_ATTRIBUTES {
            nLength: u32::try_from(size_of::<SECURITY_ATTRIBUTES>()).unwrap_or(u32::MAX),
            lpSecurityDescriptor: descriptor.as_mut().map_or(null_mut(), AbsoluteDescriptor::as_ptr),
            bInheritHandle: i32::from(request.inherit),
        };
        #[expect(clippy::cast_possible_wrap, reason = "levels and types are below 4")]
        let (level, token_type) = (
            u32::from(request.impersonation_level) as i32,
            u32::from(request.token_type) as i32,
        );
        let mut raw: HANDLE = null_mut();
        // SAFETY: `attributes` and the descriptor it points to outlive the call.
        let result = unsafe {
            DuplicateTokenEx(
                token.as_raw(),
                request.access.bits(),
                &raw const attributes,
                level,
                token_type,
                &raw mut raw,
            )
        };
        opened(result, raw)
    }

    fn impersonate(&self, token: &NativeHandle) -> NativeResult<()> {
        // SAFETY: plain FFI call on a token handle.
        check(unsafe { ImpersonateLoggedOnUser(token.as_raw()) })
    }

    fn revert_to_self(&self) -> NativeResult<()> {
        // SAFETY: plain FFI call.
        check(unsafe { RevertToSelf() })
    }

    fn get_handle_information(&self, handle: &NativeHandle) -> NativeResult<HandleFlags> {
        let mut flags = 0u32;
        // SAFETY: `flags` is a valid output location.
        check(unsafe { GetHandleInformation(handle.as_raw(), &raw mut flags) })?;
        Ok(HandleFlags::from_bits_truncate(flags))
    }

    fn set_handle_information(&self, handle: &NativeHandle, mask: HandleFlags, flags: HandleFlags) -> NativeResult<()> {
        // SAFETY: plain FFI call on a handle.
        check(unsafe { SetHandleInformation(handle.as_raw(), mask.bits(), flags.bits()) })
    }
}
