use core::mem::size_of;
use core::num::NonZeroU32;
use core::ptr::{null, null_mut};

use windows_sys::Win32::Foundation::LocalFree;
use windows_sys::Win32::Security::Authorization::{GetSecurityInfo, SE_KERNEL_OBJECT, SetSecurityInfo};
use windows_sys::Win32::Security::{
    ACL, InitializeSecurityDescriptor, PSECURITY_DESCRIPTOR, PSID, SECURITY_DESCRIPTOR,
    SetSecurityDescriptorDacl, SetSecurityDescriptorGroup, SetSecurityDescriptorOwner,
};

use super::handle::NativeHandle;
use super::lookup::native_sid;
use crate::acl::RawAcl;
use crate::buffer::NativeBuffer;
use crate::descriptor::{AccessControlSections, Dacl, SecurityDescriptor};
use crate::error::NativeErrorCode;
use crate::native::{NativeResult, ObjectSecurity, SecurityUpdate};
use crate::SecurityIdentifier;

/// `SECURITY_DESCRIPTOR_REVISION`
const SECURITY_DESCRIPTOR_REVISION: u32 = 1;
/// `ERROR_INVALID_ACL`
const ERROR_INVALID_ACL: u32 = 1336;

fn status(code: u32) -> NativeResult<()> {
    NonZeroU32::new(code).map_or(Ok(()), |code| Err(code.into()))
}

fn check(result: i32) -> NativeResult<()> {
    if result == 0 { Err(NativeErrorCode::last()) } else { Ok(()) }
}

/// Security descriptor allocated by the system, freed with `LocalFree`.
struct LocalDescriptor(PSECURITY_DESCRIPTOR);

impl Drop for LocalDescriptor {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer was returned by `GetSecurityInfo` and is freed once.
            unsafe { LocalFree(self.0) };
        }
    }
}

/// Native ACL for `dacl`; `None` for a null DACL.
fn native_acl(dacl: &Dacl) -> NativeResult<Option<NativeBuffer>> {
    match dacl {
        Dacl::Null => Ok(None),
        Dacl::Acl(acl) => {
            let bytes = acl
                .to_bytes()
                .map_err(|_| NativeErrorCode::Other(ERROR_INVALID_ACL))?;
            NativeBuffer::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| NativeErrorCode::NotEnoughMemory)
        }
    }
}

fn acl_ptr(acl: Option<&NativeBuffer>) -> *const ACL {
    acl.map_or(null(), |acl| acl.as_ptr().cast())
}

pub(super) fn get_object_security(
    handle: &NativeHandle,
    sections: AccessControlSections,
) -> NativeResult<ObjectSecurity> {
    let mut owner: PSID = null_mut();
    let mut group: PSID = null_mut();
    let mut dacl: *mut ACL = null_mut();
    let mut descriptor: PSECURITY_DESCRIPTOR = null_mut();
    // SAFETY: every output pointer is valid; the descriptor is freed by the guard below.
    let code = unsafe {
        GetSecurityInfo(
            handle.as_raw(),
            SE_KERNEL_OBJECT,
            sections.bits(),
            &raw mut owner,
            &raw mut group,
            &raw mut dacl,
            null_mut(),
            &raw mut descriptor,
        )
    };
    status(code)?;
    let _guard = LocalDescriptor(descriptor);

    let read_sid = |ptr: PSID| -> NativeResult<Option<SecurityIdentifier>> {
        if ptr.is_null() {
            return Ok(None);
        }
        // SAFETY: the pointer refers into the descriptor kept alive by `_guard`.
        unsafe { SecurityIdentifier::from_raw(ptr.cast_const().cast()) }
            .map(Some)
            .map_err(|_| NativeErrorCode::InvalidSid)
    };
    let owner = if sections.contains(AccessControlSections::OWNER) { read_sid(owner)? } else { None };
    let group = if sections.contains(AccessControlSections::GROUP) { read_sid(group)? } else { None };
    let dacl = if sections.contains(AccessControlSections::ACCESS) {
        if dacl.is_null() {
            Some(Dacl::Null)
        } else {
            // SAFETY: the ACL lives in the descriptor kept alive by `_guard`.
            let acl = unsafe { RawAcl::from_raw(dacl.cast_const().cast()) }
                .map_err(|_| NativeErrorCode::Other(ERROR_INVALID_ACL))?;
            Some(Dacl::Acl(acl))
        }
    } else {
        None
    };
    Ok(ObjectSecurity { owner, group, dacl })
}

pub(super) fn set_object_security(handle: &NativeHandle, update: &SecurityUpdate<'_>) -> NativeResult<()> {
    let owner = update.owner.map(native_sid).transpose()?;
    let group = update.group.map(native_sid).transpose()?;
    let dacl = match update.dacl {
        Some(dacl) => native_acl(dacl)?,
        None => None,
    };
    let sid_ptr = |sid: Option<&NativeBuffer>| -> PSID { sid.map_or(null_mut(), |sid| sid.as_ptr().cast_mut().cast()) };
    // SAFETY: the SID and ACL buffers outlive the call. A null DACL with the
    // DACL section requested sets a null DACL.
    let code = unsafe {
        SetSecurityInfo(
            handle.as_raw(),
            SE_KERNEL_OBJECT,
            update.sections().bits(),
            sid_ptr(owner.as_ref()),
            sid_ptr(group.as_ref()),
            acl_ptr(dacl.as_ref()),
            null(),
        )
    };
    status(code)
}

/// An absolute-format native security descriptor and the memory it points to.
pub(super) struct AbsoluteDescriptor {
    descriptor: NativeBuffer,
    _owner: Option<NativeBuffer>,
    _group: Option<NativeBuffer>,
    _dacl: Option<NativeBuffer>,
}

impl AbsoluteDescriptor {
    pub fn new(source: &SecurityDescriptor) -> NativeResult<Self> {
        let mut descriptor =
            NativeBuffer::acquire(size_of::<SECURITY_DESCRIPTOR>()).map_err(|_| NativeErrorCode::NotEnoughMemory)?;
        let psd: PSECURITY_DESCRIPTOR = descriptor.as_mut_ptr().cast();
        // SAFETY: `psd` points to enough pointer-aligned memory for a descriptor.
        check(unsafe { InitializeSecurityDescriptor(psd, SECURITY_DESCRIPTOR_REVISION) })?;

        let owner = source.owner().map(native_sid).transpose()?;
        if let Some(owner) = &owner {
            // SAFETY: `owner` is kept alive alongside the descriptor.
            check(unsafe { SetSecurityDescriptorOwner(psd, owner.as_ptr().cast_mut().cast(), 0) })?;
        }
        let group = source.group().map(native_sid).transpose()?;
        if let Some(group) = &group {
            // SAFETY: `group` is kept alive alongside the descriptor.
            check(unsafe { SetSecurityDescriptorGroup(psd, group.as_ptr().cast_mut().cast(), 0) })?;
        }
        let mut dacl = None;
        if let Some(source_dacl) = source.dacl() {
            dacl = native_acl(source_dacl)?;
            // SAFETY: the ACL, if any, is kept alive alongside the descriptor;
            // a present null DACL grants everyone access.
            check(unsafe { SetSecurityDescriptorDacl(psd, 1, acl_ptr(dacl.as_ref()), 0) })?;
        }
        Ok(Self {
            descriptor,
            _owner: owner,
            _group: group,
            _dacl: dacl,
        })
    }

    pub fn as_ptr(&mut self) -> PSECURITY_DESCRIPTOR {
        self.descriptor.as_mut_ptr().cast()
    }
}
