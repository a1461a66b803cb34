//! The seam between the security algorithms and the operating system.
//!
//! Every algorithm in this crate talks to the OS through [`NativeApi`]. The
//! Windows implementation lives in `win32`; tests substitute a scripted
//! implementation so the retry protocol, the translation fallback and the
//! descriptor defaults can be exercised on any platform.

use crate::account::DisplayAccount;
use crate::buffer::NativeBuffer;
use crate::descriptor::{AccessControlSections, Dacl, SecurityDescriptor};
use crate::error::NativeErrorCode;
use crate::handle::HandleFlags;
use crate::rights::{ProcessAccessRights, ThreadAccessRights, TokenAccessRights};
use crate::sid_type::SidType;
use crate::token_info::{ImpersonationLevel, TokenInformationClass, TokenType};
use crate::SecurityIdentifier;

/// Result of a raw native call: the value, or the classified Win32 error.
pub type NativeResult<T> = core::result::Result<T, NativeErrorCode>;

/// Outcome of an account lookup by SID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLookup {
    /// The resolved `DOMAIN\Name`.
    pub account: DisplayAccount,
    /// Raw `SID_NAME_USE` value reported by the OS.
    pub sid_type_raw: i32,
}

impl AccountLookup {
    /// Typed SID kind, if the OS reported a known value.
    #[inline]
    #[must_use]
    pub fn sid_type(&self) -> Option<SidType> {
        SidType::try_from(self.sid_type_raw).ok()
    }
}

/// Owner, group and DACL as read from a kernel object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectSecurity {
    /// Owner, when requested.
    pub owner: Option<SecurityIdentifier>,
    /// Primary group, when requested.
    pub group: Option<SecurityIdentifier>,
    /// DACL, when requested. `Some(Dacl::Null)` is a present-but-null DACL.
    pub dacl: Option<Dacl>,
}

/// The sections of a descriptor to write to a kernel object.
///
/// A `None` field is not written at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityUpdate<'a> {
    /// New owner.
    pub owner: Option<&'a SecurityIdentifier>,
    /// New primary group.
    pub group: Option<&'a SecurityIdentifier>,
    /// New DACL.
    pub dacl: Option<&'a Dacl>,
}

impl SecurityUpdate<'_> {
    /// Sections this update writes.
    #[must_use]
    pub fn sections(&self) -> AccessControlSections {
        let mut sections = AccessControlSections::empty();
        sections.set(AccessControlSections::OWNER, self.owner.is_some());
        sections.set(AccessControlSections::GROUP, self.group.is_some());
        sections.set(AccessControlSections::ACCESS, self.dacl.is_some());
        sections
    }
}

/// Parameters of a token duplication.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateRequest<'a> {
    /// Rights on the new token.
    pub access: TokenAccessRights,
    /// Whether the new handle is inheritable by child processes.
    pub inherit: bool,
    /// Security descriptor of the new token; `None` lets the OS pick the default.
    pub descriptor: Option<&'a SecurityDescriptor>,
    /// Impersonation level of the new token.
    pub impersonation_level: ImpersonationLevel,
    /// Primary or impersonation token.
    pub token_type: TokenType,
}

/// Native operations the crate needs from the operating system.
///
/// Implementations report failures as raw [`NativeErrorCode`]s; callers
/// attach the operation name and context.
pub trait NativeApi {
    /// An owned, closeable kernel handle.
    type Handle;

    /// Pseudo-handle for the current process. Never needs closing.
    fn current_process(&self) -> Self::Handle;

    /// Pseudo-handle for the current thread. Never needs closing.
    fn current_thread(&self) -> Self::Handle;

    /// Opens another process by id.
    fn open_process(&self, pid: u32, access: ProcessAccessRights) -> NativeResult<Self::Handle>;

    /// Opens a thread by id.
    fn open_thread(&self, tid: u32, access: ThreadAccessRights) -> NativeResult<Self::Handle>;

    /// Opens the primary token of a process.
    fn open_process_token(
        &self,
        process: &Self::Handle,
        access: TokenAccessRights,
    ) -> NativeResult<Self::Handle>;

    /// Opens the impersonation token of a thread. Fails with
    /// [`NativeErrorCode::NoToken`] when the thread is not impersonating.
    fn open_thread_token(
        &self,
        thread: &Self::Handle,
        access: TokenAccessRights,
        open_as_self: bool,
    ) -> NativeResult<Self::Handle>;

    /// One `GetTokenInformation` call.
    ///
    /// Writes at most `buffer.len()` bytes and always stores the size the OS
    /// reports in `return_length`: the required size when the buffer is too
    /// small, the written size on success.
    fn get_token_information(
        &self,
        token: &Self::Handle,
        class: TokenInformationClass,
        buffer: &mut NativeBuffer,
        return_length: &mut u32,
    ) -> NativeResult<()>;

    /// Resolves a SID to its account name.
    fn lookup_account_sid(&self, sid: &SecurityIdentifier) -> NativeResult<AccountLookup>;

    /// Resolves an account name to its SID.
    fn lookup_account_name(&self, account: &DisplayAccount) -> NativeResult<SecurityIdentifier>;

    /// Reads the requested sections of a kernel object's security descriptor.
    fn get_object_security(
        &self,
        handle: &Self::Handle,
        sections: AccessControlSections,
    ) -> NativeResult<ObjectSecurity>;

    /// Writes the sections present in `update`.
    fn set_object_security(
        &self,
        handle: &Self::Handle,
        update: &SecurityUpdate<'_>,
    ) -> NativeResult<()>;

    /// Duplicates a token.
    fn duplicate_token(
        &self,
        token: &Self::Handle,
        request: &DuplicateRequest<'_>,
    ) -> NativeResult<Self::Handle>;

    /// Makes the calling thread impersonate `token`.
    fn impersonate(&self, token: &Self::Handle) -> NativeResult<()>;

    /// Ends impersonation on the calling thread.
    fn revert_to_self(&self) -> NativeResult<()>;

    /// Reads the inherit/protect flags of a handle.
    fn get_handle_information(&self, handle: &Self::Handle) -> NativeResult<HandleFlags>;

    /// Sets the flags selected by `mask` to their value in `flags`.
    fn set_handle_information(
        &self,
        handle: &Self::Handle,
        mask: HandleFlags,
        flags: HandleFlags,
    ) -> NativeResult<()>;
}
