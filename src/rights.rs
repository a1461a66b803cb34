//! Typed access masks for tokens, processes and threads.
//!
//! Every typed right widens to the plain 32-bit [`AccessMask`] through
//! [`AccessRight::to_mask`]; that is the only place such a conversion happens.

use bitflags::bitflags;

/// Plain 32-bit access mask as stored in access-control entries.
pub type AccessMask = u32;

/// A set of rights that can be stored in an access-control entry.
pub trait AccessRight: Copy + core::fmt::Debug {
    /// Widens to the raw mask.
    fn to_mask(self) -> AccessMask;

    /// Narrows from a raw mask. Bits with no meaning for `Self` are dropped.
    fn from_mask(mask: AccessMask) -> Self;
}

impl AccessRight for AccessMask {
    #[inline]
    fn to_mask(self) -> AccessMask {
        self
    }

    #[inline]
    fn from_mask(mask: AccessMask) -> Self {
        mask
    }
}

/// `DELETE | READ_CONTROL | WRITE_DAC | WRITE_OWNER`
const STANDARD_RIGHTS_REQUIRED: u32 = 0x000F_0000;
const STANDARD_SYNCHRONIZE: u32 = 0x0010_0000;

bitflags! {
    /// Rights on an access token.
    #[derive(Default)]
    pub struct TokenAccessRights: u32 {
        /// Attach a primary token to a process.
        const ASSIGN_PRIMARY = 0x0001;
        /// Duplicate the token.
        const DUPLICATE = 0x0002;
        /// Attach an impersonation token to a thread.
        const IMPERSONATE = 0x0004;
        /// Query the token.
        const QUERY = 0x0008;
        /// Query the token source.
        const QUERY_SOURCE = 0x0010;
        /// Enable or disable privileges.
        const ADJUST_PRIVILEGES = 0x0020;
        /// Adjust group attributes.
        const ADJUST_GROUPS = 0x0040;
        /// Change the default owner, primary group or DACL.
        const ADJUST_DEFAULT = 0x0080;
        /// Adjust the session ID.
        const ADJUST_SESSION_ID = 0x0100;
        /// Delete the object.
        const DELETE = 0x0001_0000;
        /// Read the security descriptor, except the SACL.
        const READ_CONTROL = 0x0002_0000;
        /// Modify the DACL.
        const WRITE_DAC = 0x0004_0000;
        /// Change the owner.
        const WRITE_OWNER = 0x0008_0000;
        /// Read or write the SACL.
        const ACCESS_SYSTEM_SECURITY = 0x0100_0000;
        /// Every right the caller is granted.
        const MAXIMUM_ALLOWED = 0x0200_0000;
        /// All token-specific and standard rights.
        const ALL_ACCESS = STANDARD_RIGHTS_REQUIRED | 0x01FF;
    }
}

bitflags! {
    /// Rights on a process.
    #[derive(Default)]
    pub struct ProcessAccessRights: u32 {
        /// Terminate the process.
        const TERMINATE = 0x0001;
        /// Create a thread in the process.
        const CREATE_THREAD = 0x0002;
        /// Change the session ID.
        const SET_SESSION_ID = 0x0004;
        /// Operate on the address space.
        const VM_OPERATION = 0x0008;
        /// Read memory.
        const VM_READ = 0x0010;
        /// Write memory.
        const VM_WRITE = 0x0020;
        /// Duplicate handles.
        const DUP_HANDLE = 0x0040;
        /// Create a child process.
        const CREATE_PROCESS = 0x0080;
        /// Set memory quotas.
        const SET_QUOTA = 0x0100;
        /// Set process information.
        const SET_INFORMATION = 0x0200;
        /// Query process information, including its token.
        const QUERY_INFORMATION = 0x0400;
        /// Suspend or resume.
        const SUSPEND_RESUME = 0x0800;
        /// Query a restricted set of information.
        const QUERY_LIMITED_INFORMATION = 0x1000;
        /// Delete the object.
        const DELETE = 0x0001_0000;
        /// Read the security descriptor.
        const READ_CONTROL = 0x0002_0000;
        /// Modify the DACL.
        const WRITE_DAC = 0x0004_0000;
        /// Change the owner.
        const WRITE_OWNER = 0x0008_0000;
        /// Wait on the process.
        const SYNCHRONIZE = STANDARD_SYNCHRONIZE;
        /// Every process right.
        const ALL_ACCESS = STANDARD_RIGHTS_REQUIRED | STANDARD_SYNCHRONIZE | 0xFFFF;
    }
}

bitflags! {
    /// Rights on a thread.
    #[derive(Default)]
    pub struct ThreadAccessRights: u32 {
        /// Terminate the thread.
        const TERMINATE = 0x0001;
        /// Suspend or resume.
        const SUSPEND_RESUME = 0x0002;
        /// Read the context.
        const GET_CONTEXT = 0x0008;
        /// Write the context.
        const SET_CONTEXT = 0x0010;
        /// Set thread information.
        const SET_INFORMATION = 0x0020;
        /// Query thread information, including its token.
        const QUERY_INFORMATION = 0x0040;
        /// Set the impersonation token.
        const SET_THREAD_TOKEN = 0x0080;
        /// Impersonate the thread's security context.
        const IMPERSONATE = 0x0100;
        /// Impersonate via the direct path.
        const DIRECT_IMPERSONATION = 0x0200;
        /// Set a restricted set of information.
        const SET_LIMITED_INFORMATION = 0x0400;
        /// Query a restricted set of information.
        const QUERY_LIMITED_INFORMATION = 0x0800;
        /// Delete the object.
        const DELETE = 0x0001_0000;
        /// Read the security descriptor.
        const READ_CONTROL = 0x0002_0000;
        /// Modify the DACL.
        const WRITE_DAC = 0x0004_0000;
        /// Change the owner.
        const WRITE_OWNER = 0x0008_0000;
        /// Wait on the thread.
        const SYNCHRONIZE = STANDARD_SYNCHRONIZE;
        /// Every thread right.
        const ALL_ACCESS = STANDARD_RIGHTS_REQUIRED | STANDARD_SYNCHRONIZE | 0xFFFF;
    }
}

macro_rules! impl_access_right {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl AccessRight for $ty {
                #[inline]
                fn to_mask(self) -> AccessMask {
                    self.bits()
                }

                #[inline]
                fn from_mask(mask: AccessMask) -> Self {
                    Self::from_bits_truncate(mask)
                }
            }
        )+
    };
}

impl_access_right!(TokenAccessRights, ProcessAccessRights, ThreadAccessRights);
