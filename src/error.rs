//! Error taxonomy shared by every operation of the crate.
//!
//! Native failures carry the Win32 error code (classified into
//! [`NativeErrorCode`]) and the name of the native operation that failed, so
//! a presentation layer can build a precise diagnostic without the crate ever
//! formatting user-facing messages itself.

use core::fmt::{self, Display};
use core::num::NonZeroU32;

use thiserror::Error;

/// Win32 error codes the crate branches on.
///
/// `windows-sys` is only available on Windows targets, while the
/// classification has to work everywhere the core logic is exercised.
pub mod codes {
    /// `ERROR_ACCESS_DENIED`
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    /// `ERROR_INVALID_HANDLE`
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    /// `ERROR_NOT_ENOUGH_MEMORY`
    pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
    /// `ERROR_BAD_LENGTH`
    pub const ERROR_BAD_LENGTH: u32 = 24;
    /// `ERROR_INVALID_PARAMETER`
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    /// `ERROR_INSUFFICIENT_BUFFER`
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    /// `ERROR_NO_TOKEN`
    pub const ERROR_NO_TOKEN: u32 = 1008;
    /// `ERROR_INVALID_OWNER`
    pub const ERROR_INVALID_OWNER: u32 = 1307;
    /// `ERROR_INVALID_PRIMARY_GROUP`
    pub const ERROR_INVALID_PRIMARY_GROUP: u32 = 1308;
    /// `ERROR_PRIVILEGE_NOT_HELD`
    pub const ERROR_PRIVILEGE_NOT_HELD: u32 = 1314;
    /// `ERROR_NONE_MAPPED`
    pub const ERROR_NONE_MAPPED: u32 = 1332;
    /// `ERROR_INVALID_SID`
    pub const ERROR_INVALID_SID: u32 = 1337;
    /// `ERROR_BAD_IMPERSONATION_LEVEL`
    pub const ERROR_BAD_IMPERSONATION_LEVEL: u32 = 1346;
    /// `ERROR_NO_SUCH_DOMAIN`
    pub const ERROR_NO_SUCH_DOMAIN: u32 = 1355;
    /// `ERROR_TRUSTED_DOMAIN_FAILURE`
    pub const ERROR_TRUSTED_DOMAIN_FAILURE: u32 = 1788;
}

use codes::*;

/// Classified Win32 error code returned by a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NativeErrorCode {
    /// The caller lacks the rights required by the call.
    #[error("access is denied")]
    AccessDenied,
    /// The handle is not valid for this call.
    #[error("the handle is invalid")]
    InvalidHandle,
    /// The system could not allocate memory for the call.
    #[error("not enough memory")]
    NotEnoughMemory,
    /// The supplied length does not match the data (too-small buffer variant).
    #[error("the program issued a command but the command length is incorrect")]
    BadLength,
    /// One or more parameters are invalid, also used by tokens lacking an attribute.
    #[error("the parameter is incorrect")]
    InvalidParameter,
    /// The supplied buffer is too small for the data.
    #[error("the data area passed to a system call is too small")]
    InsufficientBuffer,
    /// The thread is not impersonating and has no token.
    #[error("an attempt was made to reference a token that does not exist")]
    NoToken,
    /// The SID cannot be assigned as the owner of the object.
    #[error("this security ID may not be assigned as the owner of this object")]
    InvalidOwner,
    /// The SID cannot be assigned as the primary group of the object.
    #[error("this security ID may not be assigned as the primary group of an object")]
    InvalidPrimaryGroup,
    /// A required privilege is not held by the caller.
    #[error("a required privilege is not held by the client")]
    PrivilegeNotHeld,
    /// No mapping between account names and security IDs was done.
    #[error("no mapping between account names and security IDs was done")]
    NoneMapped,
    /// The SID is syntactically invalid.
    #[error("the security ID structure is invalid")]
    InvalidSid,
    /// The impersonation level is not sufficient for the operation.
    #[error("either a required impersonation level was not provided, or the provided impersonation level is invalid")]
    BadImpersonationLevel,
    /// The specified domain either does not exist or could not be contacted.
    #[error("the specified domain either does not exist or could not be contacted")]
    NoSuchDomain,
    /// Trust relationship issues with the domain.
    #[error("the trust relationship between the primary domain and the trusted domain failed")]
    TrustedDomainFailure,
    /// Any other Win32 error code.
    #[error("Win32 error {0} (0x{0:08X})")]
    Other(u32),
}

impl NativeErrorCode {
    /// Reads the last error of the calling thread after a failed Win32 call.
    #[cfg(windows)]
    #[must_use]
    pub fn last() -> Self {
        // SAFETY: GetLastError only reads thread-local state.
        let code = unsafe { windows_sys::Win32::Foundation::GetLastError() };
        // A failed call that left no last error is reported as a generic failure.
        NonZeroU32::new(code).map_or(Self::Other(0), Self::from)
    }

    /// Returns `true` for the two codes meaning "retry with a bigger buffer".
    #[inline]
    #[must_use]
    pub const fn is_buffer_too_small(self) -> bool {
        matches!(self, Self::InsufficientBuffer | Self::BadLength)
    }

    /// Raw Win32 error code.
    #[inline]
    #[must_use]
    pub fn code(self) -> u32 {
        self.into()
    }

    /// Coarse category for caller-side branching.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::AccessDenied | Self::PrivilegeNotHeld | Self::BadImpersonationLevel => {
                ErrorCategory::PermissionDenied
            }
            Self::InvalidParameter
            | Self::InvalidHandle
            | Self::InvalidSid
            | Self::InvalidOwner
            | Self::InvalidPrimaryGroup => ErrorCategory::InvalidArgument,
            Self::NoneMapped | Self::NoToken | Self::NoSuchDomain => ErrorCategory::ObjectNotFound,
            Self::NotEnoughMemory | Self::InsufficientBuffer | Self::BadLength => {
                ErrorCategory::ResourceUnavailable
            }
            Self::TrustedDomainFailure | Self::Other(_) => ErrorCategory::NotSpecified,
        }
    }
}

impl From<NonZeroU32> for NativeErrorCode {
    #[inline]
    fn from(code: NonZeroU32) -> Self {
        match code.get() {
            ERROR_ACCESS_DENIED => Self::AccessDenied,
            ERROR_INVALID_HANDLE => Self::InvalidHandle,
            ERROR_NOT_ENOUGH_MEMORY => Self::NotEnoughMemory,
            ERROR_BAD_LENGTH => Self::BadLength,
            ERROR_INVALID_PARAMETER => Self::InvalidParameter,
            ERROR_INSUFFICIENT_BUFFER => Self::InsufficientBuffer,
            ERROR_NO_TOKEN => Self::NoToken,
            ERROR_INVALID_OWNER => Self::InvalidOwner,
            ERROR_INVALID_PRIMARY_GROUP => Self::InvalidPrimaryGroup,
            ERROR_PRIVILEGE_NOT_HELD => Self::PrivilegeNotHeld,
            ERROR_NONE_MAPPED => Self::NoneMapped,
            ERROR_INVALID_SID => Self::InvalidSid,
            ERROR_BAD_IMPERSONATION_LEVEL => Self::BadImpersonationLevel,
            ERROR_NO_SUCH_DOMAIN => Self::NoSuchDomain,
            ERROR_TRUSTED_DOMAIN_FAILURE => Self::TrustedDomainFailure,
            other => Self::Other(other),
        }
    }
}

impl From<NativeErrorCode> for u32 {
    #[inline]
    fn from(error: NativeErrorCode) -> Self {
        match error {
            NativeErrorCode::AccessDenied => ERROR_ACCESS_DENIED,
            NativeErrorCode::InvalidHandle => ERROR_INVALID_HANDLE,
            NativeErrorCode::NotEnoughMemory => ERROR_NOT_ENOUGH_MEMORY,
            NativeErrorCode::BadLength => ERROR_BAD_LENGTH,
            NativeErrorCode::InvalidParameter => ERROR_INVALID_PARAMETER,
            NativeErrorCode::InsufficientBuffer => ERROR_INSUFFICIENT_BUFFER,
            NativeErrorCode::NoToken => ERROR_NO_TOKEN,
            NativeErrorCode::InvalidOwner => ERROR_INVALID_OWNER,
            NativeErrorCode::InvalidPrimaryGroup => ERROR_INVALID_PRIMARY_GROUP,
            NativeErrorCode::PrivilegeNotHeld => ERROR_PRIVILEGE_NOT_HELD,
            NativeErrorCode::NoneMapped => ERROR_NONE_MAPPED,
            NativeErrorCode::InvalidSid => ERROR_INVALID_SID,
            NativeErrorCode::BadImpersonationLevel => ERROR_BAD_IMPERSONATION_LEVEL,
            NativeErrorCode::NoSuchDomain => ERROR_NO_SUCH_DOMAIN,
            NativeErrorCode::TrustedDomainFailure => ERROR_TRUSTED_DOMAIN_FAILURE,
            NativeErrorCode::Other(other) => other,
        }
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<NativeErrorCode> for windows_result::HRESULT {
    #[inline]
    fn from(value: NativeErrorCode) -> Self {
        Self::from_win32(value.into())
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<NativeErrorCode> for windows_result::Error {
    #[inline]
    fn from(value: NativeErrorCode) -> Self {
        let hresult: windows_result::HRESULT = value.into();
        Self::from_hresult(hresult)
    }
}

/// Category of a native failure, mirroring how callers usually react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing rights or privileges.
    PermissionDenied,
    /// A supplied value was rejected.
    InvalidArgument,
    /// The referenced object, token or account does not exist.
    ObjectNotFound,
    /// Memory or buffer space was insufficient.
    ResourceUnavailable,
    /// Anything else.
    NotSpecified,
}

/// Where an identity was used when its translation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityRole {
    /// Owner of a security descriptor.
    Owner,
    /// Primary group of a security descriptor.
    Group,
    /// Identity of the access rule at this index.
    Rule(usize),
}

impl Display for IdentityRole {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => f.write_str("owner"),
            Self::Group => f.write_str("group"),
            Self::Rule(index) => write!(f, "access rule {index}"),
        }
    }
}

/// Errors returned by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A native call reported failure.
    #[error("{operation} failed{}: {code}", target.as_ref().map(|t| format!(" for {t}")).unwrap_or_default())]
    Native {
        /// Name of the native operation.
        operation: &'static str,
        /// The attribute, handle or identity involved, when known.
        target: Option<String>,
        /// Classified error code.
        code: NativeErrorCode,
    },

    /// Neither the OS service nor the fallback table could translate the identity.
    #[error("some or all identity references could not be translated: {identity}{}", role.map(|r| format!(" ({r})")).unwrap_or_default())]
    IdentityNotMapped {
        /// The identity as it was supplied.
        identity: String,
        /// Where the identity was used, if it was part of a composition.
        role: Option<IdentityRole>,
    },

    /// The combination of inputs is self-contradictory; nothing was sent to the OS.
    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    /// An allocation failed. Never retried.
    #[error("failed to allocate {size} bytes")]
    ResourceExhausted {
        /// Requested allocation size.
        size: usize,
    },

    /// The OS returned data that does not decode as the expected structure.
    #[error("malformed native data: {0}")]
    MalformedData(&'static str),

    /// An access-control list could not be decoded.
    #[error(transparent)]
    InvalidAcl(#[from] crate::acl::AclFormatError),
}

impl Error {
    /// Builds a [`Error::Native`] without target context.
    #[inline]
    #[must_use]
    pub const fn native(operation: &'static str, code: NativeErrorCode) -> Self {
        Self::Native {
            operation,
            target: None,
            code,
        }
    }

    /// Builds a [`Error::Native`] naming the attribute, handle or identity involved.
    #[inline]
    pub fn native_for<T: Display>(operation: &'static str, target: T, code: NativeErrorCode) -> Self {
        Self::Native {
            operation,
            target: Some(target.to_string()),
            code,
        }
    }

    /// Native error code carried by this error, if any.
    #[inline]
    #[must_use]
    pub const fn native_code(&self) -> Option<NativeErrorCode> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when the error means an identity could not be translated.
    #[inline]
    #[must_use]
    pub const fn is_identity_not_mapped(&self) -> bool {
        matches!(
            self,
            Self::IdentityNotMapped { .. }
                | Self::Native {
                    code: NativeErrorCode::NoneMapped,
                    ..
                }
        )
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;
