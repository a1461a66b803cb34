//! Reading token attributes whose size is only known after asking.
//!
//! [`query_token_attribute`] runs the size-probe protocol: the first call
//! passes the null buffer, the OS answers with one of the two "too small"
//! codes and the size it needs, and the next call passes a buffer of exactly
//! that size. The typed getters decode the structures the OS writes, whose
//! pointer fields refer to data stored later in the same buffer.

use core::fmt::{self, Display};
use core::mem::size_of;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::{debug, trace};

use crate::acl::RawAcl;
use crate::buffer::NativeBuffer;
use crate::error::NativeErrorCode;
use crate::native::NativeApi;
use crate::{Error, Result, SecurityIdentifier};

/// Upper bound on `GetTokenInformation` calls for one attribute.
///
/// One probe plus one sized call is the normal case; the extra rounds absorb
/// an attribute that grows between the two calls.
pub const MAX_QUERY_ATTEMPTS: usize = 4;

const PTR_SIZE: usize = size_of::<usize>();
/// `SID_AND_ATTRIBUTES`: a pointer followed by a `u32`, padded to pointer alignment.
const SID_AND_ATTRIBUTES_SIZE: usize = 2 * PTR_SIZE;

/// `TOKEN_INFORMATION_CLASS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum TokenInformationClass {
    User = 1,
    Groups = 2,
    Privileges = 3,
    Owner = 4,
    PrimaryGroup = 5,
    DefaultDacl = 6,
    Source = 7,
    Type = 8,
    ImpersonationLevel = 9,
    Statistics = 10,
    RestrictedSids = 11,
    SessionId = 12,
    GroupsAndPrivileges = 13,
    SessionReference = 14,
    SandBoxInert = 15,
    AuditPolicy = 16,
    Origin = 17,
    ElevationType = 18,
    LinkedToken = 19,
    Elevation = 20,
    HasRestrictions = 21,
    AccessInformation = 22,
    VirtualizationAllowed = 23,
    VirtualizationEnabled = 24,
    IntegrityLevel = 25,
    UiAccess = 26,
    MandatoryPolicy = 27,
    LogonSid = 28,
    IsAppContainer = 29,
    Capabilities = 30,
    AppContainerSid = 31,
    AppContainerNumber = 32,
    UserClaimAttributes = 33,
    DeviceClaimAttributes = 34,
    RestrictedUserClaimAttributes = 35,
    RestrictedDeviceClaimAttributes = 36,
    DeviceGroups = 37,
    RestrictedDeviceGroups = 38,
    SecurityAttributes = 39,
    IsRestricted = 40,
    ProcessTrustLevel = 41,
    PrivateNameSpace = 42,
    SingletonAttributes = 43,
    BnoIsolation = 44,
    ChildProcessFlags = 45,
    IsLessPrivilegedAppContainer = 46,
    IsSandboxed = 47,
    OriginatingProcessTrustLevel = 48,
}

impl Display for TokenInformationClass {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `TOKEN_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum TokenType {
    /// Token attached to a process.
    #[default]
    Primary = 1,
    /// Token attached to a thread.
    Impersonation = 2,
}

/// `SECURITY_IMPERSONATION_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum ImpersonationLevel {
    /// The server cannot identify the client.
    Anonymous = 0,
    /// The server can identify the client but not act as it.
    Identification = 1,
    /// The server can act as the client on the local system.
    #[default]
    Impersonation = 2,
    /// The server can act as the client on remote systems.
    Delegation = 3,
}

bitflags! {
    /// `SE_GROUP_*` attributes of a token group.
    #[derive(Default)]
    pub struct GroupAttributes: u32 {
        /// The group cannot be disabled.
        const MANDATORY = 0x0000_0001;
        /// The group is enabled by default.
        const ENABLED_BY_DEFAULT = 0x0000_0002;
        /// The group is enabled for access checks.
        const ENABLED = 0x0000_0004;
        /// The group may be assigned as owner.
        const OWNER = 0x0000_0008;
        /// The group only matches deny entries.
        const USE_FOR_DENY_ONLY = 0x0000_0010;
        /// Mandatory integrity label.
        const INTEGRITY = 0x0000_0020;
        /// Integrity label enabled for checks.
        const INTEGRITY_ENABLED = 0x0000_0040;
        /// Domain-local group.
        const RESOURCE = 0x2000_0000;
        /// Logon-session SID.
        const LOGON_ID = 0xC000_0000;
    }
}

/// One entry of the token's group list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup {
    /// Group SID.
    pub sid: SecurityIdentifier,
    /// Attributes.
    pub attributes: GroupAttributes,
}

/// Fetches the raw bytes of one token attribute.
///
/// # Errors
/// - [`Error::Native`] naming `GetTokenInformation` and the attribute, for
///   any failure other than "buffer too small", and when the reported size
///   does not grow after a resize or the attempts run out.
/// - [`Error::ResourceExhausted`] if the buffer cannot be allocated.
pub fn query_token_attribute<A: NativeApi + ?Sized>(
    api: &A,
    token: &A::Handle,
    class: TokenInformationClass,
) -> Result<NativeBuffer> {
    let mut buffer = NativeBuffer::null();
    let mut last_code = NativeErrorCode::InsufficientBuffer;
    for attempt in 1..=MAX_QUERY_ATTEMPTS {
        let mut required = 0u32;
        match api.get_token_information(token, class, &mut buffer, &mut required) {
            Ok(()) => {
                if required > 0 {
                    buffer.truncate(required as usize);
                }
                debug!(%class, len = buffer.len(), attempt, "read token attribute");
                return Ok(buffer);
            }
            Err(code) if code.is_buffer_too_small() => {
                let required = required as usize;
                if required <= buffer.len() {
                    // The OS keeps answering "too small" for a size it was given.
                    return Err(Error::native_for("GetTokenInformation", class, code));
                }
                trace!(%class, required, attempt, "resizing token information buffer");
                // Assigning drops, and so frees, the previous buffer.
                buffer = NativeBuffer::acquire(required)?;
                last_code = code;
            }
            Err(code) => return Err(Error::native_for("GetTokenInformation", class, code)),
        }
    }
    Err(Error::native_for("GetTokenInformation", class, last_code))
}

fn malformed(class: TokenInformationClass) -> Error {
    debug!(%class, "token attribute did not decode");
    Error::MalformedData("token information does not match its structure")
}

/// Decodes the SID a pointer field at `offset` refers to.
fn sid_at_pointer(buffer: &NativeBuffer, offset: usize, class: TokenInformationClass) -> Result<SecurityIdentifier> {
    let address = buffer.read_usize(offset).ok_or_else(|| malformed(class))?;
    let tail = buffer.tail_at_address(address).ok_or_else(|| malformed(class))?;
    SecurityIdentifier::from_prefix(tail)
        .map(|(sid, _)| sid)
        .map_err(|_| malformed(class))
}

fn read_u32_attribute<A: NativeApi + ?Sized>(
    api: &A,
    token: &A::Handle,
    class: TokenInformationClass,
) -> Result<u32> {
    let buffer = query_token_attribute(api, token, class)?;
    buffer.read_u32(0).ok_or_else(|| malformed(class))
}

fn read_groups(buffer: &NativeBuffer, class: TokenInformationClass) -> Result<Vec<TokenGroup>> {
    let count = buffer.read_u32(0).ok_or_else(|| malformed(class))? as usize;
    // The array starts after the count, aligned to pointer size.
    (0..count)
        .map(|index| {
            let entry = index
                .checked_mul(SID_AND_ATTRIBUTES_SIZE)
                .and_then(|offset| offset.checked_add(PTR_SIZE))
                .ok_or_else(|| malformed(class))?;
            let sid = sid_at_pointer(buffer, entry, class)?;
            let attributes = entry
                .checked_add(PTR_SIZE)
                .and_then(|offset| buffer.read_u32(offset))
                .ok_or_else(|| malformed(class))?;
            Ok(TokenGroup {
                sid,
                attributes: GroupAttributes::from_bits_truncate(attributes),
            })
        })
        .collect()
}

/// The user the token represents (`TokenUser`).
///
/// # Errors
/// See [`query_token_attribute`]; [`Error::MalformedData`] if the structure does not decode.
pub fn user<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<SecurityIdentifier> {
    let class = TokenInformationClass::User;
    let buffer = query_token_attribute(api, token, class)?;
    sid_at_pointer(&buffer, 0, class)
}

/// Default owner of objects created with the token (`TokenOwner`).
///
/// # Errors
/// See [`user`].
pub fn owner<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<SecurityIdentifier> {
    let class = TokenInformationClass::Owner;
    let buffer = query_token_attribute(api, token, class)?;
    sid_at_pointer(&buffer, 0, class)
}

/// Default primary group of objects created with the token (`TokenPrimaryGroup`).
///
/// # Errors
/// See [`user`].
pub fn primary_group<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<SecurityIdentifier> {
    let class = TokenInformationClass::PrimaryGroup;
    let buffer = query_token_attribute(api, token, class)?;
    sid_at_pointer(&buffer, 0, class)
}

/// Default DACL of objects created with the token (`TokenDefaultDacl`).
///
/// `None` when the token carries no default DACL.
///
/// # Errors
/// See [`user`].
pub fn default_dacl<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<Option<RawAcl>> {
    let class = TokenInformationClass::DefaultDacl;
    let buffer = query_token_attribute(api, token, class)?;
    let address = buffer.read_usize(0).ok_or_else(|| malformed(class))?;
    if address == 0 {
        return Ok(None);
    }
    let tail = buffer.tail_at_address(address).ok_or_else(|| malformed(class))?;
    Ok(Some(RawAcl::from_bytes(tail)?))
}

/// Primary or impersonation token (`TokenType`).
///
/// # Errors
/// See [`user`].
pub fn token_type<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<TokenType> {
    let class = TokenInformationClass::Type;
    let raw = read_u32_attribute(api, token, class)?;
    TokenType::try_from(raw).map_err(|_| malformed(class))
}

/// Impersonation level (`TokenImpersonationLevel`).
///
/// `None` for primary tokens, for which the OS rejects the query with
/// `ERROR_INVALID_PARAMETER`.
///
/// # Errors
/// See [`user`].
pub fn impersonation_level<A: NativeApi + ?Sized>(
    api: &A,
    token: &A::Handle,
) -> Result<Option<ImpersonationLevel>> {
    let class = TokenInformationClass::ImpersonationLevel;
    match read_u32_attribute(api, token, class) {
        Ok(raw) => ImpersonationLevel::try_from(raw)
            .map(Some)
            .map_err(|_| malformed(class)),
        Err(Error::Native {
            code: NativeErrorCode::InvalidParameter,
            ..
        }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Mandatory integrity label (`TokenIntegrityLevel`).
///
/// # Errors
/// See [`user`].
pub fn integrity_level<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<SecurityIdentifier> {
    let class = TokenInformationClass::IntegrityLevel;
    let buffer = query_token_attribute(api, token, class)?;
    sid_at_pointer(&buffer, 0, class)
}

/// Groups of the token (`TokenGroups`).
///
/// # Errors
/// See [`user`].
pub fn groups<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<Vec<TokenGroup>> {
    let class = TokenInformationClass::Groups;
    let buffer = query_token_attribute(api, token, class)?;
    read_groups(&buffer, class)
}

/// Terminal-services session of the token (`TokenSessionId`).
///
/// # Errors
/// See [`user`].
pub fn session_id<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<u32> {
    read_u32_attribute(api, token, TokenInformationClass::SessionId)
}

/// Logon-session SID (`TokenLogonSid`), `None` when the token has none.
///
/// # Errors
/// See [`user`].
pub fn logon_sid<A: NativeApi + ?Sized>(api: &A, token: &A::Handle) -> Result<Option<SecurityIdentifier>> {
    let class = TokenInformationClass::LogonSid;
    let buffer = query_token_attribute(api, token, class)?;
    Ok(read_groups(&buffer, class)?.into_iter().next().map(|group| group.sid))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use crate::acl::{AceFlags, AceType, RawAce};
    use crate::test_support::{MockApi, MockToken};
    use crate::well_known;
    use proptest::prelude::*;

    #[test]
    fn oversized_group_count_is_malformed() {
        let mut bytes = vec![0u8; PTR_SIZE];
        bytes[..4].copy_from_slice(&u32::MAX.to_ne_bytes());
        let buffer = NativeBuffer::from_bytes(&bytes).unwrap();
        let err = read_groups(&buffer, TokenInformationClass::Groups).unwrap_err();
        assert!(matches!(err, Error::MalformedData(_)));
    }

    #[test]
    fn probe_then_sized_call() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let sid = user(&api, &token).unwrap();
        assert_eq!(sid, api.process_token().user);
        assert_eq!(api.query_sizes(TokenInformationClass::User), [0, api.required_size(TokenInformationClass::User)]);
    }

    #[test]
    fn bad_length_is_also_retried() {
        let api = MockApi::new();
        api.set_too_small_code(NativeErrorCode::BadLength);
        let token = api.process_token_handle();
        assert_eq!(owner(&api, &token).unwrap(), api.process_token().owner);
    }

    #[test]
    fn growth_between_calls_is_absorbed_up_to_the_bound() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        api.set_growth(TokenInformationClass::Groups, 2);
        assert_eq!(groups(&api, &token).unwrap().len(), api.process_token().groups.len());
        assert_eq!(api.query_sizes(TokenInformationClass::Groups).len(), 4);

        api.set_growth(TokenInformationClass::Groups, 3);
        let err = groups(&api, &token).unwrap_err();
        assert_eq!(err.native_code(), Some(NativeErrorCode::InsufficientBuffer));
    }

    #[test]
    fn persistent_too_small_without_growth_is_fatal() {
        let api = MockApi::new();
        api.set_stuck(TokenInformationClass::Owner);
        let token = api.process_token_handle();
        let err = owner(&api, &token).unwrap_err();
        assert!(matches!(
            err,
            Error::Native { operation: "GetTokenInformation", code: NativeErrorCode::InsufficientBuffer, .. }
        ));
        assert_eq!(api.query_sizes(TokenInformationClass::Owner).len(), 2);
    }

    #[test]
    fn other_failures_name_the_attribute() {
        let api = MockApi::new();
        api.fail_query(TokenInformationClass::Owner, NativeErrorCode::AccessDenied);
        let token = api.process_token_handle();
        let err = owner(&api, &token).unwrap_err();
        assert_eq!(err.to_string(), "GetTokenInformation failed for Owner: access is denied");
        assert_eq!(api.query_sizes(TokenInformationClass::Owner).len(), 1);
    }

    #[test]
    fn primary_tokens_have_no_impersonation_level() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        assert_eq!(token_type(&api, &token).unwrap(), TokenType::Primary);
        assert_eq!(impersonation_level(&api, &token).unwrap(), None);

        let imp = api.add_token(MockToken {
            token_type: TokenType::Impersonation,
            impersonation_level: Some(ImpersonationLevel::Delegation),
            ..MockToken::sample()
        });
        assert_eq!(impersonation_level(&api, &imp).unwrap(), Some(ImpersonationLevel::Delegation));
    }

    #[test]
    fn decodes_every_typed_attribute() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let expected = api.process_token();
        assert_eq!(primary_group(&api, &token).unwrap(), expected.primary_group);
        assert_eq!(default_dacl(&api, &token).unwrap(), expected.default_dacl);
        assert_eq!(integrity_level(&api, &token).unwrap(), well_known::MEDIUM_MANDATORY_LEVEL);
        assert_eq!(session_id(&api, &token).unwrap(), expected.session_id);
        assert_eq!(groups(&api, &token).unwrap(), expected.groups);
        let logon = logon_sid(&api, &token).unwrap().unwrap();
        assert!(well_known::LOGON_SESSION_PREFIX.is_prefix_of(&logon));
    }

    #[test]
    fn missing_default_dacl_is_none() {
        let api = MockApi::new();
        let token = api.add_token(MockToken {
            default_dacl: None,
            ..MockToken::sample()
        });
        assert_eq!(default_dacl(&api, &token).unwrap(), None);
    }

    proptest! {
        #[test]
        fn default_dacl_of_any_size_is_read_whole(count in 0usize..64) {
            let acl: RawAcl = (0..count)
                .map(|i| RawAce::new(
                    AceType::AccessAllowed,
                    AceFlags::empty(),
                    u32::try_from(i).unwrap(),
                    well_known::BUILTIN_USERS.to_sid(),
                ))
                .collect();
            let api = MockApi::new();
            let token = api.add_token(MockToken {
                default_dacl: Some(acl.clone()),
                ..MockToken::sample()
            });
            prop_assert_eq!(default_dacl(&api, &token).unwrap(), Some(acl));
            prop_assert_eq!(api.query_sizes(TokenInformationClass::DefaultDacl).len(), 2);
        }
    }
}
