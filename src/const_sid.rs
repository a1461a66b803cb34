use core::fmt::{self, Display};

use crate::{SecurityIdentifier, SidIdentifierAuthority};

/// Fixed-size, compile-time Security Identifier.
///
/// `ConstSid<N>` stores exactly `N` sub-authorities in an array so well-known
/// SIDs can be declared as `const` items and compared against owned
/// [`SecurityIdentifier`] values without allocating.
///
/// # Examples
/// ```rust
/// # use win_access_token::{ConstSid, SidIdentifierAuthority, SecurityIdentifier};
/// const ADMIN_ALIAS: ConstSid<2> =
///     ConstSid::new(1, SidIdentifierAuthority::NT_AUTHORITY, [32, 544]);
/// assert_eq!(ADMIN_ALIAS.to_string(), "S-1-5-32-544");
/// let owned: SecurityIdentifier = ADMIN_ALIAS.into();
/// assert_eq!(owned, ADMIN_ALIAS);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstSid<const N: usize> {
    /// SID revision (commonly `1`).
    pub revision: u8,
    /// 6-byte identifier authority.
    pub identifier_authority: SidIdentifierAuthority,
    /// Fixed-size list of sub-authorities.
    pub sub_authority: [u32; N],
}

impl<const N: usize> ConstSid<N> {
    /// Creates a new `ConstSid<N>`.
    ///
    /// Evaluated in a `const` item, an `N` outside `1..=15` fails compilation.
    #[must_use]
    pub const fn new(
        revision: u8,
        identifier_authority: SidIdentifierAuthority,
        sub_authority: [u32; N],
    ) -> Self {
        assert!(N >= 1 && N <= 15, "a SID has between 1 and 15 sub-authorities");
        Self {
            revision,
            identifier_authority,
            sub_authority,
        }
    }

    /// Owned copy of this SID.
    #[must_use]
    pub fn to_sid(&self) -> SecurityIdentifier {
        SecurityIdentifier::try_new(self.revision, self.identifier_authority, &self.sub_authority)
            .unwrap_or_else(|| unreachable!("ConstSid::new bounds N"))
    }

    /// Returns `true` if `sid` starts with this SID's authority and sub-authorities.
    ///
    /// Used to recognise families such as logon-session SIDs (`S-1-5-5-X-Y`).
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, sid: &SecurityIdentifier) -> bool {
        sid.revision() == self.revision && sid.has_prefix(self.identifier_authority, &self.sub_authority)
    }
}

impl<const N: usize> Display for ConstSid<N> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.identifier_authority)?;
        for sub_auth in self.sub_authority {
            write!(f, "-{sub_auth}")?;
        }
        Ok(())
    }
}

impl<const N: usize> From<ConstSid<N>> for SecurityIdentifier {
    #[inline]
    fn from(value: ConstSid<N>) -> Self {
        value.to_sid()
    }
}

impl<const N: usize> PartialEq<SecurityIdentifier> for ConstSid<N> {
    #[inline]
    fn eq(&self, other: &SecurityIdentifier) -> bool {
        other.revision() == self.revision
            && other.identifier_authority() == self.identifier_authority
            && other.sub_authorities() == self.sub_authority
    }
}

impl<const N: usize> PartialEq<ConstSid<N>> for SecurityIdentifier {
    #[inline]
    fn eq(&self, other: &ConstSid<N>) -> bool {
        other == self
    }
}
