//! Principal references: either a SID or a display name.

use core::fmt::{self, Display};
use core::str::FromStr;

use crate::account::{AccountParsingError, DisplayAccount};
use crate::{ConstSid, SecurityIdentifier};

/// Which representation a translation should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// A [`SecurityIdentifier`].
    Sid,
    /// A [`DisplayAccount`].
    Account,
}

/// A principal, named either by SID or by `DOMAIN\Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityReference {
    /// Machine-oriented form.
    Sid(SecurityIdentifier),
    /// Human-readable form.
    Account(DisplayAccount),
}

impl IdentityReference {
    /// Kind of this reference.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::Sid(_) => IdentityKind::Sid,
            Self::Account(_) => IdentityKind::Account,
        }
    }

    /// The SID, if this reference holds one.
    #[inline]
    #[must_use]
    pub const fn as_sid(&self) -> Option<&SecurityIdentifier> {
        match self {
            Self::Sid(sid) => Some(sid),
            Self::Account(_) => None,
        }
    }

    /// The account, if this reference holds one.
    #[inline]
    #[must_use]
    pub const fn as_account(&self) -> Option<&DisplayAccount> {
        match self {
            Self::Account(account) => Some(account),
            Self::Sid(_) => None,
        }
    }
}

impl Display for IdentityReference {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sid(sid) => Display::fmt(sid, f),
            Self::Account(account) => Display::fmt(account, f),
        }
    }
}

impl FromStr for IdentityReference {
    type Err = AccountParsingError;

    /// Anything that parses as a SID string is a SID, everything else an account name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(sid) = s.parse::<SecurityIdentifier>() {
            return Ok(Self::Sid(sid));
        }
        s.parse().map(Self::Account)
    }
}

impl From<SecurityIdentifier> for IdentityReference {
    #[inline]
    fn from(value: SecurityIdentifier) -> Self {
        Self::Sid(value)
    }
}

impl<const N: usize> From<ConstSid<N>> for IdentityReference {
    #[inline]
    fn from(value: ConstSid<N>) -> Self {
        Self::Sid(value.to_sid())
    }
}

impl From<DisplayAccount> for IdentityReference {
    #[inline]
    fn from(value: DisplayAccount) -> Self {
        Self::Account(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;

    #[test]
    fn parses_sids_before_accounts() {
        let sid: IdentityReference = "S-1-5-18".parse().unwrap();
        assert_eq!(sid.kind(), IdentityKind::Sid);
        let account: IdentityReference = "NT AUTHORITY\\SYSTEM".parse().unwrap();
        assert_eq!(
            account.as_account(),
            Some(&DisplayAccount::new("NT AUTHORITY", "SYSTEM"))
        );
        let bare: IdentityReference = "S-Admins".parse().unwrap();
        assert_eq!(bare.kind(), IdentityKind::Account);
        assert_eq!(bare.to_string(), "S-Admins");
    }
}
