//! Owned representation of a Windows Security Identifier (SID).
//!
//! A [`SecurityIdentifier`] stores the revision, the 48-bit identifier
//! authority and up to [`MAX_SUBAUTHORITY_COUNT`] sub-authorities. It converts
//! to and from the canonical `S-R-A-S1-...-Sn` string form and the binary
//! layout the OS uses (`revision`, `count`, 6 authority bytes, `count`
//! little-endian `u32`).

use core::fmt::{self, Debug, Display};
use core::str::FromStr;

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::SidIdentifierAuthority;

/// Minimum number of sub-authorities in a valid SID.
pub const MIN_SUBAUTHORITY_COUNT: u8 = 1;
/// Maximum number of sub-authorities in a valid SID.
pub const MAX_SUBAUTHORITY_COUNT: u8 = 15;

/// Size of the fixed SID header (revision, count, authority).
pub(crate) const SID_HEADER_SIZE: usize = 8;

/// Error returned when a SID string or binary blob is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid format for Sid")]
pub struct InvalidSidFormat;

/// Owned Windows Security Identifier.
///
/// # Examples
/// ```rust
/// # use win_access_token::SecurityIdentifier;
/// let sid: SecurityIdentifier = "S-1-5-32-544".parse().unwrap();
/// assert_eq!(sid.sub_authorities(), &[32, 544]);
/// assert_eq!(sid.to_string(), "S-1-5-32-544");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecurityIdentifier {
    revision: u8,
    identifier_authority: SidIdentifierAuthority,
    sub_authority: ArrayVec<u32, { MAX_SUBAUTHORITY_COUNT as usize }>,
}

impl SecurityIdentifier {
    /// Builds a SID from its parts.
    ///
    /// Returns `None` when the sub-authority count is outside `1..=15`.
    #[must_use]
    pub fn try_new(
        revision: u8,
        identifier_authority: SidIdentifierAuthority,
        sub_authority: &[u32],
    ) -> Option<Self> {
        let count = u8::try_from(sub_authority.len()).ok()?;
        if !(MIN_SUBAUTHORITY_COUNT..=MAX_SUBAUTHORITY_COUNT).contains(&count) {
            return None;
        }
        let mut subs = ArrayVec::new();
        subs.try_extend_from_slice(sub_authority).ok()?;
        Some(Self {
            revision,
            identifier_authority,
            sub_authority: subs,
        })
    }

    /// The SID revision, `1` for every SID in use today.
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    /// The identifier authority.
    #[inline]
    #[must_use]
    pub const fn identifier_authority(&self) -> SidIdentifierAuthority {
        self.identifier_authority
    }

    /// The sub-authorities, in order.
    #[inline]
    #[must_use]
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authority
    }

    /// The relative identifier (last sub-authority).
    #[inline]
    #[must_use]
    pub fn rid(&self) -> u32 {
        // Non-empty by construction.
        self.sub_authority.last().copied().unwrap_or_default()
    }

    /// Returns `true` if this SID has the given authority and starts with `prefix`.
    #[must_use]
    pub fn has_prefix(&self, authority: SidIdentifierAuthority, prefix: &[u32]) -> bool {
        self.identifier_authority == authority && self.sub_authority.starts_with(prefix)
    }

    /// Size of the binary representation.
    #[inline]
    #[must_use]
    pub fn binary_len(&self) -> usize {
        SID_HEADER_SIZE + self.sub_authority.len() * 4
    }

    /// Binary representation as laid out in memory by the OS.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.binary_len());
        self.write_bytes(&mut bytes);
        bytes
    }

    pub(crate) fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(self.revision);
        // Bounded by MAX_SUBAUTHORITY_COUNT.
        #[expect(clippy::cast_possible_truncation, reason = "count is at most 15")]
        out.push(self.sub_authority.len() as u8);
        out.extend_from_slice(&self.identifier_authority.value);
        for sub in &self.sub_authority {
            out.extend_from_slice(&sub.to_le_bytes());
        }
    }

    /// Decodes a SID from a slice holding exactly one SID.
    ///
    /// # Errors
    /// [`InvalidSidFormat`] if the slice is not exactly one valid SID.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidSidFormat> {
        let (sid, len) = Self::from_prefix(bytes)?;
        if len == bytes.len() {
            Ok(sid)
        } else {
            Err(InvalidSidFormat)
        }
    }

    /// Decodes the SID at the start of `bytes`, returning it with its encoded length.
    ///
    /// Trailing bytes are ignored.
    ///
    /// # Errors
    /// [`InvalidSidFormat`] if the header is truncated, the count is out of
    /// range, or the slice is too short for the announced sub-authorities.
    pub fn from_prefix(bytes: &[u8]) -> Result<(Self, usize), InvalidSidFormat> {
        let header = bytes.get(..SID_HEADER_SIZE).ok_or(InvalidSidFormat)?;
        let count = header[1];
        if !(MIN_SUBAUTHORITY_COUNT..=MAX_SUBAUTHORITY_COUNT).contains(&count) {
            return Err(InvalidSidFormat);
        }
        let len = SID_HEADER_SIZE + usize::from(count) * 4;
        let body = bytes.get(SID_HEADER_SIZE..len).ok_or(InvalidSidFormat)?;
        let mut authority = [0u8; 6];
        authority.copy_from_slice(&header[2..]);
        let sub_authority = body
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok((
            Self {
                revision: header[0],
                identifier_authority: authority.into(),
                sub_authority,
            },
            len,
        ))
    }

    /// Reads a SID from a raw pointer.
    ///
    /// # Safety
    /// `ptr` must point to a readable SID: at least 8 bytes, followed by as
    /// many sub-authorities as its count byte announces. No alignment is required.
    ///
    /// # Errors
    /// [`InvalidSidFormat`] if the count byte is out of range.
    pub unsafe fn from_raw(ptr: *const u8) -> Result<Self, InvalidSidFormat> {
        if ptr.is_null() {
            return Err(InvalidSidFormat);
        }
        // SAFETY: the caller guarantees the header is readable.
        let count = unsafe { ptr.add(1).read() };
        if !(MIN_SUBAUTHORITY_COUNT..=MAX_SUBAUTHORITY_COUNT).contains(&count) {
            return Err(InvalidSidFormat);
        }
        let len = SID_HEADER_SIZE + usize::from(count) * 4;
        // SAFETY: the caller guarantees `count` sub-authorities follow the header.
        let bytes = unsafe { core::slice::from_raw_parts(ptr, len) };
        Self::from_bytes(bytes)
    }
}

impl Display for SecurityIdentifier {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.identifier_authority)?;
        for &sub_auth in &self.sub_authority {
            write!(f, "-{sub_auth}")?;
        }
        Ok(())
    }
}

impl Debug for SecurityIdentifier {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityIdentifier({self})")
    }
}

impl FromStr for SecurityIdentifier {
    type Err = InvalidSidFormat;

    /// Parses `S-R-A-S1-...-Sn`. The authority may be decimal or `0x` hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut s_cmp = s.split('-');
        if !s_cmp
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case("s"))
        {
            return Err(InvalidSidFormat);
        }
        let revision = s_cmp
            .next()
            .ok_or(InvalidSidFormat)?
            .parse::<u8>()
            .map_err(|_| InvalidSidFormat)?;

        let authority = s_cmp.next().ok_or(InvalidSidFormat)?;
        let authority = match authority
            .strip_prefix("0x")
            .or_else(|| authority.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority.parse::<u64>(),
        }
        .map_err(|_| InvalidSidFormat)?;
        if authority > 0xFFFF_FFFF_FFFF {
            return Err(InvalidSidFormat);
        }

        let mut sub_authority = ArrayVec::<u32, { MAX_SUBAUTHORITY_COUNT as usize }>::new();
        for item in s_cmp {
            let item = item.parse::<u32>().map_err(|_| InvalidSidFormat)?;
            sub_authority.try_push(item).map_err(|_| InvalidSidFormat)?;
        }
        Self::try_new(
            revision,
            SidIdentifierAuthority::from_u64(authority),
            &sub_authority,
        )
        .ok_or(InvalidSidFormat)
    }
}

impl TryFrom<&[u8]> for SecurityIdentifier {
    type Error = InvalidSidFormat;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(value)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::sid_identifier_authority::test::arb_identifier_authority;
    use proptest::prelude::*;

    prop_compose! {
        pub fn arb_security_identifier()
            (authority in arb_identifier_authority(),
             subs in prop::collection::vec(any::<u32>(), 1..=15))
            -> SecurityIdentifier {
            SecurityIdentifier::try_new(1, authority, &subs).unwrap_or_else(|| unreachable!())
        }
    }

    proptest! {
        #[test]
        fn sid_display_round_trip(sid in arb_security_identifier()) {
            let display = sid.to_string();
            prop_assert!(display.starts_with("S-1-"), "Display does not start with S-1-: {}", display);
            let dash_count = display.matches('-').count();
            prop_assert_eq!(dash_count, sid.sub_authorities().len() + 2);
            prop_assert_eq!(display.parse::<SecurityIdentifier>(), Ok(sid));
        }

        #[test]
        fn sid_prefix_ignores_trailing_bytes(sid in arb_security_identifier(), tail in prop::collection::vec(any::<u8>(), 0..16)) {
            let mut bytes = sid.to_bytes();
            let len = bytes.len();
            prop_assert_eq!(len, sid.binary_len());
            bytes.extend_from_slice(&tail);
            prop_assert_eq!(SecurityIdentifier::from_prefix(&bytes), Ok((sid, len)));
        }
    }

    #[test]
    fn known_binary_layout() {
        let sid: SecurityIdentifier = "S-1-5-32-544".parse().unwrap();
        assert_eq!(
            sid.to_bytes(),
            [1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 32, 2, 0, 0]
        );
        assert_eq!(sid.rid(), 544);
        assert!(sid.has_prefix(SidIdentifierAuthority::NT_AUTHORITY, &[32]));
    }

    #[test]
    fn rejects_malformed() {
        for input in ["", "S", "S-1", "X-1-5-18", "S-1-5", "S-1-5-x", "S-1-0x1000000000000-1"] {
            assert_eq!(input.parse::<SecurityIdentifier>(), Err(InvalidSidFormat), "{input}");
        }
        let too_many = format!("S-1-5{}", "-1".repeat(16));
        assert!(too_many.parse::<SecurityIdentifier>().is_err());
        assert_eq!(SecurityIdentifier::from_bytes(&[1, 0, 0, 0, 0, 0, 0, 5]), Err(InvalidSidFormat));
        assert_eq!(SecurityIdentifier::from_bytes(&[1, 2, 0, 0, 0, 0, 0, 5, 1, 0, 0, 0]), Err(InvalidSidFormat));
    }

    #[test]
    fn hex_authority_and_lowercase_prefix() {
        let sid: SecurityIdentifier = "s-1-0x100000000-7".parse().unwrap();
        assert_eq!(sid.identifier_authority().as_u64(), 0x1_0000_0000);
        assert_eq!(sid.to_string(), "S-1-0x100000000-7");
    }
}
