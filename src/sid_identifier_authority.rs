use core::fmt::{self, Display};

/// The 48-bit identifier authority of a SID, stored big-endian as on the wire.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SidIdentifierAuthority {
    /// Big-endian authority bytes.
    pub value: [u8; 6],
}

impl SidIdentifierAuthority {
    /// `S-1-0`
    pub const NULL_AUTHORITY: Self = Self::from_u64(0);
    /// `S-1-1`
    pub const SECURITY_WORLD_AUTHORITY: Self = Self::from_u64(1);
    /// `S-1-2`
    pub const SECURITY_LOCAL_AUTHORITY: Self = Self::from_u64(2);
    /// `S-1-3`
    pub const SECURITY_CREATOR_AUTHORITY: Self = Self::from_u64(3);
    /// `S-1-5`
    pub const NT_AUTHORITY: Self = Self::from_u64(5);
    /// `S-1-16`
    pub const SECURITY_MANDATORY_LABEL_AUTHORITY: Self = Self::from_u64(16);

    /// Builds an authority from the low 48 bits of `value`.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        Self {
            value: [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]],
        }
    }

    /// Numeric value of the authority.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        let v = self.value;
        u64::from_be_bytes([0, 0, v[0], v[1], v[2], v[3], v[4], v[5]])
    }
}

impl Display for SidIdentifierAuthority {
    /// Decimal when the value fits in 32 bits, `0x`-prefixed hex otherwise.
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.as_u64();
        if value <= 0xFFFF_FFFF {
            write!(f, "{value}")
        } else {
            write!(f, "0x{value:X}")
        }
    }
}

impl From<[u8; 6]> for SidIdentifierAuthority {
    #[inline]
    fn from(value: [u8; 6]) -> Self {
        Self { value }
    }
}

impl From<SidIdentifierAuthority> for [u8; 6] {
    #[inline]
    fn from(value: SidIdentifierAuthority) -> Self {
        value.value
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use proptest::prelude::*;
    prop_compose! {
        pub fn arb_identifier_authority()
            (val in prop_oneof![1u64..=5, Just(16u64), 0x1_0000_0000u64..0xFFFF_FFFF_FFFF])
            -> SidIdentifierAuthority {
            SidIdentifierAuthority::from_u64(val)
        }
    }

    #[test]
    fn display_switches_to_hex() {
        assert_eq!(SidIdentifierAuthority::NT_AUTHORITY.to_string(), "5");
        assert_eq!(
            SidIdentifierAuthority::from_u64(0x1_0000_0000).to_string(),
            "0x100000000"
        );
    }
}
