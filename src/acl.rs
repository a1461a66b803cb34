//! Raw access-control lists in the binary layout the OS uses.
//!
//! An ACL is an 8-byte header (`revision`, pad, `u16` size, `u16` count, pad)
//! followed by its entries. Every entry starts with a 4-byte header (`type`,
//! `flags`, `u16` size). The allow/deny/audit family then carries a `u32`
//! mask and a SID; other entry types are kept as opaque bytes.

use bitflags::bitflags;
use delegate::delegate;
use num_enum::FromPrimitive;
use thiserror::Error;

use crate::SecurityIdentifier;
use crate::rights::AccessMask;

/// Revision of ACLs holding only non-object entries.
pub const ACL_REVISION: u8 = 2;
/// Revision of ACLs that may hold object entries.
pub const ACL_REVISION_DS: u8 = 4;

const ACL_HEADER_SIZE: usize = 8;
const ACE_HEADER_SIZE: usize = 4;

/// Error decoding or encoding an ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AclFormatError {
    /// The data ends before the announced size.
    #[error("ACL data is truncated")]
    Truncated,
    /// The entry at `index` announces a size that does not fit.
    #[error("access-control entry {index} has an invalid size")]
    BadEntrySize {
        /// Position of the entry.
        index: usize,
    },
    /// The entry at `index` holds a malformed SID.
    #[error("access-control entry {index} holds an invalid SID")]
    InvalidSid {
        /// Position of the entry.
        index: usize,
    },
    /// The encoded list exceeds the 64 KiB limit of the format.
    #[error("ACL exceeds the maximum encodable size")]
    TooLarge,
}

/// `ACE_HEADER.AceType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum AceType {
    /// `ACCESS_ALLOWED_ACE_TYPE`
    AccessAllowed = 0,
    /// `ACCESS_DENIED_ACE_TYPE`
    AccessDenied = 1,
    /// `SYSTEM_AUDIT_ACE_TYPE`
    SystemAudit = 2,
    /// `SYSTEM_ALARM_ACE_TYPE`
    SystemAlarm = 3,
    /// `SYSTEM_MANDATORY_LABEL_ACE_TYPE`
    SystemMandatoryLabel = 0x11,
    /// Any other type, carried opaquely.
    #[num_enum(catch_all)]
    Other(u8),
}

impl AceType {
    /// Raw type byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::AccessAllowed => 0,
            Self::AccessDenied => 1,
            Self::SystemAudit => 2,
            Self::SystemAlarm => 3,
            Self::SystemMandatoryLabel => 0x11,
            Self::Other(raw) => raw,
        }
    }

    /// Whether entries of this type are laid out as header, mask, SID.
    #[must_use]
    pub const fn has_mask_and_sid(self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

bitflags! {
    /// `ACE_HEADER.AceFlags`
    #[derive(Default)]
    pub struct AceFlags: u8 {
        /// Non-container children inherit the entry.
        const OBJECT_INHERIT = 0x01;
        /// Container children inherit the entry.
        const CONTAINER_INHERIT = 0x02;
        /// Inheritance stops at the immediate children.
        const NO_PROPAGATE_INHERIT = 0x04;
        /// The entry applies to children only.
        const INHERIT_ONLY = 0x08;
        /// The entry was inherited from a parent.
        const INHERITED = 0x10;
        /// Audit successful accesses.
        const SUCCESSFUL_ACCESS = 0x40;
        /// Audit failed accesses.
        const FAILED_ACCESS = 0x80;
    }
}

/// Payload of an access-control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AceBody {
    /// Mask and trustee of the allow/deny/audit family.
    Standard {
        /// Access mask.
        mask: AccessMask,
        /// Trustee.
        sid: SecurityIdentifier,
    },
    /// Bytes after the header of an entry type this crate does not interpret.
    Opaque(Vec<u8>),
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAce {
    /// Entry type.
    pub ace_type: AceType,
    /// Inheritance and audit flags.
    pub flags: AceFlags,
    /// Payload.
    pub body: AceBody,
}

impl RawAce {
    /// Builds a mask-and-SID entry.
    #[inline]
    #[must_use]
    pub const fn new(ace_type: AceType, flags: AceFlags, mask: AccessMask, sid: SecurityIdentifier) -> Self {
        Self {
            ace_type,
            flags,
            body: AceBody::Standard { mask, sid },
        }
    }

    /// The access mask, for mask-and-SID entries.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> Option<AccessMask> {
        match &self.body {
            AceBody::Standard { mask, .. } => Some(*mask),
            AceBody::Opaque(_) => None,
        }
    }

    /// The trustee, for mask-and-SID entries.
    #[inline]
    #[must_use]
    pub const fn sid(&self) -> Option<&SecurityIdentifier> {
        match &self.body {
            AceBody::Standard { sid, .. } => Some(sid),
            AceBody::Opaque(_) => None,
        }
    }

    fn encoded_len(&self) -> usize {
        ACE_HEADER_SIZE
            + match &self.body {
                AceBody::Standard { sid, .. } => 4 + sid.binary_len(),
                AceBody::Opaque(bytes) => bytes.len(),
            }
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<(), AclFormatError> {
        let size = u16::try_from(self.encoded_len()).map_err(|_| AclFormatError::TooLarge)?;
        out.push(self.ace_type.as_u8());
        out.push(self.flags.bits());
        out.extend_from_slice(&size.to_le_bytes());
        match &self.body {
            AceBody::Standard { mask, sid } => {
                out.extend_from_slice(&mask.to_le_bytes());
                sid.write_bytes(out);
            }
            AceBody::Opaque(bytes) => out.extend_from_slice(bytes),
        }
        Ok(())
    }

    fn read(index: usize, bytes: &[u8]) -> Result<(Self, usize), AclFormatError> {
        let header = bytes.get(..ACE_HEADER_SIZE).ok_or(AclFormatError::Truncated)?;
        let ace_type = AceType::from_primitive(header[0]);
        let flags = AceFlags::from_bits_truncate(header[1]);
        let size = usize::from(u16::from_le_bytes([header[2], header[3]]));
        if size < ACE_HEADER_SIZE {
            return Err(AclFormatError::BadEntrySize { index });
        }
        let payload = bytes
            .get(ACE_HEADER_SIZE..size)
            .ok_or(AclFormatError::BadEntrySize { index })?;
        let body = if ace_type.has_mask_and_sid() {
            let mask = payload
                .get(..4)
                .map(|m| u32::from_le_bytes([m[0], m[1], m[2], m[3]]))
                .ok_or(AclFormatError::BadEntrySize { index })?;
            let (sid, _) = SecurityIdentifier::from_prefix(&payload[4..])
                .map_err(|_| AclFormatError::InvalidSid { index })?;
            AceBody::Standard { mask, sid }
        } else {
            AceBody::Opaque(payload.to_vec())
        };
        Ok((
            Self {
                ace_type,
                flags,
                body,
            },
            size,
        ))
    }
}

/// An ordered list of access-control entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAcl {
    revision: u8,
    aces: Vec<RawAce>,
}

impl Default for RawAcl {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl RawAcl {
    /// An empty list. Applied as a DACL it grants nothing to anyone.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            revision: ACL_REVISION,
            aces: Vec::new(),
        }
    }

    /// ACL revision.
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    delegate! {
        to self.aces {
            /// Number of entries.
            pub fn len(&self) -> usize;
            /// Returns `true` if there are no entries.
            pub fn is_empty(&self) -> bool;
            /// Appends an entry.
            pub fn push(&mut self, ace: RawAce);
            /// Entries in order.
            #[call(iter)]
            pub fn entries(&self) -> core::slice::Iter<'_, RawAce>;
            /// Entry at `index`.
            pub fn get(&self, index: usize) -> Option<&RawAce>;
        }
    }

    /// Size of the binary form.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ACL_HEADER_SIZE + self.aces.iter().map(RawAce::encoded_len).sum::<usize>()
    }

    /// Binary form.
    ///
    /// # Errors
    /// [`AclFormatError::TooLarge`] when the list exceeds the format's size fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AclFormatError> {
        let size = u16::try_from(self.encoded_len()).map_err(|_| AclFormatError::TooLarge)?;
        let count = u16::try_from(self.aces.len()).map_err(|_| AclFormatError::TooLarge)?;
        let mut out = Vec::with_capacity(usize::from(size));
        out.push(self.revision);
        out.push(0);
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        for ace in &self.aces {
            ace.write(&mut out)?;
        }
        Ok(out)
    }

    /// Decodes the ACL at the start of `bytes`, using the size in its header.
    ///
    /// # Errors
    /// [`AclFormatError`] when the data is truncated or an entry is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AclFormatError> {
        let header = bytes.get(..ACL_HEADER_SIZE).ok_or(AclFormatError::Truncated)?;
        let size = usize::from(u16::from_le_bytes([header[2], header[3]]));
        let count = usize::from(u16::from_le_bytes([header[4], header[5]]));
        if size < ACL_HEADER_SIZE {
            return Err(AclFormatError::Truncated);
        }
        let body = bytes.get(ACL_HEADER_SIZE..size).ok_or(AclFormatError::Truncated)?;
        let mut aces = Vec::with_capacity(count);
        let mut offset = 0;
        for index in 0..count {
            let (ace, len) = RawAce::read(index, body.get(offset..).ok_or(AclFormatError::Truncated)?)?;
            aces.push(ace);
            offset += len;
        }
        Ok(Self {
            revision: header[0],
            aces,
        })
    }

    /// Reads an ACL from a raw pointer.
    ///
    /// # Safety
    /// `ptr` must point to a readable ACL: an 8-byte header followed by as
    /// many bytes as its size field announces. No alignment is required.
    ///
    /// # Errors
    /// [`AclFormatError`] when the entries are malformed.
    pub unsafe fn from_raw(ptr: *const u8) -> Result<Self, AclFormatError> {
        if ptr.is_null() {
            return Err(AclFormatError::Truncated);
        }
        // SAFETY: the caller guarantees the header is readable.
        let size = unsafe { ptr.add(2).cast::<u16>().read_unaligned() };
        let size = usize::from(u16::from_le(size)).max(ACL_HEADER_SIZE);
        // SAFETY: the caller guarantees `size` bytes are readable.
        let bytes = unsafe { core::slice::from_raw_parts(ptr, size) };
        Self::from_bytes(bytes)
    }
}

impl FromIterator<RawAce> for RawAcl {
    fn from_iter<T: IntoIterator<Item = RawAce>>(iter: T) -> Self {
        Self {
            revision: ACL_REVISION,
            aces: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RawAcl {
    type Item = &'a RawAce;
    type IntoIter = core::slice::Iter<'a, RawAce>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.aces.iter()
    }
}
