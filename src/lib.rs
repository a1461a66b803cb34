//! # Windows access-token and object-security primitives for Rust
//!
//! Building blocks to inspect and manipulate Windows **access tokens** and
//! the **security descriptors** of kernel objects. The crate provides:
//! - [`token_info`]: typed reads of token attributes (user, owner, primary
//!   group, default DACL, groups, integrity level, ...) on top of the
//!   variable-length [`query_token_attribute`] protocol.
//! - [`IdentityTranslator`]: SID ⇄ `DOMAIN\Name` translation through the OS,
//!   with a fallback for names the OS does not know (mandatory integrity
//!   labels and logon-session SIDs), in strict or lenient mode.
//! - [`marshal`]: conversion between raw ACLs ([`RawAcl`]) and typed rules
//!   ([`AccessRule`], [`AuditRule`]).
//! - [`DescriptorAssembler`]: builds a complete owner / group / DACL
//!   descriptor from partial input and applies selected sections to an object.
//! - [`token`]: open, duplicate and impersonate tokens.
//!
//! ## Overview
//! Every operation talks to the OS through the [`NativeApi`] trait. On
//! Windows, [`Win32Api`] implements it over the Win32 API; the algorithms
//! themselves are platform independent.
//!
//! ## Errors
//! All fallible operations return [`Error`]. Native failures keep the name of
//! the failing call and a classified [`NativeErrorCode`].
//!
//! ## Examples
//! ### Parse a SID
//! ```rust
//! use win_access_token::{SecurityIdentifier, well_known};
//!
//! let sid: SecurityIdentifier = "S-1-5-32-544".parse().unwrap();
//! assert_eq!(sid, well_known::BUILTIN_ADMINISTRATORS);
//! assert_eq!(sid.rid(), 544);
//! ```
//!
//! ### Names the OS lookup does not know
//! ```rust
//! use win_access_token::translate::fallback_account;
//! use win_access_token::well_known;
//!
//! let label = fallback_account(&well_known::HIGH_MANDATORY_LEVEL.to_sid()).unwrap();
//! assert_eq!(label.to_string(), "Mandatory Label\\High Mandatory Label");
//! ```
//!
//! ### (Windows) Build and apply a descriptor
//! ```no_run
//! # #[cfg(windows)]
//! # {
//! use win_access_token::{
//!     AccessControlSections, AccessControlType, AccessRule, DaclSource, DescriptorAssembler,
//!     DescriptorRequest, TokenAccessRights, Win32Api, token, well_known,
//! };
//!
//! let api = Win32Api;
//! let target = token::open_current_token(&api, TokenAccessRights::ALL_ACCESS).unwrap();
//! let request = DescriptorRequest {
//!     access: Some(DaclSource::Rules(vec![
//!         AccessRule::new(well_known::WORLD, TokenAccessRights::QUERY, AccessControlType::Allow).into(),
//!     ])),
//!     ..DescriptorRequest::default()
//! };
//! let assembler = DescriptorAssembler::new(&api);
//! let descriptor = assembler.build(Some(&target), &request).unwrap();
//! assembler.apply(&target, &descriptor, AccessControlSections::ACCESS).unwrap();
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

mod account;
pub mod acl;
mod buffer;
mod const_sid;
pub mod descriptor;
mod error;
pub mod handle;
mod identity;
pub mod marshal;
pub mod native;
mod rights;
pub mod rule;
mod sid;
mod sid_identifier_authority;
mod sid_type;
pub mod token;
pub mod token_info;
pub mod translate;
pub mod well_known;

#[cfg(feature = "serde")]
mod serde_impl;

#[cfg(test)]
mod test_support;

#[cfg(test)]
pub(crate) use sid::test::arb_security_identifier;
#[cfg(test)]
pub(crate) use sid_identifier_authority::test::arb_identifier_authority;

pub use account::{AccountParsingError, Component, DisplayAccount, ParsePolicy};
pub use acl::{AceFlags, AceType, AclFormatError, RawAce, RawAcl};
pub use buffer::NativeBuffer;
/// Const-friendly fixed-size SID (`N` sub-authorities).
pub use const_sid::ConstSid;
pub use descriptor::{
    AccessControlSections, Dacl, DaclSource, DescriptorAssembler, DescriptorRequest, ResourceKind,
    SecurityDescriptor, read_security_descriptor,
};
pub use error::{Error, ErrorCategory, IdentityRole, NativeErrorCode, Result, codes};
pub use handle::HandleFlags;
pub use identity::{IdentityKind, IdentityReference};
pub use marshal::{to_raw_acl, to_rules};
pub use native::NativeApi;
pub use rights::{AccessMask, AccessRight, ProcessAccessRights, ThreadAccessRights, TokenAccessRights};
pub use rule::{
    AccessControlType, AccessRule, AuditFlags, AuditRule, AuthorizationRule, InheritanceFlags,
    PropagationFlags,
};
pub use sid::{InvalidSidFormat, MAX_SUBAUTHORITY_COUNT, MIN_SUBAUTHORITY_COUNT, SecurityIdentifier};
/// Identifier authority component of a SID (6-byte value).
pub use sid_identifier_authority::SidIdentifierAuthority;
/// Rust representation of `SID_NAME_USE`, as returned by account lookups.
pub use sid_type::SidType;
pub use token::{DuplicateOptions, ImpersonationContext};
pub use token_info::{ImpersonationLevel, TokenInformationClass, TokenType, query_token_attribute};
pub use translate::{IdentityTranslator, TranslationMode};

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(windows)] {
        mod win32;
        pub use win32::{NativeHandle, Win32Api};
    }
}
