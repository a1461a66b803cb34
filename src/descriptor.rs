//! Security descriptors for kernel objects, and their assembly from
//! partial input.
//!
//! [`DescriptorAssembler::build`] fills whatever the caller leaves unset:
//! the owner and primary group come from the caller's own token, the DACL
//! from a token's default DACL. An explicit null DACL ([`DaclSource::Null`])
//! and an unset DACL are different requests.

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::acl::{AceFlags, AceType, RawAcl};
use crate::error::IdentityRole;
use crate::marshal;
use crate::native::{NativeApi, SecurityUpdate};
use crate::rights::{AccessMask, AccessRight, TokenAccessRights};
use crate::rule::{AuthorizationRule, InheritanceFlags, PropagationFlags};
use crate::token::open_current_token;
use crate::token_info;
use crate::translate::IdentityTranslator;
use crate::{Error, IdentityKind, IdentityReference, Result, SecurityIdentifier};

bitflags! {
    /// Parts of a security descriptor, with the native
    /// `SECURITY_INFORMATION` values.
    #[derive(Default)]
    pub struct AccessControlSections: u32 {
        /// `OWNER_SECURITY_INFORMATION`.
        const OWNER = 0x1;
        /// `GROUP_SECURITY_INFORMATION`.
        const GROUP = 0x2;
        /// `DACL_SECURITY_INFORMATION`.
        const ACCESS = 0x4;
    }
}

/// State of a discretionary ACL that is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dacl {
    /// An ACL; an empty one grants nothing.
    Acl(RawAcl),
    /// No discretionary control; everything is granted.
    Null,
}

impl Dacl {
    /// Whether a principal holding `sids` is granted all of `desired`.
    ///
    /// Entries are evaluated in order. A deny entry that matches a bit not
    /// yet granted refuses access. Inherit-only entries are ignored and
    /// generic rights are not mapped.
    #[must_use]
    pub fn allows(&self, sids: &[SecurityIdentifier], desired: AccessMask) -> bool {
        let acl = match self {
            Self::Null => return true,
            Self::Acl(acl) => acl,
        };
        let mut granted: AccessMask = 0;
        for ace in acl {
            if ace.flags.contains(AceFlags::INHERIT_ONLY) {
                continue;
            }
            let (Some(mask), Some(sid)) = (ace.mask(), ace.sid()) else {
                continue;
            };
            if !sids.contains(sid) {
                continue;
            }
            let pending = desired & !granted;
            match ace.ace_type {
                AceType::AccessDenied if mask & pending != 0 => return false,
                AceType::AccessAllowed => granted |= mask & pending,
                _ => {}
            }
            if granted == desired && desired != 0 {
                return true;
            }
        }
        false
    }
}

/// What a descriptor protects. Inheritance only means something on containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceKind {
    /// An access token.
    #[default]
    Token,
    /// A process object.
    Process,
    /// A thread object.
    Thread,
    /// Any other kernel object.
    Other {
        /// Whether the object holds children that can inherit entries.
        container: bool,
    },
}

impl ResourceKind {
    /// Whether inheritance flags are meaningful on this kind.
    #[inline]
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Other { container: true })
    }
}

/// Owner, primary group and DACL of an object.
///
/// Every section is optional: an absent section is neither read nor written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityDescriptor {
    kind: ResourceKind,
    owner: Option<SecurityIdentifier>,
    group: Option<SecurityIdentifier>,
    dacl: Option<Dacl>,
}

impl SecurityDescriptor {
    /// Descriptor with no section present.
    #[inline]
    #[must_use]
    pub const fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            owner: None,
            group: None,
            dacl: None,
        }
    }

    /// Sets the owner.
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: SecurityIdentifier) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the primary group.
    #[inline]
    #[must_use]
    pub fn with_group(mut self, group: SecurityIdentifier) -> Self {
        self.group = Some(group);
        self
    }

    /// Sets the DACL.
    #[inline]
    #[must_use]
    pub fn with_dacl(mut self, dacl: Dacl) -> Self {
        self.dacl = Some(dacl);
        self
    }

    /// What the descriptor protects.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The owner, if present.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> Option<&SecurityIdentifier> {
        self.owner.as_ref()
    }

    /// The primary group, if present.
    #[inline]
    #[must_use]
    pub const fn group(&self) -> Option<&SecurityIdentifier> {
        self.group.as_ref()
    }

    /// The DACL, if present.
    #[inline]
    #[must_use]
    pub const fn dacl(&self) -> Option<&Dacl> {
        self.dacl.as_ref()
    }

    /// Sections that carry a value.
    #[must_use]
    pub fn present_sections(&self) -> AccessControlSections {
        let mut sections = AccessControlSections::empty();
        sections.set(AccessControlSections::OWNER, self.owner.is_some());
        sections.set(AccessControlSections::GROUP, self.group.is_some());
        sections.set(AccessControlSections::ACCESS, self.dacl.is_some());
        sections
    }

    /// The DACL as rules naming identities of `kind`.
    ///
    /// `None` when the DACL is absent or null.
    ///
    /// # Errors
    /// See [`marshal::to_rules`].
    pub fn access_rules<A: NativeApi + ?Sized>(
        &self,
        translator: &IdentityTranslator<'_, A>,
        kind: IdentityKind,
    ) -> Result<Option<Vec<AuthorizationRule>>> {
        match &self.dacl {
            Some(Dacl::Acl(acl)) => marshal::to_rules(translator, acl, kind).map(Some),
            Some(Dacl::Null) | None => Ok(None),
        }
    }
}

/// DACL requested from [`DescriptorAssembler::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaclSource<R = AccessMask> {
    /// Exactly these rules, in this order. An empty list denies everyone.
    Rules(Vec<AuthorizationRule<R>>),
    /// A null DACL.
    Null,
}

/// Partial input of [`DescriptorAssembler::build`]; `None` means "use the default".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorRequest<R = AccessMask> {
    /// Owner of the object.
    pub owner: Option<IdentityReference>,
    /// Primary group of the object.
    pub group: Option<IdentityReference>,
    /// Discretionary ACL of the object.
    pub access: Option<DaclSource<R>>,
}

impl<R> Default for DescriptorRequest<R> {
    #[inline]
    fn default() -> Self {
        Self {
            owner: None,
            group: None,
            access: None,
        }
    }
}

/// Builds, applies and reads security descriptors through a [`NativeApi`].
#[derive(Debug, Clone, Copy)]
pub struct DescriptorAssembler<'a, A: ?Sized> {
    api: &'a A,
    kind: ResourceKind,
}

impl<'a, A: NativeApi + ?Sized> DescriptorAssembler<'a, A> {
    /// Assembler for token objects.
    #[inline]
    #[must_use]
    pub const fn new(api: &'a A) -> Self {
        Self {
            api,
            kind: ResourceKind::Token,
        }
    }

    /// Targets objects of `kind` instead.
    #[inline]
    #[must_use]
    pub const fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    fn validate<R: AccessRight>(&self, rules: &[AuthorizationRule<R>]) -> Result<()> {
        for (index, rule) in rules.iter().enumerate() {
            if matches!(rule, AuthorizationRule::Audit(_)) {
                return Err(Error::InvalidComposition(format!(
                    "rule {index} is an audit rule and cannot be placed in a DACL"
                )));
            }
            if rule.inheritance().is_empty() && !rule.propagation().is_empty() {
                return Err(Error::InvalidComposition(format!(
                    "rule {index} sets propagation flags without inheritance flags"
                )));
            }
            if !rule.inheritance().is_empty() && !self.kind.is_container() {
                return Err(Error::InvalidComposition(format!(
                    "rule {index} sets inheritance flags on a non-container {:?}",
                    self.kind
                )));
            }
        }
        Ok(())
    }

    fn resolve(
        translator: &IdentityTranslator<'_, A>,
        requested: Option<&IdentityReference>,
        fallback: Option<SecurityIdentifier>,
        role: IdentityRole,
    ) -> Result<SecurityIdentifier> {
        match (requested, fallback) {
            (Some(identity), _) => translator.to_sid_for(identity, role),
            (None, Some(sid)) => Ok(sid),
            (None, None) => Err(Error::InvalidComposition(format!("no {role} to fall back to"))),
        }
    }

    /// Completes `request` into a descriptor with every section present.
    ///
    /// Unset owner and group are read from the caller's own token (its
    /// impersonation token if the thread has one, its process token
    /// otherwise). An unset DACL is the default DACL of `target`, or of the
    /// caller's token when there is no target; a token without a default
    /// DACL yields a null DACL.
    ///
    /// # Errors
    /// - [`Error::InvalidComposition`] for an audit rule in the DACL,
    ///   propagation flags without inheritance flags, or inheritance flags on
    ///   a non-container, before any native call.
    /// - [`Error::IdentityNotMapped`] naming the owner, group or rule index.
    /// - [`Error::Native`] when the caller's token cannot be opened or read.
    pub fn build<R: AccessRight>(
        &self,
        target: Option<&A::Handle>,
        request: &DescriptorRequest<R>,
    ) -> Result<SecurityDescriptor> {
        if let Some(DaclSource::Rules(rules)) = &request.access {
            self.validate(rules)?;
        }

        let needs_caller_dacl = request.access.is_none() && target.is_none();
        let needs_caller = request.owner.is_none() || request.group.is_none() || needs_caller_dacl;
        let caller = if needs_caller {
            Some(open_current_token(self.api, TokenAccessRights::QUERY)?)
        } else {
            None
        };

        let mut default_owner = None;
        let mut default_group = None;
        if let Some(token) = &caller {
            if request.owner.is_none() {
                default_owner = Some(token_info::owner(self.api, token)?);
            }
            if request.group.is_none() {
                default_group = Some(token_info::primary_group(self.api, token)?);
            }
        }

        let translator = IdentityTranslator::new(self.api);
        let owner = Self::resolve(&translator, request.owner.as_ref(), default_owner, IdentityRole::Owner)?;
        let group = Self::resolve(&translator, request.group.as_ref(), default_group, IdentityRole::Group)?;

        let dacl = match &request.access {
            Some(DaclSource::Rules(rules)) => Dacl::Acl(marshal::to_raw_acl(&translator, rules)?),
            Some(DaclSource::Null) => Dacl::Null,
            None => {
                let source = match (target, &caller) {
                    (Some(target), _) => target,
                    (None, Some(token)) => token,
                    (None, None) => {
                        return Err(Error::InvalidComposition("no token to read a default DACL from".into()));
                    }
                };
                token_info::default_dacl(self.api, source)?.map_or(Dacl::Null, Dacl::Acl)
            }
        };
        let null_dacl = dacl == Dacl::Null;
        debug!(%owner, %group, null_dacl, "built security descriptor");
        Ok(SecurityDescriptor {
            kind: self.kind,
            owner: Some(owner),
            group: Some(group),
            dacl: Some(dacl),
        })
    }

    /// Writes the sections of `descriptor` that are both requested and
    /// present to `target`, and returns them. Other sections of the live
    /// object are left alone.
    ///
    /// # Errors
    /// - [`Error::InvalidComposition`] if no section would be written.
    /// - [`Error::Native`] naming `SetSecurityInfo`.
    pub fn apply(
        &self,
        target: &A::Handle,
        descriptor: &SecurityDescriptor,
        sections: AccessControlSections,
    ) -> Result<AccessControlSections> {
        let effective = sections & descriptor.present_sections();
        if effective.is_empty() {
            return Err(Error::InvalidComposition(format!(
                "none of the requested sections {sections:?} is present in the descriptor"
            )));
        }
        let update = SecurityUpdate {
            owner: descriptor
                .owner()
                .filter(|_| effective.contains(AccessControlSections::OWNER)),
            group: descriptor
                .group()
                .filter(|_| effective.contains(AccessControlSections::GROUP)),
            dacl: descriptor
                .dacl()
                .filter(|_| effective.contains(AccessControlSections::ACCESS)),
        };
        trace!(?effective, "applying security descriptor");
        self.api
            .set_object_security(target, &update)
            .map_err(|code| Error::native("SetSecurityInfo", code))?;
        Ok(effective)
    }

    /// Re-reads `sections` from the live object.
    ///
    /// # Errors
    /// See [`read_security_descriptor`].
    pub fn read(&self, target: &A::Handle, sections: AccessControlSections) -> Result<SecurityDescriptor> {
        read_security_descriptor(self.api, target, self.kind, sections)
    }
}

/// Reads `sections` of the security of `target`.
///
/// # Errors
/// [`Error::Native`] naming `GetSecurityInfo`.
pub fn read_security_descriptor<A: NativeApi + ?Sized>(
    api: &A,
    target: &A::Handle,
    kind: ResourceKind,
    sections: AccessControlSections,
) -> Result<SecurityDescriptor> {
    let security = api
        .get_object_security(target, sections)
        .map_err(|code| Error::native("GetSecurityInfo", code))?;
    Ok(SecurityDescriptor {
        kind,
        owner: security.owner,
        group: security.group,
        dacl: security.dacl,
    })
}
