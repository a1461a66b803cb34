//! Typed access-control rules.
//!
//! A rule names a principal by [`IdentityReference`], carries a right set
//! (`R`, any [`AccessRight`]) and the inheritance settings of the entry. The
//! [`marshal`](crate::marshal) module converts between rules and raw entries.

use bitflags::bitflags;

use crate::IdentityReference;
use crate::rights::{AccessMask, AccessRight};

/// Whether a rule grants or refuses its rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessControlType {
    /// Grant the rights.
    Allow,
    /// Refuse the rights.
    Deny,
}

bitflags! {
    /// Which kinds of children inherit a rule.
    #[derive(Default)]
    pub struct InheritanceFlags: u32 {
        /// Child containers inherit the rule.
        const CONTAINER_INHERIT = 0x1;
        /// Child leaf objects inherit the rule.
        const OBJECT_INHERIT = 0x2;
    }
}

bitflags! {
    /// How an inheritable rule propagates.
    #[derive(Default)]
    pub struct PropagationFlags: u32 {
        /// Only immediate children inherit the rule.
        const NO_PROPAGATE_INHERIT = 0x1;
        /// The rule applies to children only, not to the object itself.
        const INHERIT_ONLY = 0x2;
    }
}

bitflags! {
    /// Which access attempts an audit rule records.
    #[derive(Default)]
    pub struct AuditFlags: u32 {
        /// Successful attempts.
        const SUCCESS = 0x1;
        /// Failed attempts.
        const FAILURE = 0x2;
    }
}

/// A rule granting or denying rights to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule<R = AccessMask> {
    identity: IdentityReference,
    rights: R,
    control: AccessControlType,
    inheritance: InheritanceFlags,
    propagation: PropagationFlags,
    inherited: bool,
}

impl<R: AccessRight> AccessRule<R> {
    /// A rule that applies to the object only.
    #[inline]
    pub fn new(identity: impl Into<IdentityReference>, rights: R, control: AccessControlType) -> Self {
        Self {
            identity: identity.into(),
            rights,
            control,
            inheritance: InheritanceFlags::empty(),
            propagation: PropagationFlags::empty(),
            inherited: false,
        }
    }

    /// Sets the inheritance and propagation flags.
    #[inline]
    #[must_use]
    pub fn with_inheritance(mut self, inheritance: InheritanceFlags, propagation: PropagationFlags) -> Self {
        self.inheritance = inheritance;
        self.propagation = propagation;
        self
    }

    /// Marks the rule as inherited from a parent object.
    #[inline]
    #[must_use]
    pub fn with_inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    /// The principal.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> &IdentityReference {
        &self.identity
    }

    /// The typed rights.
    #[inline]
    #[must_use]
    pub const fn rights(&self) -> R {
        self.rights
    }

    /// The rights as a raw mask.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> AccessMask {
        self.rights.to_mask()
    }

    /// Allow or deny.
    #[inline]
    #[must_use]
    pub const fn control(&self) -> AccessControlType {
        self.control
    }

    /// Inheritance flags.
    #[inline]
    #[must_use]
    pub const fn inheritance(&self) -> InheritanceFlags {
        self.inheritance
    }

    /// Propagation flags.
    #[inline]
    #[must_use]
    pub const fn propagation(&self) -> PropagationFlags {
        self.propagation
    }

    /// Whether the rule was inherited.
    #[inline]
    #[must_use]
    pub const fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Same rule with its principal replaced.
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityReference) -> Self {
        self.identity = identity;
        self
    }

    /// Same rule with its rights reinterpreted as another right type.
    #[must_use]
    pub fn map_rights<T: AccessRight>(self) -> AccessRule<T> {
        AccessRule {
            identity: self.identity,
            rights: T::from_mask(self.rights.to_mask()),
            control: self.control,
            inheritance: self.inheritance,
            propagation: self.propagation,
            inherited: self.inherited,
        }
    }
}

/// A rule recording access attempts by a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRule<R = AccessMask> {
    identity: IdentityReference,
    rights: R,
    audit: AuditFlags,
    inheritance: InheritanceFlags,
    propagation: PropagationFlags,
    inherited: bool,
}

impl<R: AccessRight> AuditRule<R> {
    /// An audit rule that applies to the object only.
    #[inline]
    pub fn new(identity: impl Into<IdentityReference>, rights: R, audit: AuditFlags) -> Self {
        Self {
            identity: identity.into(),
            rights,
            audit,
            inheritance: InheritanceFlags::empty(),
            propagation: PropagationFlags::empty(),
            inherited: false,
        }
    }

    /// Sets the inheritance and propagation flags.
    #[inline]
    #[must_use]
    pub fn with_inheritance(mut self, inheritance: InheritanceFlags, propagation: PropagationFlags) -> Self {
        self.inheritance = inheritance;
        self.propagation = propagation;
        self
    }

    /// Marks the rule as inherited from a parent object.
    #[inline]
    #[must_use]
    pub fn with_inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    /// The principal.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> &IdentityReference {
        &self.identity
    }

    /// The typed rights.
    #[inline]
    #[must_use]
    pub const fn rights(&self) -> R {
        self.rights
    }

    /// The rights as a raw mask.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> AccessMask {
        self.rights.to_mask()
    }

    /// Success and/or failure.
    #[inline]
    #[must_use]
    pub const fn audit_flags(&self) -> AuditFlags {
        self.audit
    }

    /// Inheritance flags.
    #[inline]
    #[must_use]
    pub const fn inheritance(&self) -> InheritanceFlags {
        self.inheritance
    }

    /// Propagation flags.
    #[inline]
    #[must_use]
    pub const fn propagation(&self) -> PropagationFlags {
        self.propagation
    }

    /// Whether the rule was inherited.
    #[inline]
    #[must_use]
    pub const fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Same rule with its principal replaced.
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityReference) -> Self {
        self.identity = identity;
        self
    }
}

/// Either kind of rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationRule<R = AccessMask> {
    /// Discretionary rule.
    Access(AccessRule<R>),
    /// System audit rule.
    Audit(AuditRule<R>),
}

impl<R: AccessRight> AuthorizationRule<R> {
    /// The principal of the rule.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> &IdentityReference {
        match self {
            Self::Access(rule) => rule.identity(),
            Self::Audit(rule) => rule.identity(),
        }
    }

    /// Inheritance flags of the rule.
    #[inline]
    #[must_use]
    pub const fn inheritance(&self) -> InheritanceFlags {
        match self {
            Self::Access(rule) => rule.inheritance(),
            Self::Audit(rule) => rule.inheritance(),
        }
    }

    /// Propagation flags of the rule.
    #[inline]
    #[must_use]
    pub const fn propagation(&self) -> PropagationFlags {
        match self {
            Self::Access(rule) => rule.propagation(),
            Self::Audit(rule) => rule.propagation(),
        }
    }
}

impl<R> From<AccessRule<R>> for AuthorizationRule<R> {
    #[inline]
    fn from(value: AccessRule<R>) -> Self {
        Self::Access(value)
    }
}

impl<R> From<AuditRule<R>> for AuthorizationRule<R> {
    #[inline]
    fn from(value: AuditRule<R>) -> Self {
        Self::Audit(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rights::TokenAccessRights;
    use crate::well_known;

    #[test]
    fn typed_rights_widen_to_mask() {
        let rule = AccessRule::new(
            well_known::WORLD,
            TokenAccessRights::QUERY | TokenAccessRights::DUPLICATE,
            AccessControlType::Allow,
        );
        assert_eq!(rule.mask(), 0xA);
        let raw: AccessRule = rule.clone().map_rights();
        assert_eq!(raw.rights(), 0xA);
        assert_eq!(raw.map_rights::<TokenAccessRights>(), rule);
    }
}
