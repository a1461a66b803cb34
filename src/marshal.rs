//! Conversion between raw access-control entries and typed rules.
//!
//! Reading translates each trustee leniently: an entry whose SID cannot be
//! named keeps its SID. Writing resolves every rule's identity to a SID and
//! widens its rights to a raw mask. Entry order is preserved both ways.

use tracing::trace;

use crate::acl::{AceFlags, AceType, RawAce, RawAcl};
use crate::error::IdentityRole;
use crate::native::NativeApi;
use crate::rights::{AccessMask, AccessRight};
use crate::rule::{
    AccessControlType, AccessRule, AuditFlags, AuditRule, AuthorizationRule, InheritanceFlags,
    PropagationFlags,
};
use crate::translate::{IdentityTranslator, TranslationMode};
use crate::{IdentityKind, IdentityReference, Result};

fn inheritance_from(flags: AceFlags) -> (InheritanceFlags, PropagationFlags) {
    let mut inheritance = InheritanceFlags::empty();
    inheritance.set(InheritanceFlags::CONTAINER_INHERIT, flags.contains(AceFlags::CONTAINER_INHERIT));
    inheritance.set(InheritanceFlags::OBJECT_INHERIT, flags.contains(AceFlags::OBJECT_INHERIT));
    let mut propagation = PropagationFlags::empty();
    propagation.set(PropagationFlags::NO_PROPAGATE_INHERIT, flags.contains(AceFlags::NO_PROPAGATE_INHERIT));
    propagation.set(PropagationFlags::INHERIT_ONLY, flags.contains(AceFlags::INHERIT_ONLY));
    (inheritance, propagation)
}

fn ace_flags(inheritance: InheritanceFlags, propagation: PropagationFlags, inherited: bool) -> AceFlags {
    let mut flags = AceFlags::empty();
    flags.set(AceFlags::CONTAINER_INHERIT, inheritance.contains(InheritanceFlags::CONTAINER_INHERIT));
    flags.set(AceFlags::OBJECT_INHERIT, inheritance.contains(InheritanceFlags::OBJECT_INHERIT));
    flags.set(AceFlags::NO_PROPAGATE_INHERIT, propagation.contains(PropagationFlags::NO_PROPAGATE_INHERIT));
    flags.set(AceFlags::INHERIT_ONLY, propagation.contains(PropagationFlags::INHERIT_ONLY));
    flags.set(AceFlags::INHERITED, inherited);
    flags
}

/// Converts the entries of `acl` into rules whose identities are of `kind`.
///
/// Allow, deny and audit entries become rules; other entry types (alarms,
/// mandatory labels, object entries) are skipped.
///
/// # Errors
/// Lookup failures other than "not mapped" abort the conversion.
pub fn to_rules<A: NativeApi + ?Sized>(
    translator: &IdentityTranslator<'_, A>,
    acl: &RawAcl,
    kind: IdentityKind,
) -> Result<Vec<AuthorizationRule>> {
    let mut rules = Vec::with_capacity(acl.len());
    for ace in acl {
        let (Some(mask), Some(sid)) = (ace.mask(), ace.sid()) else {
            trace!(ace_type = ?ace.ace_type, "skipping opaque access-control entry");
            continue;
        };
        let control = match ace.ace_type {
            AceType::AccessAllowed => Some(AccessControlType::Allow),
            AceType::AccessDenied => Some(AccessControlType::Deny),
            AceType::SystemAudit => None,
            other => {
                trace!(ace_type = ?other, "skipping non-discretionary access-control entry");
                continue;
            }
        };
        let identity = translator.translate(&IdentityReference::Sid(sid.clone()), kind, TranslationMode::Lenient)?;
        let (inheritance, propagation) = inheritance_from(ace.flags);
        let inherited = ace.flags.contains(AceFlags::INHERITED);
        let rule = if let Some(control) = control {
            AuthorizationRule::Access(
                AccessRule::new(identity, mask, control)
                    .with_inheritance(inheritance, propagation)
                    .with_inherited(inherited),
            )
        } else {
            let mut audit = AuditFlags::empty();
            audit.set(AuditFlags::SUCCESS, ace.flags.contains(AceFlags::SUCCESSFUL_ACCESS));
            audit.set(AuditFlags::FAILURE, ace.flags.contains(AceFlags::FAILED_ACCESS));
            AuthorizationRule::Audit(
                AuditRule::new(identity, mask, audit)
                    .with_inheritance(inheritance, propagation)
                    .with_inherited(inherited),
            )
        };
        rules.push(rule);
    }
    Ok(rules)
}

/// Converts one access rule into a raw entry, resolving its identity.
pub(crate) fn access_ace<A: NativeApi + ?Sized, R: AccessRight>(
    translator: &IdentityTranslator<'_, A>,
    index: usize,
    rule: &AccessRule<R>,
) -> Result<RawAce> {
    let sid = translator.to_sid_for(rule.identity(), IdentityRole::Rule(index))?;
    let ace_type = match rule.control() {
        AccessControlType::Allow => AceType::AccessAllowed,
        AccessControlType::Deny => AceType::AccessDenied,
    };
    let mask: AccessMask = rule.mask();
    Ok(RawAce::new(
        ace_type,
        ace_flags(rule.inheritance(), rule.propagation(), rule.is_inherited()),
        mask,
        sid,
    ))
}

fn audit_ace<A: NativeApi + ?Sized, R: AccessRight>(
    translator: &IdentityTranslator<'_, A>,
    index: usize,
    rule: &AuditRule<R>,
) -> Result<RawAce> {
    let sid = translator.to_sid_for(rule.identity(), IdentityRole::Rule(index))?;
    let mut flags = ace_flags(rule.inheritance(), rule.propagation(), rule.is_inherited());
    flags.set(AceFlags::SUCCESSFUL_ACCESS, rule.audit_flags().contains(AuditFlags::SUCCESS));
    flags.set(AceFlags::FAILED_ACCESS, rule.audit_flags().contains(AuditFlags::FAILURE));
    Ok(RawAce::new(AceType::SystemAudit, flags, rule.mask(), sid))
}

/// Converts rules into a raw ACL, in order.
///
/// # Errors
/// [`Error::IdentityNotMapped`](crate::Error::IdentityNotMapped) tagged with
/// the index of the first rule whose identity cannot be resolved.
pub fn to_raw_acl<A: NativeApi + ?Sized, R: AccessRight>(
    translator: &IdentityTranslator<'_, A>,
    rules: &[AuthorizationRule<R>],
) -> Result<RawAcl> {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| match rule {
            AuthorizationRule::Access(rule) => access_ace(translator, index, rule),
            AuthorizationRule::Audit(rule) => audit_ace(translator, index, rule),
        })
        .collect()
}
