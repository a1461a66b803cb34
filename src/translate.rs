//! Translation between SIDs and account names.
//!
//! The OS lookup service is asked first. Only when it answers "none mapped"
//! does the translator consult a small table of identities the service does
//! not know: mandatory integrity labels and logon-session SIDs. Any other
//! lookup failure is reported as is.

use tracing::{debug, warn};

use crate::error::{IdentityRole, NativeErrorCode};
use crate::native::NativeApi;
use crate::well_known::{
    LOGON_SESSION_DOMAIN, LOGON_SESSION_NAME_PREFIX, LOGON_SESSION_PREFIX, MANDATORY_LABEL_DOMAIN,
    MANDATORY_LABELS,
};
use crate::{DisplayAccount, Error, IdentityKind, IdentityReference, Result, SecurityIdentifier};

/// How translation failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TranslationMode {
    /// An untranslatable identity is an error.
    #[default]
    Strict,
    /// An untranslatable identity is returned unchanged, with a warning.
    Lenient,
}

/// Account name for a SID the lookup service did not map.
#[must_use]
pub fn fallback_account(sid: &SecurityIdentifier) -> Option<DisplayAccount> {
    if let Some((_, name)) = MANDATORY_LABELS.iter().find(|(label, _)| label == sid) {
        return Some(DisplayAccount::new(MANDATORY_LABEL_DOMAIN, *name));
    }
    // S-1-5-5-X-Y
    if LOGON_SESSION_PREFIX.is_prefix_of(sid) && sid.sub_authorities().len() == 3 {
        let [_, high, low] = sid.sub_authorities() else {
            return None;
        };
        return Some(DisplayAccount::new(
            LOGON_SESSION_DOMAIN,
            format!("{LOGON_SESSION_NAME_PREFIX}{high}_{low}"),
        ));
    }
    None
}

/// SID for an account name the lookup service did not map.
///
/// Domain and name are compared case-insensitively.
#[must_use]
pub fn fallback_sid(account: &DisplayAccount) -> Option<SecurityIdentifier> {
    if account.domain.eq_ignore_ascii_case(MANDATORY_LABEL_DOMAIN) {
        return MANDATORY_LABELS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(&account.name))
            .map(|(label, _)| label.to_sid());
    }
    if account.domain.eq_ignore_ascii_case(LOGON_SESSION_DOMAIN) {
        let prefix_len = LOGON_SESSION_NAME_PREFIX.len();
        let prefix = account.name.get(..prefix_len)?;
        if !prefix.eq_ignore_ascii_case(LOGON_SESSION_NAME_PREFIX) {
            return None;
        }
        let suffix = account.name.get(prefix_len..)?;
        let (high, low) = suffix.split_once('_')?;
        let [prefix_rid] = LOGON_SESSION_PREFIX.sub_authority;
        return SecurityIdentifier::try_new(
            LOGON_SESSION_PREFIX.revision,
            LOGON_SESSION_PREFIX.identifier_authority,
            &[prefix_rid, parse_component(high)?, parse_component(low)?],
        );
    }
    None
}

/// Decimal or `0x` hexadecimal.
fn parse_component(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Translates identities through a [`NativeApi`].
#[derive(Debug, Clone, Copy)]
pub struct IdentityTranslator<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: NativeApi + ?Sized> IdentityTranslator<'a, A> {
    /// Translator backed by `api`.
    #[inline]
    #[must_use]
    pub const fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Resolves `identity` to a SID.
    ///
    /// # Errors
    /// - [`Error::IdentityNotMapped`] when neither the OS nor the fallback
    ///   table knows the account.
    /// - [`Error::Native`] naming `LookupAccountName` for any other lookup failure.
    pub fn to_sid(&self, identity: &IdentityReference) -> Result<SecurityIdentifier> {
        let account = match identity {
            IdentityReference::Sid(sid) => return Ok(sid.clone()),
            IdentityReference::Account(account) => account,
        };
        match self.api.lookup_account_name(account) {
            Ok(sid) => Ok(sid),
            Err(NativeErrorCode::NoneMapped) => fallback_sid(account).ok_or_else(|| {
                debug!(%account, "account is not mapped");
                Error::IdentityNotMapped {
                    identity: account.to_string(),
                    role: None,
                }
            }),
            Err(code) => Err(Error::native_for("LookupAccountName", account, code)),
        }
    }

    /// Resolves `identity` to an account name.
    ///
    /// # Errors
    /// - [`Error::IdentityNotMapped`] when neither the OS nor the fallback
    ///   table knows the SID.
    /// - [`Error::Native`] naming `LookupAccountSid` for any other lookup failure.
    pub fn to_account(&self, identity: &IdentityReference) -> Result<DisplayAccount> {
        let sid = match identity {
            IdentityReference::Account(account) => return Ok(account.clone()),
            IdentityReference::Sid(sid) => sid,
        };
        match self.api.lookup_account_sid(sid) {
            Ok(lookup) => Ok(lookup.account),
            Err(NativeErrorCode::NoneMapped) => fallback_account(sid).ok_or_else(|| {
                debug!(%sid, "SID is not mapped");
                Error::IdentityNotMapped {
                    identity: sid.to_string(),
                    role: None,
                }
            }),
            Err(code) => Err(Error::native_for("LookupAccountSid", sid, code)),
        }
    }

    /// Converts `identity` into the requested representation.
    ///
    /// In [`TranslationMode::Lenient`] an unmapped identity is returned
    /// unchanged; other failures are still errors.
    ///
    /// # Errors
    /// See [`Self::to_sid`] and [`Self::to_account`].
    pub fn translate(
        &self,
        identity: &IdentityReference,
        kind: IdentityKind,
        mode: TranslationMode,
    ) -> Result<IdentityReference> {
        let translated = match kind {
            IdentityKind::Sid => self.to_sid(identity).map(IdentityReference::Sid),
            IdentityKind::Account => self.to_account(identity).map(IdentityReference::Account),
        };
        match (translated, mode) {
            (Err(err), TranslationMode::Lenient) if err.is_identity_not_mapped() => {
                warn!(%identity, "identity could not be translated, keeping it as is");
                Ok(identity.clone())
            }
            (result, _) => result,
        }
    }

    /// [`Self::to_sid`] with the failure tagged by where the identity is used.
    pub(crate) fn to_sid_for(&self, identity: &IdentityReference, role: IdentityRole) -> Result<SecurityIdentifier> {
        self.to_sid(identity).map_err(|err| match err {
            Error::IdentityNotMapped { identity, .. } => Error::IdentityNotMapped {
                identity,
                role: Some(role),
            },
            other => other,
        })
    }
}
