//! Opening, duplicating and impersonating access tokens.

use core::marker::PhantomData;

use tracing::{debug, warn};

use crate::descriptor::SecurityDescriptor;
use crate::error::NativeErrorCode;
use crate::native::{DuplicateRequest, NativeApi};
use crate::rights::{ProcessAccessRights, ThreadAccessRights, TokenAccessRights};
use crate::token_info::{self, ImpersonationLevel, TokenType};
use crate::translate::{IdentityTranslator, TranslationMode};
use crate::{Error, IdentityKind, IdentityReference, Result};

/// Rights [`impersonate_process`] opens the process token with.
pub const IMPERSONATION_ACCESS: TokenAccessRights = TokenAccessRights::QUERY
    .union(TokenAccessRights::DUPLICATE)
    .union(TokenAccessRights::IMPERSONATE);

/// Opens the token of the calling thread, or of the process when the thread
/// is not impersonating.
///
/// # Errors
/// [`Error::Native`] naming `OpenThreadToken` for any thread failure other
/// than `ERROR_NO_TOKEN`, or `OpenProcessToken`.
pub fn open_current_token<A: NativeApi + ?Sized>(api: &A, access: TokenAccessRights) -> Result<A::Handle> {
    let thread = api.current_thread();
    match api.open_thread_token(&thread, access, true) {
        Ok(token) => {
            debug!(?access, "opened the impersonation token of the current thread");
            Ok(token)
        }
        Err(NativeErrorCode::NoToken) => {
            let process = api.current_process();
            api.open_process_token(&process, access)
                .map_err(|code| Error::native("OpenProcessToken", code))
        }
        Err(code) => Err(Error::native("OpenThreadToken", code)),
    }
}

/// Opens the primary token of process `pid`; `0` is the calling process.
///
/// # Errors
/// [`Error::Native`] naming `OpenProcess` or `OpenProcessToken`, with the
/// process ID as target.
pub fn open_process_token<A: NativeApi + ?Sized>(
    api: &A,
    pid: u32,
    access: TokenAccessRights,
) -> Result<A::Handle> {
    let process = if pid == 0 {
        api.current_process()
    } else {
        api.open_process(pid, ProcessAccessRights::QUERY_INFORMATION)
            .map_err(|code| Error::native_for("OpenProcess", pid, code))?
    };
    api.open_process_token(&process, access)
        .map_err(|code| Error::native_for("OpenProcessToken", pid, code))
}

/// Opens the impersonation token of thread `tid`.
///
/// With `open_as_self` the access check uses the process security context
/// instead of the thread's.
///
/// # Errors
/// [`Error::Native`] naming `OpenThread` or `OpenThreadToken`; a thread that
/// is not impersonating reports [`NativeErrorCode::NoToken`].
pub fn open_thread_token<A: NativeApi + ?Sized>(
    api: &A,
    tid: u32,
    access: TokenAccessRights,
    open_as_self: bool,
) -> Result<A::Handle> {
    let thread = api
        .open_thread(tid, ThreadAccessRights::QUERY_INFORMATION)
        .map_err(|code| Error::native_for("OpenThread", tid, code))?;
    api.open_thread_token(&thread, access, open_as_self)
        .map_err(|code| Error::native_for("OpenThreadToken", tid, code))
}

/// Settings for [`duplicate_token`].
///
/// The defaults request the source handle's access, a non-inheritable
/// handle, the default security and a primary token at impersonation level.
#[derive(Debug, Clone, Default)]
pub struct DuplicateOptions {
    /// Access for the new handle; empty means the access of the source handle.
    pub access: TokenAccessRights,
    /// Whether child processes inherit the new handle.
    pub inherit: bool,
    /// Security of the new token object.
    pub descriptor: Option<SecurityDescriptor>,
    /// Impersonation level of the new token.
    pub impersonation_level: ImpersonationLevel,
    /// Primary or impersonation token.
    pub token_type: TokenType,
}

impl DuplicateOptions {
    /// Sets [`Self::access`].
    #[inline]
    #[must_use]
    pub fn with_access(mut self, access: TokenAccessRights) -> Self {
        self.access = access;
        self
    }

    /// Sets [`Self::inherit`].
    #[inline]
    #[must_use]
    pub fn with_inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Sets [`Self::descriptor`].
    #[inline]
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: SecurityDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Sets [`Self::impersonation_level`].
    #[inline]
    #[must_use]
    pub fn with_impersonation_level(mut self, level: ImpersonationLevel) -> Self {
        self.impersonation_level = level;
        self
    }

    /// Sets [`Self::token_type`].
    #[inline]
    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }
}

/// Duplicates `token` into a new token object.
///
/// # Errors
/// [`Error::Native`] naming `DuplicateTokenEx`.
pub fn duplicate_token<A: NativeApi + ?Sized>(
    api: &A,
    token: &A::Handle,
    options: &DuplicateOptions,
) -> Result<A::Handle> {
    let request = DuplicateRequest {
        access: options.access,
        inherit: options.inherit,
        descriptor: options.descriptor.as_ref(),
        impersonation_level: options.impersonation_level,
        token_type: options.token_type,
    };
    debug!(
        access = ?options.access,
        inherit = options.inherit,
        level = ?options.impersonation_level,
        token_type = ?options.token_type,
        "duplicating token"
    );
    api.duplicate_token(token, &request)
        .map_err(|code| Error::native("DuplicateTokenEx", code))
}

/// The calling thread impersonating a token.
///
/// Created by [`impersonate`]. The thread returns to its own security
/// context through [`Self::revert`] or when the context is dropped. The
/// context is tied to the thread that created it and is not `Send`.
#[must_use = "dropping the context ends the impersonation"]
pub struct ImpersonationContext<'a, A: NativeApi + ?Sized> {
    api: &'a A,
    user: IdentityReference,
    active: bool,
    _not_send: PhantomData<*const ()>,
}

impl<A: NativeApi + ?Sized> core::fmt::Debug for ImpersonationContext<'_, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImpersonationContext")
            .field("user", &self.user)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl<A: NativeApi + ?Sized> ImpersonationContext<'_, A> {
    /// The impersonated user, as an account name when it could be resolved
    /// and as a SID otherwise.
    #[inline]
    #[must_use]
    pub const fn user(&self) -> &IdentityReference {
        &self.user
    }

    /// Ends the impersonation.
    ///
    /// # Errors
    /// [`Error::Native`] naming `RevertToSelf`.
    pub fn revert(mut self) -> Result<()> {
        self.active = false;
        debug!(user = %self.user, "reverting impersonation");
        self.api
            .revert_to_self()
            .map_err(|code| Error::native("RevertToSelf", code))
    }
}

impl<A: NativeApi + ?Sized> Drop for ImpersonationContext<'_, A> {
    fn drop(&mut self) {
        if self.active {
            if let Err(code) = self.api.revert_to_self() {
                warn!(user = %self.user, %code, "failed to revert impersonation");
            }
        }
    }
}

/// Makes the calling thread impersonate `token`.
///
/// The token needs query, duplicate and impersonate access. A thread that is
/// already impersonating is refused so contexts never nest.
///
/// # Errors
/// - [`Error::InvalidComposition`] if the thread is already impersonating.
/// - [`Error::Native`] naming `OpenThreadToken`, `GetTokenInformation`, a
///   lookup operation or `ImpersonateLoggedOnUser`.
pub fn impersonate<'a, A: NativeApi + ?Sized>(
    api: &'a A,
    token: &A::Handle,
) -> Result<ImpersonationContext<'a, A>> {
    let thread = api.current_thread();
    match api.open_thread_token(&thread, TokenAccessRights::QUERY, true) {
        Ok(_) => {
            return Err(Error::InvalidComposition(
                "cannot enter a token context while the thread is already impersonating".into(),
            ));
        }
        Err(NativeErrorCode::NoToken) => {}
        Err(code) => return Err(Error::native("OpenThreadToken", code)),
    }

    let sid = token_info::user(api, token)?;
    let user = IdentityTranslator::new(api).translate(
        &IdentityReference::Sid(sid),
        IdentityKind::Account,
        TranslationMode::Lenient,
    )?;

    api.impersonate(token)
        .map_err(|code| Error::native("ImpersonateLoggedOnUser", code))?;
    debug!(%user, "impersonating");
    Ok(ImpersonationContext {
        api,
        user,
        active: true,
        _not_send: PhantomData,
    })
}

/// Opens the token of process `pid` (`0` for the calling process) and
/// impersonates it. The token handle is closed before returning.
///
/// # Errors
/// See [`open_process_token`] and [`impersonate`].
pub fn impersonate_process<A: NativeApi + ?Sized>(api: &A, pid: u32) -> Result<ImpersonationContext<'_, A>> {
    let token = open_process_token(api, pid, IMPERSONATION_ACCESS)?;
    impersonate(api, &token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use crate::test_support::{CURRENT_TID, MockApi, OTHER_PID, alice, sid};
    use crate::{DisplayAccount, well_known};

    #[test]
    fn current_token_falls_back_to_process() {
        let api = MockApi::new();
        let token = open_current_token(&api, TokenAccessRights::QUERY).unwrap();
        assert_eq!(token_info::user(&api, &token).unwrap(), alice());
        assert_eq!(api.calls(), ["OpenThreadToken", "OpenProcessToken"]);
    }

    #[test]
    fn current_token_prefers_thread() {
        let api = MockApi::new();
        let system = open_process_token(&api, OTHER_PID, TokenAccessRights::QUERY).unwrap();
        api.set_thread_token(&system);
        let token = open_current_token(&api, TokenAccessRights::QUERY).unwrap();
        assert_eq!(token_info::user(&api, &token).unwrap(), well_known::LOCAL_SYSTEM);
    }

    #[test]
    fn open_by_id() {
        let api = MockApi::new();
        let own = open_process_token(&api, 0, TokenAccessRights::QUERY).unwrap();
        assert_eq!(token_info::user(&api, &own).unwrap(), alice());
        assert_eq!(api.call_count("OpenProcess"), 0);

        let err = open_process_token(&api, 77, TokenAccessRights::QUERY).unwrap_err();
        assert!(matches!(
            err,
            Error::Native { operation: "OpenProcess", code: NativeErrorCode::InvalidParameter, .. }
        ));

        let err = open_thread_token(&api, CURRENT_TID, TokenAccessRights::QUERY, false).unwrap_err();
        assert_eq!(err.native_code(), Some(NativeErrorCode::NoToken));
        // The opened process and thread handles are released on every path.
        drop(own);
        assert_eq!(api.open_handle_count(), 0);
    }

    #[test]
    fn duplicate_defaults() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let copy = duplicate_token(&api, &token, &DuplicateOptions::default()).unwrap();
        assert_eq!(
            api.duplicates(),
            [(0, false, ImpersonationLevel::Impersonation, TokenType::Primary)]
        );
        assert_eq!(api.token_of(&copy).token_type, TokenType::Primary);
    }

    #[test]
    fn duplicate_impersonation_token() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let options = DuplicateOptions::default()
            .with_access(TokenAccessRights::QUERY | TokenAccessRights::IMPERSONATE)
            .with_inherit(true)
            .with_token_type(TokenType::Impersonation)
            .with_impersonation_level(ImpersonationLevel::Identification);
        let copy = duplicate_token(&api, &token, &options).unwrap();
        assert_eq!(
            token_info::impersonation_level(&api, &copy).unwrap(),
            Some(ImpersonationLevel::Identification)
        );
        assert_eq!(
            crate::handle::handle_information(&api, &copy).unwrap(),
            crate::HandleFlags::INHERIT
        );
    }

    #[test]
    fn duplicate_needs_duplicate_access() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let query_only = api.reopen_with_access(&token, TokenAccessRights::QUERY);
        let err = duplicate_token(&api, &query_only, &DuplicateOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Native { operation: "DuplicateTokenEx", code: NativeErrorCode::AccessDenied, .. }
        ));
    }

    #[test]
    fn impersonation_reverts_on_drop() {
        let api = MockApi::new();
        {
            let context = impersonate_process(&api, OTHER_PID).unwrap();
            assert_eq!(
                context.user(),
                &IdentityReference::Account(DisplayAccount::new("NT AUTHORITY", "SYSTEM"))
            );
            assert_eq!(api.thread_token_user(), Some(well_known::LOCAL_SYSTEM.to_sid()));
        }
        assert_eq!(api.thread_token_user(), None);
        assert_eq!(api.revert_count(), 1);
        assert_eq!(api.open_handle_count(), 0);
    }

    #[test]
    fn explicit_revert_runs_once() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let context = impersonate(&api, &token).unwrap();
        context.revert().unwrap();
        assert_eq!(api.revert_count(), 1);
    }

    #[test]
    fn nested_impersonation_is_refused() {
        let api = MockApi::new();
        let token = api.process_token_handle();
        let _context = impersonate(&api, &token).unwrap();
        let err = impersonate(&api, &token).unwrap_err();
        assert!(matches!(err, Error::InvalidComposition(_)));
        assert_eq!(api.call_count("ImpersonateLoggedOnUser"), 1);
    }

    #[test]
    fn unnamed_user_is_kept_as_sid() {
        let api = MockApi::new();
        let stranger = sid("S-1-5-21-8-8-8-1111");
        let token = api.add_token(crate::test_support::MockToken {
            user: stranger.clone(),
            ..crate::test_support::MockToken::sample()
        });
        let context = impersonate(&api, &token).unwrap();
        assert_eq!(context.user(), &IdentityReference::Sid(stranger));
    }

    #[test]
    fn failed_impersonation_does_not_revert() {
        let api = MockApi::new();
        api.fail_impersonate(NativeErrorCode::BadImpersonationLevel);
        let token = api.process_token_handle();
        let err = impersonate(&api, &token).unwrap_err();
        assert_eq!(err.native_code(), Some(NativeErrorCode::BadImpersonationLevel));
        assert_eq!(api.revert_count(), 0);
    }
}
