//! Scripted [`NativeApi`] used by the unit tests.
//!
//! The mock keeps a small table of tokens, processes and accounts, writes
//! token information in the same layout the OS uses (pointer fields refer
//! into the caller's buffer) and records every call so tests can assert on
//! call order, buffer sizes and handle release.

#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]

use core::cell::RefCell;
use core::mem::size_of;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::acl::{AceFlags, AceType, RawAce, RawAcl};
use crate::buffer::NativeBuffer;
use crate::descriptor::{AccessControlSections, Dacl};
use crate::error::NativeErrorCode;
use crate::handle::HandleFlags;
use crate::native::{
    AccountLookup, DuplicateRequest, NativeApi, NativeResult, ObjectSecurity, SecurityUpdate,
};
use crate::rights::{ProcessAccessRights, ThreadAccessRights, TokenAccessRights};
use crate::sid_type::SidType;
use crate::token_info::{GroupAttributes, ImpersonationLevel, TokenGroup, TokenInformationClass, TokenType};
use crate::{DisplayAccount, SecurityIdentifier, well_known};

pub(crate) const CURRENT_PID: u32 = 100;
pub(crate) const OTHER_PID: u32 = 4321;
pub(crate) const CURRENT_TID: u32 = 200;

const READ_CONTROL: u32 = 0x0002_0000;
const WRITE_DAC: u32 = 0x0004_0000;
const WRITE_OWNER: u32 = 0x0008_0000;
const PTR_SIZE: usize = size_of::<usize>();

pub(crate) fn sid(s: &str) -> SecurityIdentifier {
    s.parse().unwrap()
}

pub(crate) fn alice() -> SecurityIdentifier {
    sid("S-1-5-21-1-2-3-1001")
}

pub(crate) fn domain_users() -> SecurityIdentifier {
    sid("S-1-5-21-1-2-3-513")
}

/// State of one token in the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockToken {
    pub user: SecurityIdentifier,
    pub owner: SecurityIdentifier,
    pub primary_group: SecurityIdentifier,
    pub default_dacl: Option<RawAcl>,
    pub token_type: TokenType,
    pub impersonation_level: Option<ImpersonationLevel>,
    pub integrity_level: SecurityIdentifier,
    pub groups: Vec<TokenGroup>,
    pub session_id: u32,
}

impl MockToken {
    pub fn sample() -> Self {
        Self {
            user: alice(),
            owner: well_known::BUILTIN_ADMINISTRATORS.to_sid(),
            primary_group: domain_users(),
            default_dacl: Some(
                [
                    RawAce::new(AceType::AccessAllowed, AceFlags::empty(), 0x1000_0000, alice()),
                    RawAce::new(
                        AceType::AccessAllowed,
                        AceFlags::empty(),
                        0x1000_0000,
                        well_known::LOCAL_SYSTEM.to_sid(),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
            token_type: TokenType::Primary,
            impersonation_level: None,
            integrity_level: well_known::MEDIUM_MANDATORY_LEVEL.to_sid(),
            groups: vec![
                TokenGroup {
                    sid: well_known::WORLD.to_sid(),
                    attributes: GroupAttributes::MANDATORY | GroupAttributes::ENABLED,
                },
                TokenGroup {
                    sid: sid("S-1-5-5-0-12345"),
                    attributes: GroupAttributes::LOGON_ID | GroupAttributes::ENABLED,
                },
                TokenGroup {
                    sid: well_known::BUILTIN_ADMINISTRATORS.to_sid(),
                    attributes: GroupAttributes::OWNER | GroupAttributes::ENABLED,
                },
            ],
            session_id: 1,
        }
    }

    fn security(&self) -> ObjectSecurity {
        ObjectSecurity {
            owner: Some(self.owner.clone()),
            group: Some(self.primary_group.clone()),
            dacl: Some(Dacl::Acl(self.default_dacl.clone().unwrap_or_default())),
        }
    }

    /// Bytes the OS would write for `class`, with pointers relative to `base`.
    fn encode(&self, class: TokenInformationClass, base: usize) -> NativeResult<Vec<u8>> {
        let mut out = Vec::new();
        match class {
            TokenInformationClass::User | TokenInformationClass::IntegrityLevel => {
                let (sid, attributes) = if class == TokenInformationClass::User {
                    (&self.user, 0)
                } else {
                    (
                        &self.integrity_level,
                        (GroupAttributes::INTEGRITY | GroupAttributes::INTEGRITY_ENABLED).bits(),
                    )
                };
                write_sid_and_attributes(&mut out, base + 2 * PTR_SIZE, attributes);
                sid.write_bytes(&mut out);
            }
            TokenInformationClass::Owner | TokenInformationClass::PrimaryGroup => {
                let sid = if class == TokenInformationClass::Owner {
                    &self.owner
                } else {
                    &self.primary_group
                };
                out.extend_from_slice(&(base + PTR_SIZE).to_ne_bytes());
                sid.write_bytes(&mut out);
            }
            TokenInformationClass::DefaultDacl => match &self.default_dacl {
                Some(acl) => {
                    out.extend_from_slice(&(base + PTR_SIZE).to_ne_bytes());
                    out.extend_from_slice(&acl.to_bytes().unwrap());
                }
                None => out.extend_from_slice(&0usize.to_ne_bytes()),
            },
            TokenInformationClass::Type => out.extend_from_slice(&u32::from(self.token_type).to_ne_bytes()),
            TokenInformationClass::ImpersonationLevel => {
                let level = self
                    .impersonation_level
                    .ok_or(NativeErrorCode::InvalidParameter)?;
                out.extend_from_slice(&u32::from(level).to_ne_bytes());
            }
            TokenInformationClass::SessionId => out.extend_from_slice(&self.session_id.to_ne_bytes()),
            TokenInformationClass::Groups => encode_groups(&mut out, &self.groups, base),
            TokenInformationClass::LogonSid => {
                let logon: Vec<_> = self
                    .groups
                    .iter()
                    .filter(|g| g.attributes.contains(GroupAttributes::LOGON_ID))
                    .cloned()
                    .collect();
                encode_groups(&mut out, &logon, base);
            }
            _ => return Err(NativeErrorCode::InvalidParameter),
        }
        Ok(out)
    }
}

fn write_sid_and_attributes(out: &mut Vec<u8>, sid_address: usize, attributes: u32) {
    out.extend_from_slice(&sid_address.to_ne_bytes());
    out.extend_from_slice(&attributes.to_ne_bytes());
    out.resize(out.len() + PTR_SIZE - 4, 0);
}

fn encode_groups(out: &mut Vec<u8>, groups: &[TokenGroup], base: usize) {
    out.extend_from_slice(&u32::try_from(groups.len()).unwrap().to_ne_bytes());
    out.resize(PTR_SIZE, 0);
    let mut sid_address = base + PTR_SIZE + groups.len() * 2 * PTR_SIZE;
    for group in groups {
        write_sid_and_attributes(out, sid_address, group.attributes.bits());
        sid_address += group.sid.binary_len();
    }
    for group in groups {
        group.sid.write_bytes(out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Token(usize),
    Process(u32),
    Thread(u32),
}

#[derive(Debug, Clone, Copy)]
struct HandleEntry {
    target: Target,
    access: u32,
    flags: HandleFlags,
    pseudo: bool,
}

/// Owned handle into the mock. Dropping it records the release.
#[derive(Debug)]
pub(crate) struct MockHandle {
    id: u32,
    pseudo: bool,
    released: Rc<RefCell<Vec<u32>>>,
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if !self.pseudo {
            self.released.borrow_mut().push(self.id);
        }
    }
}

#[derive(Debug)]
struct MockState {
    next_id: u32,
    handles: HashMap<u32, HandleEntry>,
    tokens: Vec<MockToken>,
    security: HashMap<Target, ObjectSecurity>,
    processes: HashMap<u32, usize>,
    thread_token: Option<usize>,
    accounts: Vec<(DisplayAccount, SecurityIdentifier, SidType)>,
    queries: Vec<(TokenInformationClass, usize)>,
    calls: Vec<&'static str>,
    too_small_code: NativeErrorCode,
    growth: HashMap<TokenInformationClass, u32>,
    stuck: HashSet<TokenInformationClass>,
    query_failures: HashMap<TokenInformationClass, NativeErrorCode>,
    lookup_failure: Option<NativeErrorCode>,
    set_security_failure: Option<NativeErrorCode>,
    impersonate_failure: Option<NativeErrorCode>,
    revert_count: u32,
    duplicates: Vec<(u32, bool, ImpersonationLevel, TokenType)>,
    opened_handles: u32,
}

/// In-memory stand-in for the OS.
#[derive(Debug)]
pub(crate) struct MockApi {
    state: RefCell<MockState>,
    released: Rc<RefCell<Vec<u32>>>,
}

impl MockApi {
    pub fn new() -> Self {
        let current = MockToken::sample();
        let other = MockToken {
            user: well_known::LOCAL_SYSTEM.to_sid(),
            owner: well_known::LOCAL_SYSTEM.to_sid(),
            primary_group: well_known::LOCAL_SYSTEM.to_sid(),
            integrity_level: well_known::SYSTEM_MANDATORY_LEVEL.to_sid(),
            session_id: 0,
            ..MockToken::sample()
        };
        let mut security = HashMap::new();
        security.insert(Target::Token(0), current.security());
        security.insert(Target::Token(1), other.security());
        security.insert(Target::Process(CURRENT_PID), current.security());
        let accounts = vec![
            (DisplayAccount::new("DOMAIN", "alice"), alice(), SidType::User),
            (DisplayAccount::new("DOMAIN", "Domain Users"), domain_users(), SidType::Group),
            (
                DisplayAccount::new("BUILTIN", "Administrators"),
                well_known::BUILTIN_ADMINISTRATORS.to_sid(),
                SidType::Alias,
            ),
            (
                DisplayAccount::new("BUILTIN", "Users"),
                well_known::BUILTIN_USERS.to_sid(),
                SidType::Alias,
            ),
            (
                DisplayAccount::new("NT AUTHORITY", "SYSTEM"),
                well_known::LOCAL_SYSTEM.to_sid(),
                SidType::WellKnownGroup,
            ),
            (
                DisplayAccount::new("", "Everyone"),
                well_known::WORLD.to_sid(),
                SidType::WellKnownGroup,
            ),
        ];
        Self {
            state: RefCell::new(MockState {
                next_id: 16,
                handles: HashMap::new(),
                tokens: vec![current, other],
                security,
                processes: HashMap::from([(CURRENT_PID, 0), (OTHER_PID, 1)]),
                thread_token: None,
                accounts,
                queries: Vec::new(),
                calls: Vec::new(),
                too_small_code: NativeErrorCode::InsufficientBuffer,
                growth: HashMap::new(),
                stuck: HashSet::new(),
                query_failures: HashMap::new(),
                lookup_failure: None,
                set_security_failure: None,
                impersonate_failure: None,
                revert_count: 0,
                duplicates: Vec::new(),
                opened_handles: 0,
            }),
            released: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn new_handle(&self, target: Target, access: u32) -> MockHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.opened_handles += 1;
        state.handles.insert(
            id,
            HandleEntry {
                target,
                access,
                flags: HandleFlags::empty(),
                pseudo: false,
            },
        );
        MockHandle {
            id,
            pseudo: false,
            released: Rc::clone(&self.released),
        }
    }

    fn pseudo_handle(&self, id: u32, target: Target) -> MockHandle {
        self.state.borrow_mut().handles.insert(
            id,
            HandleEntry {
                target,
                access: u32::MAX,
                flags: HandleFlags::empty(),
                pseudo: true,
            },
        );
        MockHandle {
            id,
            pseudo: true,
            released: Rc::clone(&self.released),
        }
    }

    fn entry(&self, handle: &MockHandle) -> NativeResult<HandleEntry> {
        if self.released.borrow().contains(&handle.id) {
            return Err(NativeErrorCode::InvalidHandle);
        }
        self.state
            .borrow()
            .handles
            .get(&handle.id)
            .copied()
            .ok_or(NativeErrorCode::InvalidHandle)
    }

    fn token_index(&self, handle: &MockHandle) -> NativeResult<(usize, u32)> {
        match self.entry(handle)? {
            HandleEntry {
                target: Target::Token(index),
                access,
                ..
            } => Ok((index, access)),
            _ => Err(NativeErrorCode::InvalidHandle),
        }
    }

    fn record(&self, call: &'static str) {
        self.state.borrow_mut().calls.push(call);
    }

    /// New handle with full access to the current process token.
    pub fn process_token_handle(&self) -> MockHandle {
        self.new_handle(Target::Token(0), u32::MAX)
    }

    /// Adds a token and returns a full-access handle to it.
    pub fn add_token(&self, token: MockToken) -> MockHandle {
        let index = {
            let mut state = self.state.borrow_mut();
            state.tokens.push(token.clone());
            let index = state.tokens.len() - 1;
            state.security.insert(Target::Token(index), token.security());
            index
        };
        self.new_handle(Target::Token(index), u32::MAX)
    }

    /// Handle to an existing token with exactly `access`.
    pub fn reopen_with_access(&self, handle: &MockHandle, access: TokenAccessRights) -> MockHandle {
        let (index, _) = self.token_index(handle).unwrap();
        self.new_handle(Target::Token(index), access.bits())
    }

    pub fn process_token(&self) -> MockToken {
        self.state.borrow().tokens[0].clone()
    }

    pub fn token_of(&self, handle: &MockHandle) -> MockToken {
        let (index, _) = self.token_index(handle).unwrap();
        self.state.borrow().tokens[index].clone()
    }

    pub fn security_of(&self, handle: &MockHandle) -> ObjectSecurity {
        let target = self.entry(handle).unwrap().target;
        self.state.borrow().security.get(&target).cloned().unwrap_or_default()
    }

    /// Makes the current thread impersonate the token behind `handle`.
    pub fn set_thread_token(&self, handle: &MockHandle) {
        let (index, _) = self.token_index(handle).unwrap();
        self.state.borrow_mut().thread_token = Some(index);
    }

    pub fn thread_token_user(&self) -> Option<SecurityIdentifier> {
        let state = self.state.borrow();
        state.thread_token.map(|index| state.tokens[index].user.clone())
    }

    pub fn required_size(&self, class: TokenInformationClass) -> usize {
        self.process_token().encode(class, 0).unwrap().len()
    }

    /// Buffer lengths passed to each `GetTokenInformation` call for `class`.
    pub fn query_sizes(&self, class: TokenInformationClass) -> Vec<usize> {
        self.state
            .borrow()
            .queries
            .iter()
            .filter(|(c, _)| *c == class)
            .map(|(_, len)| *len)
            .collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == call).count()
    }

    /// Handles opened and not yet released.
    pub fn open_handle_count(&self) -> usize {
        self.state.borrow().opened_handles as usize - self.released.borrow().len()
    }

    pub fn revert_count(&self) -> u32 {
        self.state.borrow().revert_count
    }

    pub fn duplicates(&self) -> Vec<(u32, bool, ImpersonationLevel, TokenType)> {
        self.state.borrow().duplicates.clone()
    }

    pub fn set_too_small_code(&self, code: NativeErrorCode) {
        self.state.borrow_mut().too_small_code = code;
    }

    /// The next `rounds` sized calls for `class` report a bigger size.
    pub fn set_growth(&self, class: TokenInformationClass, rounds: u32) {
        self.state.borrow_mut().growth.insert(class, rounds);
    }

    /// Sized calls for `class` keep reporting the size they were given.
    pub fn set_stuck(&self, class: TokenInformationClass) {
        self.state.borrow_mut().stuck.insert(class);
    }

    pub fn fail_query(&self, class: TokenInformationClass, code: NativeErrorCode) {
        self.state.borrow_mut().query_failures.insert(class, code);
    }

    pub fn fail_lookups(&self, code: NativeErrorCode) {
        self.state.borrow_mut().lookup_failure = Some(code);
    }

    pub fn fail_set_security(&self, code: NativeErrorCode) {
        self.state.borrow_mut().set_security_failure = Some(code);
    }

    pub fn fail_impersonate(&self, code: NativeErrorCode) {
        self.state.borrow_mut().impersonate_failure = Some(code);
    }

    pub fn add_account(&self, account: DisplayAccount, sid: SecurityIdentifier, sid_type: SidType) {
        self.state.borrow_mut().accounts.push((account, sid, sid_type));
    }
}

impl NativeApi for MockApi {
    type Handle = MockHandle;

    fn current_process(&self) -> MockHandle {
        self.pseudo_handle(1, Target::Process(CURRENT_PID))
    }

    fn current_thread(&self) -> MockHandle {
        self.pseudo_handle(2, Target::Thread(CURRENT_TID))
    }

    fn open_process(&self, pid: u32, access: ProcessAccessRights) -> NativeResult<MockHandle> {
        self.record("OpenProcess");
        if !self.state.borrow().processes.contains_key(&pid) {
            return Err(NativeErrorCode::InvalidParameter);
        }
        Ok(self.new_handle(Target::Process(pid), access.bits()))
    }

    fn open_thread(&self, tid: u32, access: ThreadAccessRights) -> NativeResult<MockHandle> {
        self.record("OpenThread");
        if tid != CURRENT_TID {
            return Err(NativeErrorCode::InvalidParameter);
        }
        Ok(self.new_handle(Target::Thread(tid), access.bits()))
    }

    fn open_process_token(&self, process: &MockHandle, access: TokenAccessRights) -> NativeResult<MockHandle> {
        self.record("OpenProcessToken");
        let Target::Process(pid) = self.entry(process)?.target else {
            return Err(NativeErrorCode::InvalidHandle);
        };
        let index = *self
            .state
            .borrow()
            .processes
            .get(&pid)
            .ok_or(NativeErrorCode::InvalidHandle)?;
        Ok(self.new_handle(Target::Token(index), access.bits()))
    }

    fn open_thread_token(
        &self,
        thread: &MockHandle,
        access: TokenAccessRights,
        _open_as_self: bool,
    ) -> NativeResult<MockHandle> {
        self.record("OpenThreadToken");
        let Target::Thread(_) = self.entry(thread)?.target else {
            return Err(NativeErrorCode::InvalidHandle);
        };
        let index = self.state.borrow().thread_token.ok_or(NativeErrorCode::NoToken)?;
        Ok(self.new_handle(Target::Token(index), access.bits()))
    }

    fn get_token_information(
        &self,
        token: &MockHandle,
        class: TokenInformationClass,
        buffer: &mut NativeBuffer,
        return_length: &mut u32,
    ) -> NativeResult<()> {
        let (index, access) = self.token_index(token)?;
        let mut state = self.state.borrow_mut();
        state.queries.push((class, buffer.len()));
        if let Some(code) = state.query_failures.get(&class) {
            return Err(*code);
        }
        if access & TokenAccessRights::QUERY.bits() == 0 {
            return Err(NativeErrorCode::AccessDenied);
        }
        let bytes = state.tokens[index].encode(class, buffer.as_ptr() as usize)?;
        let too_small = state.too_small_code;
        if buffer.len() < bytes.len() {
            *return_length = u32::try_from(bytes.len()).unwrap();
            return Err(too_small);
        }
        if state.stuck.contains(&class) {
            *return_length = buffer.len_u32();
            return Err(too_small);
        }
        if let Some(rounds) = state.growth.get_mut(&class).filter(|r| **r > 0) {
            *rounds -= 1;
            *return_length = buffer.len_u32() + 8;
            return Err(too_small);
        }
        buffer.as_bytes_mut()[..bytes.len()].copy_from_slice(&bytes);
        *return_length = u32::try_from(bytes.len()).unwrap();
        Ok(())
    }

    fn lookup_account_sid(&self, sid: &SecurityIdentifier) -> NativeResult<AccountLookup> {
        self.record("LookupAccountSid");
        let state = self.state.borrow();
        if let Some(code) = state.lookup_failure {
            return Err(code);
        }
        state
            .accounts
            .iter()
            .find(|(_, s, _)| s == sid)
            .map(|(account, _, sid_type)| AccountLookup {
                account: account.clone(),
                sid_type_raw: (*sid_type).into(),
            })
            .ok_or(NativeErrorCode::NoneMapped)
    }

    fn lookup_account_name(&self, account: &DisplayAccount) -> NativeResult<SecurityIdentifier> {
        self.record("LookupAccountName");
        let state = self.state.borrow();
        if let Some(code) = state.lookup_failure {
            return Err(code);
        }
        state
            .accounts
            .iter()
            .find(|(known, _, _)| {
                known.eq_ignore_case(account)
                    || (account.domain.is_empty() && known.name.eq_ignore_ascii_case(&account.name))
            })
            .map(|(_, sid, _)| sid.clone())
            .ok_or(NativeErrorCode::NoneMapped)
    }

    fn get_object_security(
        &self,
        handle: &MockHandle,
        sections: AccessControlSections,
    ) -> NativeResult<ObjectSecurity> {
        self.record("GetSecurityInfo");
        let entry = self.entry(handle)?;
        if entry.access & READ_CONTROL == 0 {
            return Err(NativeErrorCode::AccessDenied);
        }
        let stored = self
            .state
            .borrow()
            .security
            .get(&entry.target)
            .cloned()
            .unwrap_or_default();
        Ok(ObjectSecurity {
            owner: stored.owner.filter(|_| sections.contains(AccessControlSections::OWNER)),
            group: stored.group.filter(|_| sections.contains(AccessControlSections::GROUP)),
            dacl: stored.dacl.filter(|_| sections.contains(AccessControlSections::ACCESS)),
        })
    }

    fn set_object_security(&self, handle: &MockHandle, update: &SecurityUpdate<'_>) -> NativeResult<()> {
        self.record("SetSecurityInfo");
        let entry = self.entry(handle)?;
        if let Some(code) = self.state.borrow().set_security_failure {
            return Err(code);
        }
        let sections = update.sections();
        let needs_owner = sections.intersects(AccessControlSections::OWNER | AccessControlSections::GROUP);
        if (needs_owner && entry.access & WRITE_OWNER == 0)
            || (sections.contains(AccessControlSections::ACCESS) && entry.access & WRITE_DAC == 0)
        {
            return Err(NativeErrorCode::AccessDenied);
        }
        let mut state = self.state.borrow_mut();
        let stored = state.security.entry(entry.target).or_default();
        if let Some(owner) = update.owner {
            stored.owner = Some(owner.clone());
        }
        if let Some(group) = update.group {
            stored.group = Some(group.clone());
        }
        if let Some(dacl) = update.dacl {
            stored.dacl = Some(dacl.clone());
        }
        Ok(())
    }

    fn duplicate_token(&self, token: &MockHandle, request: &DuplicateRequest<'_>) -> NativeResult<MockHandle> {
        self.record("DuplicateTokenEx");
        let (index, access) = self.token_index(token)?;
        if access & TokenAccessRights::DUPLICATE.bits() == 0 {
            return Err(NativeErrorCode::AccessDenied);
        }
        let new_index = {
            let mut state = self.state.borrow_mut();
            let mut copy = state.tokens[index].clone();
            copy.token_type = request.token_type;
            copy.impersonation_level =
                (request.token_type == TokenType::Impersonation).then_some(request.impersonation_level);
            let mut security = copy.security();
            if let Some(descriptor) = request.descriptor {
                if let Some(owner) = descriptor.owner() {
                    security.owner = Some(owner.clone());
                }
                if let Some(group) = descriptor.group() {
                    security.group = Some(group.clone());
                }
                if let Some(dacl) = descriptor.dacl() {
                    security.dacl = Some(dacl.clone());
                }
            }
            state.tokens.push(copy);
            let new_index = state.tokens.len() - 1;
            state.security.insert(Target::Token(new_index), security);
            state.duplicates.push((
                request.access.bits(),
                request.inherit,
                request.impersonation_level,
                request.token_type,
            ));
            new_index
        };
        let handle = self.new_handle(Target::Token(new_index), request.access.bits());
        if request.inherit {
            if let Some(entry) = self.state.borrow_mut().handles.get_mut(&handle.id) {
                entry.flags = HandleFlags::INHERIT;
            }
        }
        Ok(handle)
    }

    fn impersonate(&self, token: &MockHandle) -> NativeResult<()> {
        self.record("ImpersonateLoggedOnUser");
        let (index, _) = self.token_index(token)?;
        let mut state = self.state.borrow_mut();
        if let Some(code) = state.impersonate_failure {
            return Err(code);
        }
        state.thread_token = Some(index);
        Ok(())
    }

    fn revert_to_self(&self) -> NativeResult<()> {
        self.record("RevertToSelf");
        let mut state = self.state.borrow_mut();
        state.thread_token = None;
        state.revert_count += 1;
        Ok(())
    }

    fn get_handle_information(&self, handle: &MockHandle) -> NativeResult<HandleFlags> {
        self.record("GetHandleInformation");
        Ok(self.entry(handle)?.flags)
    }

    fn set_handle_information(
        &self,
        handle: &MockHandle,
        mask: HandleFlags,
        flags: HandleFlags,
    ) -> NativeResult<()> {
        self.record("SetHandleInformation");
        self.entry(handle)?;
        let mut state = self.state.borrow_mut();
        let entry = state
            .handles
            .get_mut(&handle.id)
            .ok_or(NativeErrorCode::InvalidHandle)?;
        entry.flags = (entry.flags - mask) | (flags & mask);
        Ok(())
    }
}
