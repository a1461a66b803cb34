use core::ptr::{null, null_mut};

use smallvec::SmallVec;
use widestring::{U16CString, U16Str};
use windows_sys::Win32::Security::{LookupAccountNameW, LookupAccountSidW};

use crate::buffer::NativeBuffer;
use crate::error::NativeErrorCode;
use crate::native::{AccountLookup, NativeResult};
use crate::{DisplayAccount, SecurityIdentifier};

type WideBuffer = SmallVec<[u16; 256]>;

fn wide_to_string(buffer: &[u16]) -> String {
    U16Str::from_slice(buffer).to_string_lossy()
}

/// Copies `sid` into pointer-aligned memory the lookup functions can read.
pub(super) fn native_sid(sid: &SecurityIdentifier) -> NativeResult<NativeBuffer> {
    NativeBuffer::from_bytes(&sid.to_bytes()).map_err(|_| NativeErrorCode::NotEnoughMemory)
}

/// State of a `LookupAccountSidW` call after its size probe.
pub(super) struct SidLookupOperation {
    sid: NativeBuffer,
    name_len: u32,
    domain_len: u32,
    sid_type_raw: i32,
}

impl SidLookupOperation {
    /// Probes the name and domain lengths for `sid`.
    pub fn new(sid: &SecurityIdentifier) -> NativeResult<Self> {
        let sid = native_sid(sid)?;
        let mut name_len = 0u32;
        let mut domain_len = 0u32;
        let mut sid_type_raw = 0i32;

        // SAFETY: the SID buffer is valid; null output buffers with zero
        // lengths ask for the required sizes.
        let result = unsafe {
            LookupAccountSidW(
                null(),
                sid.as_ptr().cast_mut().cast(),
                null_mut(),
                &raw mut name_len,
                null_mut(),
                &raw mut domain_len,
                &raw mut sid_type_raw,
            )
        };
        if result == 0 {
            let err = NativeErrorCode::last();
            if err != NativeErrorCode::InsufficientBuffer {
                return Err(err);
            }
        }
        Ok(Self {
            sid,
            name_len,
            domain_len,
            sid_type_raw,
        })
    }

    pub fn process(mut self) -> NativeResult<AccountLookup> {
        let mut name_buffer = WideBuffer::with_capacity(self.name_len as usize);
        let mut domain_buffer = WideBuffer::with_capacity(self.domain_len as usize);
        // SAFETY: the buffers hold at least the capacities passed as lengths.
        let result = unsafe {
            LookupAccountSidW(
                null(),
                self.sid.as_ptr().cast_mut().cast(),
                name_buffer.as_mut_ptr(),
                &raw mut self.name_len,
                domain_buffer.as_mut_ptr(),
                &raw mut self.domain_len,
                &raw mut self.sid_type_raw,
            )
        };
        if result == 0 {
            return match NativeErrorCode::last() {
                // The account was renamed between the two calls.
                NativeErrorCode::InsufficientBuffer => self.process(),
                err => Err(err),
            };
        }
        #[expect(
            clippy::multiple_unsafe_ops_per_block,
            reason = "Same operation so same safety doc"
        )]
        // SAFETY: on success the lengths hold the characters written, without the terminator.
        unsafe {
            name_buffer.set_len(self.name_len as usize);
            domain_buffer.set_len(self.domain_len as usize);
        }
        Ok(AccountLookup {
            account: DisplayAccount::new(wide_to_string(&domain_buffer), wide_to_string(&name_buffer)),
            sid_type_raw: self.sid_type_raw,
        })
    }
}

/// Resolves `account` with `LookupAccountNameW`.
pub(super) fn lookup_account_name(account: &DisplayAccount) -> NativeResult<SecurityIdentifier> {
    let name = U16CString::from_str(account.to_string()).map_err(|_| NativeErrorCode::InvalidParameter)?;
    let mut sid_len = 0u32;
    let mut domain_len = 0u32;
    let mut sid_type_raw = 0i32;
    let mut sid = NativeBuffer::null();
    let mut domain_buffer = WideBuffer::new();
    loop {
        // SAFETY: `sid` and `domain_buffer` hold at least `sid_len` bytes and
        // `domain_len` characters.
        let result = unsafe {
            LookupAccountNameW(
                null(),
                name.as_ptr(),
                sid.as_mut_ptr().cast(),
                &raw mut sid_len,
                domain_buffer.as_mut_ptr(),
                &raw mut domain_len,
                &raw mut sid_type_raw,
            )
        };
        if result != 0 {
            break;
        }
        match NativeErrorCode::last() {
            NativeErrorCode::InsufficientBuffer
                if sid_len as usize > sid.len() || domain_len as usize > domain_buffer.capacity() =>
            {
                sid = NativeBuffer::acquire(sid_len as usize).map_err(|_| NativeErrorCode::NotEnoughMemory)?;
                domain_buffer = WideBuffer::with_capacity(domain_len as usize);
            }
            err => return Err(err),
        }
    }
    SecurityIdentifier::from_prefix(sid.as_bytes())
        .map(|(sid, _)| sid)
        .map_err(|_| NativeErrorCode::InvalidSid)
}
