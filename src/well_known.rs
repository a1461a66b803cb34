//! Well-known SIDs definitions
//!
//! Source: https://learn.microsoft.com/windows/win32/secauthz/well-known-sids
//!
//! Besides the usual principals this module carries the mandatory integrity
//! labels and the logon-session prefix, which the account lookup service of
//! the OS does not always resolve.

use crate::{ConstSid, SidIdentifierAuthority};

// ---- Basic Authorities ----

/// Null SID (S-1-0-0)
pub const NULL: ConstSid<1> = ConstSid::new(1, SidIdentifierAuthority::NULL_AUTHORITY, [0]);

/// World SID (S-1-1-0)
pub const WORLD: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_WORLD_AUTHORITY, [0]);

/// Creator Owner SID (S-1-3-0)
pub const CREATOR_OWNER: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_CREATOR_AUTHORITY, [0]);

// ---- NT Authority (S-1-5) ----

/// Prefix of every logon-session SID (S-1-5-5-X-Y).
pub const LOGON_SESSION_PREFIX: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::NT_AUTHORITY, [5]);

/// Local System (S-1-5-18)
pub const LOCAL_SYSTEM: ConstSid<1> = ConstSid::new(1, SidIdentifierAuthority::NT_AUTHORITY, [18]);

/// BUILTIN\Administrators (S-1-5-32-544)
pub const BUILTIN_ADMINISTRATORS: ConstSid<2> =
    ConstSid::new(1, SidIdentifierAuthority::NT_AUTHORITY, [32, 544]);

/// BUILTIN\Users (S-1-5-32-545)
pub const BUILTIN_USERS: ConstSid<2> =
    ConstSid::new(1, SidIdentifierAuthority::NT_AUTHORITY, [32, 545]);

// ---- Mandatory Label Authority (S-1-16) ----

/// Untrusted integrity level (S-1-16-0)
pub const UNTRUSTED_MANDATORY_LEVEL: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_MANDATORY_LABEL_AUTHORITY, [0]);

/// Low integrity level (S-1-16-4096)
pub const LOW_MANDATORY_LEVEL: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_MANDATORY_LABEL_AUTHORITY, [0x1000]);

/// Medium integrity level (S-1-16-8192)
pub const MEDIUM_MANDATORY_LEVEL: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_MANDATORY_LABEL_AUTHORITY, [0x2000]);

/// High integrity level (S-1-16-12288)
pub const HIGH_MANDATORY_LEVEL: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_MANDATORY_LABEL_AUTHORITY, [0x3000]);

/// System integrity level (S-1-16-16384)
pub const SYSTEM_MANDATORY_LEVEL: ConstSid<1> =
    ConstSid::new(1, SidIdentifierAuthority::SECURITY_MANDATORY_LABEL_AUTHORITY, [0x4000]);

/// Domain under which fallback names for mandatory labels are reported.
pub const MANDATORY_LABEL_DOMAIN: &str = "Mandatory Label";

/// Domain under which fallback names for logon-session SIDs are reported.
pub const LOGON_SESSION_DOMAIN: &str = "NT AUTHORITY";

/// Name prefix of logon-session accounts (`LogonSessionId_X_Y`).
pub const LOGON_SESSION_NAME_PREFIX: &str = "LogonSessionId_";

/// Mandatory labels paired with the account name the OS gives them.
pub const MANDATORY_LABELS: [(ConstSid<1>, &str); 5] = [
    (UNTRUSTED_MANDATORY_LEVEL, "Untrusted Mandatory Label"),
    (LOW_MANDATORY_LEVEL, "Low Mandatory Label"),
    (MEDIUM_MANDATORY_LEVEL, "Medium Mandatory Label"),
    (HIGH_MANDATORY_LEVEL, "High Mandatory Label"),
    (SYSTEM_MANDATORY_LEVEL, "System Mandatory Label"),
];
