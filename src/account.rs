//! Human-readable principal names in `DOMAIN\Name` form.
//!
//! - `DisplayAccount` stores both parts as `String`; the domain may be empty
//!   for bare names such as `Administrators`.
//! - `Display` prints `DOMAIN\Name`, or just `Name` when there is no domain.
//! - `FromStr` parses with the default policy (at most one `\`).
//! - Optional validation is controlled by a lightweight `ParsePolicy`.

use core::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

/// Which component an error refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Component {
    /// The part before the `\`.
    Domain,
    /// The part after the `\`.
    Name,
}

impl Display for Component {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => f.write_str("domain"),
            Self::Name => f.write_str("name"),
        }
    }
}

/// Parsing/validation errors for `DOMAIN\Name`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountParsingError {
    /// Input did not contain a `\` separator while the policy requires one.
    #[error("Missing '\\' separator")]
    MissingSeparator,

    /// Input contained more than one `\` separator.
    #[error("Too many '\\' separators")]
    TooManySeparators,

    /// Left part is empty while policy forbids it.
    #[error("Domain is empty")]
    EmptyDomain,

    /// Right part is empty while policy forbids it.
    #[error("Name is empty")]
    EmptyName,

    /// A component exceeded the configured maximum length.
    #[error("{which} too long: max={max}, actual={actual}")]
    ComponentTooLong {
        /// Offending component.
        which: Component,
        /// Configured maximum, in UTF-16 code units.
        max: usize,
        /// Actual length, in UTF-16 code units.
        actual: usize,
    },

    /// A forbidden character was found (e.g., `\` or NUL).
    #[error("Forbidden code unit 0x{unit:02X} in {which} at index {index}")]
    ForbiddenUnit {
        /// Offending component.
        which: Component,
        /// The forbidden character.
        unit: u32,
        /// Character index inside the component.
        index: usize,
    },
}

/// Simple, const-friendly validation policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParsePolicy {
    /// Accept a bare `Name` without any `\`?
    pub allow_missing_separator: bool,
    /// Allow empty domain (e.g., `\User`)?
    pub allow_empty_domain: bool,
    /// Allow empty name (e.g., `DOMAIN\`)?
    pub allow_empty_name: bool,
    /// Optional max length of each component, in UTF-16 code units
    /// (the unit the account APIs of the OS count in).
    pub max_component_len: Option<usize>,
    /// ASCII characters disallowed in components (default: backslash and NUL).
    pub forbidden_ascii: &'static [u8],
}

impl ParsePolicy {
    /// Sensible default for Windows-style principals.
    pub const DEFAULT: Self = Self {
        allow_missing_separator: true,
        allow_empty_domain: true,
        allow_empty_name: false,
        max_component_len: None,
        forbidden_ascii: b"\\\0",
    };

    /// Requires the explicit `DOMAIN\Name` form.
    pub const QUALIFIED: Self = Self {
        allow_missing_separator: false,
        allow_empty_domain: false,
        ..Self::DEFAULT
    };

    /// Validate a single component against this policy.
    fn validate_component(&self, which: Component, s: &str) -> Result<(), AccountParsingError> {
        if s.is_empty() {
            return match which {
                Component::Domain if !self.allow_empty_domain => {
                    Err(AccountParsingError::EmptyDomain)
                }
                Component::Name if !self.allow_empty_name => Err(AccountParsingError::EmptyName),
                _ => Ok(()),
            };
        }

        if let Some(max) = self.max_component_len {
            let len = s.encode_utf16().count();
            if len > max {
                return Err(AccountParsingError::ComponentTooLong {
                    which,
                    max,
                    actual: len,
                });
            }
        }

        for (index, ch) in s.chars().enumerate() {
            if ch == '\0' || (ch.is_ascii() && self.forbidden_ascii.contains(&(ch as u8))) {
                return Err(AccountParsingError::ForbiddenUnit {
                    which,
                    unit: u32::from(ch),
                    index,
                });
            }
        }
        Ok(())
    }

    fn validate_pair(&self, domain: &str, name: &str) -> Result<(), AccountParsingError> {
        self.validate_component(Component::Domain, domain)?;
        self.validate_component(Component::Name, name)
    }
}

impl Default for ParsePolicy {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Human-readable principal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DisplayAccount {
    /// The domain part (before the `\`), possibly empty.
    pub domain: String,
    /// The name part (after the `\`).
    pub name: String,
}

impl DisplayAccount {
    /// Non-validating constructor (domain, then name).
    #[inline]
    pub fn new<D: Into<String>, N: Into<String>>(domain: D, name: N) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }

    /// Validating constructor from owned parts.
    /// # Errors
    /// See [`AccountParsingError`].
    #[inline]
    pub fn try_new_with_policy<D: Into<String>, N: Into<String>>(
        policy: &ParsePolicy,
        domain: D,
        name: N,
    ) -> Result<Self, AccountParsingError> {
        let account = Self::new(domain, name);
        policy.validate_pair(&account.domain, &account.name)?;
        Ok(account)
    }

    /// Parse `"DOMAIN\Name"` (or a bare `"Name"` when allowed) with a specific policy.
    /// # Errors
    /// See [`AccountParsingError`] and [`ParsePolicy`].
    pub fn parse_with_policy(policy: &ParsePolicy, s: &str) -> Result<Self, AccountParsingError> {
        // Split into at most 3 parts to detect "too many separators"
        let mut iter = s.splitn(3, '\\');
        let first = iter.next().unwrap_or_default();
        let (domain, name) = match iter.next() {
            Some(name) => (first, name),
            None if policy.allow_missing_separator => ("", first),
            None => return Err(AccountParsingError::MissingSeparator),
        };
        if iter.next().is_some() {
            return Err(AccountParsingError::TooManySeparators);
        }
        policy.validate_pair(domain, name)?;
        Ok(Self::new(domain, name))
    }

    /// Case-insensitive comparison, the way the OS compares principal names.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.domain.to_lowercase() == other.domain.to_lowercase()
            && self.name.to_lowercase() == other.name.to_lowercase()
    }
}

impl Display for DisplayAccount {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}\\{}", self.domain, self.name)
        }
    }
}

impl FromStr for DisplayAccount {
    type Err = AccountParsingError;

    /// Parses with `ParsePolicy::DEFAULT`.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_policy(&ParsePolicy::DEFAULT, s)
    }
}
