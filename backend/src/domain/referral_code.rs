//! Referral code value type and generation.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::UserId;

/// Maximum accepted length of a referral code.
pub const REFERRAL_CODE_MAX: usize = 128;

/// Number of random base36 characters appended to generated codes.
pub const REFERRAL_CODE_SUFFIX_LEN: usize = 6;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static REFERRAL_CODE_RE: OnceLock<Regex> = OnceLock::new();

fn referral_code_regex() -> &'static Regex {
    REFERRAL_CODE_RE.get_or_init(|| {
        Regex::new("^[A-Za-z0-9-]+$")
            .unwrap_or_else(|error| panic!("referral code regex failed to compile: {error}"))
    })
}

/// Validation errors returned by [`ReferralCode::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferralCodeValidationError {
    /// The code was empty or whitespace.
    #[error("referral code must not be empty")]
    Empty,
    /// The code exceeded [`REFERRAL_CODE_MAX`] characters.
    #[error("referral code must be at most {max} characters")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The code contained characters outside `[A-Za-z0-9-]`.
    #[error("referral code may only contain letters, digits, or hyphens")]
    InvalidCharacters,
}

/// Opaque token identifying a referring user.
///
/// Generated codes take the shape `<user-id>-<millis base36><random base36>`,
/// which keeps them unique across users and across generation instants.
///
/// # Examples
/// ```
/// use referrals::domain::ReferralCode;
///
/// let code = ReferralCode::new("friend-2024").expect("valid code");
/// assert_eq!(code.as_ref(), "friend-2024");
/// assert!(ReferralCode::new("not valid!").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Validate and construct a [`ReferralCode`].
    pub fn new(code: impl Into<String>) -> Result<Self, ReferralCodeValidationError> {
        Self::from_owned(code.into())
    }

    /// Derive a fresh code for `user_id` at instant `now`.
    pub fn generate(user_id: &UserId, now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let suffix: String = (0..REFERRAL_CODE_SUFFIX_LEN)
            .map(|_| char::from(BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())]))
            .collect();
        Self(format!("{user_id}-{}{suffix}", to_base36(millis)))
    }

    fn from_owned(code: String) -> Result<Self, ReferralCodeValidationError> {
        if code.trim().is_empty() {
            return Err(ReferralCodeValidationError::Empty);
        }
        if code.chars().count() > REFERRAL_CODE_MAX {
            return Err(ReferralCodeValidationError::TooLong {
                max: REFERRAL_CODE_MAX,
            });
        }
        if !referral_code_regex().is_match(&code) {
            return Err(ReferralCodeValidationError::InvalidCharacters);
        }
        Ok(Self(code))
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let index = usize::try_from(value % 36).unwrap_or_default();
        digits.push(char::from(BASE36_ALPHABET[index]));
        value /= 36;
    }
    digits.iter().rev().collect()
}

impl AsRef<str> for ReferralCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ReferralCode> for String {
    fn from(value: ReferralCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = ReferralCodeValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}
