//! User data model as seen by the referral core.
//!
//! Users are created elsewhere; this crate only reads them, assigns their
//! referral code once and credits reward points.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::referral_code::{ReferralCode, ReferralCodeValidationError};

/// Validation errors returned by [`UserId::new`] and [`User`] deserialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    /// The id was empty.
    #[error("user id must not be empty")]
    EmptyId,
    /// The id was not a UUID.
    #[error("user id must be a valid UUID")]
    InvalidId,
    /// The stored referral code failed validation.
    #[error("invalid referral code: {0}")]
    InvalidReferralCode(#[from] ReferralCodeValidationError),
}

/// Stable user identifier stored as a UUID.
///
/// Any accepted spelling of a UUID (upper case, braced, simple) is
/// normalised to the lower-case hyphenated form, so two spellings of one
/// UUID compare and hash as the same user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid, String);

impl UserId {
    /// Validate and construct a [`UserId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Generate a new random [`UserId`].
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Wrap an already parsed UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, uuid.to_string())
    }

    fn from_owned(id: String) -> Result<Self, UserValidationError> {
        if id.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(UserValidationError::InvalidId);
        }

        let parsed = Uuid::parse_str(&id).map_err(|_| UserValidationError::InvalidId)?;
        Ok(Self::from_uuid(parsed))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        let UserId(_, raw) = value;
        raw
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Application user with referral state.
///
/// ## Invariants
/// - `id` must be a valid UUID string.
/// - `referral_code`, once set, never changes.
/// - `reward_points` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "UserDto", into = "UserDto")]
pub struct User {
    id: UserId,
    referral_code: Option<ReferralCode>,
    reward_points: u64,
}

impl User {
    /// Build a user with no referral code and an empty balance.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            referral_code: None,
            reward_points: 0,
        }
    }

    /// Return a copy carrying the given referral code.
    pub fn with_referral_code(mut self, code: ReferralCode) -> Self {
        self.referral_code = Some(code);
        self
    }

    /// Return a copy carrying the given reward balance.
    pub fn with_reward_points(mut self, points: u64) -> Self {
        self.reward_points = points;
        self
    }

    /// Stable user identifier.
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Referral code assigned to this user, if any.
    pub fn referral_code(&self) -> Option<&ReferralCode> {
        self.referral_code.as_ref()
    }

    /// Accumulated reward points.
    pub fn reward_points(&self) -> u64 {
        self.reward_points
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referral_code: Option<String>,
    #[serde(default)]
    reward_points: u64,
}

impl From<User> for UserDto {
    fn from(value: User) -> Self {
        let User {
            id,
            referral_code,
            reward_points,
        } = value;
        Self {
            id: id.into(),
            referral_code: referral_code.map(String::from),
            reward_points,
        }
    }
}

impl TryFrom<UserDto> for User {
    type Error = UserValidationError;

    fn try_from(value: UserDto) -> Result<Self, Self::Error> {
        let id = UserId::try_from(value.id)?;
        let referral_code = value.referral_code.map(ReferralCode::try_from).transpose()?;
        Ok(Self {
            id,
            referral_code,
            reward_points: value.reward_points,
        })
    }
}
