//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses, queue acknowledgements, or any other protocol-specific envelope.
//! Callers branch on [`ErrorCode`]; the message is for humans.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A referenced user id does not resolve.
    NotFound,
    /// A referral code does not resolve to any user.
    ReferrerNotFound,
    /// The user being referred does not exist.
    ReferredUserNotFound,
    /// Referrer and referred user are the same identity.
    SelfReferral,
    /// The referred user already has a ledger record.
    AlreadyReferred,
    /// The referral was recorded but the referrer has not been credited yet.
    CreditPending,
    /// A collaborator store failed for infrastructural reasons.
    StoreUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use referrals::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::SelfReferral, "users cannot refer themselves");
/// assert_eq!(err.code(), ErrorCode::SelfReferral);
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The message was empty or whitespace.
    #[error("error message must not be empty")]
    EmptyMessage,
}

impl Error {
    /// Create a new error, panicking if validation fails.
    ///
    /// # Panics
    /// Panics when `message` is blank. Callers in this crate always pass
    /// literal or formatted non-empty messages.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Store outages are retryable. A pending credit is recoverable through
    /// credit settlement rather than by repeating the registration.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::StoreUnavailable | ErrorCode::CreditPending
        )
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use referrals::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::not_found("user not found").with_details(json!({ "userId": "x" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::ReferrerNotFound`].
    pub fn referrer_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReferrerNotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::ReferredUserNotFound`].
    pub fn referred_user_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReferredUserNotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::SelfReferral`].
    pub fn self_referral(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SelfReferral, message)
    }

    /// Convenience constructor for [`ErrorCode::AlreadyReferred`].
    pub fn already_referred(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyReferred, message)
    }

    /// Convenience constructor for [`ErrorCode::CreditPending`].
    pub fn credit_pending(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CreditPending, message)
    }

    /// Convenience constructor for [`ErrorCode::StoreUnavailable`].
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let ErrorDto {
            code,
            message,
            details,
        } = value;

        let mut error = Error::try_new(code, message)?;
        error.details = details;
        Ok(error)
    }
}
