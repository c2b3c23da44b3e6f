//! Domain primitives, ports and the referral service.
//!
//! Purpose: hold the referral invariants that neither store enforces alone:
//! one code per user, one referral per referred user, no self-referral, and
//! a reward credited exactly once per referral.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - User / UserId / ReferralCode: identity values.
//! - ReferralRecord / CreditStatus / CreditOutcome: ledger facts.
//! - ReferralConfig: reward policy.
//! - ReferralService: the engine implementing the driving ports.

pub mod error;
pub mod ports;
pub mod referral;
pub mod referral_code;
pub mod referral_config;
mod referral_service;
pub mod user;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::referral::{
    CreditClaim, CreditOutcome, CreditStatus, ReconciliationReport, ReferralRecord,
};
pub use self::referral_code::{ReferralCode, ReferralCodeValidationError};
pub use self::referral_config::{DefaultReferralEnv, ReferralConfig, ReferralEnv};
pub use self::referral_service::ReferralService;
pub use self::user::{User, UserId, UserValidationError};
