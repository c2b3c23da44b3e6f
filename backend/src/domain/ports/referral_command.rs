//! Driving ports for referral operations.
//!
//! Inbound adapters (HTTP handlers, bot commands, queue consumers) call these
//! traits; [`crate::domain::ReferralService`] implements both.

use async_trait::async_trait;

use crate::domain::{
    CreditOutcome, Error, ReconciliationReport, ReferralCode, ReferralRecord, UserId,
};

/// Driving port for handing out referral codes.
#[async_trait]
pub trait ReferralCodeCommand: Send + Sync {
    /// Return the user's referral code, generating and persisting one on
    /// first use.
    ///
    /// Repeated and concurrent calls for the same user return the same code.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the user does not exist.
    /// - `StoreUnavailable` when the identity store fails.
    async fn generate_referral_code(&self, user_id: &UserId) -> Result<ReferralCode, Error>;
}

/// Driving port for registering referrals and settling their rewards.
#[async_trait]
pub trait ReferralCommand: Send + Sync {
    /// Record that `referred_user_id` joined through `referrer_code` and
    /// credit the code's owner.
    ///
    /// # Errors
    ///
    /// Validation failures, checked in this order:
    /// - `ReferrerNotFound` when the code resolves to no user.
    /// - `ReferredUserNotFound` when the referred user does not exist.
    /// - `SelfReferral` when the code belongs to the referred user.
    /// - `AlreadyReferred` when the referred user already has a record,
    ///   including when a concurrent registration wins the insert.
    ///
    /// `CreditPending` when the record was stored but the credit could not be
    /// applied; the referral stands and [`Self::settle_pending_credit`]
    /// completes it. `StoreUnavailable` for any other store failure.
    async fn register_referral(
        &self,
        referrer_code: &ReferralCode,
        referred_user_id: &UserId,
    ) -> Result<ReferralRecord, Error>;

    /// Apply the outstanding credit for one referral, at most once.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no referral names `referred_user_id`.
    /// - `CreditPending` when the credit failed again.
    async fn settle_pending_credit(&self, referred_user_id: &UserId) -> Result<CreditOutcome, Error>;

    /// Settle every pending credit the ledger reports.
    ///
    /// Individual settlement failures are counted, not returned.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the pending list cannot be read.
    async fn reconcile_pending_credits(&self) -> Result<ReconciliationReport, Error>;
}
