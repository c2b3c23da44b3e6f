//! Port for the append-only referral ledger.
//!
//! The [`ReferralLedger`] trait defines the contract for recording referral
//! facts. Adapters must enforce uniqueness of `referred_user_id` at insert
//! time (e.g. a unique index) and report violations as
//! [`ReferralLedgerError::DuplicateReferral`]; the referral core relies on
//! this to resolve concurrent registrations of the same user.
//!
//! # Credit settlement
//!
//! Each record carries a [`CreditStatus`]. New records start
//! [`CreditStatus::Pending`]. A settlement first takes a claim with
//! [`ReferralLedger::claim_credit`], which atomically moves the record to
//! [`CreditStatus::Claimed`]. It then either confirms the credit with
//! [`ReferralLedger::confirm_credit`] once the award is applied, or hands the
//! claim back with [`ReferralLedger::release_credit`]. A claim nobody
//! confirms or releases expires after a lease, so a record can never be
//! stranded in `Claimed`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CreditClaim, CreditStatus, ReferralRecord, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by referral ledger adapters.
    pub enum ReferralLedgerError {
        /// Ledger connection could not be established.
        Connection { message: String } =>
            "referral ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "referral ledger query failed: {message}",
        /// A record for this referred user already exists.
        DuplicateReferral { referred_user_id: UserId } =>
            "user {referred_user_id} has already been referred",
        /// No record exists for this referred user.
        UnknownReferral { referred_user_id: UserId } =>
            "no referral recorded for user {referred_user_id}",
    }
}

/// Port for referral record storage and credit bookkeeping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferralLedger: Send + Sync {
    /// Whether any record names `referred_user_id`.
    async fn exists_by_referred_user_id(
        &self,
        referred_user_id: &UserId,
    ) -> Result<bool, ReferralLedgerError>;

    /// Append a record with status [`CreditStatus::Pending`].
    ///
    /// Fails with [`ReferralLedgerError::DuplicateReferral`] when a record for
    /// the same referred user already exists.
    async fn insert(&self, record: &ReferralRecord) -> Result<ReferralRecord, ReferralLedgerError>;

    /// Fetch the record for `referred_user_id` with its credit status.
    async fn find_by_referred_user_id(
        &self,
        referred_user_id: &UserId,
    ) -> Result<Option<(ReferralRecord, CreditStatus)>, ReferralLedgerError>;

    /// Atomically take the settlement claim for `referred_user_id`.
    ///
    /// Succeeds with [`CreditClaim::Acquired`] when the record is pending or
    /// its claim was taken at or before `stale_before`; the record then holds
    /// `Claimed { claimed_at }`. Reports [`CreditClaim::Held`] for a live claim
    /// and [`CreditClaim::AlreadyCredited`] once confirmed. Fails with
    /// [`ReferralLedgerError::UnknownReferral`] for unknown users.
    async fn claim_credit(
        &self,
        referred_user_id: &UserId,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<CreditClaim, ReferralLedgerError>;

    /// Mark a claimed record as credited after its award was applied.
    async fn confirm_credit(&self, referred_user_id: &UserId) -> Result<(), ReferralLedgerError>;

    /// Return a claimed record to pending after its credit failed.
    async fn release_credit(&self, referred_user_id: &UserId) -> Result<(), ReferralLedgerError>;

    /// Records still awaiting their credit, oldest first.
    ///
    /// Includes pending records and records whose claim was taken at or
    /// before `stale_before`.
    async fn list_pending_credits(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ReferralRecord>, ReferralLedgerError>;
}

/// Fixture implementation for testing without a real ledger.
///
/// Reports no existing records, echoes inserts without storing them and
/// treats every claim as acquired. Use it where ledger behaviour is not under
/// test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureReferralLedger;

#[async_trait]
impl ReferralLedger for FixtureReferralLedger {
    async fn exists_by_referred_user_id(
        &self,
        _referred_user_id: &UserId,
    ) -> Result<bool, ReferralLedgerError> {
        Ok(false)
    }

    async fn insert(&self, record: &ReferralRecord) -> Result<ReferralRecord, ReferralLedgerError> {
        Ok(record.clone())
    }

    async fn find_by_referred_user_id(
        &self,
        _referred_user_id: &UserId,
    ) -> Result<Option<(ReferralRecord, CreditStatus)>, ReferralLedgerError> {
        Ok(None)
    }

    async fn claim_credit(
        &self,
        _referred_user_id: &UserId,
        _claimed_at: DateTime<Utc>,
        _stale_before: DateTime<Utc>,
    ) -> Result<CreditClaim, ReferralLedgerError> {
        Ok(CreditClaim::Acquired)
    }

    async fn confirm_credit(&self, _referred_user_id: &UserId) -> Result<(), ReferralLedgerError> {
        Ok(())
    }

    async fn release_credit(&self, _referred_user_id: &UserId) -> Result<(), ReferralLedgerError> {
        Ok(())
    }

    async fn list_pending_credits(
        &self,
        _stale_before: DateTime<Utc>,
    ) -> Result<Vec<ReferralRecord>, ReferralLedgerError> {
        Ok(Vec::new())
    }
}
