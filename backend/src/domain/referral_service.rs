//! Referral engine implementing the referral driving ports.
//!
//! Registration is a short saga over two stores: the ledger insert comes first
//! because it carries the uniqueness constraint, the reward credit second.
//! Each credit runs under a ledger claim: claim, increment, then confirm. A
//! failed increment releases the claim and is reported as `CreditPending`;
//! settlement retries it later. A claim that could not be released expires
//! after the configured lease and is picked up by reconciliation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    IdentityStore, IdentityStoreError, ReferralCodeCommand, ReferralCommand, ReferralLedger,
    ReferralLedgerError,
};
use crate::domain::{
    CreditClaim, CreditOutcome, CreditStatus, Error, ReconciliationReport, ReferralCode, ReferralConfig,
    ReferralRecord, User, UserId,
};

/// Attempts at allocating a fresh code before giving up on collisions.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Referral engine coordinating the identity store and referral ledger.
#[derive(Clone)]
pub struct ReferralService<S, L> {
    identity_store: Arc<S>,
    ledger: Arc<L>,
    clock: Arc<dyn Clock>,
    config: ReferralConfig,
}

impl<S, L> ReferralService<S, L> {
    /// Create a new service over the given stores.
    ///
    /// ```rust,no_run
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// # use referrals::domain::{ReferralConfig, ReferralService};
    /// # use referrals::outbound::memory::{InMemoryIdentityStore, InMemoryReferralLedger};
    /// let service = ReferralService::new(
    ///     Arc::new(InMemoryIdentityStore::default()),
    ///     Arc::new(InMemoryReferralLedger::default()),
    ///     Arc::new(DefaultClock),
    ///     ReferralConfig::from_env(),
    /// );
    /// ```
    pub fn new(
        identity_store: Arc<S>,
        ledger: Arc<L>,
        clock: Arc<dyn Clock>,
        config: ReferralConfig,
    ) -> Self {
        Self {
            identity_store,
            ledger,
            clock,
            config,
        }
    }
}

impl<S, L> ReferralService<S, L>
where
    S: IdentityStore,
    L: ReferralLedger,
{
    fn map_identity_error(error: IdentityStoreError) -> Error {
        match error {
            IdentityStoreError::Connection { message } => {
                Error::store_unavailable(format!("identity store unavailable: {message}"))
            }
            IdentityStoreError::Query { message } => {
                Error::store_unavailable(format!("identity store error: {message}"))
            }
            IdentityStoreError::CodeConflict { code } => {
                Error::internal(format!("unexpected referral code conflict: {code}"))
            }
        }
    }

    fn map_ledger_error(error: ReferralLedgerError) -> Error {
        match error {
            ReferralLedgerError::Connection { message } => {
                Error::store_unavailable(format!("referral ledger unavailable: {message}"))
            }
            ReferralLedgerError::Query { message } => {
                Error::store_unavailable(format!("referral ledger error: {message}"))
            }
            ReferralLedgerError::DuplicateReferral { referred_user_id } => {
                Self::already_referred(&referred_user_id)
            }
            ReferralLedgerError::UnknownReferral { referred_user_id } => {
                Error::not_found("no referral recorded for user")
                    .with_details(json!({ "referredUserId": referred_user_id }))
            }
        }
    }

    fn user_not_found(user_id: &UserId) -> Error {
        Error::not_found("user not found").with_details(json!({ "userId": user_id }))
    }

    fn already_referred(referred_user_id: &UserId) -> Error {
        Error::already_referred("user has already been referred")
            .with_details(json!({ "referredUserId": referred_user_id }))
    }

    fn credit_pending(record: &ReferralRecord, cause: &Error) -> Error {
        Error::credit_pending(format!(
            "referral recorded but referrer credit is pending: {cause}"
        ))
        .with_details(json!({
            "referrerId": record.referrer_id,
            "referredUserId": record.referred_user_id,
            "cause": cause.code(),
        }))
    }

    async fn find_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.identity_store
            .find_by_id(user_id)
            .await
            .map_err(Self::map_identity_error)
    }

    /// Credit the configured award to `referrer_id`.
    ///
    /// Uses the store's atomic increment so concurrent credits to the same
    /// referrer are never lost. Only the registration saga and settlement
    /// reach this; no other path changes a balance.
    pub(crate) async fn reward_referrer(&self, referrer_id: &UserId) -> Result<u64, Error> {
        let award = self.config.award_points();
        let new_balance = self
            .identity_store
            .increment_reward_points(referrer_id, award)
            .await
            .map_err(Self::map_identity_error)?
            .ok_or_else(|| Self::user_not_found(referrer_id))?;

        debug!(%referrer_id, award, new_balance, "referrer credited");
        Ok(new_balance)
    }

    /// Claims taken at or before this instant count as abandoned.
    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.claim_lease()
    }

    /// Claim the record's credit, apply it, then confirm or release the claim.
    async fn settle(&self, record: &ReferralRecord) -> Result<CreditOutcome, Error> {
        let referred_user_id = &record.referred_user_id;
        let now = self.clock.utc();
        let claim = self
            .ledger
            .claim_credit(referred_user_id, now, self.stale_before(now))
            .await
            .map_err(Self::map_ledger_error)?;
        match claim {
            CreditClaim::Acquired => {}
            CreditClaim::Held => return Ok(CreditOutcome::InProgress),
            CreditClaim::AlreadyCredited => return Ok(CreditOutcome::AlreadySettled),
        }

        let new_balance = match self.reward_referrer(&record.referrer_id).await {
            Ok(new_balance) => new_balance,
            Err(err) => {
                if let Err(release_err) = self.ledger.release_credit(referred_user_id).await {
                    error!(
                        referrer_id = %record.referrer_id,
                        %referred_user_id,
                        error = %release_err,
                        "credit failed and its claim could not be released; it stays claimed until the lease expires"
                    );
                }
                return Err(err);
            }
        };

        if let Err(confirm_err) = self.ledger.confirm_credit(referred_user_id).await {
            error!(
                referrer_id = %record.referrer_id,
                %referred_user_id,
                new_balance,
                error = %confirm_err,
                "referrer credited but the ledger did not confirm it; confirm before the claim lease expires"
            );
        }
        Ok(CreditOutcome::Credited { new_balance })
    }

    async fn resolve_referrer(&self, referrer_code: &ReferralCode) -> Result<User, Error> {
        self.identity_store
            .find_by_referral_code(referrer_code)
            .await
            .map_err(Self::map_identity_error)?
            .ok_or_else(|| {
                Error::referrer_not_found("referral code does not match any user")
                    .with_details(json!({ "referralCode": referrer_code }))
            })
    }

    async fn validate_referral(
        &self,
        referrer: &User,
        referred_user_id: &UserId,
    ) -> Result<(), Error> {
        if self.find_user(referred_user_id).await?.is_none() {
            return Err(Error::referred_user_not_found("referred user not found")
                .with_details(json!({ "referredUserId": referred_user_id })));
        }

        if referrer.id() == referred_user_id {
            return Err(Error::self_referral("users cannot refer themselves")
                .with_details(json!({ "userId": referred_user_id })));
        }

        let already_referred = self
            .ledger
            .exists_by_referred_user_id(referred_user_id)
            .await
            .map_err(Self::map_ledger_error)?;
        if already_referred {
            return Err(Self::already_referred(referred_user_id));
        }

        Ok(())
    }
}

#[async_trait]
impl<S, L> ReferralCodeCommand for ReferralService<S, L>
where
    S: IdentityStore,
    L: ReferralLedger,
{
    async fn generate_referral_code(&self, user_id: &UserId) -> Result<ReferralCode, Error> {
        let user = self
            .find_user(user_id)
            .await?
            .ok_or_else(|| Self::user_not_found(user_id))?;

        if let Some(existing) = user.referral_code() {
            return Ok(existing.clone());
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = ReferralCode::generate(user_id, self.clock.utc(), &mut rand::thread_rng());
            match self
                .identity_store
                .assign_referral_code(user_id, &candidate)
                .await
            {
                Ok(Some(persisted)) => {
                    if persisted == candidate {
                        info!(%user_id, referral_code = %persisted, "referral code assigned");
                    }
                    return Ok(persisted);
                }
                Ok(None) => return Err(Self::user_not_found(user_id)),
                Err(IdentityStoreError::CodeConflict { code }) => {
                    warn!(%user_id, %code, attempt, "generated referral code collided");
                }
                Err(err) => return Err(Self::map_identity_error(err)),
            }
        }

        Err(Error::internal("could not allocate a unique referral code")
            .with_details(json!({ "userId": user_id, "attempts": MAX_CODE_ATTEMPTS })))
    }
}

#[async_trait]
impl<S, L> ReferralCommand for ReferralService<S, L>
where
    S: IdentityStore,
    L: ReferralLedger,
{
    async fn register_referral(
        &self,
        referrer_code: &ReferralCode,
        referred_user_id: &UserId,
    ) -> Result<ReferralRecord, Error> {
        let referrer = self.resolve_referrer(referrer_code).await?;
        self.validate_referral(&referrer, referred_user_id).await?;

        let candidate = ReferralRecord::new(
            referrer.id().clone(),
            referred_user_id.clone(),
            self.clock.utc(),
        );
        let record = self
            .ledger
            .insert(&candidate)
            .await
            .map_err(Self::map_ledger_error)?;

        match self.settle(&record).await {
            Ok(outcome) => {
                info!(
                    referrer_id = %record.referrer_id,
                    referred_user_id = %record.referred_user_id,
                    ?outcome,
                    "referral registered"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(
                    referrer_id = %record.referrer_id,
                    referred_user_id = %record.referred_user_id,
                    error = %err,
                    "referral recorded but credit is pending"
                );
                Err(Self::credit_pending(&record, &err))
            }
        }
    }

    async fn settle_pending_credit(&self, referred_user_id: &UserId) -> Result<CreditOutcome, Error> {
        let (record, status) = self
            .ledger
            .find_by_referred_user_id(referred_user_id)
            .await
            .map_err(Self::map_ledger_error)?
            .ok_or_else(|| {
                Error::not_found("no referral recorded for user")
                    .with_details(json!({ "referredUserId": referred_user_id }))
            })?;

        if status == CreditStatus::Credited {
            return Ok(CreditOutcome::AlreadySettled);
        }

        self.settle(&record)
            .await
            .map_err(|err| Self::credit_pending(&record, &err))
    }

    async fn reconcile_pending_credits(&self) -> Result<ReconciliationReport, Error> {
        let pending = self
            .ledger
            .list_pending_credits(self.stale_before(self.clock.utc()))
            .await
            .map_err(Self::map_ledger_error)?;

        let mut report = ReconciliationReport {
            examined: pending.len(),
            ..ReconciliationReport::default()
        };
        for record in &pending {
            match self.settle(record).await {
                Ok(CreditOutcome::Credited { .. }) => report.credited += 1,
                Ok(CreditOutcome::InProgress) => report.in_progress += 1,
                Ok(CreditOutcome::AlreadySettled) => report.already_settled += 1,
                Err(err) => {
                    warn!(
                        referrer_id = %record.referrer_id,
                        referred_user_id = %record.referred_user_id,
                        error = %err,
                        "pending credit still failing"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            credited = report.credited,
            in_progress = report.in_progress,
            already_settled = report.already_settled,
            failed = report.failed,
            "pending credit reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "referral_service_tests.rs"]
mod tests;
