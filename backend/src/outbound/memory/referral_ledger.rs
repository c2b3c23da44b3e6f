//! Mutex-guarded referral ledger.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::ports::{ReferralLedger, ReferralLedgerError};
use crate::domain::{CreditClaim, CreditStatus, ReferralRecord, UserId};

#[derive(Debug, Default)]
struct LedgerState {
    // Append-only; insertion order doubles as the pending sweep order.
    entries: Vec<(ReferralRecord, CreditStatus)>,
    by_referred: HashMap<UserId, usize>,
}

impl LedgerState {
    fn status_mut(
        &mut self,
        referred_user_id: &UserId,
    ) -> Result<&mut CreditStatus, ReferralLedgerError> {
        let index = *self.by_referred.get(referred_user_id).ok_or_else(|| {
            ReferralLedgerError::unknown_referral(referred_user_id.clone())
        })?;
        self.entries
            .get_mut(index)
            .map(|(_, status)| status)
            .ok_or_else(|| ReferralLedgerError::query("referral index out of step with entries"))
    }
}

/// Referral ledger holding records in memory.
///
/// Inserts enforce one record per referred user, like a unique index.
#[derive(Debug, Default)]
pub struct InMemoryReferralLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryReferralLedger {
    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, ReferralLedgerError> {
        self.state
            .lock()
            .map_err(|_| ReferralLedgerError::query("referral ledger lock poisoned"))
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.state.lock().map_or(0, |state| state.entries.len())
    }

    /// Whether no referral has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReferralLedger for InMemoryReferralLedger {
    async fn exists_by_referred_user_id(
        &self,
        referred_user_id: &UserId,
    ) -> Result<bool, ReferralLedgerError> {
        let state = self.lock()?;
        Ok(state.by_referred.contains_key(referred_user_id))
    }

    async fn insert(&self, record: &ReferralRecord) -> Result<ReferralRecord, ReferralLedgerError> {
        let mut state = self.lock()?;
        if state.by_referred.contains_key(&record.referred_user_id) {
            return Err(ReferralLedgerError::duplicate_referral(
                record.referred_user_id.clone(),
            ));
        }

        let index = state.entries.len();
        state
            .entries
            .push((record.clone(), CreditStatus::Pending));
        state
            .by_referred
            .insert(record.referred_user_id.clone(), index);
        debug!(
            referrer_id = %record.referrer_id,
            referred_user_id = %record.referred_user_id,
            "referral recorded"
        );
        Ok(record.clone())
    }

    async fn find_by_referred_user_id(
        &self,
        referred_user_id: &UserId,
    ) -> Result<Option<(ReferralRecord, CreditStatus)>, ReferralLedgerError> {
        let state = self.lock()?;
        Ok(state
            .by_referred
            .get(referred_user_id)
            .and_then(|index| state.entries.get(*index))
            .cloned())
    }

    async fn claim_credit(
        &self,
        referred_user_id: &UserId,
        claimed_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<CreditClaim, ReferralLedgerError> {
        let mut state = self.lock()?;
        let status = state.status_mut(referred_user_id)?;
        match *status {
            CreditStatus::Credited => return Ok(CreditClaim::AlreadyCredited),
            current if !current.is_settleable(stale_before) => return Ok(CreditClaim::Held),
            _ => {}
        }
        *status = CreditStatus::Claimed { claimed_at };
        debug!(%referred_user_id, %claimed_at, "referral credit claimed");
        Ok(CreditClaim::Acquired)
    }

    async fn confirm_credit(&self, referred_user_id: &UserId) -> Result<(), ReferralLedgerError> {
        let mut state = self.lock()?;
        *state.status_mut(referred_user_id)? = CreditStatus::Credited;
        debug!(%referred_user_id, "referral credit confirmed");
        Ok(())
    }

    async fn release_credit(&self, referred_user_id: &UserId) -> Result<(), ReferralLedgerError> {
        let mut state = self.lock()?;
        let status = state.status_mut(referred_user_id)?;
        if matches!(status, CreditStatus::Claimed { .. }) {
            *status = CreditStatus::Pending;
            debug!(%referred_user_id, "referral credit released");
        }
        Ok(())
    }

    async fn list_pending_credits(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ReferralRecord>, ReferralLedgerError> {
        let state = self.lock()?;
        Ok(state
            .entries
            .iter()
            .filter(|(_, status)| status.is_settleable(stale_before))
            .map(|(record, _)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use futures::future::join_all;
    use rstest::rstest;

    use super::*;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, second)
            .single()
            .expect("valid timestamp")
    }

    fn record_at(second: u32) -> ReferralRecord {
        ReferralRecord::new(UserId::random(), UserId::random(), at(second))
    }

    #[tokio::test]
    async fn insert_records_a_pending_entry() {
        let ledger = InMemoryReferralLedger::default();
        let record = record_at(0);

        let stored = ledger.insert(&record).await.expect("insert");

        assert_eq!(stored, record);
        assert!(
            ledger
                .exists_by_referred_user_id(&record.referred_user_id)
                .await
                .expect("exists")
        );
        assert_eq!(
            ledger
                .find_by_referred_user_id(&record.referred_user_id)
                .await
                .expect("find"),
            Some((record, CreditStatus::Pending))
        );
    }

    #[tokio::test]
    async fn insert_rejects_a_second_record_for_the_same_user() {
        let ledger = InMemoryReferralLedger::default();
        let first = record_at(0);
        let second = ReferralRecord::new(
            UserId::random(),
            first.referred_user_id.clone(),
            first.created_at,
        );
        ledger.insert(&first).await.expect("first insert");

        let error = ledger.insert(&second).await.expect_err("duplicate");

        assert_eq!(
            error,
            ReferralLedgerError::duplicate_referral(first.referred_user_id.clone())
        );
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_admit_exactly_one_record() {
        let ledger = Arc::new(InMemoryReferralLedger::default());
        let referred = UserId::random();
        let base = record_at(0);

        let inserts = (0..16).map(|_| {
            let ledger = Arc::clone(&ledger);
            let record =
                ReferralRecord::new(UserId::random(), referred.clone(), base.created_at);
            tokio::spawn(async move { ledger.insert(&record).await })
        });
        let outcomes: Vec<_> = join_all(inserts)
            .await
            .into_iter()
            .map(|joined| joined.expect("task joins"))
            .collect();

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn claim_is_held_until_released_or_confirmed() {
        let ledger = InMemoryReferralLedger::default();
        let record = record_at(0);
        let referred = record.referred_user_id.clone();
        let (now, cutoff) = (at(30), at(0));
        ledger.insert(&record).await.expect("insert");

        let first = ledger.claim_credit(&referred, now, cutoff).await;
        let second = ledger.claim_credit(&referred, now, cutoff).await;
        assert_eq!(first, Ok(CreditClaim::Acquired));
        assert_eq!(second, Ok(CreditClaim::Held));

        ledger.release_credit(&referred).await.expect("release");
        assert_eq!(
            ledger.claim_credit(&referred, now, cutoff).await,
            Ok(CreditClaim::Acquired)
        );

        ledger.confirm_credit(&referred).await.expect("confirm");
        ledger.release_credit(&referred).await.expect("release");
        assert_eq!(
            ledger.claim_credit(&referred, now, cutoff).await,
            Ok(CreditClaim::AlreadyCredited)
        );
        assert_eq!(
            ledger
                .find_by_referred_user_id(&referred)
                .await
                .expect("find")
                .map(|(_, status)| status),
            Some(CreditStatus::Credited)
        );
    }

    #[tokio::test]
    async fn abandoned_claims_expire_after_the_lease() {
        let ledger = InMemoryReferralLedger::default();
        let record = record_at(0);
        let referred = record.referred_user_id.clone();
        ledger.insert(&record).await.expect("insert");
        ledger
            .claim_credit(&referred, at(10), at(0))
            .await
            .expect("claim");

        assert!(
            ledger
                .list_pending_credits(at(5))
                .await
                .expect("list")
                .is_empty()
        );
        assert_eq!(
            ledger.list_pending_credits(at(10)).await.expect("list"),
            vec![record]
        );
        assert_eq!(
            ledger.claim_credit(&referred, at(40), at(10)).await,
            Ok(CreditClaim::Acquired)
        );
        assert_eq!(
            ledger
                .find_by_referred_user_id(&referred)
                .await
                .expect("find")
                .map(|(_, status)| status),
            Some(CreditStatus::Claimed {
                claimed_at: at(40)
            })
        );
    }

    #[rstest]
    #[case::claim("claim")]
    #[case::confirm("confirm")]
    #[case::release("release")]
    #[tokio::test]
    async fn settlement_rejects_unknown_referrals(#[case] step: &str) {
        let ledger = InMemoryReferralLedger::default();
        let unknown = UserId::random();

        let outcome = match step {
            "claim" => ledger
                .claim_credit(&unknown, at(0), at(0))
                .await
                .map(|_| ()),
            "confirm" => ledger.confirm_credit(&unknown).await,
            _ => ledger.release_credit(&unknown).await,
        };

        assert_eq!(outcome, Err(ReferralLedgerError::unknown_referral(unknown)));
    }

    #[tokio::test]
    async fn pending_credits_are_listed_oldest_first() {
        let ledger = InMemoryReferralLedger::default();
        let oldest = record_at(1);
        let credited = record_at(2);
        let claimed = record_at(3);
        let newest = record_at(4);
        for record in [&oldest, &credited, &claimed, &newest] {
            ledger.insert(record).await.expect("insert");
        }
        ledger
            .claim_credit(&credited.referred_user_id, at(20), at(0))
            .await
            .expect("claim");
        ledger
            .confirm_credit(&credited.referred_user_id)
            .await
            .expect("confirm");
        ledger
            .claim_credit(&claimed.referred_user_id, at(20), at(0))
            .await
            .expect("claim");

        let pending = ledger.list_pending_credits(at(10)).await.expect("list");

        assert_eq!(pending, vec![oldest, newest]);
    }
}
