//! Referral ledger facts and credit settlement outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Immutable fact linking a referring user to a referred user.
///
/// ## Invariants
/// - `referrer_id != referred_user_id`.
/// - At most one record exists per `referred_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRecord {
    /// Owner of the referral code that was used.
    pub referrer_id: UserId,
    /// Newly registered user.
    pub referred_user_id: UserId,
    /// Registration instant, set once.
    pub created_at: DateTime<Utc>,
}

impl ReferralRecord {
    /// Build a record for a validated referral.
    pub fn new(referrer_id: UserId, referred_user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            referrer_id,
            referred_user_id,
            created_at,
        }
    }
}

/// Settlement state the ledger tracks alongside each record.
///
/// `Pending -> Claimed -> Credited`, with `Claimed -> Pending` when a credit
/// fails. A claim older than the configured lease is treated as abandoned
/// and may be claimed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CreditStatus {
    /// Recorded, referrer not yet credited.
    Pending,
    /// A settlement holds the credit and is applying the award.
    #[serde(rename_all = "camelCase")]
    Claimed {
        /// When the current holder took the claim.
        claimed_at: DateTime<Utc>,
    },
    /// Referrer credited.
    Credited,
}

impl CreditStatus {
    /// Whether the record still awaits its credit, given the lease cutoff.
    ///
    /// Claims taken at or before `stale_before` count as abandoned.
    pub fn is_settleable(&self, stale_before: DateTime<Utc>) -> bool {
        match self {
            Self::Pending => true,
            Self::Claimed { claimed_at } => *claimed_at <= stale_before,
            Self::Credited => false,
        }
    }
}

/// Answer of the ledger to a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditClaim {
    /// This caller now holds the claim and must confirm or release it.
    Acquired,
    /// Another caller holds a live claim.
    Held,
    /// The credit was already confirmed.
    AlreadyCredited,
}

/// Result of settling the credit for one referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CreditOutcome {
    /// The award was applied by this call.
    Credited {
        /// Referrer balance after the increment.
        new_balance: u64,
    },
    /// Another settlement is applying the award right now.
    InProgress,
    /// The award was applied earlier; nothing was applied.
    AlreadySettled,
}

/// Summary of a pending-credit reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Settleable records found at the start of the sweep.
    pub examined: usize,
    /// Records credited by this sweep.
    pub credited: usize,
    /// Records claimed by a concurrent settlement.
    pub in_progress: usize,
    /// Records settled concurrently by another caller.
    pub already_settled: usize,
    /// Records whose credit failed again and remain settleable.
    pub failed: usize,
}
