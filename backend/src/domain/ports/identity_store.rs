//! Port abstraction for the user identity store and its errors.
//!
//! The [`IdentityStore`] owns user records, their referral codes and reward
//! balances. The referral core never mutates a balance by read-modify-write:
//! it calls [`IdentityStore::increment_reward_points`], which adapters must
//! implement as a single atomic store operation (e.g. `UPDATE ... SET
//! reward_points = reward_points + $1 RETURNING reward_points`).

use async_trait::async_trait;

use crate::domain::{ReferralCode, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity store adapters.
    pub enum IdentityStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "identity store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "identity store query failed: {message}",
        /// The referral code is already assigned to a different user.
        CodeConflict { code: ReferralCode } => "referral code {code} is already assigned",
    }
}

/// Port for user lookups and the referral-related user mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a user by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, IdentityStoreError>;

    /// Fetch the user owning `code`.
    async fn find_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<User>, IdentityStoreError>;

    /// Insert a user record.
    ///
    /// Saving a user that already exists must not change its referral code or
    /// its balance: those move only through
    /// [`IdentityStore::assign_referral_code`] and
    /// [`IdentityStore::increment_reward_points`]. Fails with
    /// [`IdentityStoreError::CodeConflict`] when a new user carries a code
    /// owned by someone else.
    async fn save(&self, user: &User) -> Result<(), IdentityStoreError>;

    /// Assign `code` to the user unless a code is already present.
    ///
    /// Returns the code persisted after the call: `code` itself when the slot
    /// was empty, otherwise the previously assigned code. Returns `None` when
    /// the user does not exist. Fails with
    /// [`IdentityStoreError::CodeConflict`] when another user already owns
    /// `code`.
    async fn assign_referral_code(
        &self,
        id: &UserId,
        code: &ReferralCode,
    ) -> Result<Option<ReferralCode>, IdentityStoreError>;

    /// Atomically add `amount` to the user's balance.
    ///
    /// Returns the new balance, or `None` when the user does not exist.
    async fn increment_reward_points(
        &self,
        id: &UserId,
        amount: u64,
    ) -> Result<Option<u64>, IdentityStoreError>;
}

/// Fixture implementation for testing without a real store.
///
/// Every lookup misses and every mutation is discarded. Use it where identity
/// behaviour is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureIdentityStore;

#[async_trait]
impl IdentityStore for FixtureIdentityStore {
    async fn find_by_id(&self, _id: &UserId) -> Result<Option<User>, IdentityStoreError> {
        Ok(None)
    }

    async fn find_by_referral_code(
        &self,
        _code: &ReferralCode,
    ) -> Result<Option<User>, IdentityStoreError> {
        Ok(None)
    }

    async fn save(&self, _user: &User) -> Result<(), IdentityStoreError> {
        Ok(())
    }

    async fn assign_referral_code(
        &self,
        _id: &UserId,
        _code: &ReferralCode,
    ) -> Result<Option<ReferralCode>, IdentityStoreError> {
        Ok(None)
    }

    async fn increment_reward_points(
        &self,
        _id: &UserId,
        _amount: u64,
    ) -> Result<Option<u64>, IdentityStoreError> {
        Ok(None)
    }
}
