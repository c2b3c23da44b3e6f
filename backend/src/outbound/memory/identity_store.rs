//! Mutex-guarded identity store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{IdentityStore, IdentityStoreError};
use crate::domain::{ReferralCode, User, UserId};

#[derive(Debug, Default)]
struct IdentityState {
    users: HashMap<UserId, User>,
    codes: HashMap<ReferralCode, UserId>,
}

impl IdentityState {
    fn code_owned_by_other(&self, code: &ReferralCode, id: &UserId) -> bool {
        self.codes.get(code).is_some_and(|owner| owner != id)
    }
}

/// Identity store holding users in memory.
///
/// Referral codes are indexed so that a code maps to at most one user, the
/// same guarantee a unique column gives a database adapter.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    state: Mutex<IdentityState>,
}

impl InMemoryIdentityStore {
    /// Build a store pre-populated with `users`.
    ///
    /// Users whose id or referral code an earlier user already holds are
    /// skipped, matching what [`IdentityStore::save`] would accept.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut state = IdentityState::default();
        for user in users {
            if state.users.contains_key(user.id()) {
                continue;
            }
            if let Some(code) = user.referral_code() {
                if state.code_owned_by_other(code, user.id()) {
                    continue;
                }
                state.codes.insert(code.clone(), user.id().clone());
            }
            state.users.insert(user.id().clone(), user);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, IdentityState>, IdentityStoreError> {
        self.state
            .lock()
            .map_err(|_| IdentityStoreError::query("identity store lock poisoned"))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, IdentityStoreError> {
        let state = self.lock()?;
        Ok(state.users.get(id).cloned())
    }

    async fn find_by_referral_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<User>, IdentityStoreError> {
        let state = self.lock()?;
        Ok(state
            .codes
            .get(code)
            .and_then(|owner| state.users.get(owner))
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<(), IdentityStoreError> {
        let mut state = self.lock()?;
        if state.users.contains_key(user.id()) {
            debug!(user_id = %user.id(), "user already stored; referral state kept");
            return Ok(());
        }
        if let Some(code) = user.referral_code() {
            if state.code_owned_by_other(code, user.id()) {
                return Err(IdentityStoreError::code_conflict(code.clone()));
            }
            state.codes.insert(code.clone(), user.id().clone());
        }
        state.users.insert(user.id().clone(), user.clone());
        debug!(user_id = %user.id(), "user saved");
        Ok(())
    }

    async fn assign_referral_code(
        &self,
        id: &UserId,
        code: &ReferralCode,
    ) -> Result<Option<ReferralCode>, IdentityStoreError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.get(id) else {
            return Ok(None);
        };
        if let Some(existing) = user.referral_code() {
            return Ok(Some(existing.clone()));
        }
        if state.code_owned_by_other(code, id) {
            return Err(IdentityStoreError::code_conflict(code.clone()));
        }

        let updated = user.clone().with_referral_code(code.clone());
        state.users.insert(id.clone(), updated);
        state.codes.insert(code.clone(), id.clone());
        debug!(user_id = %id, referral_code = %code, "referral code stored");
        Ok(Some(code.clone()))
    }

    async fn increment_reward_points(
        &self,
        id: &UserId,
        amount: u64,
    ) -> Result<Option<u64>, IdentityStoreError> {
        let mut state = self.lock()?;
        let Some(user) = state.users.get_mut(id) else {
            return Ok(None);
        };
        let balance = user.reward_points().checked_add(amount).ok_or_else(|| {
            IdentityStoreError::query(format!("reward balance overflow for user {id}"))
        })?;
        *user = user.clone().with_reward_points(balance);
        debug!(user_id = %id, amount, balance, "reward points incremented");
        Ok(Some(balance))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;
    use rstest::{fixture, rstest};

    use super::*;

    fn code(raw: &str) -> ReferralCode {
        ReferralCode::new(raw).expect("valid code")
    }

    #[fixture]
    fn user() -> User {
        User::new(UserId::random())
    }

    #[rstest]
    #[tokio::test]
    async fn finds_seeded_users_by_id_and_code(user: User) {
        let coded = User::new(UserId::random()).with_referral_code(code("seeded-code"));
        let store = InMemoryIdentityStore::with_users([user.clone(), coded.clone()]);

        assert_eq!(
            store.find_by_id(user.id()).await.expect("lookup"),
            Some(user)
        );
        assert_eq!(
            store
                .find_by_referral_code(&code("seeded-code"))
                .await
                .expect("lookup"),
            Some(coded)
        );
        assert_eq!(
            store
                .find_by_referral_code(&code("missing-code"))
                .await
                .expect("lookup"),
            None
        );
    }

    #[rstest]
    #[tokio::test]
    async fn assignment_keeps_the_first_code(user: User) {
        let store = InMemoryIdentityStore::with_users([user.clone()]);

        let first = store
            .assign_referral_code(user.id(), &code("first-code"))
            .await
            .expect("assign");
        let second = store
            .assign_referral_code(user.id(), &code("second-code"))
            .await
            .expect("assign");

        assert_eq!(first, Some(code("first-code")));
        assert_eq!(second, Some(code("first-code")));
        assert_eq!(
            store
                .find_by_referral_code(&code("second-code"))
                .await
                .expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn assignment_rejects_a_code_owned_by_another_user() {
        let owner = User::new(UserId::random()).with_referral_code(code("taken-code"));
        let other = User::new(UserId::random());
        let store = InMemoryIdentityStore::with_users([owner, other.clone()]);

        let error = store
            .assign_referral_code(other.id(), &code("taken-code"))
            .await
            .expect_err("code already owned");

        assert_eq!(error, IdentityStoreError::code_conflict(code("taken-code")));
    }

    #[tokio::test]
    async fn assignment_reports_unknown_user() {
        let store = InMemoryIdentityStore::default();
        let assigned = store
            .assign_referral_code(&UserId::random(), &code("orphan-code"))
            .await
            .expect("assign");
        assert_eq!(assigned, None);
    }

    #[tokio::test]
    async fn save_rejects_duplicate_codes() {
        let owner = User::new(UserId::random()).with_referral_code(code("shared-code"));
        let store = InMemoryIdentityStore::with_users([owner]);
        let intruder = User::new(UserId::random()).with_referral_code(code("shared-code"));

        let error = store.save(&intruder).await.expect_err("duplicate code");

        assert_eq!(error, IdentityStoreError::code_conflict(code("shared-code")));
        assert_eq!(
            store.find_by_id(intruder.id()).await.expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn save_keeps_stored_code_and_balance() {
        let stored = User::new(UserId::random())
            .with_referral_code(code("kept-code"))
            .with_reward_points(40);
        let store = InMemoryIdentityStore::with_users([stored.clone()]);
        let stale = User::new(stored.id().clone()).with_referral_code(code("other-code"));

        store.save(&stale).await.expect("save succeeds");
        store
            .save(&User::new(stored.id().clone()))
            .await
            .expect("save succeeds");

        assert_eq!(
            store.find_by_id(stored.id()).await.expect("lookup"),
            Some(stored.clone())
        );
        assert_eq!(
            store
                .find_by_referral_code(&code("other-code"))
                .await
                .expect("lookup"),
            None
        );
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost(user: User) {
        let store = Arc::new(InMemoryIdentityStore::with_users([user.clone()]));

        let increments = (0..50).map(|_| {
            let store = Arc::clone(&store);
            let id = user.id().clone();
            tokio::spawn(async move { store.increment_reward_points(&id, 10).await })
        });
        for outcome in join_all(increments).await {
            outcome.expect("task joins").expect("increment");
        }

        let stored = store
            .find_by_id(user.id())
            .await
            .expect("lookup")
            .expect("user exists");
        assert_eq!(stored.reward_points(), 500);
    }

    #[tokio::test]
    async fn increment_reports_unknown_user() {
        let store = InMemoryIdentityStore::default();
        let balance = store
            .increment_reward_points(&UserId::random(), 10)
            .await
            .expect("increment");
        assert_eq!(balance, None);
    }

    #[tokio::test]
    async fn increment_refuses_to_overflow() {
        let user = User::new(UserId::random()).with_reward_points(u64::MAX);
        let store = InMemoryIdentityStore::with_users([user.clone()]);

        let error = store
            .increment_reward_points(user.id(), 1)
            .await
            .expect_err("overflow");

        assert!(matches!(error, IdentityStoreError::Query { .. }));
    }
}
