//! In-process adapters for the referral ports.
//!
//! Each adapter keeps its state behind a single [`std::sync::Mutex`], so every
//! port operation is atomic with respect to the others. That mirrors the
//! guarantees a database adapter gets from unique indexes and single-statement
//! updates, which makes these adapters suitable for tests and embedding.

mod identity_store;
mod referral_ledger;

pub use identity_store::InMemoryIdentityStore;
pub use referral_ledger::InMemoryReferralLedger;
