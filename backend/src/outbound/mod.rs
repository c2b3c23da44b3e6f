//! Outbound adapters implementing domain ports.
//!
//! - **memory**: mutex-guarded in-process stores for the identity store and
//!   referral ledger ports.
//!
//! Adapters are thin translators that convert between domain types and
//! storage representations. They contain no business logic.

pub mod memory;
