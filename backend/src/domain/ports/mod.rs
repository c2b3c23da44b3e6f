//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod identity_store;
mod referral_command;
mod referral_ledger;

#[cfg(test)]
pub use identity_store::MockIdentityStore;
pub use identity_store::{FixtureIdentityStore, IdentityStore, IdentityStoreError};
pub use referral_command::{ReferralCodeCommand, ReferralCommand};
#[cfg(test)]
pub use referral_ledger::MockReferralLedger;
pub use referral_ledger::{FixtureReferralLedger, ReferralLedger, ReferralLedgerError};
