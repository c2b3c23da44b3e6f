//! Referral registration and reward crediting.
//!
//! The [`domain`] module holds the referral engine and the ports it drives;
//! [`outbound`] holds store adapters.

pub mod domain;
pub mod outbound;
