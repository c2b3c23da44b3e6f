//! Environment-driven configuration for referral reward policy.

use chrono::TimeDelta;

/// Environment variable name for the per-referral award.
pub const REFERRAL_AWARD_POINTS_ENV: &str = "REFERRAL_AWARD_POINTS";

/// Environment variable name for the credit claim lease, in seconds.
pub const REFERRAL_CLAIM_LEASE_SECS_ENV: &str = "REFERRAL_CLAIM_LEASE_SECS";

/// Environment abstraction for referral configuration lookups.
///
/// This trait allows testing with mock environments without unsafe env var
/// mutations.
pub trait ReferralEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReferralEnv;

impl ReferralEnv for DefaultReferralEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Reward policy applied on each successful referral.
///
/// # Example
///
/// ```
/// # use referrals::domain::ReferralConfig;
/// let config = ReferralConfig::default();
/// assert_eq!(config.award_points(), 10);
///
/// let custom = ReferralConfig::with_award_points(25);
/// assert_eq!(custom.award_points(), 25);
/// assert_eq!(custom.claim_lease().num_seconds(), 300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralConfig {
    award_points: u64,
    claim_lease: TimeDelta,
}

impl ReferralConfig {
    /// Default award per referral.
    pub const DEFAULT_AWARD_POINTS: u64 = 10;

    /// Awards below one would make a referral worthless.
    const MIN_AWARD_POINTS: u64 = 1;

    const MAX_AWARD_POINTS: u64 = 1_000_000;

    /// Default lifetime of an unconfirmed credit claim.
    pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

    const MIN_CLAIM_LEASE_SECS: i64 = 1;

    const MAX_CLAIM_LEASE_SECS: i64 = 24 * 3600;

    /// Load configuration from the real process environment.
    ///
    /// Reads `REFERRAL_AWARD_POINTS` (default: 10, clamped to
    /// `[1, 1_000_000]`) and `REFERRAL_CLAIM_LEASE_SECS` (default: 300,
    /// clamped to `[1, 86_400]`). Unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_env_with(&DefaultReferralEnv)
    }

    /// Load configuration from a custom environment source.
    pub fn from_env_with(env: &impl ReferralEnv) -> Self {
        let award_points = env
            .string(REFERRAL_AWARD_POINTS_ENV)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(Self::DEFAULT_AWARD_POINTS)
            .clamp(Self::MIN_AWARD_POINTS, Self::MAX_AWARD_POINTS);
        let lease_secs = env
            .string(REFERRAL_CLAIM_LEASE_SECS_ENV)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(Self::DEFAULT_CLAIM_LEASE_SECS)
            .clamp(Self::MIN_CLAIM_LEASE_SECS, Self::MAX_CLAIM_LEASE_SECS);
        Self::with_award_points(award_points).with_claim_lease(TimeDelta::seconds(lease_secs))
    }

    /// Create with an explicit award, clamped like environment values.
    pub fn with_award_points(award_points: u64) -> Self {
        Self {
            award_points: award_points.clamp(Self::MIN_AWARD_POINTS, Self::MAX_AWARD_POINTS),
            ..Self::default()
        }
    }

    /// Replace the claim lease, clamped like environment values.
    #[must_use]
    pub fn with_claim_lease(self, lease: TimeDelta) -> Self {
        Self {
            claim_lease: lease.clamp(
                TimeDelta::seconds(Self::MIN_CLAIM_LEASE_SECS),
                TimeDelta::seconds(Self::MAX_CLAIM_LEASE_SECS),
            ),
            ..self
        }
    }

    /// Points credited to the referrer per successful referral.
    pub fn award_points(&self) -> u64 {
        self.award_points
    }

    /// How long a credit claim may stay unconfirmed before it is abandoned.
    pub fn claim_lease(&self) -> TimeDelta {
        self.claim_lease
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            award_points: Self::DEFAULT_AWARD_POINTS,
            claim_lease: TimeDelta::seconds(Self::DEFAULT_CLAIM_LEASE_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl ReferralEnv for MapEnv {
        fn string(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|value| (*value).to_owned())
        }
    }

    fn env_with(value: Option<&'static str>) -> MapEnv {
        env_for(REFERRAL_AWARD_POINTS_ENV, value)
    }

    fn env_for(name: &'static str, value: Option<&'static str>) -> MapEnv {
        MapEnv(
            value
                .map(|v| HashMap::from([(name, v)]))
                .unwrap_or_default(),
        )
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some("25"), 25)]
    #[case(Some(" 40 "), 40)]
    #[case(Some("0"), 1)]
    #[case(Some("99999999"), 1_000_000)]
    #[case(Some("lots"), 10)]
    #[case(Some("-5"), 10)]
    fn award_points_are_read_and_clamped(#[case] raw: Option<&'static str>, #[case] expected: u64) {
        let config = ReferralConfig::from_env_with(&env_with(raw));
        assert_eq!(config.award_points(), expected);
    }

    #[rstest]
    #[case(None, 300)]
    #[case(Some("60"), 60)]
    #[case(Some("0"), 1)]
    #[case(Some("999999"), 86_400)]
    #[case(Some("soon"), 300)]
    fn claim_lease_is_read_and_clamped(#[case] raw: Option<&'static str>, #[case] expected: i64) {
        let config = ReferralConfig::from_env_with(&env_for(REFERRAL_CLAIM_LEASE_SECS_ENV, raw));
        assert_eq!(config.claim_lease(), TimeDelta::seconds(expected));
        assert_eq!(config.award_points(), ReferralConfig::DEFAULT_AWARD_POINTS);
    }

    #[rstest]
    fn explicit_values_are_clamped() {
        let config = ReferralConfig::with_award_points(0).with_claim_lease(TimeDelta::zero());
        assert_eq!(config.award_points(), 1);
        assert_eq!(config.claim_lease(), TimeDelta::seconds(1));
    }
}
