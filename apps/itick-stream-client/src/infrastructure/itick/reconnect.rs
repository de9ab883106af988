//! Reconnection Policy
//!
//! Delay schedule for reconnect attempts after a failed open, a rejected
//! authentication, or a lost session. The default is the service's
//! fixed five-second retry with no attempt cap; exponential backoff with a cap
//! and jitter is available behind the same type.

use std::time::Duration;

use rand::Rng;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier applied after each attempt (1.0 keeps the delay fixed).
    pub multiplier: f64,
    /// Jitter factor as a fraction in `[0.0, 1.0]` (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum number of reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    ///
    /// `jitter_factor` is clamped to `[0.0, 1.0]`; a non-finite factor disables jitter.
    #[must_use]
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor: clamp_jitter(jitter_factor),
            max_attempts,
        }
    }

    /// Same delay before every attempt, retrying forever.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0, 0.0, 0)
    }

    /// Exponential backoff from `initial_delay` up to `max_delay`.
    #[must_use]
    pub fn exponential(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self::new(initial_delay, max_delay, multiplier, 0.0, 0)
    }

    /// Set the jitter fraction, clamped like [`new`](Self::new).
    #[must_use]
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = clamp_jitter(jitter_factor);
        self
    }

    /// Cap the number of attempts (0 = unlimited).
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

fn clamp_jitter(jitter_factor: f64) -> f64 {
    if jitter_factor.is_finite() {
        jitter_factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Reconnection policy implementing backoff with optional jitter.
///
/// # Example
///
/// ```rust
/// use itick_stream_client::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
///
/// // Authenticated again
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Get the next delay, advancing the backoff.
    ///
    /// Returns `None` once `max_attempts` is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count = self.attempt_count.saturating_add(1);

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Reset the policy after a successful authentication.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        // Fields are public, so the factor may bypass the clamp.
        if !jitter_range.is_finite() || jitter_range <= 0.0 {
            return duration;
        }
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

/// Error type for reconnection failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxAttemptsExceeded(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds_unlimited() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(5));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert!((config.multiplier - 1.0).abs() < f64::EPSILON);
        assert!(config.jitter_factor.abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn fixed_policy_repeats_delay() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_millis(250)));
        for _ in 0..5 {
            assert_eq!(policy.next_delay(), Some(Duration::from_millis(250)));
        }
        assert_eq!(policy.attempt_count(), 5);
    }

    #[test]
    fn policy_exponential_backoff() {
        let config = ReconnectConfig::exponential(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
        );
        let mut policy = ReconnectPolicy::new(config);

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(800)));
    }

    #[test]
    fn policy_max_delay_cap() {
        let config = ReconnectConfig::exponential(
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            4.0,
        );
        let mut policy = ReconnectPolicy::new(config);

        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn policy_max_attempts() {
        let config = ReconnectConfig::fixed(Duration::from_millis(100)).with_max_attempts(3);
        let mut policy = ReconnectPolicy::new(config);

        for expected in 1..=3 {
            assert!(policy.next_delay().is_some());
            assert_eq!(policy.attempt_count(), expected);
        }

        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
        assert_eq!(policy.attempt_count(), 3);
    }

    #[test]
    fn policy_reset() {
        let config = ReconnectConfig::exponential(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
        )
        .with_max_attempts(3);
        let mut policy = ReconnectPolicy::new(config);

        let _ = policy.next_delay();
        let _ = policy.next_delay();
        assert_eq!(policy.attempt_count(), 2);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.should_retry());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn policy_jitter_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(
                ReconnectConfig::fixed(Duration::from_millis(1000)).with_jitter(0.1),
            );

            let millis = policy.next_delay().unwrap().as_millis();
            assert!(millis >= 900, "delay {millis}ms is below minimum 900ms");
            assert!(millis <= 1100, "delay {millis}ms is above maximum 1100ms");
        }
    }

    #[test]
    fn jitter_factor_is_clamped() {
        let huge = ReconnectConfig::fixed(Duration::from_secs(5)).with_jitter(1e308);
        assert!((huge.jitter_factor - 1.0).abs() < f64::EPSILON);

        let nan = ReconnectConfig::fixed(Duration::from_secs(5)).with_jitter(f64::NAN);
        assert!(nan.jitter_factor.abs() < f64::EPSILON);

        let negative = ReconnectConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            1.0,
            -0.5,
            0,
        );
        assert!(negative.jitter_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_jitter_never_panics() {
        let mut clamped = ReconnectPolicy::new(
            ReconnectConfig::fixed(Duration::from_millis(1000)).with_jitter(1e308),
        );
        for _ in 0..20 {
            let millis = clamped.next_delay().unwrap().as_millis();
            assert!((1..=2000).contains(&millis), "delay {millis}ms outside ±100%");
        }

        let mut config = ReconnectConfig::fixed(Duration::from_millis(1000));
        config.jitter_factor = f64::INFINITY;
        let mut unclamped = ReconnectPolicy::new(config);
        assert_eq!(unclamped.next_delay(), Some(Duration::from_millis(1000)));

        let mut config = ReconnectConfig::fixed(Duration::from_millis(1000));
        config.jitter_factor = f64::NAN;
        let mut unclamped = ReconnectPolicy::new(config);
        assert_eq!(unclamped.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn unlimited_attempts() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..1000 {
            assert!(policy.should_retry());
            assert!(policy.next_delay().is_some());
        }
    }
}
