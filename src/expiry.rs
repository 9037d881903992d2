//! Renew-ahead-of-expiry policy for session token credentials.
//!
//! A token is treated as expired as soon as its remaining life drops to the
//! safety margin or below, not only once it has actually lapsed:
//!
//! ```text
//! expired = last_refresh is absent || (now - last_refresh) > (duration - margin)
//! ```

use crate::credential::SessionTokenCredential;

/// Seconds before actual expiry at which a token is renewed.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    safety_margin_secs: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_MARGIN_SECS)
    }
}

impl ExpiryPolicy {
    pub fn new(safety_margin_secs: i64) -> Self {
        Self { safety_margin_secs }
    }

    pub fn safety_margin_secs(&self) -> i64 {
        self.safety_margin_secs
    }

    /// Decide whether a token refreshed at `last_refresh` with a validity window of
    /// `duration_secs` must be renewed at `now`.
    ///
    /// A token that was never refreshed is always expired, and so is any token whose
    /// window is no longer than the safety margin.
    pub fn is_expired(&self, last_refresh: Option<i64>, now: i64, duration_secs: i64) -> bool {
        let Some(last) = last_refresh else {
            return true;
        };
        now.saturating_sub(last) > duration_secs.saturating_sub(self.safety_margin_secs)
    }

    /// Apply the policy to a session token credential's current secrets.
    pub fn check(&self, session: &SessionTokenCredential, now: i64) -> bool {
        self.is_expired(
            session.last_refresh_epoch_seconds(),
            now,
            i64::from(session.effective_token_duration()),
        )
    }

    /// Seconds left until the renew point, or `None` when the token is already expired.
    pub fn remaining_secs(&self, last_refresh: Option<i64>, now: i64, duration_secs: i64) -> Option<i64> {
        if self.is_expired(last_refresh, now, duration_secs) {
            return None;
        }
        let last = last_refresh?;
        Some(duration_secs - self.safety_margin_secs - (now - last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000;

    #[test]
    fn test_fresh_inside_window() {
        let policy = ExpiryPolicy::default();
        assert!(!policy.is_expired(Some(T0), T0 + 3000, 3600));
        assert!(!policy.is_expired(Some(T0), T0, 3600));
    }

    #[test]
    fn test_renew_point_is_exclusive() {
        let policy = ExpiryPolicy::default();
        // Exactly margin seconds left: still usable.
        assert!(!policy.is_expired(Some(T0), T0 + 3300, 3600));
        assert!(policy.is_expired(Some(T0), T0 + 3301, 3600));
    }

    #[test]
    fn test_expired_inside_margin() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired(Some(T0), T0 + 3400, 3600));
        assert!(policy.is_expired(Some(T0), T0 + 10_000, 3600));
    }

    #[test]
    fn test_never_refreshed_is_expired() {
        let policy = ExpiryPolicy::default();
        for now in [0, T0, i64::MAX] {
            for duration in [0, 200, 3600, 43_200] {
                assert!(policy.is_expired(None, now, duration));
            }
        }
    }

    #[test]
    fn test_window_shorter_than_margin_is_always_expired() {
        let policy = ExpiryPolicy::default();
        assert!(policy.is_expired(Some(T0), T0, 200));
        assert!(policy.is_expired(Some(T0), T0 + 1, 300));
        assert!(policy.is_expired(Some(T0), T0, 299));
    }

    #[test]
    fn test_monotonic_in_elapsed_time() {
        let policy = ExpiryPolicy::default();
        let threshold = T0 + 3600 - 300;
        let mut previous = false;
        for now in threshold..threshold + 50 {
            let expired = policy.is_expired(Some(T0), now, 3600);
            assert!(!previous || expired, "expiry flipped back at {now}");
            previous = expired;
        }
        assert!(previous);
    }

    #[test]
    fn test_custom_margin() {
        let policy = ExpiryPolicy::new(60);
        assert!(!policy.is_expired(Some(T0), T0 + 3500, 3600));
        assert!(policy.is_expired(Some(T0), T0 + 3541, 3600));
    }

    #[test]
    fn test_clock_behind_last_refresh_is_fresh() {
        let policy = ExpiryPolicy::default();
        assert!(!policy.is_expired(Some(T0), T0 - 120, 3600));
    }

    #[test]
    fn test_remaining_secs() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.remaining_secs(Some(T0), T0 + 3000, 3600), Some(300));
        assert_eq!(policy.remaining_secs(Some(T0), T0 + 3400, 3600), None);
        assert_eq!(policy.remaining_secs(None, T0, 3600), None);
    }
}
