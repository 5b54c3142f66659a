use std::time::Duration;

use rand::Rng;

/// How the WebSocket transport retries after losing its connection.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever; `Some(0)` never reconnects.
    pub max_attempts: Option<u32>,
    /// A session that stays up at least this long resets the attempt count.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(10),
            stable_after: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    pub fn never() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Whether a session that lasted `uptime` earns a fresh attempt count.
    pub fn is_stable(&self, uptime: Duration) -> bool {
        uptime >= self.stable_after
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Upper bound of the wait before `attempt` (1-based): doubles each time,
    /// capped at `max_delay`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Wait before `attempt`, jittered uniformly over the upper half of the ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let floor = ceiling / 2;
        if ceiling <= floor {
            return ceiling;
        }
        rand::rng().random_range(floor..=ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_doubles_then_caps() {
        let p = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            max_attempts: None,
            ..Default::default()
        };
        assert_eq!(p.ceiling(1), Duration::from_millis(100));
        assert_eq!(p.ceiling(2), Duration::from_millis(200));
        assert_eq!(p.ceiling(4), Duration::from_millis(800));
        assert_eq!(p.ceiling(5), Duration::from_millis(1000));
        assert_eq!(p.ceiling(64), Duration::from_millis(1000));
    }

    #[test]
    fn delay_stays_within_jitter_band() {
        let p = ReconnectPolicy::default();
        for attempt in 1..12 {
            let d = p.delay(attempt);
            let ceiling = p.ceiling(attempt);
            assert!(d <= ceiling && d >= ceiling / 2, "attempt {}: {:?}", attempt, d);
        }
    }

    #[test]
    fn attempt_limits() {
        assert!(!ReconnectPolicy::never().allows(1));
        assert!(ReconnectPolicy::default().allows(10));
        assert!(!ReconnectPolicy::default().allows(11));
        let forever = ReconnectPolicy {
            max_attempts: None,
            ..Default::default()
        };
        assert!(forever.allows(u32::MAX));
    }

    #[test]
    fn short_sessions_keep_counting() {
        let p = ReconnectPolicy::default();
        assert!(!p.is_stable(Duration::from_millis(50)));
        assert!(p.is_stable(Duration::from_secs(10)));
    }
}
