use std::time::Duration;
use tokio::time::Instant;

/// Quiet period after the last event before a burst fires.
pub const QUIET_WINDOW: Duration = Duration::from_millis(200);

/// Longest a burst may be postponed, measured from its first event.
pub const MAX_WAIT: Duration = Duration::from_millis(2000);

/// Debounce timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncePolicy {
    pub quiet: Duration,
    pub max_wait: Duration,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            quiet: QUIET_WINDOW,
            max_wait: MAX_WAIT,
        }
    }
}

/// Burst tracker for trailing-edge debouncing with a max-wait ceiling.
#[derive(Debug, Clone)]
pub struct Debouncer {
    policy: DebouncePolicy,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            first: None,
            last: None,
        }
    }

    /// Record an event at `now`.
    pub fn record(&mut self, now: Instant) {
        self.first.get_or_insert(now);
        self.last = Some(now);
    }

    /// When the pending burst fires, if one is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first?;
        let last = self.last?;
        Some((last + self.policy.quiet).min(first + self.policy.max_wait))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.first.is_some()
    }

    /// Forget the current burst.
    pub fn reset(&mut self) {
        self.first = None;
        self.last = None;
    }
}
