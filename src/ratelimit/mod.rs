//! Per-group deduplication and rate limiting.
//!
//! Every occurrence of an error is recorded against its group key. Each
//! notification channel then keeps its own window per group, so diagnostics
//! can stay frequent while user-facing notifications are throttled harder.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;

/// Default number of recent errors kept per group.
pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// A notification channel with its own rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Toast,
    System,
    Log,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Toast => write!(f, "toast"),
            Channel::System => write!(f, "system"),
            Channel::Log => write!(f, "log"),
        }
    }
}

/// Window lengths for each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindows {
    /// Default: 5 seconds
    pub toast: Duration,
    /// Default: 5 minutes
    pub system: Duration,
    /// Default: 1 second
    pub log: Duration,
}

impl Default for RateLimitWindows {
    fn default() -> Self {
        Self {
            toast: Duration::from_millis(5_000),
            system: Duration::from_millis(300_000),
            log: Duration::from_millis(1_000),
        }
    }
}

impl RateLimitWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toast(mut self, window: Duration) -> Self {
        self.toast = window;
        self
    }

    pub fn with_system(mut self, window: Duration) -> Self {
        self.system = window;
        self
    }

    pub fn with_log(mut self, window: Duration) -> Self {
        self.log = window;
        self
    }

    pub fn window(&self, channel: Channel) -> Duration {
        match channel {
            Channel::Toast => self.toast,
            Channel::System => self.system,
            Channel::Log => self.log,
        }
    }
}

/// Accumulated state for one group key.
#[derive(Debug, Clone)]
pub struct ErrorGroup {
    pub group_key: String,
    /// Cumulative occurrences, whether or not anything was shown.
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    recent_errors: VecDeque<AppError>,
    last_notified: HashMap<Channel, DateTime<Utc>>,
}

impl ErrorGroup {
    fn new(group_key: String, now: DateTime<Utc>) -> Self {
        Self {
            group_key,
            count: 0,
            first_seen: now,
            last_seen: now,
            recent_errors: VecDeque::new(),
            last_notified: HashMap::new(),
        }
    }

    /// Most recent occurrences, oldest first.
    pub fn recent_errors(&self) -> impl Iterator<Item = &AppError> {
        self.recent_errors.iter()
    }

    pub fn recent_len(&self) -> usize {
        self.recent_errors.len()
    }

    /// When this group last produced a notification on `channel`.
    pub fn last_notified(&self, channel: Channel) -> Option<DateTime<Utc>> {
        self.last_notified.get(&channel).copied()
    }
}

/// Keyed occurrence counters and per-channel notification windows.
pub struct RateLimiter {
    windows: RateLimitWindows,
    recent_capacity: usize,
    clock: Arc<dyn Clock>,
    groups: HashMap<String, ErrorGroup>,
}

impl RateLimiter {
    /// Creates a limiter backed by the system clock.
    pub fn new(windows: RateLimitWindows) -> Self {
        Self::with_clock(windows, Arc::new(SystemClock))
    }

    pub fn with_clock(windows: RateLimitWindows, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            clock,
            groups: HashMap::new(),
        }
    }

    /// Sets how many recent errors each group keeps. Zero keeps none.
    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = capacity;
        self
    }

    pub fn windows(&self) -> &RateLimitWindows {
        &self.windows
    }

    /// Records one occurrence of `error` against its group.
    pub fn record(&mut self, error: &AppError) -> &ErrorGroup {
        let now = self.clock.now();
        let capacity = self.recent_capacity;
        let group = self
            .groups
            .entry(error.group_key.clone())
            .or_insert_with(|| ErrorGroup::new(error.group_key.clone(), now));

        group.count += 1;
        group.last_seen = now;
        if capacity > 0 {
            group.recent_errors.push_back(error.clone());
            while group.recent_errors.len() > capacity {
                group.recent_errors.pop_front();
            }
        }
        group
    }

    /// Decides whether `group_key` may notify on `channel` now.
    ///
    /// A first sighting always notifies. Afterwards a channel notifies again
    /// only once its window has fully elapsed. A positive answer restarts the
    /// window.
    pub fn should_notify(&mut self, group_key: &str, channel: Channel) -> bool {
        let now = self.clock.now();
        let window = self.windows.window(channel);
        let group = self
            .groups
            .entry(group_key.to_string())
            .or_insert_with(|| ErrorGroup::new(group_key.to_string(), now));

        let allowed = match group.last_notified.get(&channel) {
            None => true,
            Some(last) => (now - *last)
                .to_std()
                .map(|elapsed| elapsed >= window)
                .unwrap_or(false),
        };

        if allowed {
            group.last_notified.insert(channel, now);
        } else {
            tracing::debug!(group_key, %channel, "notification suppressed by rate limit");
        }
        allowed
    }

    pub fn group(&self, group_key: &str) -> Option<&ErrorGroup> {
        self.groups.get(group_key)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ErrorGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drops every group, as a full reload would.
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitWindows::default())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("windows", &self.windows)
            .field("recent_capacity", &self.recent_capacity)
            .field("groups", &self.groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{create_error, ErrorOptions};

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_clock(RateLimitWindows::default(), clock.clone());
        (limiter, clock)
    }

    fn error(key: &str) -> AppError {
        create_error("boom", ErrorOptions::new().group_key(key))
    }

    #[test]
    fn test_default_windows() {
        let windows = RateLimitWindows::default();
        assert_eq!(windows.window(Channel::Toast), Duration::from_secs(5));
        assert_eq!(windows.window(Channel::System), Duration::from_secs(300));
        assert_eq!(windows.window(Channel::Log), Duration::from_secs(1));
    }

    #[test]
    fn test_first_occurrence_notifies_and_creates_group() {
        let (mut limiter, _) = limiter();
        assert!(limiter.is_empty());
        assert!(limiter.should_notify("g", Channel::Toast));
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.group("g").map(|g| g.count), Some(0));
    }

    #[test]
    fn test_suppressed_within_window() {
        let (mut limiter, clock) = limiter();
        assert!(limiter.should_notify("g", Channel::Toast));
        clock.advance_ms(4_999);
        assert!(!limiter.should_notify("g", Channel::Toast));
    }

    #[test]
    fn test_reopens_when_window_elapsed() {
        let (mut limiter, clock) = limiter();
        assert!(limiter.should_notify("g", Channel::Toast));
        clock.advance_ms(5_000);
        assert!(limiter.should_notify("g", Channel::Toast));
        clock.advance_ms(1_000);
        assert!(!limiter.should_notify("g", Channel::Toast));
    }

    #[test]
    fn test_suppressed_attempt_does_not_extend_window() {
        let (mut limiter, clock) = limiter();
        assert!(limiter.should_notify("g", Channel::Toast));
        clock.advance_ms(3_000);
        assert!(!limiter.should_notify("g", Channel::Toast));
        clock.advance_ms(2_000);
        assert!(limiter.should_notify("g", Channel::Toast));
    }

    #[test]
    fn test_channels_are_independent() {
        let (mut limiter, clock) = limiter();
        assert!(limiter.should_notify("g", Channel::Log));
        assert!(limiter.should_notify("g", Channel::Toast));
        assert!(limiter.should_notify("g", Channel::System));

        clock.advance_ms(1_000);
        assert!(limiter.should_notify("g", Channel::Log));
        assert!(!limiter.should_notify("g", Channel::Toast));
        assert!(!limiter.should_notify("g", Channel::System));

        clock.advance_ms(299_000);
        assert!(limiter.should_notify("g", Channel::System));
    }

    #[test]
    fn test_groups_are_independent() {
        let (mut limiter, _) = limiter();
        assert!(limiter.should_notify("a", Channel::Toast));
        assert!(limiter.should_notify("b", Channel::Toast));
        assert!(!limiter.should_notify("a", Channel::Toast));
    }

    #[test]
    fn test_record_counts_every_occurrence() {
        let (mut limiter, clock) = limiter();
        let first = limiter.record(&error("oauth-401")).first_seen;
        clock.advance_ms(700);
        limiter.record(&error("oauth-401"));
        clock.advance_ms(700);
        let group = limiter.record(&error("oauth-401"));

        assert_eq!(group.count, 3);
        assert_eq!(group.first_seen, first);
        assert_eq!((group.last_seen - first).num_milliseconds(), 1_400);
    }

    #[test]
    fn test_recent_errors_bounded_oldest_evicted() {
        let clock = Arc::new(ManualClock::default());
        let mut limiter = RateLimiter::with_clock(RateLimitWindows::default(), clock)
            .with_recent_capacity(3);

        for i in 0..5 {
            let err = create_error(format!("e{}", i), ErrorOptions::new().group_key("g"));
            limiter.record(&err);
        }

        let group = limiter.group("g").unwrap();
        assert_eq!(group.count, 5);
        assert_eq!(group.recent_len(), 3);
        let messages: Vec<_> = group.recent_errors().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_default_recent_capacity_is_ten() {
        let (mut limiter, _) = limiter();
        for _ in 0..25 {
            limiter.record(&error("g"));
        }
        assert_eq!(limiter.group("g").unwrap().recent_len(), DEFAULT_RECENT_CAPACITY);
    }

    #[test]
    fn test_clock_going_backwards_suppresses() {
        let (mut limiter, clock) = limiter();
        clock.advance_ms(10_000);
        assert!(limiter.should_notify("g", Channel::Toast));
        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert!(!limiter.should_notify("g", Channel::Toast));
    }

    #[test]
    fn test_last_notified_and_clear() {
        let (mut limiter, clock) = limiter();
        assert!(limiter.should_notify("g", Channel::Toast));
        let group = limiter.group("g").unwrap();
        assert_eq!(group.last_notified(Channel::Toast), Some(clock.now()));
        assert_eq!(group.last_notified(Channel::System), None);

        limiter.clear();
        assert!(limiter.is_empty());
        assert!(limiter.should_notify("g", Channel::Toast));
    }
}
