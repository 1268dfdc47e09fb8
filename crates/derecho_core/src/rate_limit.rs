//! crates/derecho_core/src/rate_limit.rs
//!
//! A keyed, fixed-window attempt counter used to throttle actions such as
//! resending a verification email.
//!
//! State lives in a [`RateLimitStore`] handed to the limiter by whoever builds
//! the application, so it is local to one process: several instances of the
//! service each enforce their own limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Prefix of the keys used to throttle verification-email resends.
const EMAIL_RESEND_PREFIX: &str = "email-resend-";

/// The stored state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Attempts consumed in the current window.
    pub count: u32,
    /// Instant the window closes and the count goes back to zero.
    pub reset_time: DateTime<Utc>,
}

impl RateLimitEntry {
    /// An entry only counts while its window is open.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.reset_time
    }
}

/// How many attempts a key gets per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Three resends every fifteen minutes.
    pub const EMAIL_RESEND: Self = Self {
        max_attempts: 3,
        window: Duration::from_secs(15 * 60),
    };

    pub const fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let millis = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        chrono::Duration::try_milliseconds(millis)
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::EMAIL_RESEND
    }
}

/// The answer to a `consume` or `peek` call.
///
/// A refusal is an ordinary value, not an error: callers branch on
/// `is_allowed` and show `message` to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub is_allowed: bool,
    pub remaining_attempts: u32,
    pub reset_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl RateLimitStatus {
    fn allowed(remaining_attempts: u32, reset_time: Option<DateTime<Utc>>) -> Self {
        Self {
            is_allowed: true,
            remaining_attempts,
            reset_time,
            message: None,
        }
    }

    fn exhausted(reset_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            is_allowed: false,
            remaining_attempts: 0,
            reset_time: Some(reset_time),
            message: Some(exhausted_message(minutes_until(reset_time, now))),
        }
    }
}

/// Whole minutes left in the window, rounded up.
fn minutes_until(reset_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (reset_time - now).num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}

fn exhausted_message(minutes: i64) -> String {
    let plural = if minutes == 1 { "" } else { "s" };
    format!(
        "Has excedido el límite de reintentos. Por favor espera {minutes} minuto{plural} antes de intentar nuevamente."
    )
}

/// Builds the limiter key for resend requests from an email address.
///
/// The address is trimmed and lowercased so that case variations of the same
/// mailbox share one counter.
pub fn email_resend_key(email: &str) -> String {
    format!("{EMAIL_RESEND_PREFIX}{}", email.trim().to_lowercase())
}

//=========================================================================================
// Store and Clock Seams
//=========================================================================================

/// Where the limiter keeps its entries.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> Option<RateLimitEntry>;

    fn set(&self, key: &str, entry: RateLimitEntry);

    fn delete(&self, key: &str);

    /// Drops every entry whose window has closed at `now`, returning how many
    /// were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default store: a map guarded by a mutex.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.lock().get(key).copied()
    }

    fn set(&self, key: &str, entry: RateLimitEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Source of "now". Each limiter call reads it exactly once.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// The Limiter
//=========================================================================================

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    // Serialises the read-modify-write of `consume` (and `reset`) so racing
    // attempts on one key cannot lose an increment.
    update_lock: Mutex<()>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            update_lock: Mutex::new(()),
        }
    }

    /// A limiter over a fresh in-memory store and the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), Arc::new(SystemClock))
    }

    /// Records one attempt for `key` if the window still has room.
    pub fn consume(&self, key: &str, policy: RateLimitPolicy) -> RateLimitStatus {
        let _guard = self.update_lock.lock();
        let now = self.clock.now();

        match self.store.get(key).filter(|entry| entry.is_live(now)) {
            None => {
                let reset_time = policy.window_end(now);
                self.store.set(key, RateLimitEntry { count: 1, reset_time });
                RateLimitStatus::allowed(policy.max_attempts.saturating_sub(1), Some(reset_time))
            }
            Some(entry) if entry.count >= policy.max_attempts => {
                RateLimitStatus::exhausted(entry.reset_time, now)
            }
            Some(entry) => {
                let count = entry.count + 1;
                self.store.set(
                    key,
                    RateLimitEntry {
                        count,
                        reset_time: entry.reset_time,
                    },
                );
                RateLimitStatus::allowed(
                    policy.max_attempts.saturating_sub(count),
                    Some(entry.reset_time),
                )
            }
        }
    }

    /// Reports what `consume` would see for `key` without spending an attempt.
    pub fn peek(&self, key: &str, policy: RateLimitPolicy) -> RateLimitStatus {
        let now = self.clock.now();

        match self.store.get(key).filter(|entry| entry.is_live(now)) {
            None => RateLimitStatus::allowed(policy.max_attempts, None),
            Some(entry) if entry.count >= policy.max_attempts => {
                RateLimitStatus::exhausted(entry.reset_time, now)
            }
            Some(entry) => RateLimitStatus::allowed(
                policy.max_attempts.saturating_sub(entry.count),
                Some(entry.reset_time),
            ),
        }
    }

    /// Forgets everything recorded for `key`.
    pub fn reset(&self, key: &str) {
        let _guard = self.update_lock.lock();
        self.store.delete(key);
    }

    /// Removes entries whose window has closed. Only bounds memory: the read
    /// paths already ignore stale entries.
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.clock.now())
    }

    /// Number of keys currently held by the store, stale ones included.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}
