//! Fixed-window behaviour of the resend limiter, driven by a manual clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use derecho_core::{
    email_resend_key, Clock, InMemoryRateLimitStore, RateLimitPolicy, RateLimitStore,
    RateLimiter,
};
use parking_lot::Mutex;

struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()),
        }
    }

    fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

fn setup() -> (RateLimiter, Arc<ManualClock>, Arc<InMemoryRateLimitStore>) {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(InMemoryRateLimitStore::new());
    let limiter = RateLimiter::new(store.clone(), clock.clone());
    (limiter, clock, store)
}

#[test]
fn test_exhaustion_after_max_attempts() {
    let (limiter, _, _) = setup();
    let policy = RateLimitPolicy::new(3, Duration::from_secs(15 * 60));

    let remaining: Vec<u32> = (0..3)
        .map(|_| {
            let status = limiter.consume("x", policy);
            assert!(status.is_allowed);
            assert!(status.message.is_none());
            status.remaining_attempts
        })
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    let refused = limiter.consume("x", policy);
    assert!(!refused.is_allowed);
    assert_eq!(refused.remaining_attempts, 0);
    let message = refused.message.expect("refusal carries a message");
    assert!(!message.is_empty());
    assert!(message.contains("15 minutos"));
}

#[test]
fn test_window_expiry_reopens_the_key() {
    let (limiter, clock, _) = setup();
    let policy = RateLimitPolicy::new(1, Duration::from_millis(100));

    assert!(limiter.consume("y", policy).is_allowed);
    assert!(!limiter.consume("y", policy).is_allowed);

    clock.advance(chrono::Duration::milliseconds(101));

    let status = limiter.consume("y", policy);
    assert!(status.is_allowed);
    assert_eq!(status.remaining_attempts, 0);
}

#[test]
fn test_window_expiry_with_real_time() {
    let limiter = RateLimiter::in_memory();
    let policy = RateLimitPolicy::new(1, Duration::from_millis(100));

    assert!(limiter.consume("y", policy).is_allowed);
    std::thread::sleep(Duration::from_millis(150));
    assert!(limiter.consume("y", policy).is_allowed);
}

#[test]
fn test_peek_never_spends_attempts() {
    let (with_peeks, _, _) = setup();
    let (without_peeks, _, _) = setup();
    let policy = RateLimitPolicy::EMAIL_RESEND;

    let fresh = with_peeks.peek("z", policy);
    assert!(fresh.is_allowed);
    assert_eq!(fresh.remaining_attempts, 3);
    assert_eq!(fresh.reset_time, None);

    for round in 0..4 {
        for _ in 0..5 {
            with_peeks.peek("z", policy);
        }
        let observed = with_peeks.consume("z", policy);
        let expected = without_peeks.consume("z", policy);
        assert_eq!(observed, expected, "round {round}");
    }
}

#[test]
fn test_peek_on_exhausted_key_matches_consume() {
    let (limiter, _, _) = setup();
    let policy = RateLimitPolicy::new(2, Duration::from_secs(90));

    limiter.consume("k", policy);
    limiter.consume("k", policy);

    let peeked = limiter.peek("k", policy);
    let consumed = limiter.consume("k", policy);
    assert_eq!(peeked, consumed);
    assert!(peeked.message.unwrap().contains("2 minutos"));
}

#[test]
fn test_reset_after_exhaustion() {
    let (limiter, _, store) = setup();
    let policy = RateLimitPolicy::EMAIL_RESEND;
    let key = email_resend_key("lector@ejemplo.com");

    for _ in 0..4 {
        limiter.consume(&key, policy);
    }
    assert!(!limiter.consume(&key, policy).is_allowed);

    limiter.reset(&key);
    assert!(store.get(&key).is_none());

    let status = limiter.consume(&key, policy);
    assert!(status.is_allowed);
    assert_eq!(status.remaining_attempts, policy.max_attempts - 1);
}

#[test]
fn test_keys_are_independent() {
    let (limiter, _, _) = setup();
    let policy = RateLimitPolicy::new(1, Duration::from_secs(60));

    assert!(limiter.consume("a", policy).is_allowed);
    assert!(!limiter.consume("a", policy).is_allowed);
    assert!(limiter.consume("b", policy).is_allowed);
}

#[test]
fn test_one_minute_left_is_singular() {
    let (limiter, clock, _) = setup();
    let policy = RateLimitPolicy::new(1, Duration::from_secs(15 * 60));

    limiter.consume("k", policy);
    clock.advance(chrono::Duration::minutes(14) + chrono::Duration::seconds(30));

    let message = limiter.consume("k", policy).message.unwrap();
    assert!(message.contains("espera 1 minuto antes"), "{message}");
}

#[test]
fn test_sweep_is_not_needed_for_correctness() {
    let (limiter, clock, store) = setup();
    let policy = RateLimitPolicy::new(1, Duration::from_secs(60));

    limiter.consume("k", policy);
    clock.advance(chrono::Duration::seconds(61));

    // The stale entry is still stored but ignored.
    assert_eq!(store.len(), 1);
    assert!(limiter.peek("k", policy).is_allowed);

    assert_eq!(limiter.purge_expired(), 1);
    assert!(store.is_empty());
}
