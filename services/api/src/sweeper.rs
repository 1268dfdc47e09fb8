//! services/api/src/sweeper.rs
//!
//! Background task that evicts expired rate limit entries so the in-memory
//! store does not grow with every address that ever asked for a resend.

use derecho_core::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn sweep_once(limiter: &RateLimiter) {
    let purged = limiter.purge_expired();
    debug!(purged, remaining = limiter.tracked_keys(), "Rate limit sweep finished");
}

/// Sweeps `limiter` every `interval` until `shutdown` is cancelled.
///
/// The first sweep happens one full interval after start; a fresh store has
/// nothing to purge.
pub async fn run_rate_limit_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "Starting rate limit sweeper");

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&limiter),
            _ = shutdown.cancelled() => {
                info!("Rate limit sweeper shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derecho_core::rate_limit::{InMemoryRateLimitStore, RateLimitPolicy, SystemClock};

    #[tokio::test]
    async fn sweeper_purges_expired_entries_and_stops_on_cancel() {
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            Arc::new(SystemClock),
        ));
        let short = RateLimitPolicy::new(3, Duration::from_millis(20));
        limiter.consume("email-resend-a@example.com", short);
        limiter.consume("email-resend-b@example.com", short);
        limiter.consume("email-resend-c@example.com", RateLimitPolicy::EMAIL_RESEND);
        assert_eq!(limiter.tracked_keys(), 3);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_rate_limit_sweeper(
            limiter.clone(),
            Duration::from_millis(50),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(limiter.tracked_keys(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
