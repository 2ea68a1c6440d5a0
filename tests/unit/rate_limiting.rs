//! Sliding-window rate limiter behavior (paused clock)

use harvest_backup::downloader::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, sleep, Instant};

#[tokio::test(start_paused = true)]
async fn test_request_over_quota_waits_for_oldest_to_expire() {
    let limiter = RateLimiter::new(3, Duration::from_secs(1));
    for _ in 0..3 {
        assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
    }

    advance(Duration::from_millis(400)).await;

    let start = Instant::now();
    let waited = limiter.wait_if_needed().await;

    // Remaining window plus the 100ms buffer
    assert_eq!(waited, Duration::from_millis(700));
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(limiter.in_window().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exact_wait_without_buffer() {
    let limiter = RateLimiter::new(2, Duration::from_secs(15)).with_buffer(Duration::ZERO);
    limiter.wait_if_needed().await;
    limiter.wait_if_needed().await;

    let start = Instant::now();
    assert_eq!(limiter.wait_if_needed().await, Duration::from_secs(15));
    assert!(start.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_spread_out_requests_never_wait() {
    let limiter = RateLimiter::new(2, Duration::from_secs(1));
    for _ in 0..10 {
        assert_eq!(limiter.wait_if_needed().await, Duration::ZERO);
        sleep(Duration::from_millis(600)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_the_quota() {
    let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
    let start = Instant::now();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.wait_if_needed().await })
        })
        .collect();

    let mut waited = Vec::new();
    for handle in handles {
        waited.push(handle.await.unwrap());
    }

    assert_eq!(waited.iter().filter(|w| w.is_zero()).count(), 3);
    assert!(start.elapsed() >= Duration::from_secs(1));
}
