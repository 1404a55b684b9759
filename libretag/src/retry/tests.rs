use super::*;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Instant;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(100),
        Duration::from_millis(1000),
    )
}

#[test]
fn test_delay_doubles_and_caps() {
    let policy = policy(10);
    assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(200));
    assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    assert_eq!(policy.delay_for(4), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
}

#[test]
fn test_delays_are_non_decreasing() {
    let policy = policy(10);
    let delays: Vec<_> = (0..64).map(|i| policy.delay_for(i)).collect();
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_max_attempts_is_at_least_one() {
    assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
}

#[test]
fn test_ceiling_never_below_base() {
    let policy = RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(1));
    assert_eq!(policy.delay_for(0), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt_makes_one_call() {
    let calls = AtomicU32::new(0);
    let result: Result<&str> = policy(4)
        .run("fetch", &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("done") }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_k_transient_failures_below_cap_succeed_after_k_plus_one_attempts() {
    for k in 0..4u32 {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = policy(5)
            .run("fetch", &CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt <= k {
                        Err(RetagError::server("service unavailable", 503))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), k + 1);
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_return_final_failure_after_exactly_n_attempts() {
    let times = Mutex::new(Vec::new());
    let result: Result<()> = policy(4)
        .run("write", &CancellationToken::new(), |attempt| {
            times.lock().unwrap().push(Instant::now());
            async move { Err(RetagError::network(format!("timeout on attempt {attempt}"))) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetagError::Network { .. }));
    assert!(err.to_string().contains("attempt 4"));

    let times = times.into_inner().unwrap();
    assert_eq!(times.len(), 4);

    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(gaps[0] >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<()> = policy(5)
        .run("fetch", &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RetagError::authentication("denied", Some(403))) }
        })
        .await;

    assert!(matches!(result, Err(RetagError::Authentication { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<()> = policy(5)
        .run("fetch", &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RetagError::not_found("manifest", "app:prod")) }
        })
        .await;

    assert!(matches!(result, Err(RetagError::NotFound { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_raises_delay_within_ceiling() {
    let times = Mutex::new(Vec::new());
    let _: Result<()> = policy(2)
        .run("fetch", &CancellationToken::new(), |_| {
            times.lock().unwrap().push(Instant::now());
            async { Err(RetagError::rate_limit("slow down", Some(60))) }
        })
        .await;

    let times = times.into_inner().unwrap();
    assert_eq!(times.len(), 2);
    // Hint of 60s is capped at the 1s ceiling.
    assert_eq!(times[1] - times[0], Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_skips_operation() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let calls = AtomicU32::new(0);
    let result: Result<()> = policy(3)
        .run("fetch", &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

    assert!(matches!(result, Err(RetagError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_attempt_aborts_it() {
    let cancel = CancellationToken::new();
    let calls = AtomicU32::new(0);

    let result: Result<()> = policy(5)
        .run("fetch", &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            std::future::pending()
        })
        .await;

    assert!(matches!(result, Err(RetagError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let task = {
        let cancel = cancel.clone();
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            policy(5)
                .run("fetch", &cancel, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(RetagError::server("unavailable", 503)) }
                })
                .await
        })
    };

    // First attempt fails and the 100ms backoff begins.
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cancel.cancel();
    let result = task.await.unwrap();

    assert!(matches!(result, Err(RetagError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_millis(100));
}
