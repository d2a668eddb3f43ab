//! Retry policy behavior against scripted failure sequences

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use variant_annotator::shutdown::ShutdownCoordinator;
use variant_annotator::vep::retry::{permanent, transient, RetryPolicy};
use variant_annotator::vep::{FailureKind, ServiceError};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(2),
        max_backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_transient_then_success() {
    let calls = AtomicU32::new(0);
    let result = fast_policy()
        .run(None, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(transient(FailureKind::ServerError(503), "service unavailable"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_transient_exhausts_three_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast_policy()
        .run(None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient(FailureKind::ConnectionFailed, "connection refused")) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts, 3);
    assert!(!err.interrupted);
    assert!(matches!(
        err.cause,
        ServiceError::Transient {
            kind: FailureKind::ConnectionFailed,
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<(), _> = fast_policy()
        .run(None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(permanent(FailureKind::InvalidRequest, "HTTP 400")) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(err.report().contains("HTTP 400"));
}

#[tokio::test]
async fn test_undecodable_body_is_retried() {
    let result = fast_policy()
        .run(None, |attempt| async move {
            if attempt == 1 {
                Err(ServiceError::from_kind(
                    FailureKind::UndecodableBody,
                    "expected value at line 1 column 1",
                ))
            } else {
                Ok("decoded")
            }
        })
        .await;
    assert_eq!(result.unwrap(), "decoded");
}

#[tokio::test]
async fn test_shutdown_cuts_backoff_short() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_secs(30),
        max_backoff: Duration::from_secs(60),
    };
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.request_shutdown("stop");
        }
    });

    let result: Result<(), _> = tokio::time::timeout(
        Duration::from_secs(5),
        policy.run(Some(shutdown.as_ref()), |_| async {
            Err(transient(FailureKind::NetworkTimeout, "timed out"))
        }),
    )
    .await
    .expect("backoff should end on shutdown");

    let err = result.unwrap_err();
    assert!(err.interrupted);
    assert_eq!(err.attempts, 1);
}

#[test]
fn test_backoff_growth_and_cap() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_ceiling(0), Duration::from_secs(1));
    assert_eq!(policy.backoff_ceiling(1), Duration::from_secs(2));
    assert_eq!(policy.backoff_ceiling(2), Duration::from_secs(4));
    assert_eq!(policy.backoff_ceiling(10), Duration::from_secs(60));
    assert_eq!(policy.backoff_ceiling(40), Duration::from_secs(60));

    for retry in 0..8 {
        let ceiling = policy.backoff_ceiling(retry);
        for _ in 0..50 {
            let wait = policy.backoff(retry);
            assert!(wait <= ceiling);
            assert!(wait >= ceiling / 2);
        }
    }
}
