use std::sync::atomic::{AtomicUsize, Ordering};

use futures::executor::block_on;
use proptest::prelude::*;
use reqwest::StatusCode;

use student_analyzer::services::{
    AiError, AiErrorKind, CredentialPool, GenerationRequest, GenerativeBackend, RotatingInvoker,
};

mod common;
use common::{Reply, ScriptedBackend};

fn pool_of(n: usize) -> CredentialPool {
    CredentialPool::new((0..n).map(|i| format!("key-{i}")))
}

fn rate_limited() -> AiError {
    AiError::http(StatusCode::TOO_MANY_REQUESTS, "quota exceeded")
}

proptest! {
    #[test]
    fn test_succeeds_on_last_credential_after_retryable_failures(n in 1usize..8) {
        let invoker = RotatingInvoker::new(pool_of(n));
        let report = block_on(invoker.invoke_with_report("prop", "fallback", |credential| async move {
            if credential.index() + 1 < n {
                Err(rate_limited())
            } else {
                Ok("success")
            }
        }));

        prop_assert_eq!(report.value, "success");
        prop_assert_eq!(report.calls, n);
        prop_assert!(!report.fell_back);
        prop_assert_eq!(report.attempts.len(), n - 1);
        prop_assert!(report.attempts.iter().all(|a| a.retry_allowed));
    }

    #[test]
    fn test_retryable_failure_on_every_credential_returns_fallback(n in 1usize..8, expired in any::<bool>()) {
        let invoker = RotatingInvoker::new(pool_of(n));
        let report = block_on(invoker.invoke_with_report("prop", -1i64, |_| async move {
            if expired {
                Err::<i64, _>(AiError::CredentialRejected("API key expired".into()))
            } else {
                Err(rate_limited())
            }
        }));

        prop_assert_eq!(report.value, -1);
        prop_assert_eq!(report.calls, n);
        prop_assert!(report.fell_back);
        let last = report.attempts.last().copied();
        prop_assert_eq!(last.map(|a| a.retry_allowed), Some(false));
    }

    #[test]
    fn test_non_retryable_failure_stops_after_one_attempt(n in 1usize..8) {
        let calls = AtomicUsize::new(0);
        let invoker = RotatingInvoker::new(pool_of(n));
        let report = block_on(invoker.invoke_with_report("prop", 0u8, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u8, _>(AiError::http(StatusCode::INTERNAL_SERVER_ERROR, "boom")) }
        }));

        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        prop_assert_eq!(report.calls, 1);
        prop_assert_eq!(report.attempts[0].kind, AiErrorKind::Unavailable);
        prop_assert!(!report.attempts[0].retry_allowed);
        prop_assert!(report.fell_back);
    }
}

#[tokio::test]
async fn test_empty_pool_never_runs_the_work() {
    let calls = AtomicUsize::new(0);
    let invoker = RotatingInvoker::new(CredentialPool::new(Vec::<String>::new()));

    let report = invoker
        .invoke_with_report("empty", "fallback", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("never") }
        })
        .await;

    assert_eq!(report.value, "fallback");
    assert_eq!(report.calls, 0);
    assert!(report.fell_back);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rotation_order_k1_k2_k3() {
    let backend = ScriptedBackend::new()
        .reply("k1", Reply::RateLimited)
        .reply("k2", Reply::RateLimited)
        .reply("k3", Reply::text("done"));
    let invoker = RotatingInvoker::new(CredentialPool::new(["k1", "k2", "k3"]));
    let request = GenerationRequest::new("hi");

    let report = invoker
        .invoke_with_report("scenario", None, |credential| {
            let backend = &backend;
            let request = &request;
            async move { backend.generate(&credential, request).await.map(Some) }
        })
        .await;

    assert_eq!(report.value.as_deref(), Some("done"));
    assert_eq!(report.calls, 3);
    assert_eq!(backend.secrets_called(), vec!["k1", "k2", "k3"]);
    assert_eq!(
        report.attempts.iter().map(|a| a.kind).collect::<Vec<_>>(),
        vec![AiErrorKind::RateLimited, AiErrorKind::RateLimited]
    );
}

#[tokio::test]
async fn test_expired_key_rotates_to_next() {
    let backend = ScriptedBackend::new()
        .reply("old", Reply::Expired)
        .reply("new", Reply::text("ok"));
    let invoker = RotatingInvoker::new(CredentialPool::new(["old", "new"]));
    let request = GenerationRequest::new("hi");

    let value = invoker
        .invoke("expired", String::new(), |credential| {
            let backend = &backend;
            let request = &request;
            async move { backend.generate(&credential, request).await }
        })
        .await;

    assert_eq!(value, "ok");
    assert_eq!(backend.secrets_called(), vec!["old", "new"]);
}

#[tokio::test]
async fn test_concurrent_invocations_use_their_own_credentials() {
    let backend = ScriptedBackend::new()
        .reply("k1", Reply::RateLimited)
        .reply("k2", Reply::text("from-k2"));
    let invoker = RotatingInvoker::new(CredentialPool::new(["k1", "k2"]));
    let request = GenerationRequest::new("hi");

    let run = || {
        invoker.invoke("concurrent", None, |credential| {
            let backend = &backend;
            let request = &request;
            async move { backend.generate(&credential, request).await.map(Some) }
        })
    };
    let (a, b) = tokio::join!(run(), run());

    assert_eq!(a.as_deref(), Some("from-k2"));
    assert_eq!(b.as_deref(), Some("from-k2"));
    assert_eq!(backend.secrets_called().len(), 4);
}
