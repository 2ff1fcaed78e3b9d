use std::future::Future;

use crate::services::ai_error::{AiError, AiErrorKind};
use crate::services::credentials::{Credential, CredentialPool};

/// One failed call made by the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub credential_index: usize,
    pub kind: AiErrorKind,
    pub retry_allowed: bool,
}

#[derive(Debug)]
pub struct Invocation<T> {
    pub value: T,
    /// Failed attempts, in order.
    pub attempts: Vec<Attempt>,
    /// Number of times the unit of work ran.
    pub calls: usize,
    pub fell_back: bool,
}

/// Runs a unit of work against the credential pool, one credential per
/// attempt, until it succeeds or a fallback has to be returned.
///
/// The credential is passed into each attempt; nothing shared is mutated, so
/// concurrent invocations never observe each other's rotation.
#[derive(Debug, Clone)]
pub struct RotatingInvoker {
    pool: CredentialPool,
    max_attempts: Option<usize>,
}

impl RotatingInvoker {
    pub fn new(pool: CredentialPool) -> Self {
        Self {
            pool,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Attempts available to one invocation; never more than the pool size.
    pub fn attempt_budget(&self) -> usize {
        let size = self.pool.len();
        self.max_attempts.map_or(size, |max| max.min(size))
    }

    pub async fn invoke<T, F, Fut>(&self, operation: &str, fallback: T, work: F) -> T
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        self.invoke_with_report(operation, fallback, work).await.value
    }

    pub async fn invoke_with_report<T, F, Fut>(
        &self,
        operation: &str,
        fallback: T,
        mut work: F,
    ) -> Invocation<T>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let budget = self.attempt_budget();
        let mut attempts = Vec::new();

        if budget == 0 {
            if self.pool.is_empty() {
                tracing::warn!(operation, "no AI credentials configured, returning fallback");
            } else {
                tracing::warn!(operation, "attempt cap is zero, returning fallback");
            }
            return Invocation {
                value: fallback,
                attempts,
                calls: 0,
                fell_back: true,
            };
        }

        for index in 0..budget {
            let Some(credential) = self.pool.get(index) else {
                break;
            };

            let err = match work(credential).await {
                Ok(value) => {
                    if index > 0 {
                        tracing::info!(operation, credential_index = index, "AI call succeeded after rotation");
                    }
                    return Invocation {
                        value,
                        attempts,
                        calls: index + 1,
                        fell_back: false,
                    };
                }
                Err(err) => err,
            };

            let kind = err.kind();
            let retry_allowed = kind.is_retryable() && index + 1 < budget;
            attempts.push(Attempt {
                credential_index: index,
                kind,
                retry_allowed,
            });

            if retry_allowed {
                tracing::warn!(
                    operation,
                    credential_index = index,
                    ?kind,
                    error = %err,
                    "AI call failed, rotating to next credential"
                );
                continue;
            }

            if kind.is_retryable() {
                tracing::warn!(
                    operation,
                    attempts = index + 1,
                    ?kind,
                    error = %err,
                    "AI credentials exhausted, returning fallback"
                );
            } else {
                tracing::error!(
                    operation,
                    credential_index = index,
                    ?kind,
                    error = %err,
                    "AI call failed, returning fallback"
                );
            }
            break;
        }

        Invocation {
            value: fallback,
            calls: attempts.len(),
            attempts,
            fell_back: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn invoker(keys: &[&str]) -> RotatingInvoker {
        RotatingInvoker::new(CredentialPool::new(keys.iter().copied()))
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let report = invoker(&["a", "b"])
            .invoke_with_report("test", 0, |c| async move { Ok(c.index() + 10) })
            .await;
        assert_eq!(report.value, 10);
        assert_eq!(report.calls, 1);
        assert!(!report.fell_back);
    }

    #[tokio::test]
    async fn test_max_attempts_caps_budget() {
        let invoker = invoker(&["a", "b", "c"]).with_max_attempts(2);
        assert_eq!(invoker.attempt_budget(), 2);
        let report = invoker
            .invoke_with_report("test", "fallback", |_| async {
                Err::<&str, _>(AiError::http(StatusCode::TOO_MANY_REQUESTS, "quota"))
            })
            .await;
        assert_eq!(report.value, "fallback");
        assert_eq!(report.calls, 2);
        assert!(report.attempts[0].retry_allowed);
        assert!(!report.attempts[1].retry_allowed);
    }

    #[tokio::test]
    async fn test_zero_cap_makes_no_calls() {
        let report = invoker(&["a", "b"])
            .with_max_attempts(0)
            .invoke_with_report("test", "fallback", |_| async { Ok("live") })
            .await;
        assert_eq!(report.value, "fallback");
        assert_eq!(report.calls, 0);
        assert!(report.fell_back);
    }

    #[tokio::test]
    async fn test_max_attempts_never_exceeds_pool() {
        assert_eq!(invoker(&["a"]).with_max_attempts(5).attempt_budget(), 1);
    }
}
