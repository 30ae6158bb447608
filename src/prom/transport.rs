//! HTTP execution with bounded, jittered exponential backoff
//!
//! Attempts run strictly one after another: the next attempt starts only once
//! the previous one has failed and its backoff delay has elapsed.

use super::config::RetryPolicy;
use super::error::{QueryError, TransientCause, TransportError};
use super::query::RequestDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP exchange
///
/// Implementations report only network-level failures as errors; any
/// response that arrived, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed executor
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Build an executor that identifies itself with `user_agent`
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    TransportError::Transient(TransientCause::Network(err.to_string()))
}

/// Map a completed exchange to its body or a classified failure
///
/// # Errors
///
/// 5xx is transient, every other non-2xx status is permanent.
pub fn classify_response(response: HttpResponse) -> Result<String, TransportError> {
    match response.status {
        200..=299 => Ok(response.body),
        500..=599 => Err(TransportError::Transient(TransientCause::ServerStatus {
            status: response.status,
            body: response.body,
        })),
        status => Err(TransportError::Permanent {
            status,
            body: response.body,
        }),
    }
}

/// Wraps an executor with the retry policy
#[derive(Debug, Clone)]
pub struct RetryingTransport<E> {
    executor: E,
    policy: RetryPolicy,
}

impl<E: HttpExecutor> RetryingTransport<E> {
    #[must_use]
    pub const fn new(executor: E, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Execute `request`, retrying transient failures
    ///
    /// # Errors
    ///
    /// Returns `Transport` immediately for a permanent failure, and
    /// `RetryExhausted` carrying the last failure once every attempt failed.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<String, QueryError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Attempt {}/{} for {}", attempt, max_attempts, request.url);

            let err = match self.attempt(request).await {
                Ok(body) => return Ok(body),
                Err(err) if !err.is_retryable() => {
                    warn!("Permanent failure for {}: {}", request.url, err);
                    return Err(QueryError::Transport(err));
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                warn!("Giving up on {} after {} attempts: {}", request.url, attempt, err);
                return Err(QueryError::RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.backoff(attempt, self.policy.draw_jitter());
            debug!(
                "Transient failure on attempt {} ({}), retrying in {:?}",
                attempt, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &RequestDescriptor) -> Result<String, TransportError> {
        let timeout = self.policy.attempt_timeout;
        match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Ok(Ok(response)) => classify_response(response),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TransportError::Transient(TransientCause::Timeout(timeout))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prom::query::build_instant;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Replays scripted outcomes, then keeps answering 200
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpExecutor for Scripted {
        async fn execute(&self, _request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(status(200, "ok")))
        }
    }

    /// Never answers within any reasonable timeout
    struct Hanging {
        calls: AtomicU32,
    }

    #[async_trait]
    impl HttpExecutor for Hanging {
        async fn execute(&self, _request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(status(200, "late"))
        }
    }

    fn status(code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status: code,
            body: body.to_string(),
        }
    }

    fn network() -> Result<HttpResponse, TransportError> {
        Err(TransportError::Transient(TransientCause::Network(
            "connection refused".to_string(),
        )))
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_attempt_timeout(Duration::from_millis(200))
    }

    fn request() -> RequestDescriptor {
        build_instant("http://prom", "up", Some(1)).unwrap()
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let executor = Scripted::new(vec![network(), Ok(status(503, "busy")), network()]);
        let transport = RetryingTransport::new(executor, fast_policy(10));

        let body = transport.execute(&request()).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(transport.executor().calls(), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let executor = Scripted::new(vec![Ok(status(400, "bad query"))]);
        let transport = RetryingTransport::new(executor, fast_policy(10));

        let err = transport.execute(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Transport(TransportError::Permanent { status: 400, .. })
        ));
        assert_eq!(transport.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_failure() {
        let executor = Scripted::new(vec![network(), network(), Ok(status(502, "gateway"))]);
        let transport = RetryingTransport::new(executor, fast_policy(3));

        let err = transport.execute(&request()).await.unwrap_err();
        match err {
            QueryError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(
                    last,
                    TransportError::Transient(TransientCause::ServerStatus {
                        status: 502,
                        body: "gateway".to_string()
                    })
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.executor().calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let executor = Hanging {
            calls: AtomicU32::new(0),
        };
        let policy = fast_policy(2).with_attempt_timeout(Duration::from_millis(20));
        let transport = RetryingTransport::new(executor, policy);

        let err = transport.execute(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::RetryExhausted {
                attempts: 2,
                last: TransportError::Transient(TransientCause::Timeout(_))
            }
        ));
        assert_eq!(transport.executor().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_tries_once() {
        let executor = Scripted::new(vec![]);
        let transport = RetryingTransport::new(executor, fast_policy(0));
        assert_eq!(transport.execute(&request()).await.unwrap(), "ok");
        assert_eq!(transport.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_retried() {
        let executor = ReqwestExecutor::new("cranedash-test").unwrap();
        let transport = RetryingTransport::new(executor, fast_policy(4));
        let request = build_instant("notaurl", "up", Some(1)).unwrap();

        let err = transport.execute(&request).await.unwrap_err();
        match err {
            QueryError::Transport(TransportError::InvalidRequest(message)) => {
                assert!(message.contains("builder"), "unexpected message: {message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_response() {
        let ok = HttpResponse {
            status: 200,
            body: "{}".to_string(),
        };
        assert_eq!(classify_response(ok).unwrap(), "{}");

        let server = HttpResponse {
            status: 503,
            body: "busy".to_string(),
        };
        assert!(classify_response(server).unwrap_err().is_retryable());

        let client = HttpResponse {
            status: 404,
            body: "missing".to_string(),
        };
        assert_eq!(
            classify_response(client).unwrap_err(),
            TransportError::Permanent {
                status: 404,
                body: "missing".to_string()
            }
        );
    }
}
