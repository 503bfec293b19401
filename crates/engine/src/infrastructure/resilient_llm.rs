//! Retrying wrapper for the text-generation service.
//!
//! The decision oracle gives every call a fixed time budget (`ORACLE_TIMEOUT_SECS`).
//! Retries happen inside that budget: an attempt is cut off when the budget runs
//! out, and a retry whose backoff would not leave room for another attempt is not
//! started. Client errors (4xx other than 408/429) and unusable answers are
//! returned at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse};

/// Shortest window worth starting another attempt in.
const MIN_ATTEMPT_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles for each one after.
    pub base_delay: Duration,
    /// Wall-clock limit for all attempts and backoff together.
    pub budget: Duration,
}

impl RetryPolicy {
    /// A policy that finishes within `budget`.
    pub fn within(budget: Duration) -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(250),
            budget,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Backoff before retry number `retry` (1-based), with up to 20% shaved off
    /// at random so callers that failed together do not retry together.
    fn backoff(&self, retry: u32) -> Duration {
        let full = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        let shave = rand::thread_rng().gen_range(0.0..0.2);
        full.mul_f64(1.0 - shave)
    }
}

/// Whether a failed call is worth repeating.
fn is_transient(error: &LlmError) -> bool {
    match error {
        LlmError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
        LlmError::RequestFailed(_) | LlmError::Timeout(_) => true,
        LlmError::InvalidResponse(_) => false,
    }
}

pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    policy: RetryPolicy,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let deadline = Instant::now() + self.policy.budget;
        let mut retry = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let error = match tokio::time::timeout(remaining, self.inner.generate(request.clone()))
                .await
            {
                Ok(Ok(response)) => {
                    if retry > 0 {
                        tracing::info!(retries = retry, "LLM request succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => LlmError::Timeout(self.policy.budget),
            };

            if !is_transient(&error) {
                tracing::warn!(error = %error, "LLM request failed, not retrying");
                return Err(error);
            }
            if retry >= self.policy.max_retries {
                tracing::warn!(retries = retry, error = %error, "LLM retries exhausted");
                return Err(error);
            }

            retry += 1;
            let delay = self.policy.backoff(retry);
            let left = deadline.saturating_duration_since(Instant::now());
            if left < delay + MIN_ATTEMPT_WINDOW {
                tracing::warn!(
                    error = %error,
                    remaining_ms = left.as_millis() as u64,
                    "LLM retry would overrun the oracle budget"
                );
                return Err(error);
            }

            tracing::debug!(retry, delay_ms = delay.as_millis() as u64, error = %error, "Retrying LLM request");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{FinishReason, MockLlmPort};
    use mockall::Sequence;

    fn reply() -> LlmResponse {
        LlmResponse {
            content: "ok".to_string(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    fn status(code: u16) -> LlmError {
        LlmError::Status {
            status: code,
            body: "from the service".into(),
        }
    }

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy::within(Duration::from_secs(5))
            .with_max_retries(retries)
            .with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let mut llm = MockLlmPort::new();
        let mut seq = Sequence::new();
        llm.expect_generate()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(status(503)));
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply()));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(2));
        let response = client.generate(LlmRequest::prompt("pick")).await.unwrap();
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        for code in [400, 401, 403, 404] {
            let mut llm = MockLlmPort::new();
            llm.expect_generate().times(1).returning(move |_| Err(status(code)));

            let client = ResilientLlmClient::new(Arc::new(llm), quick(3));
            let err = client.generate(LlmRequest::prompt("pick")).await.unwrap_err();
            assert!(matches!(err, LlmError::Status { status, .. } if status == code));
        }
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let mut llm = MockLlmPort::new();
        let mut seq = Sequence::new();
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(status(429)));
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply()));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(1));
        assert!(client.generate(LlmRequest::prompt("pick")).await.is_ok());
    }

    #[tokio::test]
    async fn unusable_answers_are_not_retried() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| Err(LlmError::InvalidResponse("No candidates in response".into())));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(3));
        assert!(client.generate(LlmRequest::prompt("pick")).await.is_err());
    }

    #[tokio::test]
    async fn last_error_is_returned_when_retries_run_out() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .times(3)
            .returning(|_| Err(LlmError::RequestFailed("connection reset".into())));

        let client = ResilientLlmClient::new(Arc::new(llm), quick(2));
        let err = client.generate(LlmRequest::prompt("pick")).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn backoff_that_overruns_the_budget_is_skipped() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().times(1).returning(|_| Err(status(500)));

        let policy = RetryPolicy::within(Duration::from_millis(300))
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(10));
        let client = ResilientLlmClient::new(Arc::new(llm), policy);

        let started = std::time::Instant::now();
        assert!(client.generate(LlmRequest::prompt("pick")).await.is_err());
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    struct HangingLlm;

    #[async_trait]
    impl LlmPort for HangingLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(reply())
        }
    }

    #[tokio::test]
    async fn a_hanging_attempt_is_cut_off_at_the_budget() {
        let budget = Duration::from_millis(50);
        let client = ResilientLlmClient::new(
            Arc::new(HangingLlm),
            RetryPolicy::within(budget).with_max_retries(3),
        );

        let err = client.generate(LlmRequest::prompt("pick")).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == budget));
    }

    #[test]
    fn backoff_doubles_and_never_grows_past_the_full_step() {
        let policy = RetryPolicy::within(Duration::from_secs(8))
            .with_base_delay(Duration::from_millis(100));
        for (retry, full_ms) in [(1, 100), (2, 200), (3, 400)] {
            let delay = policy.backoff(retry);
            assert!(delay <= Duration::from_millis(full_ms));
            assert!(delay >= Duration::from_millis(full_ms * 8 / 10));
        }
    }
}
