//! Bounded, message-driven retries around a step's unit of work.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::envelope::SagaMessage;
use crate::error::Result;

/// How many times a failed step is re-emitted and how long to wait first.
///
/// The policy is stateless: the attempt number travels in the message's
/// `retry_count`, so retries survive a restart and may land on any worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-emissions after the first attempt. A step runs at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
    /// Pause before each re-emission.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

/// What a step's attempt leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// The work succeeded; carries its continuation.
    Completed(Option<SagaMessage>),
    /// The work failed and the same step is re-emitted.
    Retry(SagaMessage),
    /// The work failed on its last allowed attempt.
    Exhausted,
}

impl Attempt {
    /// Resolves to the next message, using `on_exhausted` once the retry
    /// budget is spent.
    pub fn or_on_exhausted(self, on_exhausted: impl FnOnce() -> Option<SagaMessage>) -> Option<SagaMessage> {
        match self {
            Attempt::Completed(next) => next,
            Attempt::Retry(message) => Some(message),
            Attempt::Exhausted => on_exhausted(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Runs `work` as the attempt described by `message`.
    ///
    /// On failure, waits `delay` and returns the same message with its retry
    /// count incremented while `retry_count < max_retries`; otherwise the
    /// attempt is exhausted.
    pub async fn run<F>(&self, message: &SagaMessage, work: F) -> Attempt
    where
        F: Future<Output = Result<Option<SagaMessage>>>,
    {
        let step = message.step.as_str();
        let retry_count = message.envelope.retry_count;
        metrics::counter!("saga_step_attempts_total", "step" => step).increment(1);

        let started = Instant::now();
        let result = work.await;
        metrics::histogram!("saga_step_duration_seconds", "step" => step)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(next) => {
                match &next {
                    Some(next) => tracing::info!(step, next = %next.step, "saga step completed"),
                    None => tracing::info!(step, "saga step completed, chain ends"),
                }
                Attempt::Completed(next)
            }
            Err(error) if retry_count < self.max_retries => {
                tracing::warn!(step, retry_count, %error, "saga step failed, retrying");
                metrics::counter!("saga_step_retries_total", "step" => step).increment(1);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                Attempt::Retry(message.retried())
            }
            Err(error) => {
                tracing::error!(step, retry_count, %error, "saga step exhausted its retries");
                metrics::counter!("saga_step_exhausted_total", "step" => step).increment(1);
                Attempt::Exhausted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use common::SagaStateId;

    use super::*;
    use crate::error::SagaError;
    use crate::step::Step;

    fn message(retry_count: u32) -> SagaMessage {
        let mut message = SagaMessage::for_saga(Step::CreateOrder, SagaStateId::new());
        message.envelope.retry_count = retry_count;
        message
    }

    fn failing() -> Result<Option<SagaMessage>> {
        Err(SagaError::Orders("unavailable".to_string()))
    }

    #[tokio::test]
    async fn test_success_passes_continuation_through() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let current = message(1);
        let next = current.advance(Step::UpdatePurchasesAndSalesCounts);

        let attempt = policy.run(&current, async { Ok(Some(next)) }).await;

        assert_eq!(attempt, Attempt::Completed(Some(next)));
    }

    #[tokio::test]
    async fn test_failure_below_budget_retries_same_step() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let current = message(1);

        let attempt = policy.run(&current, async { failing() }).await;

        let Attempt::Retry(retried) = attempt else {
            panic!("expected a retry, got {attempt:?}");
        };
        assert_eq!(retried.step, Step::CreateOrder);
        assert_eq!(retried.envelope.retry_count, 2);
    }

    #[tokio::test]
    async fn test_failure_at_budget_is_exhausted() {
        let policy = RetryPolicy::new(2, Duration::ZERO);

        let attempt = policy.run(&message(2), async { failing() }).await;

        assert_eq!(attempt, Attempt::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_before_reemitting() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();

        policy.run(&message(0), async { failing() }).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_or_on_exhausted() {
        let fallback = message(0).advance(Step::CreateOrderFailed);

        assert_eq!(Attempt::Exhausted.or_on_exhausted(|| Some(fallback)), Some(fallback));
        assert_eq!(Attempt::Completed(None).or_on_exhausted(|| Some(fallback)), None);
    }
}
