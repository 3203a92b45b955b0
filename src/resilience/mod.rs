//! Named retry/timeout pipelines for outbound calls.
//!
//! A pipeline composes an overall timeout around a retry loop built with
//! `backon`. Pipelines are pre-composed at startup and resolved by explicit
//! name or the configured default.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Deserialize;
use tracing::debug;

use crate::error::InteractionError;

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffShape {
    Fixed,
    #[default]
    Exponential,
}

/// Retry component of a pipeline.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub delay: Duration,
    pub backoff: BackoffShape,
    pub use_jitter: bool,
}

impl RetryPolicy {
    fn backoff_builder(&self) -> ExponentialBuilder {
        let factor = match self.backoff {
            BackoffShape::Fixed => 1.0,
            BackoffShape::Exponential => 2.0,
        };
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.delay)
            .with_factor(factor)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);
        if self.use_jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// One named timeout+retry composition.
#[derive(Debug)]
pub struct ResiliencePipeline {
    name: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ResiliencePipeline {
    pub fn new(name: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            timeout,
            retry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `op` with retries under the pipeline's overall timeout.
    ///
    /// `retryable` decides which failures are worth another attempt; once
    /// attempts are exhausted the final failure is surfaced unchanged.
    pub async fn execute<T, E, Fut, Op, P>(
        &self,
        op: Op,
        retryable: P,
    ) -> Result<T, InteractionError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: Into<InteractionError>,
    {
        let attempts = op.retry(self.retry.backoff_builder()).when(retryable);
        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(InteractionError::Timeout(self.timeout)),
        }
    }
}

/// Named pipelines plus the configured default.
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<ResiliencePipeline>>,
    default_name: String,
}

impl PipelineRegistry {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            pipelines: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: ResiliencePipeline) -> Self {
        self.pipelines
            .insert(pipeline.name.clone(), Arc::new(pipeline));
        self
    }

    /// Resolve by explicit name when registered, else the configured
    /// default. The name actually used is recorded for diagnostics.
    pub fn resolve(
        &self,
        name_override: Option<&str>,
    ) -> Result<Arc<ResiliencePipeline>, InteractionError> {
        if let Some(name) = name_override {
            if let Some(pipeline) = self.pipelines.get(name) {
                debug!(pipeline = %name, "resolved resilience pipeline");
                return Ok(Arc::clone(pipeline));
            }
        }
        let pipeline = self.pipelines.get(&self.default_name).ok_or_else(|| {
            InteractionError::Configuration(format!(
                "default resilience pipeline {} is not registered",
                self.default_name
            ))
        })?;
        debug!(pipeline = %self.default_name, "resolved resilience pipeline");
        Ok(Arc::clone(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn pipeline(max_attempts: u32, timeout: Duration) -> ResiliencePipeline {
        ResiliencePipeline::new(
            "test",
            timeout,
            RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(1),
                backoff: BackoffShape::Fixed,
                use_jitter: false,
            },
        )
    }

    fn transport(message: &str) -> InteractionError {
        InteractionError::Transport(message.to_string())
    }

    fn is_transport(err: &InteractionError) -> bool {
        matches!(err, InteractionError::Transport(_))
    }

    #[tokio::test]
    async fn succeeds_after_failures_below_attempt_limit() {
        let calls = AtomicUsize::new(0);
        let result = pipeline(3, Duration::from_secs(5))
            .execute(
                || async {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt < 3 {
                        Err(transport("flaky"))
                    } else {
                        Ok(attempt)
                    }
                },
                is_transport,
            )
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_final_failure() {
        let calls = AtomicUsize::new(0);
        let err = pipeline(3, Duration::from_secs(5))
            .execute(
                || async {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<(), _>(transport(&format!("boom {attempt}")))
                },
                is_transport,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            InteractionError::Transport(message) => assert_eq!(message, "boom 3"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_failure_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let err = pipeline(5, Duration::from_secs(5))
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(InteractionError::Configuration("wiring".to_string()))
                },
                is_transport,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, InteractionError::Configuration(_)));
    }

    #[tokio::test]
    async fn overall_timeout_wraps_the_retry_loop() {
        let err = pipeline(10, Duration::from_millis(50))
            .execute(
                || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, InteractionError>(())
                },
                is_transport,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InteractionError::Timeout(_)));
    }

    #[test]
    fn registry_prefers_registered_override_then_default() {
        let registry = PipelineRegistry::new("default")
            .with_pipeline(pipeline(3, Duration::from_secs(5)))
            .with_pipeline(ResiliencePipeline::new(
                "default",
                Duration::from_secs(30),
                RetryPolicy {
                    max_attempts: 3,
                    delay: Duration::from_millis(500),
                    backoff: BackoffShape::Exponential,
                    use_jitter: true,
                },
            ));

        assert_eq!(registry.resolve(Some("test")).unwrap().name(), "test");
        assert_eq!(registry.resolve(Some("missing")).unwrap().name(), "default");
        assert_eq!(registry.resolve(None).unwrap().name(), "default");
    }

    #[test]
    fn unregistered_default_is_configuration_error() {
        let registry = PipelineRegistry::new("default");
        assert!(matches!(
            registry.resolve(None).unwrap_err(),
            InteractionError::Configuration(_)
        ));
    }
}
