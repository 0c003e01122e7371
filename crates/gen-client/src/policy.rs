use std::time::Duration;

use serde_json::Value;

use crate::{Generate, GenClientError, Result};

// ---------------------------------------------------------------------------
// GenPolicy
// ---------------------------------------------------------------------------

/// Timeout and retry budget for a single generation call.
///
/// `max_retries` counts retries after the first attempt: `0` means one
/// attempt total, the default `2` means up to three attempts. Retries apply
/// to one call only; a caller running a multi-stage pipeline must not reuse
/// the budget across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenPolicy {
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for GenPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// generate_with_policy
// ---------------------------------------------------------------------------

/// Drive one generation call under a [`GenPolicy`].
///
/// Each attempt runs under its own `tokio::time::timeout`; a timed-out or
/// unavailable attempt is retried until the budget is exhausted, then the
/// last error is returned. Non-retryable errors (malformed responses) are
/// returned immediately.
pub async fn generate_with_policy(
    generator: &dyn Generate,
    prompt: &str,
    context: &Value,
    policy: GenPolicy,
) -> Result<String> {
    let mut last_err: Option<GenClientError> = None;

    for attempt in 1..=policy.max_retries + 1 {
        let call = generator.generate(prompt, context);
        match tokio::time::timeout(Duration::from_millis(policy.timeout_ms), call).await {
            Ok(Ok(content)) => return Ok(content),
            Ok(Err(e)) if !e.is_retryable() => return Err(e),
            Ok(Err(e)) => {
                tracing::warn!(attempt, error = %e, "generation attempt failed");
                last_err = Some(e);
            }
            Err(_) => {
                tracing::warn!(attempt, timeout_ms = policy.timeout_ms, "generation attempt timed out");
                last_err = Some(GenClientError::Timeout(policy.timeout_ms));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| GenClientError::Unavailable("no attempts made".into())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
