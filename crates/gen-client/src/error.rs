use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenClientError {
    #[error("generation endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("generation timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

impl GenClientError {
    /// Timeouts and connection-level failures are worth another attempt;
    /// a malformed body from a live endpoint is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenClientError::Timeout(_) | GenClientError::Unavailable(_) | GenClientError::Http(_)
        )
    }
}
