use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtelierError {
    #[error("malformed agent config: {0}")]
    MalformedConfig(String),

    #[error("no candidates available for selection")]
    NoCandidatesAvailable,

    #[error("stage '{stage}' failed: {cause}")]
    StageFailure { stage: String, cause: String },

    #[error("unsupported task type: {0}")]
    UnsupportedTaskType(String),

    #[error("handler for task '{task_type}' failed: {message}")]
    HandlerFailure { task_type: String, message: String },

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<gen_client::GenClientError> for AtelierError {
    fn from(e: gen_client::GenClientError) -> Self {
        AtelierError::GenerationUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AtelierError>;
