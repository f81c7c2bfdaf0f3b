/// Scale test error types and handling utilities
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scale test operations
#[derive(Debug, Error)]
pub enum ScaleTestError {
    /// The request never produced a response (connect, timeout, decode)
    #[error("Request {method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The manager answered with a non-success status
    #[error("Manager returned {status} for {method} {url}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    /// A blueprint, inputs or plugin file could not be used
    #[error("{} is not a valid file: {reason}", path.display())]
    InvalidResource { path: PathBuf, reason: String },
    #[error(
        "blueprint type '{0}' is not valid, should be one of {}",
        crate::constants::BLUEPRINT_TYPES.join(", ")
    )]
    InvalidBlueprintType(String),
    #[error("Configuration error: {0}")]
    Config(String),
    /// Executions still running or failed on the manager
    #[error("{0} executions are not terminated")]
    ActiveExecutions(usize),
    #[error("Expected {expected} {resource}, found {actual}")]
    CountMismatch {
        resource: String,
        expected: u64,
        actual: u64,
    },
    #[error("There aren't enough deployments for installing {requested} deployments (found {available})")]
    NotEnoughDeployments { requested: usize, available: usize },
    /// Some calls of a concurrent action failed
    #[error("{action}: {failed} of {total} calls failed, first error: {first_error}")]
    ActionFailures {
        action: String,
        failed: u64,
        total: u64,
        first_error: String,
    },
    #[error("Gave up waiting for {what} after {attempts} attempts: {last}")]
    RetryExhausted {
        what: String,
        attempts: u32,
        #[source]
        last: Box<ScaleTestError>,
    },
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScaleTestError>;

impl ScaleTestError {
    /// Short stable name used to bucket errors in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Api { .. } => "api",
            Self::InvalidResource { .. } => "invalid_resource",
            Self::InvalidBlueprintType(_) => "invalid_blueprint_type",
            Self::Config(_) => "config",
            Self::ActiveExecutions(_) => "active_executions",
            Self::CountMismatch { .. } => "count_mismatch",
            Self::NotEnoughDeployments { .. } => "not_enough_deployments",
            Self::ActionFailures { .. } => "action_failures",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Join(_) => "join",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Helper to determine if an error is worth another attempt
pub fn is_retryable(err: &ScaleTestError) -> bool {
    match err {
        ScaleTestError::Transport { .. } => true,
        ScaleTestError::Api { status, .. } => *status >= 500 || *status == 429,
        ScaleTestError::ActiveExecutions(_) => true,
        ScaleTestError::CountMismatch { .. } => true,
        ScaleTestError::InvalidResource { .. } => false,
        ScaleTestError::InvalidBlueprintType(_) => false,
        ScaleTestError::Config(_) => false,
        ScaleTestError::NotEnoughDeployments { .. } => false,
        ScaleTestError::ActionFailures { .. } => false,
        ScaleTestError::RetryExhausted { .. } => false,
        ScaleTestError::Join(_) => false,
        ScaleTestError::Io(_) => false,
        ScaleTestError::Json(_) => false,
    }
}
