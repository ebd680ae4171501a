use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Error kinds for the ingestion and lookup engine.
///
/// Pipeline-integrity errors (`MergeValidationFailed`, `FlattenerIntegrityFailed`)
/// are never recovered silently: they surface as a failed update and the last
/// good dataset stays live. Per-item errors (`FeedParseFailed`) are swallowed at
/// the call site and only logged.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("feed fetch failed for {feed}: {source}")]
    FeedFetchFailed {
        feed: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed parse failed for {feed} at line {line}: {message}")]
    FeedParseFailed {
        feed: String,
        line: usize,
        message: String,
    },

    #[error("merge validation failed: {0}")]
    MergeValidationFailed(String),

    #[error("flattener integrity check failed: {0}")]
    FlattenerIntegrityFailed(String),

    #[error("store unavailable: {0}")]
    IndexUnavailable(String),

    #[error("update lock is held by another process")]
    LockContention,

    #[error("stale lock detected and cleared, retrying acquisition")]
    StaleLockDetected,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("dns resolution error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    #[error("config error: {0}")]
    Config(String),

    #[error("cron schedule error: {0}")]
    Schedule(String),
}

impl CoreError {
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        CoreError::InvalidInput(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        CoreError::Config(msg.into())
    }

    pub fn merge_validation<S: Into<String>>(msg: S) -> Self {
        CoreError::MergeValidationFailed(msg.into())
    }

    pub fn flattener_integrity<S: Into<String>>(msg: S) -> Self {
        CoreError::FlattenerIntegrityFailed(msg.into())
    }

    pub fn store_unavailable<S: Into<String>>(msg: S) -> Self {
        CoreError::IndexUnavailable(msg.into())
    }

    /// Whether this error should abort the whole update (pipeline-integrity
    /// errors) as opposed to being recovered locally (per-item errors).
    pub fn is_pipeline_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::MergeValidationFailed(_)
                | CoreError::FlattenerIntegrityFailed(_)
                | CoreError::IndexUnavailable(_)
        )
    }
}
