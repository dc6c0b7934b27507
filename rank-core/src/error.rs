use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("rate limited by feed endpoint")]
    RateLimited,
    #[error("feed response decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no posts retrieved")]
    NoPosts,
}

impl FetchError {
    /// Rate limiting is retried in place by the pagination loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed feed record: expected a JSON object, got {0}")]
    MalformedRecord(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
