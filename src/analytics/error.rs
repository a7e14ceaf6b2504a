/// Domain failures surfaced by the popularity engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The requested symbol or instrument is absent from current data.
    NotFound(String),
    /// The operation needs at least one entry and found none.
    EmptyDataset(String),
    /// Sample store or instrument directory failed or timed out.
    UpstreamUnavailable(String),
    /// Caller contract violated (e.g. zero buckets).
    InvalidParameter(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::EmptyDataset(msg) => write!(f, "empty dataset: {msg}"),
            Self::UpstreamUnavailable(msg) => write!(f, "upstream unavailable: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
