use thiserror::Error;

/// All errors produced by tempocut-core.
#[derive(Debug, Error)]
pub enum TempocutError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("time-stretch failed on chunk {chunk_index}: {reason}")]
    StretchFailed { chunk_index: usize, reason: String },

    #[error("frame store error: {0}")]
    FrameStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TempocutError>;
