use thiserror::Error;

use reelwatch_api::IngestError;
use reelwatch_core::error::ReelwatchError;
use reelwatch_detect::SiteError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("stream ended inside a frame")]
    TruncatedFrame,

    #[error("browser did not answer request {id} in time")]
    Timeout { id: u64 },

    #[error("browser connection closed")]
    Disconnected,

    #[error("browser error: {0}")]
    Browser(String),

    #[error(transparent)]
    Core(#[from] ReelwatchError),

    #[error("site database error: {0}")]
    Sites(#[from] SiteError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),
}
