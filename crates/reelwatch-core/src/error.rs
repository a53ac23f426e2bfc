use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReelwatchError {
    #[error("config error: {0}")]
    Config(String),

    #[error("detector is no longer running")]
    DetectorClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
