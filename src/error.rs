use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse RON: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("failed to write RON: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    #[error("no audio output device")]
    NoOutputDevice,

    #[error("no default output config: {0}")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("engine command queue is full")]
    QueueFull,
}
