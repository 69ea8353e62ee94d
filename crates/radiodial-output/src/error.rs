//! Error types for radiodial-output.

use thiserror::Error;

/// Error type for radiodial-output operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("WAV decode failed: {0}")]
    Hound(#[from] hound::Error),

    #[error("Empty audio file: {0}")]
    EmptyAudio(String),

    #[error("Voice must have one input and one output, got {inputs} in / {outputs} out")]
    VoiceShape { inputs: usize, outputs: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for radiodial_core::Error {
    fn from(e: Error) -> Self {
        radiodial_core::Error::Backend(e.to_string())
    }
}
