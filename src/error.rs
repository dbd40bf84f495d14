//! Error types for progress-transcode

use thiserror::Error;

/// Result type alias for transcode operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transcode error type
///
/// Every variant is fatal for the current run: the pipeline stops on the
/// first error and leaves whatever was written to the output as is.
#[derive(Error, Debug)]
pub enum Error {
    // Container errors
    #[error("Failed to open input: {0}")]
    Open(String),

    #[error("Failed to create output: {0}")]
    Create(String),

    #[error("No video stream found in input")]
    StreamSelection,

    #[error("Container I/O error: {0}")]
    ContainerIo(String),

    // Codec errors
    #[error("Codec not available: {0}")]
    CodecUnavailable(String),

    #[error("Decoder rejected packet: {0}")]
    DecodeSubmit(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Encoder rejected frame: {0}")]
    EncodeSubmit(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    // Frame errors
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Total frame count is unknown or zero")]
    UnknownFrameCount,

    // Pipeline errors
    #[error("Invalid stage state: {0}")]
    InvalidState(String),

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error came from a codec (as opposed to the container or setup)
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            Error::CodecUnavailable(_)
                | Error::DecodeSubmit(_)
                | Error::Decode(_)
                | Error::EncodeSubmit(_)
                | Error::Encode(_)
        )
    }
}
