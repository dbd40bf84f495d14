//! progress-transcode: burn a progress bar into a video
//!
//! Reads the first video stream of a media file, paints a horizontal bar
//! along the bottom of every decoded frame whose length tracks how far into
//! the stream the frame is, and re-encodes the result into a new file.
//!
//! # Stages
//!
//! - **Demux**: [`demux::FfmpegSource`] reads packets, other streams are dropped
//! - **Decode**: [`decode::DecodeStage`] around an FFmpeg decoder
//! - **Overlay**: [`processing::ProgressBar`] paints into packed RGB frames
//! - **Encode**: [`encode::EncodeStage`] around an FFmpeg encoder
//! - **Mux**: [`output::FileSink`] writes the container
//!
//! # Example
//!
//! ```rust,no_run
//! use progress_transcode::{transcode, Config};
//!
//! fn main() -> progress_transcode::Result<()> {
//!     let config = Config::default().with_bar_height(16);
//!     let stats = transcode("input.mp4", "output.mkv", &config)?;
//!     println!("{} frames", stats.frames_overlaid);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decode;
pub mod demux;
pub mod encode;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod progress;
pub mod timestamp;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::{Config, EncoderConfig, FrameCountFallback};
pub use error::{Error, Result};
pub use pipeline::{transcode, Pipeline, TranscodeStats};
pub use processing::{ProgressBar, Rgb};
pub use types::{Frame, Packet, PixelFormat, StreamInfo, Timebase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize FFmpeg. Safe to call more than once.
pub fn init() -> Result<()> {
    ffmpeg_next::init().map_err(|e| Error::FFmpeg(format!("initialization failed: {}", e)))?;
    Ok(())
}
