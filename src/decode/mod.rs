//! Video decoding
//!
//! [`DecodeStage`] is the submit-and-drain state machine the pipeline drives.
//! The codec itself sits behind the [`VideoDecoder`] trait so the stage logic
//! does not depend on FFmpeg.

mod ffmpeg;

pub use self::ffmpeg::FfmpegDecoder;

use crate::error::{Error, Result};
use crate::types::{Frame, Packet, Receive};

/// Codec backend for decoding one video stream
pub trait VideoDecoder {
    /// Queue one compressed packet
    fn send_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Signal that no more packets will follow
    fn send_eof(&mut self) -> Result<()>;

    /// Pull the next decoded frame, if one is ready
    fn receive_frame(&mut self) -> Result<Receive<Frame>>;
}

/// Lifecycle of a submit/drain stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Nothing submitted yet
    Idle,
    /// Taking input
    Accepting,
    /// End of input signalled, buffered outputs remain
    Draining,
    /// Fully drained
    Closed,
}

impl StageState {
    pub(crate) fn check_submit(self, stage: &str) -> Result<()> {
        match self {
            StageState::Idle | StageState::Accepting => Ok(()),
            StageState::Draining | StageState::Closed => Err(Error::InvalidState(format!(
                "{} received input after flush",
                stage
            ))),
        }
    }
}

/// Decode stage: packets in, frames out
pub struct DecodeStage<D> {
    decoder: D,
    state: StageState,
    packets_submitted: u64,
    frames_received: u64,
}

impl<D: VideoDecoder> DecodeStage<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            state: StageState::Idle,
            packets_submitted: 0,
            frames_received: 0,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn packets_submitted(&self) -> u64 {
        self.packets_submitted
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Feed one packet of the selected stream
    pub fn submit(&mut self, packet: &Packet) -> Result<()> {
        self.state.check_submit("decoder")?;
        self.decoder.send_packet(packet)?;
        self.state = StageState::Accepting;
        self.packets_submitted += 1;
        Ok(())
    }

    /// Pull the next decoded frame.
    ///
    /// `Pending` asks for more input; `Finished` only appears after
    /// [`flush`](Self::flush) once every buffered frame has been returned.
    pub fn receive_frame(&mut self) -> Result<Receive<Frame>> {
        match self.state {
            StageState::Idle => return Ok(Receive::Pending),
            StageState::Closed => return Ok(Receive::Finished),
            StageState::Accepting | StageState::Draining => {}
        }

        match self.decoder.receive_frame()? {
            Receive::Ready(frame) => {
                self.frames_received += 1;
                Ok(Receive::Ready(frame))
            }
            Receive::Pending if self.state == StageState::Draining => {
                tracing::warn!("Decoder asked for input while draining, treating as end of stream");
                self.state = StageState::Closed;
                Ok(Receive::Finished)
            }
            Receive::Pending => Ok(Receive::Pending),
            Receive::Finished => {
                if self.state == StageState::Accepting {
                    tracing::debug!("Decoder reported end of stream before flush");
                }
                self.state = StageState::Closed;
                Ok(Receive::Finished)
            }
        }
    }

    /// Signal end of input. Idempotent.
    pub fn flush(&mut self) -> Result<()> {
        match self.state {
            StageState::Idle | StageState::Accepting => {
                self.decoder.send_eof()?;
                self.state = StageState::Draining;
                tracing::debug!(
                    "Decoder flushing after {} packets, {} frames so far",
                    self.packets_submitted,
                    self.frames_received
                );
                Ok(())
            }
            StageState::Draining | StageState::Closed => Ok(()),
        }
    }

    pub fn into_inner(self) -> D {
        self.decoder
    }
}
