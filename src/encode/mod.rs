//! Video encoding
//!
//! [`EncodeStage`] mirrors the decode stage: frames in, packets out, with an
//! explicit flush so the encoder's lookahead buffer is drained at the end.
//! [`SoftwareEncoder`] is the FFmpeg backend.

pub mod software;

pub use software::{EncoderSetup, SoftwareEncoder};

use crate::decode::StageState;
use crate::error::Result;
use crate::types::{Frame, Packet, Receive, Timebase};

/// Codec backend for encoding one video stream
pub trait VideoEncoder {
    /// Timebase of frames sent in and packets coming out
    fn time_base(&self) -> Timebase;

    /// Queue one frame, pts already in [`time_base`](Self::time_base)
    fn send_frame(&mut self, frame: Frame) -> Result<()>;

    /// Signal that no more frames will follow
    fn send_eof(&mut self) -> Result<()>;

    /// Pull the next compressed packet, if one is ready
    fn receive_packet(&mut self) -> Result<Receive<Packet>>;
}

/// Encode stage: frames in, packets out
pub struct EncodeStage<E> {
    encoder: E,
    state: StageState,
    frames_submitted: u64,
    packets_received: u64,
}

impl<E: VideoEncoder> EncodeStage<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            state: StageState::Idle,
            frames_submitted: 0,
            packets_received: 0,
        }
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn time_base(&self) -> Timebase {
        self.encoder.time_base()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Feed one frame; the stage takes ownership of it
    pub fn submit(&mut self, frame: Frame) -> Result<()> {
        self.state.check_submit("encoder")?;
        self.encoder.send_frame(frame)?;
        self.state = StageState::Accepting;
        self.frames_submitted += 1;
        Ok(())
    }

    /// Pull the next packet (`Pending` = needs more frames)
    pub fn receive_packet(&mut self) -> Result<Receive<Packet>> {
        match self.state {
            StageState::Idle => return Ok(Receive::Pending),
            StageState::Closed => return Ok(Receive::Finished),
            StageState::Accepting | StageState::Draining => {}
        }

        match self.encoder.receive_packet()? {
            Receive::Ready(packet) => {
                self.packets_received += 1;
                Ok(Receive::Ready(packet))
            }
            Receive::Pending if self.state == StageState::Draining => {
                tracing::warn!("Encoder asked for input while draining, treating as end of stream");
                self.state = StageState::Closed;
                Ok(Receive::Finished)
            }
            Receive::Pending => Ok(Receive::Pending),
            Receive::Finished => {
                self.state = StageState::Closed;
                Ok(Receive::Finished)
            }
        }
    }

    /// Signal end of input. Idempotent.
    pub fn flush(&mut self) -> Result<()> {
        match self.state {
            StageState::Idle | StageState::Accepting => {
                self.encoder.send_eof()?;
                self.state = StageState::Draining;
                tracing::debug!(
                    "Encoder flushing after {} frames, {} packets so far",
                    self.frames_submitted,
                    self.packets_received
                );
                Ok(())
            }
            StageState::Draining | StageState::Closed => Ok(()),
        }
    }

    pub fn into_inner(self) -> E {
        self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{test_frame, ScriptedEncoder};

    fn drain(stage: &mut EncodeStage<ScriptedEncoder>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Receive::Ready(packet) = stage.receive_packet().unwrap() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn test_lookahead_drained_on_flush() {
        let mut stage = EncodeStage::new(ScriptedEncoder::new(4, Timebase::new(1, 30)));
        let mut packets = Vec::new();
        for i in 0..6 {
            stage.submit(test_frame(Some(i))).unwrap();
            packets.extend(drain(&mut stage));
        }
        assert_eq!(packets.len(), 2);

        stage.flush().unwrap();
        packets.extend(drain(&mut stage));
        assert_eq!(stage.state(), StageState::Closed);
        assert_eq!(packets.len(), 6);
        assert_eq!(stage.frames_submitted(), stage.packets_received());

        let pts: Vec<_> = packets.iter().map(|p| p.pts.unwrap()).collect();
        assert_eq!(pts, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_flush_without_frames() {
        let mut stage = EncodeStage::new(ScriptedEncoder::new(2, Timebase::new(1, 30)));
        assert_eq!(stage.receive_packet().unwrap(), Receive::Pending);
        stage.flush().unwrap();
        assert!(drain(&mut stage).is_empty());
        assert_eq!(stage.receive_packet().unwrap(), Receive::Finished);
    }

    #[test]
    fn test_submit_after_flush_rejected() {
        let mut stage = EncodeStage::new(ScriptedEncoder::new(0, Timebase::new(1, 30)));
        stage.flush().unwrap();
        assert!(matches!(
            stage.submit(test_frame(Some(0))),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_encoder_failure_is_fatal() {
        let mut stage =
            EncodeStage::new(ScriptedEncoder::new(0, Timebase::new(1, 30)).reject_frame(1));
        stage.submit(test_frame(Some(0))).unwrap();
        assert!(matches!(
            stage.submit(test_frame(Some(1))),
            Err(Error::EncodeSubmit(_))
        ));
        assert_eq!(stage.frames_submitted(), 1);
    }
}
