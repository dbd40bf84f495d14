//! Output sinks
//!
//! The pipeline writes encoded packets through [`PacketSink`]; [`FileSink`]
//! is the libavformat-backed implementation.

mod file;

pub use file::FileSink;

use crate::error::Result;
use crate::types::{Packet, Timebase};

/// Destination for the encoded video stream
pub trait PacketSink {
    /// Write the container header. May change the stream timebase.
    fn write_header(&mut self) -> Result<()>;

    /// Timebase packets must be in when passed to [`write_packet`](Self::write_packet)
    fn time_base(&self) -> Result<Timebase>;

    /// Write one packet, timestamps already in the sink timebase
    fn write_packet(&mut self, packet: Packet) -> Result<()>;

    /// Finalize the container
    fn write_trailer(&mut self) -> Result<()>;
}
