//! In-memory stand-ins for the FFmpeg backends, used by unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::decode::VideoDecoder;
use crate::demux::PacketSource;
use crate::encode::VideoEncoder;
use crate::error::{Error, Result};
use crate::output::PacketSink;
use crate::types::{Frame, MediaKind, Packet, PixelFormat, Receive, StreamInfo, Timebase};

pub fn video_stream(index: usize, declared_frames: Option<u64>) -> StreamInfo {
    StreamInfo {
        index,
        kind: MediaKind::Video,
        codec: "scripted".into(),
        time_base: Timebase::new(1, 30),
        frame_rate: Timebase::new(30, 1),
        declared_frames,
        duration: None,
        width: 64,
        height: 48,
        bit_rate: 0,
    }
}

pub fn audio_stream(index: usize) -> StreamInfo {
    StreamInfo {
        index,
        kind: MediaKind::Audio,
        codec: "pcm_s16le".into(),
        time_base: Timebase::new(1, 48_000),
        frame_rate: Timebase::new(0, 0),
        declared_frames: None,
        duration: None,
        width: 0,
        height: 0,
        bit_rate: 0,
    }
}

pub fn video_packet(stream_index: usize, pts: i64) -> Packet {
    Packet::new(vec![0u8; 16], stream_index, Some(pts))
}

pub fn test_frame(pts: Option<i64>) -> Frame {
    Frame::new(16, 8, PixelFormat::Bgr24).unwrap().with_pts(pts)
}

/// Packets queued up front, optionally failing partway through
pub struct MemorySource {
    streams: Vec<StreamInfo>,
    packets: VecDeque<Packet>,
    fail_after: Option<usize>,
    read: usize,
}

impl MemorySource {
    pub fn new(streams: Vec<StreamInfo>) -> Self {
        Self {
            streams,
            packets: VecDeque::new(),
            fail_after: None,
            read: 0,
        }
    }

    /// Return a read error once `n` packets have been handed out
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }
}

impl PacketSource for MemorySource {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.fail_after == Some(self.read) {
            return Err(Error::ContainerIo("scripted read failure".into()));
        }
        let packet = self.packets.pop_front();
        if packet.is_some() {
            self.read += 1;
        }
        Ok(packet)
    }
}

/// Decoder that holds back `delay` frames until flushed.
///
/// Each packet becomes one zeroed frame carrying the packet's pts.
pub struct ScriptedDecoder {
    delay: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
    queue: VecDeque<Frame>,
    reject_at: Option<usize>,
    pending_on_drain: bool,
    eof_count: usize,
    received: Rc<RefCell<Vec<usize>>>,
}

impl ScriptedDecoder {
    pub fn new(delay: usize) -> Self {
        Self {
            delay,
            width: 64,
            height: 48,
            format: PixelFormat::Bgr24,
            queue: VecDeque::new(),
            reject_at: None,
            pending_on_drain: false,
            eof_count: 0,
            received: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Fail the `n`th packet (0-based) as corrupt
    pub fn reject_packet(mut self, n: usize) -> Self {
        self.reject_at = Some(n);
        self
    }

    /// Report `Pending` instead of end of stream once drained
    pub fn pending_on_drain(mut self) -> Self {
        self.pending_on_drain = true;
        self
    }

    pub fn eof_count(&self) -> usize {
        self.eof_count
    }

    /// Stream indices of every packet accepted
    pub fn packet_log(&self) -> Rc<RefCell<Vec<usize>>> {
        Rc::clone(&self.received)
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let n = self.received.borrow().len();
        if self.reject_at == Some(n) {
            return Err(Error::DecodeSubmit(format!("packet {} is corrupt", n)));
        }
        self.received.borrow_mut().push(packet.stream_index);

        let stride = self.width as usize * self.format.bytes_per_pixel().unwrap_or(1);
        let data = vec![0u8; stride * self.height as usize];
        let frame = Frame::from_data(data, self.width, self.height, stride, self.format.clone())
            .with_pts(packet.pts);
        self.queue.push_back(frame);
        Ok(())
    }

    fn send_eof(&mut self) -> Result<()> {
        self.eof_count += 1;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Receive<Frame>> {
        if self.eof_count > 0 {
            return Ok(match self.queue.pop_front() {
                Some(frame) => Receive::Ready(frame),
                None if self.pending_on_drain => Receive::Pending,
                None => Receive::Finished,
            });
        }
        if self.queue.len() > self.delay {
            Ok(self.queue.pop_front().map_or(Receive::Pending, Receive::Ready))
        } else {
            Ok(Receive::Pending)
        }
    }
}

/// Encoder that holds back `delay` packets until flushed.
///
/// Each frame becomes one packet with the frame's pts and a duration of one
/// timebase unit.
pub struct ScriptedEncoder {
    delay: usize,
    time_base: Timebase,
    queue: VecDeque<Packet>,
    reject_at: Option<usize>,
    eof: bool,
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl ScriptedEncoder {
    pub fn new(delay: usize, time_base: Timebase) -> Self {
        Self {
            delay,
            time_base,
            queue: VecDeque::new(),
            reject_at: None,
            eof: false,
            frames: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Fail the `n`th frame (0-based)
    pub fn reject_frame(mut self, n: usize) -> Self {
        self.reject_at = Some(n);
        self
    }

    /// Every frame accepted, as it was handed in
    pub fn frame_log(&self) -> Rc<RefCell<Vec<Frame>>> {
        Rc::clone(&self.frames)
    }
}

impl VideoEncoder for ScriptedEncoder {
    fn time_base(&self) -> Timebase {
        self.time_base
    }

    fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let n = self.frames.borrow().len();
        if self.reject_at == Some(n) {
            return Err(Error::EncodeSubmit(format!("frame {} rejected", n)));
        }

        let mut packet = Packet::new(vec![n as u8; 4], 0, frame.pts);
        packet.duration = 1;
        packet.is_keyframe = n == 0;
        self.queue.push_back(packet);
        self.frames.borrow_mut().push(frame);
        Ok(())
    }

    fn send_eof(&mut self) -> Result<()> {
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Receive<Packet>> {
        if self.eof {
            return Ok(self.queue.pop_front().map_or(Receive::Finished, Receive::Ready));
        }
        if self.queue.len() > self.delay {
            Ok(self.queue.pop_front().map_or(Receive::Pending, Receive::Ready))
        } else {
            Ok(Receive::Pending)
        }
    }
}

/// Records everything written to it, optionally failing at a chosen step
pub struct MemorySink {
    time_base: Timebase,
    header_time_base: Option<Timebase>,
    fail_header: bool,
    fail_write_after: Option<usize>,
    fail_trailer: bool,
    pub header_written: bool,
    pub trailer_written: bool,
    pub packets: Vec<Packet>,
}

impl MemorySink {
    pub fn new(time_base: Timebase) -> Self {
        Self {
            time_base,
            header_time_base: None,
            fail_header: false,
            fail_write_after: None,
            fail_trailer: false,
            header_written: false,
            trailer_written: false,
            packets: Vec::new(),
        }
    }

    /// Switch to another timebase when the header is written, like some muxers do
    pub fn retime_on_header(mut self, time_base: Timebase) -> Self {
        self.header_time_base = Some(time_base);
        self
    }

    pub fn fail_header(mut self) -> Self {
        self.fail_header = true;
        self
    }

    /// Fail the write after `n` packets have been stored
    pub fn fail_write_after(mut self, n: usize) -> Self {
        self.fail_write_after = Some(n);
        self
    }

    pub fn fail_trailer(mut self) -> Self {
        self.fail_trailer = true;
        self
    }
}

impl PacketSink for MemorySink {
    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Err(Error::InvalidState("header already written".into()));
        }
        if self.fail_header {
            return Err(Error::ContainerIo("scripted header failure".into()));
        }
        if let Some(tb) = self.header_time_base.take() {
            self.time_base = tb;
        }
        self.header_written = true;
        Ok(())
    }

    fn time_base(&self) -> Result<Timebase> {
        Ok(self.time_base)
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        if !self.header_written || self.trailer_written {
            return Err(Error::InvalidState("packet outside header/trailer".into()));
        }
        if self.fail_write_after == Some(self.packets.len()) {
            return Err(Error::ContainerIo("scripted write failure".into()));
        }
        self.packets.push(packet);
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(Error::InvalidState("trailer before header".into()));
        }
        if self.fail_trailer {
            return Err(Error::ContainerIo("scripted trailer failure".into()));
        }
        self.trailer_written = true;
        Ok(())
    }
}
