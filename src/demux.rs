//! Container source (demuxing)

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{MediaKind, Packet, StreamInfo};

use ffmpeg_next as ffmpeg;

/// Anything that yields compressed packets for a fixed set of streams
pub trait PacketSource {
    /// Streams found when the source was opened
    fn streams(&self) -> &[StreamInfo];

    /// Next packet in container order, `None` at end of input
    fn read_packet(&mut self) -> Result<Option<Packet>>;
}

/// Count the packets belonging to `stream_index` by reading the source to the end
pub fn count_stream_packets<S: PacketSource>(source: &mut S, stream_index: usize) -> Result<u64> {
    let mut count = 0;
    while let Some(packet) = source.read_packet()? {
        if packet.stream_index == stream_index {
            count += 1;
        }
    }
    Ok(count)
}

/// File or URL input read through libavformat
pub struct FfmpegSource {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    streams: Vec<StreamInfo>,
}

impl FfmpegSource {
    /// Open the input and read its stream layout
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = ffmpeg::format::input(&path)
            .map_err(|e| Error::Open(format!("{}: {}", path.display(), e)))?;

        let streams = input.streams().map(|s| Self::describe(&s)).collect::<Vec<_>>();
        for s in &streams {
            tracing::debug!(
                "Input stream #{}: {:?} {} {}x{} timebase {} ({} declared frames)",
                s.index,
                s.kind,
                s.codec,
                s.width,
                s.height,
                s.time_base,
                s.declared_frames.map_or("no".to_string(), |n| n.to_string())
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            input,
            streams,
        })
    }

    fn describe(stream: &ffmpeg::format::stream::Stream) -> StreamInfo {
        let parameters = stream.parameters();
        let kind = MediaKind::from(parameters.medium());
        let (width, height, bit_rate) = unsafe {
            let ptr = parameters.as_ptr();
            ((*ptr).width.max(0) as u32, (*ptr).height.max(0) as u32, (*ptr).bit_rate)
        };
        let declared = stream.frames();
        let duration = stream.duration();

        StreamInfo {
            index: stream.index(),
            kind,
            codec: parameters.id().name().to_string(),
            time_base: stream.time_base().into(),
            frame_rate: stream.avg_frame_rate().into(),
            declared_frames: (declared > 0).then_some(declared as u64),
            // AV_NOPTS_VALUE when unknown
            duration: (duration > 0).then_some(duration),
            width,
            height,
            bit_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Codec parameters of one stream, for opening its decoder
    pub fn parameters(&self, stream_index: usize) -> Result<ffmpeg::codec::Parameters> {
        self.input
            .stream(stream_index)
            .map(|s| s.parameters())
            .ok_or_else(|| Error::Open(format!("stream #{} does not exist", stream_index)))
    }

    /// Container duration in microseconds, when the format reports one
    pub fn duration(&self) -> Option<i64> {
        Some(self.input.duration()).filter(|d| *d > 0)
    }

    /// Print FFmpeg's summary of the input to stderr
    pub fn dump(&self) {
        ffmpeg::format::context::input::dump(&self.input, 0, self.path.to_str());
    }
}

impl PacketSource for FfmpegSource {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(Packet {
                data: packet.data().map(|d| d.to_vec()).unwrap_or_default(),
                stream_index: packet.stream(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                is_keyframe: packet.is_key(),
            })),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(Error::ContainerIo(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
