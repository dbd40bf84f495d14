//! Common types used throughout the pipeline

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timestamp;

/// Rational unit of a timestamp (seconds per tick = num / den)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timebase {
    pub num: i32,
    pub den: i32,
}

impl Timebase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Milliseconds
    pub const MILLIS: Self = Self::new(1, 1000);
    /// MPEG-TS / RTP 90 kHz clock
    pub const MPEG: Self = Self::new(1, 90_000);
    /// FFmpeg's internal AV_TIME_BASE (microseconds)
    pub const MICROS: Self = Self::new(1, 1_000_000);

    /// Both terms strictly positive
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Timebase with one tick per frame at the given rate (`1/fps` for integer rates)
    pub fn from_frame_rate(rate: Timebase) -> Option<Self> {
        if rate.is_valid() {
            Some(Self::new(rate.den, rate.num))
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl std::fmt::Display for Timebase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<ffmpeg_next::Rational> for Timebase {
    fn from(r: ffmpeg_next::Rational) -> Self {
        Self::new(r.numerator(), r.denominator())
    }
}

impl From<Timebase> for ffmpeg_next::Rational {
    fn from(tb: Timebase) -> Self {
        ffmpeg_next::Rational::new(tb.num, tb.den)
    }
}

/// Pixel layouts the overlay can write into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 24-bit, blue first
    Bgr24,
    /// Packed 24-bit, red first
    Rgb24,
    /// Packed 32-bit BGRA
    Bgra,
    /// Packed 32-bit RGBA
    Rgba,
    /// Anything else, by FFmpeg name
    Other(String),
}

impl PixelFormat {
    /// Bytes per pixel for packed layouts, `None` for formats the overlay cannot handle
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => Some(3),
            PixelFormat::Bgra | PixelFormat::Rgba => Some(4),
            PixelFormat::Other(_) => None,
        }
    }

    /// Byte offsets of (red, green, blue, alpha) inside one pixel
    pub(crate) fn channel_offsets(&self) -> Option<(usize, usize, usize, Option<usize>)> {
        match self {
            PixelFormat::Bgr24 => Some((2, 1, 0, None)),
            PixelFormat::Rgb24 => Some((0, 1, 2, None)),
            PixelFormat::Bgra => Some((2, 1, 0, Some(3))),
            PixelFormat::Rgba => Some((0, 1, 2, Some(3))),
            PixelFormat::Other(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Other(name) => name,
        }
    }

    /// FFmpeg pixel format for packed layouts
    pub fn to_ffmpeg(&self) -> Result<ffmpeg_next::format::Pixel> {
        use ffmpeg_next::format::Pixel;
        match self {
            PixelFormat::Bgr24 => Ok(Pixel::BGR24),
            PixelFormat::Rgb24 => Ok(Pixel::RGB24),
            PixelFormat::Bgra => Ok(Pixel::BGRA),
            PixelFormat::Rgba => Ok(Pixel::RGBA),
            PixelFormat::Other(name) => Err(Error::UnsupportedFormat(name.clone())),
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Bgr24
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded picture in a single packed plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Pixel data, `stride * height` bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes (linesize), may include padding
    pub stride: usize,
    pub format: PixelFormat,
    /// Presentation timestamp in the holding stage's timebase
    pub pts: Option<i64>,
}

impl Frame {
    /// Create a zeroed frame with tightly packed rows
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let bpp = format
            .bytes_per_pixel()
            .ok_or_else(|| Error::UnsupportedFormat(format.name().to_string()))?;
        let stride = width as usize * bpp;
        Ok(Self {
            data: vec![0u8; stride * height as usize],
            width,
            height,
            stride,
            format,
            pts: None,
        })
    }

    /// Create a frame from existing data
    pub fn from_data(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Self {
        Self {
            data,
            width,
            height,
            stride,
            format,
            pts: None,
        }
    }

    pub fn with_pts(mut self, pts: Option<i64>) -> Self {
        self.pts = pts;
        self
    }

    /// Bytes of row `y` that carry pixels (padding excluded), `None` when
    /// the row lies outside the frame or the buffer is short
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel().unwrap_or(1);
        let start = y as usize * self.stride;
        self.data.get(start..start + self.width as usize * bpp)
    }
}

/// A compressed data unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    /// Stream this packet belongs to
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub is_keyframe: bool,
}

impl Packet {
    pub fn new(data: Vec<u8>, stream_index: usize, pts: Option<i64>) -> Self {
        Self {
            data,
            stream_index,
            pts,
            dts: pts,
            duration: 0,
            is_keyframe: false,
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Move pts, dts and duration from one timebase to another
    pub fn rescale_ts(&mut self, from: Timebase, to: Timebase) {
        self.pts = timestamp::rescale(self.pts, from, to);
        self.dts = timestamp::rescale(self.dts, from, to);
        self.duration = timestamp::rescale_value(self.duration, from, to);
    }
}

/// Media type of a container stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Unknown,
}

impl From<ffmpeg_next::media::Type> for MediaKind {
    fn from(t: ffmpeg_next::media::Type) -> Self {
        use ffmpeg_next::media::Type;
        match t {
            Type::Video => MediaKind::Video,
            Type::Audio => MediaKind::Audio,
            Type::Subtitle => MediaKind::Subtitle,
            Type::Data | Type::Attachment => MediaKind::Data,
            Type::Unknown => MediaKind::Unknown,
        }
    }
}

/// Description of one stream in the source container
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    /// Codec short name ("h264", "mpeg4", ...)
    pub codec: String,
    pub time_base: Timebase,
    /// Average frame rate, `0/0` when unknown
    pub frame_rate: Timebase,
    /// Frame count declared by the container, `None` when it reports 0
    pub declared_frames: Option<u64>,
    /// Stream duration in `time_base` units
    pub duration: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub bit_rate: i64,
}

impl StreamInfo {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// Pick the first video stream
pub fn select_video_stream(streams: &[StreamInfo]) -> Result<&StreamInfo> {
    streams
        .iter()
        .find(|s| s.is_video())
        .ok_or(Error::StreamSelection)
}

/// Outcome of pulling from a submit/drain stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receive<T> {
    /// An output is ready
    Ready(T),
    /// Nothing ready until more input is submitted
    Pending,
    /// The stage has been drained completely
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: usize, kind: MediaKind) -> StreamInfo {
        StreamInfo {
            index,
            kind,
            codec: "test".into(),
            time_base: Timebase::MILLIS,
            frame_rate: Timebase::new(30, 1),
            declared_frames: None,
            duration: None,
            width: 0,
            height: 0,
            bit_rate: 0,
        }
    }

    #[test]
    fn test_select_first_video_stream() {
        let streams = vec![
            stream(0, MediaKind::Audio),
            stream(1, MediaKind::Video),
            stream(2, MediaKind::Video),
        ];
        assert_eq!(select_video_stream(&streams).unwrap().index, 1);
    }

    #[test]
    fn test_select_without_video_fails() {
        let streams = vec![stream(0, MediaKind::Audio), stream(1, MediaKind::Subtitle)];
        assert!(matches!(
            select_video_stream(&streams),
            Err(Error::StreamSelection)
        ));
        assert!(matches!(select_video_stream(&[]), Err(Error::StreamSelection)));
    }

    #[test]
    fn test_frame_rate_timebase() {
        assert_eq!(
            Timebase::from_frame_rate(Timebase::new(30000, 1001)),
            Some(Timebase::new(1001, 30000))
        );
        assert_eq!(Timebase::from_frame_rate(Timebase::new(0, 0)), None);
    }

    #[test]
    fn test_pixel_format_sizes() {
        assert_eq!(PixelFormat::Bgr24.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::Other("yuv420p".into()).bytes_per_pixel(), None);
        assert!(Frame::new(4, 4, PixelFormat::Other("nv12".into())).is_err());
    }

    #[test]
    fn test_row_bounds() {
        // 36 bytes, but rows claim a 16-byte pitch
        let mut frame = Frame::new(4, 3, PixelFormat::Rgb24).unwrap();
        frame.stride = 16;
        assert_eq!(frame.row(0).map(<[u8]>::len), Some(12));
        assert_eq!(frame.row(1).map(<[u8]>::len), Some(12));
        assert_eq!(frame.row(2), None);

        frame.data.resize(16 * 3, 0);
        assert_eq!(frame.row(2).map(<[u8]>::len), Some(12));
        assert_eq!(frame.row(3), None);
    }

    #[test]
    fn test_packet_rescale_keeps_missing_dts() {
        let mut packet = Packet::new(vec![1, 2, 3], 0, Some(3));
        packet.dts = None;
        packet.duration = 1;
        packet.rescale_ts(Timebase::new(1, 30), Timebase::MPEG);
        assert_eq!(packet.pts, Some(9000));
        assert_eq!(packet.dts, None);
        assert_eq!(packet.duration, 3000);
    }
}
