//! Software encoder via FFmpeg
//!
//! Re-encodes overlaid frames with any libavcodec encoder. By default the
//! encoder matches the source codec; `[encoder] codec = "libx264"` and
//! friends pick one by name.

use crate::config::EncoderConfig;
use crate::error::{Error, Result};
use crate::processing::FromPacked;
use crate::types::{Frame, Packet, Receive, Timebase};

use super::VideoEncoder;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::Dictionary;

/// Fallback when the source does not report a usable frame rate
const DEFAULT_FRAME_RATE: Timebase = Timebase::new(30, 1);

/// Largest frame rate term the MPEG-1/2/4 encoders accept
const MAX_RATE_TERM: i32 = 65_535;

/// What the encoder inherits from the decoded source stream
#[derive(Debug, Clone)]
pub struct EncoderSetup {
    /// Source codec, used when no encoder name is configured
    pub codec_id: ffmpeg::codec::Id,
    pub width: u32,
    pub height: u32,
    /// Average frame rate of the source, `0/0` if unknown
    pub frame_rate: Timebase,
    /// Source bitrate in bits/sec, 0 if unknown
    pub bit_rate: usize,
    /// Output container wants codec extradata in the header
    pub global_header: bool,
}

impl EncoderSetup {
    fn effective_frame_rate(&self) -> Timebase {
        if self.frame_rate.is_valid() {
            self.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        }
    }
}

/// Software encoder using FFmpeg codecs
pub struct SoftwareEncoder {
    encoder: ffmpeg::encoder::Video,
    converter: FromPacked,
    time_base: Timebase,
    codec_name: String,
    bytes_output: u64,
}

impl SoftwareEncoder {
    /// Find, configure and open the encoder
    pub fn open(setup: &EncoderSetup, config: &EncoderConfig) -> Result<Self> {
        let codec = match config.codec.as_deref() {
            Some(name) => ffmpeg::encoder::find_by_name(name)
                .ok_or_else(|| Error::CodecUnavailable(format!("encoder {} not found", name)))?,
            None => ffmpeg::encoder::find(setup.codec_id).ok_or_else(|| {
                Error::CodecUnavailable(format!("no encoder for {:?}", setup.codec_id))
            })?,
        };
        let codec_name = codec.name().to_string();

        let pixel = Self::pick_pixel_format(&codec, config.pixel_format.as_deref())?;
        let supported_rates: Vec<Timebase> = codec
            .video()
            .ok()
            .and_then(|video| video.rates())
            .map(|rates| rates.map(Timebase::from).collect())
            .unwrap_or_default();
        let frame_rate = negotiate_frame_rate(setup.effective_frame_rate(), &supported_rates);
        if frame_rate != setup.effective_frame_rate() {
            tracing::debug!(
                "Source frame rate {} adjusted to {} for {}",
                setup.frame_rate,
                frame_rate,
                codec_name
            );
        }
        let time_base = match config.time_base {
            Some(tb) => tb,
            None => Timebase::from_frame_rate(frame_rate).unwrap_or(Timebase::new(1, 30)),
        };

        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let mut encoder = context
            .encoder()
            .video()
            .map_err(|e| Error::CodecUnavailable(format!("{}: {}", codec_name, e)))?;

        encoder.set_width(setup.width);
        encoder.set_height(setup.height);
        encoder.set_format(pixel);
        encoder.set_time_base(ffmpeg::Rational::from(time_base));
        encoder.set_frame_rate(Some(ffmpeg::Rational::from(frame_rate)));

        let bit_rate = config
            .bitrate_kbps
            .map(|kbps| kbps as usize * 1000)
            .unwrap_or(setup.bit_rate);
        if bit_rate > 0 {
            encoder.set_bit_rate(bit_rate);
        }
        if let Some(gop) = config.gop_size {
            encoder.set_gop(gop);
        }
        if let Some(b_frames) = config.b_frames {
            encoder.set_max_b_frames(b_frames as usize);
        }
        if setup.global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        if let Some(preset) = config.preset.as_deref() {
            opts.set("preset", preset);
        }
        if let Some(crf) = config.crf {
            opts.set("crf", &crf.to_string());
        }
        if let Some(threads) = config.threads {
            opts.set("threads", &threads.to_string());
        }

        let opened = encoder
            .open_with(opts)
            .map_err(|e| Error::CodecUnavailable(format!("Failed to open {}: {}", codec_name, e)))?;

        // Some encoders adjust the timebase on open
        let time_base: Timebase = unsafe { ffmpeg::Rational::from((*opened.as_ptr()).time_base).into() };

        tracing::info!(
            "Encoder opened: {} {}x{} {:?} @ {} (timebase {}, {} kbps)",
            codec_name,
            setup.width,
            setup.height,
            pixel,
            frame_rate,
            time_base,
            bit_rate / 1000
        );

        Ok(Self {
            encoder: opened,
            converter: FromPacked::new(pixel, setup.width, setup.height),
            time_base,
            codec_name,
            bytes_output: 0,
        })
    }

    /// Configured format, else the codec's first supported one, else yuv420p
    fn pick_pixel_format(codec: &ffmpeg::Codec, configured: Option<&str>) -> Result<Pixel> {
        if let Some(name) = configured {
            return name
                .parse::<Pixel>()
                .map_err(|_| Error::Config(format!("unknown pixel format: {}", name)));
        }

        let first_supported = codec
            .video()
            .ok()
            .and_then(|video| video.formats())
            .and_then(|mut formats| formats.next());
        Ok(first_supported.unwrap_or(Pixel::YUV420P))
    }

    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    pub fn bytes_output(&self) -> u64 {
        self.bytes_output
    }

    /// Stream parameters describing what this encoder actually produces
    pub fn parameters(&self) -> Result<ffmpeg::codec::Parameters> {
        let mut parameters = ffmpeg::codec::Parameters::new();
        let ret = unsafe {
            ffmpeg::ffi::avcodec_parameters_from_context(
                parameters.as_mut_ptr(),
                self.encoder.as_ptr(),
            )
        };
        if ret < 0 {
            return Err(Error::FFmpeg(format!(
                "avcodec_parameters_from_context failed: {}",
                ffmpeg::Error::from(ret)
            )));
        }
        Ok(parameters)
    }
}

/// Frame rate the encoder can represent: the closest rate the codec lists,
/// or the source rate approximated with terms no larger than 65535
fn negotiate_frame_rate(rate: Timebase, supported: &[Timebase]) -> Timebase {
    let target = rate.as_f64();
    let nearest = supported.iter().filter(|r| r.is_valid()).min_by(|a, b| {
        let da = (a.as_f64() - target).abs();
        let db = (b.as_f64() - target).abs();
        da.total_cmp(&db)
    });
    if let Some(nearest) = nearest {
        return *nearest;
    }

    if rate.num <= MAX_RATE_TERM && rate.den <= MAX_RATE_TERM {
        return rate;
    }
    let (mut num, mut den) = (0, 0);
    unsafe {
        ffmpeg::ffi::av_reduce(
            &mut num,
            &mut den,
            rate.num as i64,
            rate.den as i64,
            MAX_RATE_TERM as i64,
        );
    }
    Timebase::new(num, den)
}

impl VideoEncoder for SoftwareEncoder {
    fn time_base(&self) -> Timebase {
        self.time_base
    }

    fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let video_frame = self
            .converter
            .convert(&frame)
            .map_err(|e| Error::EncodeSubmit(e.to_string()))?;

        self.encoder
            .send_frame(&video_frame)
            .map_err(|e| Error::EncodeSubmit(format!("Failed to send frame: {}", e)))
    }

    fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| Error::EncodeSubmit(format!("Failed to send EOF: {}", e)))
    }

    fn receive_packet(&mut self) -> Result<Receive<Packet>> {
        let mut ffmpeg_packet = ffmpeg::Packet::empty();
        match self.encoder.receive_packet(&mut ffmpeg_packet) {
            Ok(()) => {
                self.bytes_output += ffmpeg_packet.size() as u64;
                Ok(Receive::Ready(Packet {
                    data: ffmpeg_packet.data().map(|d| d.to_vec()).unwrap_or_default(),
                    stream_index: ffmpeg_packet.stream(),
                    pts: ffmpeg_packet.pts(),
                    dts: ffmpeg_packet.dts(),
                    duration: ffmpeg_packet.duration(),
                    is_keyframe: ffmpeg_packet.is_key(),
                }))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Receive::Pending)
            }
            Err(ffmpeg::Error::Eof) => Ok(Receive::Finished),
            Err(e) => Err(Error::Encode(format!("Failed to receive packet: {}", e))),
        }
    }
}

impl Drop for SoftwareEncoder {
    fn drop(&mut self) {
        tracing::debug!(
            "Dropping {} encoder ({} bytes produced)",
            self.codec_name,
            self.bytes_output
        );
    }
}
