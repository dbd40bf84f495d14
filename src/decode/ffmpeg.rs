//! FFmpeg (libavcodec) decoder backend

use crate::error::{Error, Result};
use crate::processing::ToPacked;
use crate::types::{Frame, Packet, PixelFormat, Receive, Timebase};

use super::VideoDecoder;

use ffmpeg_next as ffmpeg;

/// Decoder for one video stream, producing packed frames for the overlay
pub struct FfmpegDecoder {
    decoder: ffmpeg::decoder::Video,
    converter: ToPacked,
    time_base: Timebase,
    decoded: ffmpeg::frame::Video,
}

impl FfmpegDecoder {
    /// Open a decoder from the source stream's parameters.
    ///
    /// `time_base` is the source stream timebase; packets are fed in it and
    /// frames come back in it.
    pub fn open(
        parameters: ffmpeg::codec::Parameters,
        time_base: Timebase,
        output_format: PixelFormat,
    ) -> Result<Self> {
        let codec_id = parameters.id();
        if ffmpeg::decoder::find(codec_id).is_none() {
            return Err(Error::CodecUnavailable(format!("no decoder for {:?}", codec_id)));
        }

        let mut context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| Error::CodecUnavailable(format!("decoder context for {:?}: {}", codec_id, e)))?;
        unsafe {
            (*context.as_mut_ptr()).pkt_timebase = ffmpeg::Rational::from(time_base).into();
        }

        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::CodecUnavailable(format!("failed to open {:?} decoder: {}", codec_id, e)))?;

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(Error::CodecUnavailable(format!(
                "{:?} stream is missing its dimensions",
                codec_id
            )));
        }

        tracing::info!(
            "Decoder opened: {:?} {}x{} {:?} (timebase {})",
            codec_id,
            decoder.width(),
            decoder.height(),
            decoder.format(),
            time_base
        );

        Ok(Self {
            decoder,
            converter: ToPacked::new(output_format)?,
            time_base,
            decoded: ffmpeg::frame::Video::empty(),
        })
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Bitrate reported by the stream, 0 if unknown
    pub fn bit_rate(&self) -> usize {
        self.decoder.bit_rate()
    }

    pub fn time_base(&self) -> Timebase {
        self.time_base
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let mut pkt = ffmpeg::Packet::copy(&packet.data);
        pkt.set_pts(packet.pts);
        pkt.set_dts(packet.dts);
        pkt.set_duration(packet.duration);
        pkt.set_stream(packet.stream_index);
        if packet.is_keyframe {
            pkt.set_flags(ffmpeg::codec::packet::Flags::KEY);
        }

        self.decoder
            .send_packet(&pkt)
            .map_err(|e| Error::DecodeSubmit(e.to_string()))
    }

    fn send_eof(&mut self) -> Result<()> {
        self.decoder
            .send_eof()
            .map_err(|e| Error::DecodeSubmit(format!("Failed to send EOF: {}", e)))
    }

    fn receive_frame(&mut self) -> Result<Receive<Frame>> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => {
                let pts = self.decoded.timestamp().or_else(|| self.decoded.pts());
                let frame = self.converter.convert(&self.decoded)?.with_pts(pts);
                Ok(Receive::Ready(frame))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Receive::Pending)
            }
            Err(ffmpeg::Error::Eof) => Ok(Receive::Finished),
            Err(e) => Err(Error::Decode(e.to_string())),
        }
    }
}
