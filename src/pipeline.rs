//! Transcode pipeline
//!
//! Connects demux → decode → overlay → rebase → encode → mux for a single
//! video stream. Everything runs on the calling thread: each packet read is
//! pushed through the stages and whatever they have ready is pulled out
//! immediately, so at most a codec's internal buffer is in flight. Both codecs
//! are flushed explicitly once the input ends.

use std::num::NonZeroU64;
use std::path::Path;

use crate::config::Config;
use crate::decode::{DecodeStage, FfmpegDecoder, VideoDecoder};
use crate::demux::{count_stream_packets, FfmpegSource, PacketSource};
use crate::encode::{EncodeStage, EncoderSetup, SoftwareEncoder, VideoEncoder};
use crate::error::Result;
use crate::output::{FileSink, PacketSink};
use crate::processing::ProgressBar;
use crate::progress;
use crate::timestamp;
use crate::types::{select_video_stream, Receive, StreamInfo, Timebase};

/// Counters for one transcode run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Packets read from the source, all streams
    pub packets_read: u64,
    /// Packets belonging to other streams
    pub packets_skipped: u64,
    pub frames_decoded: u64,
    pub frames_overlaid: u64,
    pub packets_written: u64,
    /// Frames whose pts had to be bumped to stay increasing
    pub timestamp_fixups: u64,
}

/// Single-stream transcode driver
pub struct Pipeline<D, E> {
    input: StreamInfo,
    decode: DecodeStage<D>,
    encode: EncodeStage<E>,
    overlay: ProgressBar,
    total_frames: NonZeroU64,
    sink_stream: usize,
    frame_index: u64,
    last_pts: Option<i64>,
    stats: TranscodeStats,
}

impl<D: VideoDecoder, E: VideoEncoder> Pipeline<D, E> {
    /// `input` is the selected source stream, `sink_stream` the index of the
    /// output stream packets are written to.
    pub fn new(
        input: StreamInfo,
        decoder: D,
        encoder: E,
        total_frames: NonZeroU64,
        sink_stream: usize,
    ) -> Self {
        Self {
            input,
            decode: DecodeStage::new(decoder),
            encode: EncodeStage::new(encoder),
            overlay: ProgressBar::default(),
            total_frames,
            sink_stream,
            frame_index: 0,
            last_pts: None,
            stats: TranscodeStats::default(),
        }
    }

    pub fn with_overlay(mut self, overlay: ProgressBar) -> Self {
        self.overlay = overlay;
        self
    }

    /// Run to completion. The first error from any stage aborts the run.
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<TranscodeStats>
    where
        S: PacketSource,
        K: PacketSink,
    {
        sink.write_header()?;
        // The muxer may pick its own timebase while writing the header
        let sink_tb = sink.time_base()?;

        tracing::info!(
            "Transcoding stream #{} ({} frames, timebase {} -> {} -> {})",
            self.input.index,
            self.total_frames,
            self.input.time_base,
            self.encode.time_base(),
            sink_tb
        );

        while let Some(packet) = source.read_packet()? {
            self.stats.packets_read += 1;
            if packet.stream_index != self.input.index {
                self.stats.packets_skipped += 1;
                continue;
            }

            self.decode.submit(&packet)?;
            self.pump_frames(sink, sink_tb)?;
        }

        tracing::debug!("End of input after {} packets", self.stats.packets_read);

        self.decode.flush()?;
        self.pump_frames(sink, sink_tb)?;

        self.encode.flush()?;
        self.pump_packets(sink, sink_tb)?;

        sink.write_trailer()?;

        tracing::info!(
            "Transcode finished: {} frames, {} packets written ({} timestamp fixups)",
            self.stats.frames_overlaid,
            self.stats.packets_written,
            self.stats.timestamp_fixups
        );
        Ok(self.stats)
    }

    /// Overlay and encode every frame the decoder has ready
    fn pump_frames<K: PacketSink>(&mut self, sink: &mut K, sink_tb: Timebase) -> Result<()> {
        while let Receive::Ready(mut frame) = self.decode.receive_frame()? {
            self.stats.frames_decoded += 1;

            self.overlay
                .apply(&mut frame, self.frame_index, self.total_frames)?;
            self.frame_index += 1;
            self.stats.frames_overlaid += 1;

            frame.pts = self.rebase(frame.pts);
            self.encode.submit(frame)?;
            self.pump_packets(sink, sink_tb)?;
        }
        Ok(())
    }

    /// Write every packet the encoder has ready
    fn pump_packets<K: PacketSink>(&mut self, sink: &mut K, sink_tb: Timebase) -> Result<()> {
        let encoder_tb = self.encode.time_base();
        while let Receive::Ready(mut packet) = self.encode.receive_packet()? {
            packet.stream_index = self.sink_stream;
            packet.rescale_ts(encoder_tb, sink_tb);
            sink.write_packet(packet)?;
            self.stats.packets_written += 1;
        }
        Ok(())
    }

    /// Source timebase to encoder timebase, keeping pts strictly increasing
    fn rebase(&mut self, pts: Option<i64>) -> Option<i64> {
        let mut pts = timestamp::rescale(pts, self.input.time_base, self.encode.time_base())?;

        if let Some(last) = self.last_pts {
            if pts <= last {
                tracing::warn!(
                    "Frame {} pts {} not after previous {}, using {}",
                    self.frame_index - 1,
                    pts,
                    last,
                    last + 1
                );
                pts = last + 1;
                self.stats.timestamp_fixups += 1;
            }
        }

        self.last_pts = Some(pts);
        Some(pts)
    }
}

/// Transcode the first video stream of `input` into `output` with a progress
/// bar burned in.
pub fn transcode(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &Config,
) -> Result<TranscodeStats> {
    let input = input.as_ref();
    config.validate()?;
    crate::init()?;

    let mut source = FfmpegSource::open(input)?;
    if config.input.dump_format {
        source.dump();
    }

    let stream = select_video_stream(source.streams())?.clone();
    tracing::info!(
        "Selected video stream #{} ({}, {}x{})",
        stream.index,
        stream.codec,
        stream.width,
        stream.height
    );

    let total_frames = progress::resolve_total_frames(
        &stream,
        source.duration(),
        config.input.frame_count_fallback,
        || {
            let mut counter = FfmpegSource::open(input)?;
            count_stream_packets(&mut counter, stream.index)
        },
    )?;

    let parameters = source.parameters(stream.index)?;
    let codec_id = parameters.id();
    let decoder = FfmpegDecoder::open(
        parameters,
        stream.time_base,
        config.overlay.pixel_format.clone(),
    )?;

    let mut sink = FileSink::create(output, config.output.format.as_deref())?;
    let setup = EncoderSetup {
        codec_id,
        width: decoder.width(),
        height: decoder.height(),
        frame_rate: stream.frame_rate,
        bit_rate: decoder.bit_rate(),
        global_header: sink.needs_global_header(),
    };
    let encoder = SoftwareEncoder::open(&setup, &config.encoder)?;
    let sink_stream = sink.add_video_stream(&encoder)?;

    let overlay = ProgressBar::new(config.overlay.bar_height, config.overlay.color);
    Pipeline::new(stream, decoder, encoder, total_frames, sink_stream)
        .with_overlay(overlay)
        .run(&mut source, &mut sink)
}
