//! File output (muxing)
//!
//! Writes the re-encoded video stream to any container libavformat can
//! produce. The container is guessed from the file extension unless a format
//! name is given.

use crate::encode::SoftwareEncoder;
use crate::error::{Error, Result};
use crate::types::{Packet, Timebase};
use std::path::{Path, PathBuf};

use super::PacketSink;

use ffmpeg_next as ffmpeg;

/// Single-video-stream file sink
pub struct FileSink {
    path: PathBuf,
    output_ctx: ffmpeg::format::context::Output,
    stream_index: Option<usize>,
    header_written: bool,
    trailer_written: bool,
    packets_written: u64,
    bytes_written: u64,
}

impl FileSink {
    /// Create the output context (the file itself is opened here too)
    pub fn create(path: impl AsRef<Path>, format: Option<&str>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Create(format!("Failed to create directory: {}", e)))?;
            }
        }

        let output_ctx = match format {
            Some(format) => ffmpeg::format::output_as(&path, format),
            None => ffmpeg::format::output(&path),
        }
        .map_err(|e| Error::Create(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            output_ctx,
            stream_index: None,
            header_written: false,
            trailer_written: false,
            packets_written: 0,
            bytes_written: 0,
        })
    }

    /// Whether the container stores codec extradata globally
    pub fn needs_global_header(&self) -> bool {
        self.output_ctx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
    }

    /// Add the output stream, described by the opened encoder
    pub fn add_video_stream(&mut self, encoder: &SoftwareEncoder) -> Result<usize> {
        if self.stream_index.is_some() {
            return Err(Error::InvalidState("output already has a video stream".into()));
        }

        let parameters = encoder.parameters()?;
        let mut stream = self
            .output_ctx
            .add_stream(ffmpeg::encoder::find(parameters.id()))
            .map_err(|e| Error::Create(format!("Failed to add stream: {}", e)))?;

        stream.set_parameters(parameters);
        // Let the muxer choose its own tag for the codec
        unsafe {
            let mut stream_params = stream.parameters();
            (*stream_params.as_mut_ptr()).codec_tag = 0;
        }
        stream.set_time_base(ffmpeg::Rational::from(
            crate::encode::VideoEncoder::time_base(encoder),
        ));

        let index = stream.index();
        self.stream_index = Some(index);

        tracing::info!(
            "Added output stream #{}: {} ({})",
            index,
            encoder.codec_name(),
            self.path.display()
        );
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn stream_index(&self) -> Result<usize> {
        self.stream_index
            .ok_or_else(|| Error::InvalidState("output has no stream".into()))
    }
}

impl PacketSink for FileSink {
    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Err(Error::InvalidState("header already written".into()));
        }
        self.stream_index()?;

        self.output_ctx
            .write_header()
            .map_err(|e| Error::ContainerIo(format!("Failed to write header: {}", e)))?;
        self.header_written = true;
        tracing::debug!("Output header written: {}", self.path.display());
        Ok(())
    }

    fn time_base(&self) -> Result<Timebase> {
        let index = self.stream_index()?;
        self.output_ctx
            .stream(index)
            .map(|s| s.time_base().into())
            .ok_or_else(|| Error::InvalidState(format!("output stream #{} missing", index)))
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        if !self.header_written || self.trailer_written {
            return Err(Error::InvalidState("packet written outside header/trailer".into()));
        }

        let mut pkt = ffmpeg::Packet::copy(&packet.data);
        pkt.set_pts(packet.pts);
        pkt.set_dts(packet.dts);
        pkt.set_duration(packet.duration);
        pkt.set_stream(packet.stream_index);
        pkt.set_position(-1);
        if packet.is_keyframe {
            pkt.set_flags(ffmpeg::codec::packet::Flags::KEY);
        }

        pkt.write_interleaved(&mut self.output_ctx)
            .map_err(|e| Error::ContainerIo(format!("Failed to write packet: {}", e)))?;

        self.packets_written += 1;
        self.bytes_written += packet.size() as u64;
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(Error::InvalidState("trailer before header".into()));
        }
        if self.trailer_written {
            return Ok(());
        }

        self.output_ctx
            .write_trailer()
            .map_err(|e| Error::ContainerIo(format!("Failed to write trailer: {}", e)))?;
        self.trailer_written = true;

        tracing::info!(
            "Output finished: {} ({} packets, {:.2} MB)",
            self.path.display(),
            self.packets_written,
            self.bytes_written as f64 / 1_000_000.0
        );
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if self.header_written && !self.trailer_written {
            tracing::warn!(
                "Output {} closed without trailer, file is likely unplayable",
                self.path.display()
            );
        }
    }
}
