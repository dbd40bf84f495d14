//! Pixel conversion between FFmpeg frames and packed overlay frames
//!
//! Decoded pictures arrive in whatever layout the codec produces (usually
//! planar YUV). The overlay writes packed RGB, and the encoder wants its own
//! layout again, so both hand-offs go through swscale.

use crate::error::{Error, Result};
use crate::types::{Frame, PixelFormat};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as SwsContext, Flags as SwsFlags};

/// A swscale context that is rebuilt whenever the input geometry changes
struct CachedScaler {
    key: (Pixel, u32, u32),
    context: SwsContext,
}

fn scaler_for<'a>(
    cache: &'a mut Option<CachedScaler>,
    src: (Pixel, u32, u32),
    dst: (Pixel, u32, u32),
) -> Result<&'a mut SwsContext> {
    let stale = cache.as_ref().map_or(true, |c| c.key != src);
    if stale {
        let context = SwsContext::get(src.0, src.1, src.2, dst.0, dst.1, dst.2, SwsFlags::BILINEAR)
            .map_err(|e| Error::FFmpeg(format!("Failed to create scaler: {}", e)))?;
        tracing::debug!(
            "swscale {:?} {}x{} -> {:?} {}x{}",
            src.0,
            src.1,
            src.2,
            dst.0,
            dst.1,
            dst.2
        );
        *cache = Some(CachedScaler { key: src, context });
    }
    cache
        .as_mut()
        .map(|c| &mut c.context)
        .ok_or_else(|| Error::FFmpeg("scaler cache empty".into()))
}

/// Converts decoded FFmpeg frames into packed [`Frame`]s
pub struct ToPacked {
    target: PixelFormat,
    target_pixel: Pixel,
    scaler: Option<CachedScaler>,
}

impl ToPacked {
    pub fn new(target: PixelFormat) -> Result<Self> {
        let target_pixel = target.to_ffmpeg()?;
        Ok(Self {
            target,
            target_pixel,
            scaler: None,
        })
    }

    /// Copy (converting if needed) a decoded picture into an owned packed frame.
    /// The returned frame has no pts; the caller sets it.
    pub fn convert(&mut self, src: &ffmpeg::frame::Video) -> Result<Frame> {
        let (width, height) = (src.width(), src.height());

        if src.format() == self.target_pixel {
            return Ok(copy_plane(src, self.target.clone()));
        }

        let scaler = scaler_for(
            &mut self.scaler,
            (src.format(), width, height),
            (self.target_pixel, width, height),
        )?;
        let mut packed = ffmpeg::frame::Video::empty();
        scaler
            .run(src, &mut packed)
            .map_err(|e| Error::FFmpeg(format!("Conversion to {} failed: {}", self.target, e)))?;

        Ok(copy_plane(&packed, self.target.clone()))
    }
}

fn copy_plane(src: &ffmpeg::frame::Video, format: PixelFormat) -> Frame {
    let stride = src.stride(0);
    let len = stride * src.height() as usize;
    let plane = src.data(0);
    let data = plane[..len.min(plane.len())].to_vec();
    Frame::from_data(data, src.width(), src.height(), stride, format)
}

/// Converts packed [`Frame`]s into FFmpeg frames in an encoder's layout
pub struct FromPacked {
    dst_pixel: Pixel,
    width: u32,
    height: u32,
    scaler: Option<CachedScaler>,
}

impl FromPacked {
    pub fn new(dst_pixel: Pixel, width: u32, height: u32) -> Self {
        Self {
            dst_pixel,
            width,
            height,
            scaler: None,
        }
    }

    /// Build an encoder-ready frame, carrying `frame.pts` over
    pub fn convert(&mut self, frame: &Frame) -> Result<ffmpeg::frame::Video> {
        let src_pixel = frame.format.to_ffmpeg()?;
        let bpp = frame
            .format
            .bytes_per_pixel()
            .ok_or_else(|| Error::UnsupportedFormat(frame.format.name().to_string()))?;
        let row_bytes = frame.width as usize * bpp;
        if frame.stride < row_bytes || frame.data.len() < frame.stride * frame.height as usize {
            return Err(Error::InvalidFrame(format!(
                "{}x{} {} frame with stride {} and {} bytes",
                frame.width,
                frame.height,
                frame.format,
                frame.stride,
                frame.data.len()
            )));
        }

        let mut packed = ffmpeg::frame::Video::new(src_pixel, frame.width, frame.height);
        let dst_stride = packed.stride(0);
        let plane = packed.data_mut(0);
        for y in 0..frame.height as usize {
            let src = &frame.data[y * frame.stride..y * frame.stride + row_bytes];
            plane[y * dst_stride..y * dst_stride + row_bytes].copy_from_slice(src);
        }

        let same_geometry = frame.width == self.width && frame.height == self.height;
        let mut out = if src_pixel == self.dst_pixel && same_geometry {
            packed
        } else {
            let scaler = scaler_for(
                &mut self.scaler,
                (src_pixel, frame.width, frame.height),
                (self.dst_pixel, self.width, self.height),
            )?;
            let mut converted = ffmpeg::frame::Video::empty();
            scaler
                .run(&packed, &mut converted)
                .map_err(|e| Error::FFmpeg(format!("Conversion from {} failed: {}", frame.format, e)))?;
            converted
        };

        out.set_pts(frame.pts);
        Ok(out)
    }
}
