//! Progress bar overlay
//!
//! Paints a solid bar along the bottom rows of a packed frame. The bar grows
//! from the left edge in proportion to `index / total`.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Frame;

/// Default bar thickness in pixel rows
pub const DEFAULT_BAR_HEIGHT: u32 = 10;

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255);
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLUE
    }
}

/// Width in pixels of the bar for frame `index` out of `total`.
///
/// Integer truncation, clamped to `frame_width` when the total was
/// underestimated.
pub fn bar_width(frame_width: u32, index: u64, total: NonZeroU64) -> u32 {
    let width = frame_width as u128 * index as u128 / total.get() as u128;
    width.min(frame_width as u128) as u32
}

/// Progress bar painter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBar {
    height: u32,
    color: Rgb,
}

impl ProgressBar {
    pub fn new(height: u32, color: Rgb) -> Self {
        Self { height, color }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Paint the bar for frame `index` of `total` into `frame`.
    ///
    /// Fails without touching the buffer if the pixel format is not a packed
    /// layout or the buffer is smaller than `stride * height`.
    pub fn apply(&self, frame: &mut Frame, index: u64, total: NonZeroU64) -> Result<()> {
        let (r, g, b, a) = frame
            .format
            .channel_offsets()
            .ok_or_else(|| Error::UnsupportedFormat(frame.format.name().to_string()))?;
        let bpp = frame
            .format
            .bytes_per_pixel()
            .ok_or_else(|| Error::UnsupportedFormat(frame.format.name().to_string()))?;

        let row_bytes = frame.width as usize * bpp;
        if frame.stride < row_bytes {
            return Err(Error::InvalidFrame(format!(
                "stride {} shorter than row of {} bytes",
                frame.stride, row_bytes
            )));
        }
        if frame.data.len() < frame.stride * frame.height as usize {
            return Err(Error::InvalidFrame(format!(
                "buffer of {} bytes cannot hold {} rows of {} bytes",
                frame.data.len(),
                frame.height,
                frame.stride
            )));
        }

        let width = bar_width(frame.width, index, total) as usize;
        if width == 0 {
            return Ok(());
        }

        let top = frame.height.saturating_sub(self.height) as usize;
        for y in top..frame.height as usize {
            let start = y * frame.stride;
            let row = &mut frame.data[start..start + width * bpp];
            for pixel in row.chunks_exact_mut(bpp) {
                pixel[r] = self.color.r;
                pixel[g] = self.color.g;
                pixel[b] = self.color.b;
                if let Some(a) = a {
                    pixel[a] = 255;
                }
            }
        }

        Ok(())
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new(DEFAULT_BAR_HEIGHT, Rgb::BLUE)
    }
}
