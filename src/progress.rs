//! Total frame count for the progress bar

use std::num::NonZeroU64;

use crate::config::FrameCountFallback;
use crate::error::{Error, Result};
use crate::types::{StreamInfo, Timebase};

/// Frames spanned by `duration` ticks of `time_base` at `rate`, rounded up
fn frames_in(duration: i64, time_base: Timebase, rate: Timebase) -> Option<u64> {
    if duration <= 0 || !time_base.is_valid() || !rate.is_valid() {
        return None;
    }

    let num = duration as i128 * time_base.num as i128 * rate.num as i128;
    let den = time_base.den as i128 * rate.den as i128;
    let frames = (num + den - 1) / den;
    u64::try_from(frames).ok().filter(|n| *n > 0)
}

/// Frames implied by the average frame rate and the stream duration, or the
/// container duration (microseconds) when the stream has none
pub fn estimate_from_duration(stream: &StreamInfo, container_duration: Option<i64>) -> Option<u64> {
    stream
        .duration
        .and_then(|d| frames_in(d, stream.time_base, stream.frame_rate))
        .or_else(|| {
            container_duration.and_then(|d| frames_in(d, Timebase::MICROS, stream.frame_rate))
        })
}

/// Decide the bar's denominator.
///
/// `count` is only called when the container declares nothing usable and the
/// fallback asks for a counting pass. A stream with no frames at all gets a
/// total of 1, which the overlay never sees.
pub fn resolve_total_frames<F>(
    stream: &StreamInfo,
    container_duration: Option<i64>,
    fallback: FrameCountFallback,
    count: F,
) -> Result<NonZeroU64>
where
    F: FnOnce() -> Result<u64>,
{
    if let Some(total) = stream.declared_frames.and_then(NonZeroU64::new) {
        tracing::debug!("Using declared frame count: {}", total);
        return Ok(total);
    }

    let total = match fallback {
        FrameCountFallback::Reject => return Err(Error::UnknownFrameCount),
        FrameCountFallback::Duration => match estimate_from_duration(stream, container_duration) {
            Some(estimate) => {
                tracing::info!(
                    "Frame count not declared, estimated {} from duration",
                    estimate
                );
                estimate
            }
            None => {
                tracing::info!("Frame count not declared and no duration, counting packets");
                count()?
            }
        },
        FrameCountFallback::Count => {
            tracing::info!("Frame count not declared, counting packets");
            count()?
        }
    };

    Ok(NonZeroU64::new(total).unwrap_or(NonZeroU64::MIN))
}
