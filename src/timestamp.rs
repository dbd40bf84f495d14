//! Timestamp rebasing between rational timebases
//!
//! Rounds to nearest with ties away from zero, matching FFmpeg's default
//! `av_rescale_q`. Intermediate products are computed in 128 bits so no
//! realistic timestamp overflows.

use crate::types::Timebase;

/// Convert an optional timestamp from `from` to `to`.
///
/// `None` ("no timestamp") passes through unchanged. A zero or negative
/// timebase yields `None` since the value cannot be expressed.
pub fn rescale(ts: Option<i64>, from: Timebase, to: Timebase) -> Option<i64> {
    let value = ts?;
    if from == to {
        return Some(value);
    }
    rescale_checked(value, from, to)
}

/// Convert a plain tick count (e.g. a duration); invalid timebases give 0
pub fn rescale_value(value: i64, from: Timebase, to: Timebase) -> i64 {
    if from == to {
        return value;
    }
    rescale_checked(value, from, to).unwrap_or(0)
}

fn rescale_checked(value: i64, from: Timebase, to: Timebase) -> Option<i64> {
    if !from.is_valid() || !to.is_valid() {
        return None;
    }

    let b = from.num as i128 * to.den as i128;
    let c = from.den as i128 * to.num as i128;
    let product = value as i128 * b;

    let rounded = if product >= 0 {
        (product + c / 2) / c
    } else {
        -((-product + c / 2) / c)
    };

    Some(rounded.clamp(i64::MIN as i128 + 1, i64::MAX as i128) as i64)
}
