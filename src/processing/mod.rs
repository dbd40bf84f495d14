//! Frame processing
//!
//! - Progress bar overlay on packed frames
//! - Pixel conversion to and from the packed overlay layout

mod convert;
pub mod overlay;

pub use convert::{FromPacked, ToPacked};
pub use overlay::{bar_width, ProgressBar, Rgb};
