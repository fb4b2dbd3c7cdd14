// SPDX-License-Identifier: GPL-3.0-only

//! Depth map processing
//!
//! This module turns a delivered depth frame into a single reading:
//!
//! ```text
//! DepthData ──converting──▶ disparity DepthBuffer ──clamp──▶ [0, 1] ──SampleStrategy──▶ DepthReading
//!                                                               │
//!                                                               └──visualization──▶ RgbaImage
//! ```
//!
//! - [`buffer`]: bounds-checked f32 grid with clamp and flat-index reads
//! - [`convert`]: depth data types and conversion to disparity
//! - [`sampler`]: which cell becomes the reading
//! - [`visualization`]: disparity to grayscale / turbo RGBA

pub mod buffer;
pub mod convert;
pub mod sampler;
pub mod visualization;

pub use buffer::DepthBuffer;
pub use convert::{DepthData, DepthDataType};
pub use sampler::{DepthReading, SamplePoint, SampleStrategy};
pub use visualization::{DepthColormap, disparity_to_image};

use crate::errors::DepthError;

/// Convert to disparity, clamp to [0, 1] and sample one value
///
/// Returns the clamped disparity buffer alongside the sampled point so callers
/// can render or export the same data the reading came from.
pub fn clamp_and_sample(
    data: DepthData,
    strategy: SampleStrategy,
) -> Result<(DepthBuffer, SamplePoint), DepthError> {
    let converted = data.converting(DepthDataType::DisparityFloat32)?;
    let (width, height) = (converted.width(), converted.height());
    let mut buffer = converted
        .into_depth_data_map()
        .ok_or(DepthError::InvalidDimensions {
            width,
            height,
            stride: width,
        })?;
    buffer.clamp();
    let point = strategy.sample(&buffer)?;
    Ok((buffer, point))
}
