// SPDX-License-Identifier: GPL-3.0-only

//! Depth visualization helpers
//!
//! Renders a clamped disparity map to a viewable RGBA image:
//! - Grayscale (bright=near, dark=far)
//! - Turbo colormap (blue=near, red=far)

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::buffer::DepthBuffer;
use crate::constants::DEPTH_COLORMAP_BANDS;

/// How disparity is mapped to color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthColormap {
    #[default]
    Grayscale,
    Turbo,
}

/// Turbo colormap: perceptually uniform rainbow
///
/// Based on: https://ai.googleblog.com/2019/08/turbo-improved-rainbow-colormap-for.html
/// Simplified version with polynomial approximation.
#[inline]
fn turbo(t: f32) -> [u8; 4] {
    let r = (0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144)))))
        .clamp(0.0, 1.0);
    let g = (0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377)))))
        .clamp(0.0, 1.0);
    let b = (0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388)))))
        .clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, 255]
}

/// Color for one disparity value
///
/// Zero disparity is "no depth" and renders black in both colormaps.
pub fn disparity_to_rgba(disparity: f32, colormap: DepthColormap) -> [u8; 4] {
    if disparity.is_nan() || disparity <= 0.0 {
        return [0, 0, 0, 255];
    }
    let t = disparity.min(1.0);
    match colormap {
        DepthColormap::Grayscale => {
            let gray = (t * 255.0) as u8;
            [gray, gray, gray, 255]
        }
        DepthColormap::Turbo => {
            // near (high disparity) = 0.0 = blue
            let far = 1.0 - t;
            let banded = (far * DEPTH_COLORMAP_BANDS).floor() / DEPTH_COLORMAP_BANDS;
            turbo(banded)
        }
    }
}

/// Render a disparity buffer to an RGBA image of the same size
pub fn disparity_to_image(buffer: &DepthBuffer, colormap: DepthColormap) -> RgbaImage {
    let mut image = RgbaImage::new(buffer.width(), buffer.height());
    for (y, row) in buffer.rows().enumerate() {
        for (x, &value) in row.iter().enumerate() {
            image.put_pixel(x as u32, y as u32, Rgba(disparity_to_rgba(value, colormap)));
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_is_black() {
        for colormap in [DepthColormap::Grayscale, DepthColormap::Turbo] {
            assert_eq!(disparity_to_rgba(0.0, colormap), [0, 0, 0, 255]);
            assert_eq!(disparity_to_rgba(f32::NAN, colormap), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_grayscale_near_is_bright() {
        let near = disparity_to_rgba(1.0, DepthColormap::Grayscale);
        let far = disparity_to_rgba(0.05, DepthColormap::Grayscale);
        assert_eq!(near[0], 255);
        assert!(far[0] < 20);
    }

    #[test]
    fn test_turbo_far_is_red() {
        let near = disparity_to_rgba(0.9, DepthColormap::Turbo);
        let far = disparity_to_rgba(0.05, DepthColormap::Turbo);
        assert!(near[2] > near[0]);
        assert!(far[0] > far[2]);
    }

    #[test]
    fn test_image_dimensions() {
        let buffer = DepthBuffer::with_stride(3, 2, 4, vec![0.5; 8]).unwrap();
        let image = disparity_to_image(&buffer, DepthColormap::Grayscale);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [127, 127, 127, 255]);
    }
}
