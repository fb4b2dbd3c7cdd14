// SPDX-License-Identifier: GPL-3.0-only

//! Owned single-channel f32 depth buffer
//!
//! Row-major grid with explicit width, height and stride (elements per row).
//! Elements between `width` and `stride` on each row are padding: they are
//! kept as-is by every transform and never returned by sampling.

use crate::backends::camera::types::Orientation;
use crate::constants::{DISPARITY_MAX, DISPARITY_MIN};
use crate::errors::DepthError;

#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    stride: u32,
    data: Vec<f32>,
}

impl DepthBuffer {
    /// Wrap tightly packed row-major samples (stride == width)
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self, DepthError> {
        Self::with_stride(width, height, width, data)
    }

    /// Wrap row-major samples whose rows are `stride` elements apart
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        data: Vec<f32>,
    ) -> Result<Self, DepthError> {
        if width == 0 || height == 0 || stride < width {
            return Err(DepthError::InvalidDimensions {
                width,
                height,
                stride,
            });
        }
        let expected = stride as usize * height as usize;
        if data.len() != expected {
            return Err(DepthError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Buffer with every element set to `value`
    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self, DepthError> {
        Self::from_vec(width, height, vec![value; width as usize * height as usize])
    }

    /// Build a buffer by evaluating `f(row, column)` for every pixel
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> f32,
    ) -> Result<Self, DepthError> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(y, x));
            }
        }
        Self::from_vec(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Raw storage including row padding
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Flat index of a pixel: `row * stride + column`
    pub fn flat_index(&self, row: u32, column: u32) -> Option<usize> {
        if row < self.height && column < self.width {
            Some(row as usize * self.stride as usize + column as usize)
        } else {
            None
        }
    }

    /// Value at (row, column), if inside the buffer
    pub fn get(&self, row: u32, column: u32) -> Option<f32> {
        self.flat_index(row, column).map(|i| self.data[i])
    }

    /// Iterate over the pixel rows (padding excluded)
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        let width = self.width as usize;
        self.data
            .chunks_exact(self.stride as usize)
            .map(move |row| &row[..width])
    }

    /// Clamp every pixel to [0, 1] in place
    ///
    /// Each value becomes `min(1.0, max(v, 0.0))`. `f32::max` returns the
    /// non-NaN operand, so NaN pixels become 0.0.
    pub fn clamp(&mut self) {
        let width = self.width as usize;
        for row in self.data.chunks_exact_mut(self.stride as usize) {
            for value in &mut row[..width] {
                *value = value.max(DISPARITY_MIN).min(DISPARITY_MAX);
            }
        }
    }

    /// Read the value at a flat index as f64
    ///
    /// The index must fall inside the buffer and on a pixel, not in row padding.
    pub fn get_depth(&self, index: usize) -> Result<f64, DepthError> {
        if index >= self.data.len() {
            return Err(DepthError::IndexOutOfRange {
                index,
                len: self.data.len(),
            });
        }
        if index % self.stride as usize >= self.width as usize {
            return Err(DepthError::IndexInPadding {
                index,
                stride: self.stride,
                width: self.width,
            });
        }
        Ok(f64::from(self.data[index]))
    }

    /// Copy of this buffer rotated into `orientation`
    ///
    /// The source is assumed to be in the sensor's native landscape orientation.
    /// The result is tightly packed.
    pub fn rotated(&self, orientation: Orientation) -> Self {
        let (data, width, height) =
            orientation.rotate_plane(&self.data, self.width, self.height, self.stride);
        Self {
            width,
            height,
            stride: width,
            data,
        }
    }

    /// Map every pixel through `f`, leaving padding untouched
    pub fn map_in_place(&mut self, mut f: impl FnMut(f32) -> f32) {
        let width = self.width as usize;
        for row in self.data.chunks_exact_mut(self.stride as usize) {
            for value in &mut row[..width] {
                *value = f(*value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::legacy;

    fn marker(row: u32, column: u32) -> f32 {
        (row * 1000 + column) as f32
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(matches!(
            DepthBuffer::from_vec(0, 4, vec![]),
            Err(DepthError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            DepthBuffer::with_stride(4, 2, 3, vec![0.0; 6]),
            Err(DepthError::InvalidDimensions { .. })
        ));
        assert_eq!(
            DepthBuffer::from_vec(2, 2, vec![0.0; 3]),
            Err(DepthError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_clamp_bounds() {
        let mut buffer =
            DepthBuffer::from_vec(3, 2, vec![-3.0, 0.0, 0.25, 1.0, 1.5, f32::INFINITY]).unwrap();
        buffer.clamp();
        assert_eq!(buffer.as_slice(), &[0.0, 0.0, 0.25, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_clamp_nan_becomes_zero() {
        let mut buffer = DepthBuffer::from_vec(2, 1, vec![f32::NAN, f32::NEG_INFINITY]).unwrap();
        buffer.clamp();
        assert_eq!(buffer.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let mut once = DepthBuffer::from_fn(16, 9, |y, x| (y as f32 - 4.0) * 0.3 + x as f32 * 0.07)
            .unwrap();
        once.clamp();
        let mut twice = once.clone();
        twice.clamp();
        assert_eq!(once, twice);
        assert!(once.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_clamp_leaves_padding() {
        let mut buffer = DepthBuffer::with_stride(2, 2, 3, vec![5.0, -1.0, 7.0, 0.5, 2.0, -9.0])
            .unwrap();
        buffer.clamp();
        assert_eq!(buffer.as_slice(), &[1.0, 0.0, 7.0, 0.5, 1.0, -9.0]);
    }

    #[test]
    fn test_get_depth_reads_legacy_center_cell() {
        let buffer =
            DepthBuffer::from_fn(legacy::DEPTH_WIDTH, legacy::DEPTH_HEIGHT, marker).unwrap();
        let value = buffer.get_depth(legacy::CENTER_INDEX).unwrap();
        assert_eq!(value, f64::from(marker(160, 120)));
    }

    #[test]
    fn test_get_depth_bounds_checked() {
        let buffer = DepthBuffer::filled(10, 10, 0.5).unwrap();
        assert_eq!(
            buffer.get_depth(100),
            Err(DepthError::IndexOutOfRange {
                index: 100,
                len: 100
            })
        );
        assert_eq!(buffer.get_depth(99), Ok(0.5));
    }

    #[test]
    fn test_get_depth_rejects_padding() {
        let buffer = DepthBuffer::with_stride(2, 2, 4, vec![0.0; 8]).unwrap();
        assert!(matches!(
            buffer.get_depth(3),
            Err(DepthError::IndexInPadding { .. })
        ));
        assert!(buffer.get_depth(5).is_ok());
    }

    #[test]
    fn test_rotate_portrait_swaps_dimensions() {
        // 3 wide, 2 high landscape
        // 0 1 2
        // 3 4 5
        let buffer = DepthBuffer::from_vec(3, 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let portrait = buffer.rotated(Orientation::Portrait);
        assert_eq!((portrait.width(), portrait.height()), (2, 3));
        // 90 degrees clockwise:
        // 3 0
        // 4 1
        // 5 2
        assert_eq!(portrait.as_slice(), &[3.0, 0.0, 4.0, 1.0, 5.0, 2.0]);
    }

    #[test]
    fn test_rotate_landscape_is_copy() {
        let buffer = DepthBuffer::from_fn(4, 3, marker).unwrap();
        assert_eq!(buffer.rotated(Orientation::LandscapeRight), buffer);
    }

    #[test]
    fn test_rows_skip_padding() {
        let buffer = DepthBuffer::with_stride(2, 2, 3, vec![1.0, 2.0, 9.0, 3.0, 4.0, 9.0]).unwrap();
        let rows: Vec<&[f32]> = buffer.rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..]]);
    }
}
