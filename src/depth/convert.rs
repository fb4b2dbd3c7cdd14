// SPDX-License-Identifier: GPL-3.0-only

//! Depth data as delivered by the depth output, and conversion between types
//!
//! A depth camera may deliver disparity (1/m), depth in meters, or raw
//! millimetre counts. Downstream processing always works on
//! [`DepthDataType::DisparityFloat32`].

use serde::{Deserialize, Serialize};

use super::buffer::DepthBuffer;
use crate::backends::camera::types::Orientation;
use crate::errors::DepthError;

/// Pixel format of a depth map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DepthDataType {
    /// Normalized inverse depth (1/m), 32-bit float
    #[default]
    DisparityFloat32,
    /// Depth in meters, 32-bit float
    DepthFloat32,
    /// Depth in millimetres, 16-bit unsigned (0 = invalid)
    DepthMillimeters16,
}

impl std::fmt::Display for DepthDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthDataType::DisparityFloat32 => write!(f, "disparity f32"),
            DepthDataType::DepthFloat32 => write!(f, "depth f32 (m)"),
            DepthDataType::DepthMillimeters16 => write!(f, "depth u16 (mm)"),
        }
    }
}

/// One depth frame: a depth map tagged with its data type
#[derive(Debug, Clone, PartialEq)]
pub enum DepthData {
    /// Disparity map (1/m)
    Disparity(DepthBuffer),
    /// Depth map in meters
    Meters(DepthBuffer),
    /// Tightly packed millimetre depth map
    Millimeters {
        width: u32,
        height: u32,
        data: Vec<u16>,
    },
}

impl DepthData {
    /// Millimetre map, checked against its dimensions
    pub fn millimeters(width: u32, height: u32, data: Vec<u16>) -> Result<Self, DepthError> {
        if width == 0 || height == 0 {
            return Err(DepthError::InvalidDimensions {
                width,
                height,
                stride: width,
            });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DepthError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::Millimeters {
            width,
            height,
            data,
        })
    }

    pub fn data_type(&self) -> DepthDataType {
        match self {
            Self::Disparity(_) => DepthDataType::DisparityFloat32,
            Self::Meters(_) => DepthDataType::DepthFloat32,
            Self::Millimeters { .. } => DepthDataType::DepthMillimeters16,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Disparity(buffer) | Self::Meters(buffer) => buffer.width(),
            Self::Millimeters { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Disparity(buffer) | Self::Meters(buffer) => buffer.height(),
            Self::Millimeters { height, .. } => *height,
        }
    }

    /// The float depth map, if this frame stores one
    pub fn depth_data_map(&self) -> Option<&DepthBuffer> {
        match self {
            Self::Disparity(buffer) | Self::Meters(buffer) => Some(buffer),
            Self::Millimeters { .. } => None,
        }
    }

    /// Take the float depth map out of this frame
    ///
    /// Millimetre maps have no float representation; convert them first.
    pub fn into_depth_data_map(self) -> Option<DepthBuffer> {
        match self {
            Self::Disparity(buffer) | Self::Meters(buffer) => Some(buffer),
            Self::Millimeters { .. } => None,
        }
    }

    /// Convert to `target`, passing the frame through untouched if it already matches
    pub fn converting(self, target: DepthDataType) -> Result<Self, DepthError> {
        if self.data_type() == target {
            return Ok(self);
        }

        let meters = self.into_meters()?;
        match target {
            DepthDataType::DepthFloat32 => Ok(Self::Meters(meters)),
            DepthDataType::DisparityFloat32 => {
                let mut disparity = meters;
                disparity.map_in_place(invert);
                Ok(Self::Disparity(disparity))
            }
            DepthDataType::DepthMillimeters16 => {
                let (width, height) = (meters.width(), meters.height());
                let data = meters
                    .rows()
                    .flat_map(|row| row.iter().map(|&m| meters_to_mm(m)))
                    .collect();
                Self::millimeters(width, height, data)
            }
        }
    }

    /// Copy of this frame rotated into `orientation`
    pub fn rotated(&self, orientation: Orientation) -> Self {
        match self {
            Self::Disparity(buffer) => Self::Disparity(buffer.rotated(orientation)),
            Self::Meters(buffer) => Self::Meters(buffer.rotated(orientation)),
            Self::Millimeters {
                width,
                height,
                data,
            } => {
                let (data, width, height) = orientation.rotate_plane(data, *width, *height, *width);
                Self::Millimeters {
                    width,
                    height,
                    data,
                }
            }
        }
    }

    fn into_meters(self) -> Result<DepthBuffer, DepthError> {
        match self {
            Self::Meters(buffer) => Ok(buffer),
            Self::Disparity(mut buffer) => {
                buffer.map_in_place(invert);
                Ok(buffer)
            }
            Self::Millimeters {
                width,
                height,
                data,
            } => DepthBuffer::from_vec(width, height, data.into_iter().map(mm_to_meters).collect()),
        }
    }
}

/// Depth <-> disparity; invalid (non-positive or non-finite) values map to 0
fn invert(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        1.0 / value
    } else {
        0.0
    }
}

fn mm_to_meters(mm: u16) -> f32 {
    f32::from(mm) / 1000.0
}

fn meters_to_mm(meters: f32) -> u16 {
    if meters.is_finite() && meters > 0.0 {
        (meters * 1000.0).round().min(f32::from(u16::MAX)) as u16
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disparity_passes_through() {
        let buffer = DepthBuffer::filled(4, 4, 0.5).unwrap();
        let data = DepthData::Disparity(buffer.clone());
        let converted = data.converting(DepthDataType::DisparityFloat32).unwrap();
        assert_eq!(converted.into_depth_data_map(), Some(buffer));
    }

    #[test]
    fn test_meters_to_disparity() {
        let buffer = DepthBuffer::from_vec(4, 1, vec![2.0, 0.5, 0.0, -1.0]).unwrap();
        let converted = DepthData::Meters(buffer)
            .converting(DepthDataType::DisparityFloat32)
            .unwrap();
        assert_eq!(converted.data_type(), DepthDataType::DisparityFloat32);
        assert_eq!(
            converted.depth_data_map().unwrap().as_slice(),
            &[0.5, 2.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_millimeters_to_disparity() {
        let data = DepthData::millimeters(3, 1, vec![1000, 4000, 0]).unwrap();
        let converted = data.converting(DepthDataType::DisparityFloat32).unwrap();
        assert_eq!(
            converted.depth_data_map().unwrap().as_slice(),
            &[1.0, 0.25, 0.0]
        );
    }

    #[test]
    fn test_disparity_to_millimeters() {
        let buffer = DepthBuffer::from_vec(2, 1, vec![0.5, 0.0]).unwrap();
        let converted = DepthData::Disparity(buffer)
            .converting(DepthDataType::DepthMillimeters16)
            .unwrap();
        assert_eq!(converted.width(), 2);
        assert!(converted.depth_data_map().is_none());
        let back = converted.converting(DepthDataType::DepthFloat32).unwrap();
        assert_eq!(back.depth_data_map().unwrap().as_slice(), &[2.0, 0.0]);
    }

    #[test]
    fn test_millimeters_size_checked() {
        assert!(matches!(
            DepthData::millimeters(2, 2, vec![0; 3]),
            Err(DepthError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_rotated_millimeters() {
        let data = DepthData::millimeters(2, 1, vec![1, 2]).unwrap();
        let rotated = data.rotated(Orientation::Portrait);
        assert_eq!((rotated.width(), rotated.height()), (1, 2));
    }
}
