// SPDX-License-Identifier: GPL-3.0-only

//! Choosing which pixel of a depth map becomes the depth reading

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::buffer::DepthBuffer;
use crate::constants::legacy;
use crate::errors::DepthError;

/// Where the single depth reading is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStrategy {
    /// Visual center of the frame: row = height / 2, column = width / 2
    #[default]
    Center,
    /// Fixed flat index 38520, the center of a 240x320 map only
    ///
    /// Any other resolution reads a different cell or fails the bounds check.
    LegacyFixedIndex,
}

impl SampleStrategy {
    pub const ALL: [SampleStrategy; 2] = [SampleStrategy::Center, SampleStrategy::LegacyFixedIndex];

    pub fn display_name(&self) -> &'static str {
        match self {
            SampleStrategy::Center => "center",
            SampleStrategy::LegacyFixedIndex => "legacy",
        }
    }

    /// Flat index this strategy reads from `buffer`
    pub fn flat_index(&self, buffer: &DepthBuffer) -> usize {
        match self {
            SampleStrategy::Center => {
                let row = buffer.height() / 2;
                let column = buffer.width() / 2;
                row as usize * buffer.stride() as usize + column as usize
            }
            SampleStrategy::LegacyFixedIndex => legacy::CENTER_INDEX,
        }
    }

    /// Read one value from `buffer`
    pub fn sample(&self, buffer: &DepthBuffer) -> Result<SamplePoint, DepthError> {
        let index = self.flat_index(buffer);
        let value = buffer.get_depth(index)?;
        let stride = buffer.stride() as usize;
        Ok(SamplePoint {
            value,
            row: (index / stride) as u32,
            column: (index % stride) as u32,
        })
    }
}

impl fmt::Display for SampleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A value and the cell it was read from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub value: f64,
    pub row: u32,
    pub column: u32,
}

/// Depth reading shown on the label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthReading {
    /// Clamped disparity at the sample point
    pub value: f64,
    pub row: u32,
    pub column: u32,
    /// Dimensions of the depth map the value came from
    pub width: u32,
    pub height: u32,
    /// Depth frame sequence number
    pub frame_index: u64,
    pub captured_at: DateTime<Local>,
}

impl DepthReading {
    pub fn new(point: SamplePoint, buffer: &DepthBuffer, frame_index: u64) -> Self {
        Self {
            value: point.value,
            row: point.row,
            column: point.column,
            width: buffer.width(),
            height: buffer.height(),
            frame_index,
            captured_at: Local::now(),
        }
    }

    /// Label text: shortest decimal that keeps a fractional part (`1.0`, `0.5`)
    pub fn label(&self) -> String {
        format!("{:?}", self.value)
    }
}

impl fmt::Display for DepthReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
