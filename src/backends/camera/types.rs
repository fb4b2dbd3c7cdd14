// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::depth::{DepthData, DepthDataType};
use crate::errors::CameraError;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackendType {
    /// Generated color + depth frames, no hardware required
    #[default]
    Synthetic,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Output orientation of a capture connection
///
/// Sensors deliver frames in landscape-right (native) orientation; every other
/// orientation is a clockwise rotation of that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// 90 degrees clockwise from the sensor
    #[default]
    Portrait,
    /// 270 degrees clockwise from the sensor
    PortraitUpsideDown,
    /// Sensor orientation, no rotation
    LandscapeRight,
    /// 180 degrees
    LandscapeLeft,
}

impl Orientation {
    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitUpsideDown)
    }

    /// Dimensions of a `width` x `height` sensor frame after rotation
    pub fn oriented_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Source (row, column) in a `width` x `height` sensor frame for output pixel (y, x)
    pub fn source_coords(&self, y: u32, x: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Orientation::LandscapeRight => (y, x),
            Orientation::Portrait => (height - 1 - x, y),
            Orientation::LandscapeLeft => (height - 1 - y, width - 1 - x),
            Orientation::PortraitUpsideDown => (x, width - 1 - y),
        }
    }

    /// Rotate a row-major plane of `T`, returning (data, width, height)
    ///
    /// The output is tightly packed. Missing source elements (short buffers)
    /// come out as `T::default()`.
    pub fn rotate_plane<T: Copy + Default>(
        &self,
        data: &[T],
        width: u32,
        height: u32,
        stride: u32,
    ) -> (Vec<T>, u32, u32) {
        let (out_w, out_h) = self.oriented_size(width, height);
        let mut out = Vec::with_capacity(out_w as usize * out_h as usize);
        for y in 0..out_h {
            for x in 0..out_w {
                let (sy, sx) = self.source_coords(y, x, width, height);
                let index = sy as usize * stride as usize + sx as usize;
                out.push(data.get(index).copied().unwrap_or_default());
            }
        }
        (out, out_w, out_h)
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::PortraitUpsideDown => write!(f, "portrait upside down"),
            Orientation::LandscapeRight => write!(f, "landscape right"),
            Orientation::LandscapeLeft => write!(f, "landscape left"),
        }
    }
}

/// Which side of the device a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPosition {
    Front,
    Back,
    #[default]
    Unspecified,
}

/// Physical camera kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Two rear sensors; depth from stereo disparity
    DualCamera,
    /// Single wide-angle sensor, color only
    WideAngleCamera,
}

impl DeviceType {
    pub fn supports_depth(&self) -> bool {
        matches!(self, DeviceType::DualCamera)
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    pub name: String,
    /// Backend-specific device identifier
    pub path: String,
    pub device_type: DeviceType,
    pub position: CameraPosition,
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Time between two frames at this rate
    pub fn frame_duration(&self) -> Duration {
        if self.num == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.denom as f64 / self.num as f64)
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Supported frame rate range of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateRange {
    pub min: Framerate,
    pub max: Framerate,
}

impl FrameRateRange {
    /// Shortest frame duration in the range (the maximum rate)
    pub fn min_frame_duration(&self) -> Duration {
        self.max.frame_duration()
    }
}

/// A depth format available alongside a video format
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFormat {
    pub width: u32,
    pub height: u32,
    pub data_type: DepthDataType,
    pub frame_rate_ranges: Vec<FrameRateRange>,
}

impl std::fmt::Display for DepthFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.data_type)?;
        if let Some(range) = self.frame_rate_ranges.first() {
            write!(f, " @ {}-{}fps", range.min, range.max)?;
        }
        Ok(())
    }
}

/// Pixel format of color frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit B G R A byte order
    BGRA,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        4
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::BGRA => write!(f, "BGRA"),
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    pub pixel_format: PixelFormat,
    /// Depth formats deliverable together with this video format
    pub depth_formats: Vec<DepthFormat>,
}

impl CameraFormat {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn supports_depth(&self) -> bool {
        !self.depth_formats.is_empty()
    }
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(f, "{}x{} @ {}fps", self.width, self.height, fps)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// A single color frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Packed pixel data, `stride` bytes per row
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub sequence: u64,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Copy of this frame rotated into `orientation`
    pub fn rotated(&self, orientation: Orientation) -> Self {
        if orientation == Orientation::LandscapeRight {
            return self.clone();
        }
        let stride_px = self.stride / self.format.bytes_per_pixel();
        let usable = (self.data.len() / 4) * 4;
        let pixels: &[[u8; 4]] = bytemuck::cast_slice(&self.data[..usable]);
        let (rotated, width, height) =
            orientation.rotate_plane(pixels, self.width, self.height, stride_px);
        let bytes: Vec<u8> = bytemuck::cast_slice::<[u8; 4], u8>(&rotated).to_vec();
        Self {
            width,
            height,
            data: Arc::from(bytes),
            format: self.format,
            stride: width * self.format.bytes_per_pixel(),
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }

    /// RGBA bytes of pixel (x, y), black if out of range
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 255];
        }
        let idx = (y * self.stride + x * 4) as usize;
        match self.data.get(idx..idx + 4) {
            Some(&[b0, b1, b2, b3]) => match self.format {
                PixelFormat::BGRA => [b2, b1, b0, b3],
            },
            _ => [0, 0, 0, 255],
        }
    }
}

/// One depth frame as delivered by the depth output
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub data: DepthData,
    /// Whether the backend applied temporal/hole filtering
    pub filtered: bool,
    pub sequence: u64,
    pub captured_at: Instant,
}

/// A sample delivered by a frame producer
#[derive(Debug, Clone)]
pub enum CapturedSample {
    Video(CameraFrame),
    Depth(DepthFrame),
}

/// Frame receiver type for the color stream
pub type FrameReceiver = tokio::sync::mpsc::Receiver<CameraFrame>;

/// Frame sender type for the color stream
pub type FrameSender = tokio::sync::mpsc::Sender<CameraFrame>;

/// Receiver type for the depth stream
pub type DepthReceiver = tokio::sync::mpsc::Receiver<DepthFrame>;

/// Sender type for the depth stream
pub type DepthSender = tokio::sync::mpsc::Sender<DepthFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Device configuration is held elsewhere
    ConfigurationLocked(String),
    /// The producer has no more frames
    EndOfStream,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::ConfigurationLocked(msg) => write!(f, "Configuration locked: {}", msg),
            BackendError::EndOfStream => write!(f, "End of stream"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ConfigurationLocked(msg) => CameraError::ConfigurationLockFailed(msg),
            BackendError::InitializationFailed(msg) => CameraError::InitializationFailed(msg),
            BackendError::FormatNotSupported(msg) => CameraError::InvalidFormat(msg),
            BackendError::EndOfStream => CameraError::Disconnected,
            other => CameraError::BackendError(other.to_string()),
        }
    }
}
