// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth sample application

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera and capture session errors
    Camera(CameraError),
    /// Depth buffer errors
    Depth(DepthError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Cameras exist but none can deliver depth data
    NoDepthCamera,
    /// Configured camera index does not exist
    IndexOutOfRange { index: usize, count: usize },
    /// Camera initialization failed
    InitializationFailed(String),
    /// Device configuration could not be locked
    ConfigurationLockFailed(String),
    /// Invalid or missing camera format
    InvalidFormat(String),
    /// Backend error
    BackendError(String),
    /// Camera stopped delivering frames
    Disconnected,
    /// No depth frame arrived within the given time
    NoDepthFrames(std::time::Duration),
}

/// Depth buffer errors
#[derive(Debug, Clone, PartialEq)]
pub enum DepthError {
    /// Sample payload does not match the declared dimensions
    SizeMismatch { expected: usize, actual: usize },
    /// Width, height or stride cannot describe a buffer
    InvalidDimensions { width: u32, height: u32, stride: u32 },
    /// Flat index lies outside the buffer
    IndexOutOfRange { index: usize, len: usize },
    /// Index lands in row padding rather than on a pixel
    IndexInPadding { index: usize, stride: u32, width: u32 },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Depth(e) => write!(f, "Depth error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::NoDepthCamera => write!(f, "No depth video camera available"),
            CameraError::IndexOutOfRange { index, count } => {
                write!(f, "Camera index {} out of range ({} cameras)", index, count)
            }
            CameraError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CameraError::ConfigurationLockFailed(msg) => {
                write!(f, "Could not lock device for configuration: {}", msg)
            }
            CameraError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            CameraError::BackendError(msg) => write!(f, "Backend error: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::NoDepthFrames(waited) => {
                write!(f, "No depth frames received from camera within {:?}", waited)
            }
        }
    }
}

impl fmt::Display for DepthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthError::SizeMismatch { expected, actual } => {
                write!(f, "Expected {} samples, got {}", expected, actual)
            }
            DepthError::InvalidDimensions {
                width,
                height,
                stride,
            } => write!(
                f,
                "Invalid dimensions {}x{} (stride {})",
                width, height, stride
            ),
            DepthError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for buffer of {} values", index, len)
            }
            DepthError::IndexInPadding {
                index,
                stride,
                width,
            } => write!(
                f,
                "Index {} falls in row padding (stride {}, width {})",
                index, stride, width
            ),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for DepthError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<DepthError> for AppError {
    fn from(err: DepthError) -> Self {
        AppError::Depth(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
