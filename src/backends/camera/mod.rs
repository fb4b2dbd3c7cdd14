// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    CaptureSession   │  ← device selection, outputs, orientation, frame rate
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← enumeration, configuration lock, frame producers
//! └──────────┬──────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ Synthetic │  ← generated color + depth scene
//!      └───────────┘
//! ```

pub mod frame_loop;
pub mod session;
pub mod synthetic;
pub mod types;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use session::{CaptureSession, SessionConfig, SessionPreset, SessionStreams};
pub use synthetic::{Scene, SyntheticBackend, SyntheticConfig};
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

/// Everything a backend needs to start delivering frames
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub video_format: CameraFormat,
    pub depth_format: DepthFormat,
    /// Shortest interval between two captured frame pairs
    pub min_frame_duration: Duration,
    /// Fill holes / smooth depth over time before delivery
    pub depth_filtering: bool,
}

/// Source of captured samples for one open device
///
/// Samples come out in capture order; a depth sample follows the video sample
/// captured at the same instant.
pub trait FrameProducer: Send {
    /// Block until the next sample is available
    ///
    /// Returns `BackendError::EndOfStream` once the device stops delivering.
    fn next_sample(&mut self) -> BackendResult<CapturedSample>;
}

/// Exclusive access to a device's configuration
///
/// The configuration is released when this value is dropped.
pub trait DeviceConfiguration {
    /// Limit the capture rate by setting the shortest frame interval
    fn set_active_min_frame_duration(&mut self, duration: Duration);

    fn active_min_frame_duration(&self) -> Option<Duration>;
}

/// Camera backend trait
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend can deliver frames on the current system
    fn is_available(&self) -> bool;

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Supported video formats (with their companion depth formats) of a device
    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat>;

    /// Take exclusive access to the device configuration
    ///
    /// Fails with `BackendError::ConfigurationLocked` if another holder has it.
    fn lock_for_configuration<'a>(
        &'a self,
        device: &CameraDevice,
    ) -> BackendResult<Box<dyn DeviceConfiguration + 'a>>;

    /// Open a device and start producing samples
    fn open(
        &self,
        device: &CameraDevice,
        config: &StreamConfig,
    ) -> BackendResult<Box<dyn FrameProducer>>;
}

/// Get a backend instance for the given type
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
    synthetic: &SyntheticConfig,
) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::Synthetic => Arc::new(SyntheticBackend::new(synthetic.clone())),
    }
}
