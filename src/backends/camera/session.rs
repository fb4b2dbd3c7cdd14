// SPDX-License-Identifier: GPL-3.0-only

//! Capture session configuration
//!
//! A session binds one depth-capable camera to two outputs, color frames and
//! depth frames, both oriented to portrait. Starting the session spawns the
//! capture thread, which routes each sample to its stream's channel in
//! capture order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender, error::TrySendError};
use tracing::{debug, info, warn};

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::{CameraBackend, FrameProducer, StreamConfig};
use crate::constants::DEFAULT_FRAME_CHANNEL_CAPACITY;
use crate::errors::{AppResult, CameraError};

/// Resolution preset for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPreset {
    /// Highest-resolution video format that carries depth
    #[default]
    Photo,
    /// Smallest video format that carries depth
    Low,
}

impl std::fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPreset::Photo => write!(f, "photo"),
            SessionPreset::Low => write!(f, "low"),
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub preset: SessionPreset,
    /// Pin a camera by enumeration index instead of taking the first depth camera
    pub camera_index: Option<usize>,
    /// Orientation of both output connections
    pub orientation: Orientation,
    pub depth_filtering: bool,
    /// Capacity of each per-stream frame channel
    pub frame_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preset: SessionPreset::default(),
            camera_index: None,
            orientation: Orientation::Portrait,
            depth_filtering: true,
            frame_channel_capacity: DEFAULT_FRAME_CHANNEL_CAPACITY,
        }
    }
}

/// Color output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDataOutput {
    pub pixel_format: PixelFormat,
    pub orientation: Orientation,
}

/// Depth output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthDataOutput {
    pub filtering_enabled: bool,
    pub orientation: Orientation,
}

/// Receiving ends of a running session
pub struct SessionStreams {
    pub video: FrameReceiver,
    pub depth: DepthReceiver,
}

/// A configured camera with a color and a depth output
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    device: CameraDevice,
    video_output: VideoDataOutput,
    depth_output: DepthDataOutput,
    stream: StreamConfig,
    scale: f32,
    frame_channel_capacity: usize,
    capture_loop: Option<CaptureLoopController>,
}

impl CaptureSession {
    /// Select a depth camera and configure both outputs
    ///
    /// Fails instead of falling back when no depth camera exists, when no
    /// format carries depth, or when the device configuration is locked.
    pub fn configure(backend: Arc<dyn CameraBackend>, config: &SessionConfig) -> AppResult<Self> {
        if !backend.is_available() {
            let err = BackendError::NotAvailable(backend.backend_type().to_string());
            return Err(CameraError::from(err).into());
        }
        let device = select_device(backend.as_ref(), config.camera_index)?;

        let formats = backend.get_formats(&device);
        let video_format = select_video_format(&formats, config.preset).ok_or_else(|| {
            CameraError::InvalidFormat(format!("{} has no video format with depth", device.name))
        })?;

        let depth_format = video_format
            .depth_formats
            .iter()
            .max_by_key(|d| d.width as u64 * d.height as u64)
            .cloned()
            .ok_or_else(|| CameraError::InvalidFormat(format!("{} has no depth", video_format)))?;

        let video_output = VideoDataOutput {
            pixel_format: PixelFormat::BGRA,
            orientation: config.orientation,
        };
        let depth_output = DepthDataOutput {
            filtering_enabled: config.depth_filtering,
            orientation: config.orientation,
        };

        let (video_w, video_h) = config
            .orientation
            .oriented_size(video_format.width, video_format.height);
        let (depth_w, depth_h) = config
            .orientation
            .oriented_size(depth_format.width, depth_format.height);
        let scale = video_w.max(video_h) as f32 / depth_w.max(depth_h) as f32;

        let range = depth_format.frame_rate_ranges.first().ok_or_else(|| {
            CameraError::InvalidFormat(format!("{} has no frame rate ranges", depth_format))
        })?;
        let min_frame_duration = range.min_frame_duration();
        {
            let mut lock = backend
                .lock_for_configuration(&device)
                .map_err(CameraError::from)?;
            lock.set_active_min_frame_duration(min_frame_duration);
        }

        info!(
            device = %device.name,
            preset = %config.preset,
            video = %video_format,
            depth = %depth_format,
            orientation = %config.orientation,
            scale,
            ?min_frame_duration,
            "Capture session configured"
        );

        Ok(Self {
            backend,
            device,
            video_output,
            depth_output,
            stream: StreamConfig {
                video_format,
                depth_format,
                min_frame_duration,
                depth_filtering: config.depth_filtering,
            },
            scale,
            frame_channel_capacity: config.frame_channel_capacity.max(1),
            capture_loop: None,
        })
    }

    /// Open the device and start routing samples to the returned channels
    pub fn start_running(&mut self) -> AppResult<SessionStreams> {
        if self.is_running() {
            return Err(CameraError::InitializationFailed("session already running".into()).into());
        }

        let producer = self
            .backend
            .open(&self.device, &self.stream)
            .map_err(CameraError::from)?;

        let (video_tx, video_rx) = mpsc::channel(self.frame_channel_capacity);
        let (depth_tx, depth_rx) = mpsc::channel(self.frame_channel_capacity);

        let state = SampleRouter {
            producer,
            video_tx: Some(video_tx),
            depth_tx: Some(depth_tx),
            video_orientation: self.video_output.orientation,
            depth_orientation: self.depth_output.orientation,
        };

        self.capture_loop = Some(CaptureLoopController::start_with_init(
            "capture",
            move || Ok(state),
            |router: &mut SampleRouter, stop: &AtomicBool| router.route_next(stop),
        ));

        info!(device = %self.device.name, "Capture session running");
        Ok(SessionStreams {
            video: video_rx,
            depth: depth_rx,
        })
    }

    /// Stop capturing and join the capture thread
    pub fn stop_running(&mut self) {
        if let Some(mut capture_loop) = self.capture_loop.take() {
            capture_loop.stop();
            info!(device = %self.device.name, "Capture session stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.capture_loop
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn video_format(&self) -> &CameraFormat {
        &self.stream.video_format
    }

    /// Active depth format, in sensor orientation
    pub fn depth_format(&self) -> &DepthFormat {
        &self.stream.depth_format
    }

    pub fn video_output(&self) -> VideoDataOutput {
        self.video_output
    }

    pub fn depth_output(&self) -> DepthDataOutput {
        self.depth_output
    }

    /// Ratio of the longest video side to the longest depth side
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn min_frame_duration(&self) -> Duration {
        self.stream.min_frame_duration
    }

    /// Video frame size as delivered (after orientation)
    pub fn video_size(&self) -> (u32, u32) {
        self.video_output
            .orientation
            .oriented_size(self.stream.video_format.width, self.stream.video_format.height)
    }

    /// Depth frame size as delivered (after orientation)
    pub fn depth_size(&self) -> (u32, u32) {
        self.depth_output
            .orientation
            .oriented_size(self.stream.depth_format.width, self.stream.depth_format.height)
    }

    /// Map a depth-map cell onto the video frame, returning (x, y)
    pub fn depth_to_video(&self, row: u32, column: u32) -> (u32, u32) {
        let (video_w, video_h) = self.video_size();
        let x = (column as f32 * self.scale) as u32;
        let y = (row as f32 * self.scale) as u32;
        (x.min(video_w.saturating_sub(1)), y.min(video_h.saturating_sub(1)))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn select_device(backend: &dyn CameraBackend, index: Option<usize>) -> AppResult<CameraDevice> {
    let cameras = backend.enumerate_cameras();
    if cameras.is_empty() {
        return Err(CameraError::NoCameraFound.into());
    }

    let device = match index {
        Some(index) => cameras
            .get(index)
            .cloned()
            .ok_or(CameraError::IndexOutOfRange {
                index,
                count: cameras.len(),
            })?,
        None => cameras
            .iter()
            .find(|d| d.device_type.supports_depth())
            .cloned()
            .ok_or(CameraError::NoDepthCamera)?,
    };

    if !device.device_type.supports_depth() {
        warn!(device = %device.name, "Selected camera cannot deliver depth");
        return Err(CameraError::NoDepthCamera.into());
    }
    debug!(device = %device.name, path = %device.path, "Selected camera");
    Ok(device)
}

fn select_video_format(formats: &[CameraFormat], preset: SessionPreset) -> Option<CameraFormat> {
    let with_depth = formats.iter().filter(|f| f.supports_depth());
    match preset {
        SessionPreset::Photo => with_depth.max_by_key(|f| f.pixel_count()),
        SessionPreset::Low => with_depth.min_by_key(|f| f.pixel_count()),
    }
    .cloned()
}

/// Capture-thread state: pulls samples and hands them to the stream channels
struct SampleRouter {
    producer: Box<dyn FrameProducer>,
    video_tx: Option<FrameSender>,
    depth_tx: Option<DepthSender>,
    video_orientation: Orientation,
    depth_orientation: Orientation,
}

impl SampleRouter {
    fn route_next(&mut self, stop: &AtomicBool) -> LoopAction {
        match self.producer.next_sample() {
            Ok(CapturedSample::Video(frame)) => {
                let frame = frame.rotated(self.video_orientation);
                deliver(&mut self.video_tx, frame, stop, "video");
            }
            Ok(CapturedSample::Depth(depth)) => {
                let depth = DepthFrame {
                    data: depth.data.rotated(self.depth_orientation),
                    ..depth
                };
                deliver(&mut self.depth_tx, depth, stop, "depth");
            }
            Err(BackendError::EndOfStream) => {
                info!("Camera reached end of stream");
                return LoopAction::Stop;
            }
            Err(e) => {
                warn!(error = %e, "Capture failed");
                return LoopAction::Stop;
            }
        }

        if self.video_tx.is_none() && self.depth_tx.is_none() {
            debug!("All stream receivers closed");
            LoopAction::Stop
        } else {
            LoopAction::Continue
        }
    }
}

/// Wait between send attempts on a full stream channel
const DELIVERY_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Send `item` in order, waiting while the channel is full
///
/// The wait polls: `try_send` is retried every [`DELIVERY_RETRY_INTERVAL`]
/// with the stop flag checked between attempts, so `stop_running` can join
/// the capture thread even while a live receiver is not being read. On stop
/// the item is dropped and the sender kept. A closed channel drops its sender
/// so the other stream keeps flowing.
fn deliver<T>(sender: &mut Option<Sender<T>>, item: T, stop: &AtomicBool, stream: &str) {
    let Some(tx) = sender.as_ref() else {
        return;
    };
    let mut item = item;
    let closed = loop {
        match tx.try_send(item) {
            Ok(()) => break false,
            Err(TrySendError::Full(back)) => {
                if stop.load(Ordering::SeqCst) {
                    break false;
                }
                item = back;
                std::thread::sleep(DELIVERY_RETRY_INTERVAL);
            }
            Err(TrySendError::Closed(_)) => break true,
        }
    };
    if closed {
        debug!(stream, "Stream receiver closed");
        *sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{SyntheticBackend, SyntheticConfig};
    use crate::errors::AppError;

    fn backend(config: SyntheticConfig) -> Arc<dyn CameraBackend> {
        Arc::new(SyntheticBackend::new(config))
    }

    #[test]
    fn test_deliver_on_full_channel_returns_once_stopped() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(1u32).unwrap();
        let mut sender = Some(tx);
        let stop = AtomicBool::new(true);

        deliver(&mut sender, 2, &stop, "video");

        assert!(sender.is_some());
        assert_eq!(rx.try_recv().ok(), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_waits_for_capacity() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(1u32).unwrap();
        let mut sender = Some(tx);
        let stop = AtomicBool::new(false);

        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let first = rx.blocking_recv();
            let second = rx.blocking_recv();
            (first, second)
        });
        deliver(&mut sender, 2, &stop, "depth");
        drop(sender);

        assert_eq!(reader.join().unwrap(), (Some(1), Some(2)));
    }

    #[test]
    fn test_deliver_drops_sender_of_closed_channel() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);
        let mut sender = Some(tx);

        deliver(&mut sender, 1, &AtomicBool::new(false), "depth");
        assert!(sender.is_none());

        // No sender left: later items are discarded without waiting
        deliver(&mut sender, 2, &AtomicBool::new(false), "depth");
        assert!(sender.is_none());
    }

    #[test]
    fn test_photo_preset_configuration() {
        let backend = backend(SyntheticConfig::default());
        let session = CaptureSession::configure(backend.clone(), &SessionConfig::default()).unwrap();

        assert_eq!(session.device().name, "Synthetic Dual Camera");
        assert_eq!(
            (session.video_format().width, session.video_format().height),
            (1280, 960)
        );
        assert_eq!(session.video_size(), (960, 1280));
        assert_eq!(session.depth_size(), (240, 320));
        assert_eq!(session.scale(), 4.0);
        assert_eq!(session.video_output().pixel_format, PixelFormat::BGRA);
        assert!(session.depth_output().filtering_enabled);
        assert_eq!(session.depth_to_video(160, 120), (480, 640));

        let expected = Duration::from_secs_f64(1.0 / 30.0);
        assert_eq!(session.min_frame_duration(), expected);
        let lock = backend.lock_for_configuration(session.device()).unwrap();
        assert_eq!(lock.active_min_frame_duration(), Some(expected));
    }

    #[test]
    fn test_low_preset_picks_largest_depth_format() {
        let config = SessionConfig {
            preset: SessionPreset::Low,
            ..Default::default()
        };
        let session = CaptureSession::configure(backend(SyntheticConfig::default()), &config).unwrap();
        assert_eq!(session.video_size(), (480, 640));
        assert_eq!(session.depth_size(), (240, 320));
        assert_eq!(session.scale(), 2.0);
    }

    #[test]
    fn test_landscape_keeps_sensor_dimensions() {
        let config = SessionConfig {
            orientation: Orientation::LandscapeRight,
            ..Default::default()
        };
        let session = CaptureSession::configure(backend(SyntheticConfig::default()), &config).unwrap();
        assert_eq!(session.depth_size(), (320, 240));
        assert_eq!(session.scale(), 4.0);
    }

    #[test]
    fn test_missing_depth_camera_is_an_error() {
        let no_depth = backend(SyntheticConfig {
            depth_camera: false,
            ..Default::default()
        });
        let err = CaptureSession::configure(no_depth, &SessionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Camera(CameraError::NoDepthCamera)));

        let pinned_front = SessionConfig {
            camera_index: Some(0),
            ..Default::default()
        };
        let err = CaptureSession::configure(backend(SyntheticConfig::default()), &pinned_front)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Camera(CameraError::NoDepthCamera)));

        let out_of_range = SessionConfig {
            camera_index: Some(5),
            ..Default::default()
        };
        let err = CaptureSession::configure(backend(SyntheticConfig::default()), &out_of_range)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::Camera(CameraError::IndexOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_locked_configuration_is_an_error() {
        let backend = backend(SyntheticConfig::default());
        let device = backend
            .enumerate_cameras()
            .into_iter()
            .find(|d| d.device_type.supports_depth())
            .unwrap();
        let _held = backend.lock_for_configuration(&device).unwrap();

        let err = CaptureSession::configure(backend.clone(), &SessionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::Camera(CameraError::ConfigurationLockFailed(_))
        ));
    }

    #[test]
    fn test_running_session_delivers_oriented_frames_in_order() {
        let backend = backend(SyntheticConfig {
            frame_limit: Some(3),
            realtime: false,
            ..Default::default()
        });
        let mut session = CaptureSession::configure(backend, &SessionConfig::default()).unwrap();
        let mut streams = session.start_running().unwrap();

        let mut video = Vec::new();
        while let Some(frame) = streams.video.blocking_recv() {
            assert_eq!((frame.width, frame.height), (960, 1280));
            video.push(frame.sequence);
        }
        let mut depth = Vec::new();
        while let Some(frame) = streams.depth.blocking_recv() {
            assert_eq!((frame.data.width(), frame.data.height()), (240, 320));
            depth.push(frame.sequence);
        }

        assert_eq!(video, vec![0, 1, 2]);
        assert_eq!(depth, vec![0, 1, 2]);
        session.stop_running();
        assert!(!session.is_running());
    }

    #[test]
    fn test_closed_video_stream_keeps_depth_flowing() {
        let backend = backend(SyntheticConfig {
            frame_limit: Some(4),
            realtime: false,
            ..Default::default()
        });
        let config = SessionConfig {
            frame_channel_capacity: 1,
            ..Default::default()
        };
        let mut session = CaptureSession::configure(backend, &config).unwrap();
        let SessionStreams { video, mut depth } = session.start_running().unwrap();
        drop(video);

        let mut count = 0;
        while depth.blocking_recv().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }
}
