// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Stands in for the platform camera subsystem. It exposes two devices, a
//! color-only front camera and a dual camera that delivers depth, and renders
//! a deterministic scene: a sphere orbiting in front of a tilted plane.
//! Frames are produced in the sensor's native landscape orientation.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::types::*;
use super::{CameraBackend, DeviceConfiguration, FrameProducer, StreamConfig};
use crate::depth::{DepthBuffer, DepthData, DepthDataType};

const FRONT_CAMERA_PATH: &str = "synthetic:front:0";
const DUAL_CAMERA_PATH: &str = "synthetic:dual:0";

/// Nearest point of the orbiting sphere (meters)
const SPHERE_NEAR_M: f32 = 0.5;
const SPHERE_DEPTH_M: f32 = 0.4;
const SPHERE_RADIUS: f32 = 0.22;
/// Plane depth at the top and bottom edge of the sensor (meters)
const PLANE_NEAR_M: f32 = 1.2;
const PLANE_FAR_M: f32 = 3.6;
/// Orbit advance per frame (radians)
const ORBIT_STEP: f32 = 0.05;

/// What the synthetic dual camera looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Scene {
    /// Sphere orbiting in front of a tilted plane
    #[default]
    Orbit,
    /// Every depth sample holds `value`, in the device's native depth units
    Constant { value: f32 },
}

/// Synthetic backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub scene: Scene,
    /// Depth data type the dual camera delivers natively
    pub depth_data_type: DepthDataType,
    /// Expose the depth-capable dual camera
    pub depth_camera: bool,
    /// Stop after this many frame pairs
    pub frame_limit: Option<u64>,
    /// Pace frames to the configured frame duration
    pub realtime: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            scene: Scene::default(),
            depth_data_type: DepthDataType::DepthFloat32,
            depth_camera: true,
            frame_limit: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Default)]
struct DeviceSettings {
    min_frame_duration: Option<Duration>,
}

struct SyntheticCamera {
    device: CameraDevice,
    formats: Vec<CameraFormat>,
    settings: Mutex<DeviceSettings>,
}

/// Synthetic backend implementation
pub struct SyntheticBackend {
    config: SyntheticConfig,
    cameras: Vec<SyntheticCamera>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        let mut cameras = vec![SyntheticCamera {
            device: CameraDevice {
                name: "Synthetic Front Camera".to_string(),
                path: FRONT_CAMERA_PATH.to_string(),
                device_type: DeviceType::WideAngleCamera,
                position: CameraPosition::Front,
            },
            formats: vec![
                video_format(640, 480, Vec::new()),
                video_format(1280, 720, Vec::new()),
            ],
            settings: Mutex::new(DeviceSettings::default()),
        }];

        if config.depth_camera {
            let depth_type = config.depth_data_type;
            cameras.push(SyntheticCamera {
                device: CameraDevice {
                    name: "Synthetic Dual Camera".to_string(),
                    path: DUAL_CAMERA_PATH.to_string(),
                    device_type: DeviceType::DualCamera,
                    position: CameraPosition::Back,
                },
                formats: vec![
                    video_format(
                        640,
                        480,
                        vec![
                            depth_format(320, 240, depth_type),
                            depth_format(160, 120, depth_type),
                        ],
                    ),
                    video_format(1280, 960, vec![depth_format(320, 240, depth_type)]),
                    video_format(1920, 1080, Vec::new()),
                ],
                settings: Mutex::new(DeviceSettings::default()),
            });
        }

        info!(cameras = cameras.len(), scene = ?config.scene, "Synthetic backend ready");
        Self { config, cameras }
    }

    fn camera(&self, device: &CameraDevice) -> BackendResult<&SyntheticCamera> {
        self.cameras
            .iter()
            .find(|c| c.device.path == device.path)
            .ok_or_else(|| BackendError::DeviceNotFound(device.path.clone()))
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

fn video_format(width: u32, height: u32, depth_formats: Vec<DepthFormat>) -> CameraFormat {
    CameraFormat {
        width,
        height,
        framerate: Some(Framerate::from_int(30)),
        pixel_format: PixelFormat::BGRA,
        depth_formats,
    }
}

fn depth_format(width: u32, height: u32, data_type: DepthDataType) -> DepthFormat {
    DepthFormat {
        width,
        height,
        data_type,
        frame_rate_ranges: vec![FrameRateRange {
            min: Framerate::from_int(15),
            max: Framerate::from_int(30),
        }],
    }
}

struct SyntheticConfigurationLock<'a> {
    settings: MutexGuard<'a, DeviceSettings>,
}

impl DeviceConfiguration for SyntheticConfigurationLock<'_> {
    fn set_active_min_frame_duration(&mut self, duration: Duration) {
        self.settings.min_frame_duration = Some(duration);
    }

    fn active_min_frame_duration(&self) -> Option<Duration> {
        self.settings.min_frame_duration
    }
}

impl CameraBackend for SyntheticBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.cameras.iter().map(|c| c.device.clone()).collect()
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        self.camera(device)
            .map(|c| c.formats.clone())
            .unwrap_or_default()
    }

    fn lock_for_configuration<'a>(
        &'a self,
        device: &CameraDevice,
    ) -> BackendResult<Box<dyn DeviceConfiguration + 'a>> {
        let camera = self.camera(device)?;
        let settings = match camera.settings.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(BackendError::ConfigurationLocked(format!(
                    "{} is being configured elsewhere",
                    device.name
                )));
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(BackendError::ConfigurationLocked(format!(
                    "{} configuration is poisoned",
                    device.name
                )));
            }
        };
        debug!(device = %device.name, "Locked device for configuration");
        Ok(Box::new(SyntheticConfigurationLock { settings }))
    }

    fn open(
        &self,
        device: &CameraDevice,
        config: &StreamConfig,
    ) -> BackendResult<Box<dyn FrameProducer>> {
        let camera = self.camera(device)?;
        let format = camera
            .formats
            .iter()
            .find(|f| **f == config.video_format)
            .ok_or_else(|| BackendError::FormatNotSupported(config.video_format.to_string()))?;
        if !format.depth_formats.contains(&config.depth_format) {
            return Err(BackendError::FormatNotSupported(
                config.depth_format.to_string(),
            ));
        }

        let frame_duration = camera
            .settings
            .lock()
            .map_err(|_| BackendError::Other("device settings poisoned".to_string()))?
            .min_frame_duration
            .unwrap_or(config.min_frame_duration);

        info!(
            device = %device.name,
            video = %config.video_format,
            depth = %config.depth_format,
            ?frame_duration,
            "Opening synthetic stream"
        );

        Ok(Box::new(SyntheticProducer {
            scene: self.config.scene,
            video_size: (config.video_format.width, config.video_format.height),
            depth_format: config.depth_format.clone(),
            filtered: config.depth_filtering,
            frame_duration,
            realtime: self.config.realtime,
            frame_limit: self.config.frame_limit,
            sequence: 0,
            next_capture: Instant::now(),
            pending_depth: None,
        }))
    }
}

struct SyntheticProducer {
    scene: Scene,
    video_size: (u32, u32),
    depth_format: DepthFormat,
    filtered: bool,
    frame_duration: Duration,
    realtime: bool,
    frame_limit: Option<u64>,
    sequence: u64,
    next_capture: Instant,
    pending_depth: Option<DepthFrame>,
}

impl SyntheticProducer {
    fn phase(&self) -> f32 {
        self.sequence as f32 * ORBIT_STEP
    }

    fn wait_for_next_capture(&mut self) {
        if !self.realtime || self.frame_duration.is_zero() {
            return;
        }
        let now = Instant::now();
        if self.next_capture > now {
            std::thread::sleep(self.next_capture - now);
        }
        self.next_capture = self.next_capture.max(now) + self.frame_duration;
    }

    fn render_video(&self, captured_at: Instant) -> CameraFrame {
        let (width, height) = self.video_size;
        let phase = self.phase();
        let aspect = width as f32 / height as f32;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);

        for y in 0..height {
            let v = (y as f32 + 0.5) / height as f32;
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let [r, g, b] = match self.scene {
                    Scene::Orbit => match sphere_hit(u, v, aspect, phase) {
                        Some(z) => {
                            let shade = 0.35 + 0.65 * z;
                            [(235.0 * shade) as u8, (120.0 * shade) as u8, (40.0 * shade) as u8]
                        }
                        None => {
                            let floor = 60.0 + 120.0 * v;
                            [(floor * 0.4) as u8, (floor * 0.7) as u8, floor as u8]
                        }
                    },
                    Scene::Constant { .. } => [128, 128, 128],
                };
                data.extend_from_slice(&[b, g, r, 255]);
            }
        }

        CameraFrame {
            width,
            height,
            data: Arc::from(data),
            format: PixelFormat::BGRA,
            stride: width * 4,
            sequence: self.sequence,
            captured_at,
        }
    }

    fn render_depth(&self, captured_at: Instant) -> BackendResult<DepthFrame> {
        let (width, height) = (self.depth_format.width, self.depth_format.height);
        let data_type = self.depth_format.data_type;

        let data = match self.scene {
            Scene::Constant { value } => constant_depth(width, height, value, data_type),
            Scene::Orbit => {
                let phase = self.phase();
                let aspect = width as f32 / height as f32;
                let sequence = self.sequence;
                let filtered = self.filtered;
                DepthBuffer::from_fn(width, height, |y, x| {
                    if !filtered && is_hole(x, y, sequence) {
                        return 0.0;
                    }
                    let u = (x as f32 + 0.5) / width as f32;
                    let v = (y as f32 + 0.5) / height as f32;
                    match sphere_hit(u, v, aspect, phase) {
                        Some(z) => SPHERE_NEAR_M + SPHERE_DEPTH_M * (1.0 - z),
                        None => PLANE_NEAR_M + (PLANE_FAR_M - PLANE_NEAR_M) * v,
                    }
                })
                .and_then(|meters| DepthData::Meters(meters).converting(data_type))
            }
        }
        .map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(DepthFrame {
            data,
            filtered: self.filtered,
            sequence: self.sequence,
            captured_at,
        })
    }
}

impl FrameProducer for SyntheticProducer {
    fn next_sample(&mut self) -> BackendResult<CapturedSample> {
        if let Some(depth) = self.pending_depth.take() {
            return Ok(CapturedSample::Depth(depth));
        }
        if let Some(limit) = self.frame_limit
            && self.sequence >= limit
        {
            return Err(BackendError::EndOfStream);
        }

        self.wait_for_next_capture();
        let captured_at = Instant::now();
        let video = self.render_video(captured_at);
        self.pending_depth = Some(self.render_depth(captured_at)?);
        self.sequence += 1;

        Ok(CapturedSample::Video(video))
    }
}

/// Normalized sphere height (1 at the center, 0 at the rim) if (u, v) hits the sphere
fn sphere_hit(u: f32, v: f32, aspect: f32, phase: f32) -> Option<f32> {
    let cx = 0.5 + 0.25 * phase.cos();
    let cy = 0.5 + 0.2 * phase.sin();
    let dx = (u - cx) * aspect;
    let dy = v - cy;
    let d2 = (dx * dx + dy * dy) / (SPHERE_RADIUS * SPHERE_RADIUS);
    (d2 < 1.0).then(|| (1.0 - d2).sqrt())
}

/// Sparse pixels with no depth, as unfiltered stereo matching leaves behind
fn is_hole(x: u32, y: u32, sequence: u64) -> bool {
    (x as u64 * 31 + y as u64 * 17 + sequence) % 89 == 0
}

fn constant_depth(
    width: u32,
    height: u32,
    value: f32,
    data_type: DepthDataType,
) -> Result<DepthData, crate::errors::DepthError> {
    match data_type {
        DepthDataType::DisparityFloat32 => {
            DepthBuffer::filled(width, height, value).map(DepthData::Disparity)
        }
        DepthDataType::DepthFloat32 => {
            DepthBuffer::filled(width, height, value).map(DepthData::Meters)
        }
        DepthDataType::DepthMillimeters16 => {
            let mm = value.clamp(0.0, f32::from(u16::MAX)) as u16;
            DepthData::millimeters(width, height, vec![mm; width as usize * height as usize])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_camera(backend: &SyntheticBackend) -> CameraDevice {
        backend
            .enumerate_cameras()
            .into_iter()
            .find(|d| d.device_type.supports_depth())
            .unwrap()
    }

    fn stream_config(backend: &SyntheticBackend, device: &CameraDevice) -> StreamConfig {
        let format = backend.get_formats(device)[0].clone();
        let depth_format = format.depth_formats[0].clone();
        StreamConfig {
            video_format: format,
            depth_format,
            min_frame_duration: Duration::ZERO,
            depth_filtering: true,
        }
    }

    #[test]
    fn test_enumeration() {
        let backend = SyntheticBackend::default();
        let cameras = backend.enumerate_cameras();
        assert_eq!(cameras.len(), 2);
        assert!(!cameras[0].device_type.supports_depth());
        assert!(cameras[1].device_type.supports_depth());

        let without_depth = SyntheticBackend::new(SyntheticConfig {
            depth_camera: false,
            ..Default::default()
        });
        assert_eq!(without_depth.enumerate_cameras().len(), 1);
    }

    #[test]
    fn test_configuration_lock_is_exclusive() {
        let backend = SyntheticBackend::default();
        let device = dual_camera(&backend);

        let mut lock = backend.lock_for_configuration(&device).unwrap();
        lock.set_active_min_frame_duration(Duration::from_millis(40));
        assert!(matches!(
            backend.lock_for_configuration(&device),
            Err(BackendError::ConfigurationLocked(_))
        ));
        drop(lock);

        let lock = backend.lock_for_configuration(&device).unwrap();
        assert_eq!(
            lock.active_min_frame_duration(),
            Some(Duration::from_millis(40))
        );
    }

    #[test]
    fn test_producer_alternates_video_and_depth() {
        let backend = SyntheticBackend::new(SyntheticConfig {
            frame_limit: Some(2),
            realtime: false,
            ..Default::default()
        });
        let device = dual_camera(&backend);
        let config = stream_config(&backend, &device);
        let mut producer = backend.open(&device, &config).unwrap();

        let mut kinds = Vec::new();
        loop {
            match producer.next_sample() {
                Ok(CapturedSample::Video(frame)) => {
                    assert_eq!((frame.width, frame.height), (640, 480));
                    kinds.push(("video", frame.sequence));
                }
                Ok(CapturedSample::Depth(depth)) => {
                    assert_eq!((depth.data.width(), depth.data.height()), (320, 240));
                    assert_eq!(depth.data.data_type(), DepthDataType::DepthFloat32);
                    kinds.push(("depth", depth.sequence));
                }
                Err(BackendError::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(
            kinds,
            vec![("video", 0), ("depth", 0), ("video", 1), ("depth", 1)]
        );
    }

    #[test]
    fn test_constant_scene_in_native_units() {
        let backend = SyntheticBackend::new(SyntheticConfig {
            scene: Scene::Constant { value: -3.0 },
            depth_data_type: DepthDataType::DisparityFloat32,
            frame_limit: Some(1),
            realtime: false,
            ..Default::default()
        });
        let device = dual_camera(&backend);
        let config = stream_config(&backend, &device);
        let mut producer = backend.open(&device, &config).unwrap();

        let _video = producer.next_sample().unwrap();
        let CapturedSample::Depth(depth) = producer.next_sample().unwrap() else {
            panic!("expected depth sample");
        };
        let map = depth.data.depth_data_map().unwrap();
        assert!(map.as_slice().iter().all(|&v| v == -3.0));
    }

    #[test]
    fn test_unfiltered_depth_has_holes() {
        let backend = SyntheticBackend::new(SyntheticConfig {
            frame_limit: Some(1),
            realtime: false,
            ..Default::default()
        });
        let device = dual_camera(&backend);
        let mut config = stream_config(&backend, &device);
        config.depth_filtering = false;
        let mut producer = backend.open(&device, &config).unwrap();

        let _video = producer.next_sample().unwrap();
        let CapturedSample::Depth(depth) = producer.next_sample().unwrap() else {
            panic!("expected depth sample");
        };
        assert!(!depth.filtered);
        let map = depth.data.depth_data_map().unwrap();
        assert!(map.as_slice().iter().any(|&v| v == 0.0));
    }

    #[test]
    fn test_open_rejects_unknown_format() {
        let backend = SyntheticBackend::default();
        let device = dual_camera(&backend);
        let mut config = stream_config(&backend, &device);
        config.depth_format.width = 99;
        assert!(matches!(
            backend.open(&device, &config),
            Err(BackendError::FormatNotSupported(_))
        ));
    }

    #[test]
    fn test_sphere_hit() {
        // phase 0: sphere centered at (0.75, 0.5)
        assert_eq!(sphere_hit(0.75, 0.5, 1.0, 0.0), Some(1.0));
        assert_eq!(sphere_hit(0.1, 0.1, 1.0, 0.0), None);
    }
}
