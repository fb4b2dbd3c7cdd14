// SPDX-License-Identifier: GPL-3.0-only

//! Frame handlers and UI delivery
//!
//! ```text
//!                 ┌──────────────┐  video  ┌───────────────┐
//! capture thread ─┤ FrameSender  ├────────▶│ video handler ├──┐
//!                 │ DepthSender  ├────────▶│ depth handler ├──┤ UiUpdate
//!                 └──────────────┘  depth  └───────────────┘  ▼
//!                                                         UI receiver
//! ```
//!
//! Each stream has its own task, so frames of one stream are handled in
//! order while the two streams run independently. Results reach the UI over
//! one bounded channel; the UI keeps whichever update arrived last.

use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backends::camera::{CameraFrame, CaptureSession, DepthFrame, DepthReceiver, FrameReceiver};
use crate::constants::DEFAULT_UI_CHANNEL_CAPACITY;
use crate::depth::{
    DepthBuffer, DepthColormap, DepthReading, SampleStrategy, clamp_and_sample, disparity_to_image,
};
use crate::errors::{AppError, AppResult, CameraError, DepthError};

/// Something the UI should show
#[derive(Debug, Clone)]
pub enum UiUpdate {
    /// New color preview
    Preview { image: Arc<RgbaImage>, sequence: u64 },
    /// New depth reading with the depth map it came from
    Depth {
        reading: DepthReading,
        /// Clamped disparity map
        buffer: Arc<DepthBuffer>,
        /// `buffer` rendered with the configured colormap
        image: Arc<RgbaImage>,
    },
    /// The depth frame arrived but no reading could be taken
    SampleFailed { sequence: u64, message: String },
}

/// Outcome of one depth frame, as seen by a reading consumer
#[derive(Debug, Clone)]
pub enum ReadingEvent {
    Reading(DepthReading),
    /// No reading could be taken from frame `sequence`
    Failed { sequence: u64, message: String },
}

/// A color preview and the first depth reading that followed it
#[derive(Debug, Clone)]
pub struct FramePair {
    pub preview: Arc<RgbaImage>,
    pub preview_sequence: u64,
    pub reading: DepthReading,
    /// Clamped disparity map
    pub buffer: Arc<DepthBuffer>,
    /// `buffer` rendered with the configured colormap
    pub image: Arc<RgbaImage>,
}

/// Handler settings
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub strategy: SampleStrategy,
    pub colormap: DepthColormap,
    pub ui_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: SampleStrategy::default(),
            colormap: DepthColormap::default(),
            ui_channel_capacity: DEFAULT_UI_CHANNEL_CAPACITY,
        }
    }
}

/// Result of handling one depth frame
#[derive(Debug, Clone)]
pub struct ProcessedDepth {
    pub reading: DepthReading,
    pub buffer: DepthBuffer,
    pub image: RgbaImage,
}

/// Wrap a color frame as a displayable RGBA image
pub fn handle_video_frame(frame: &CameraFrame) -> RgbaImage {
    RgbaImage::from_fn(frame.width, frame.height, |x, y| Rgba(frame.rgba_at(x, y)))
}

/// Convert to disparity, clamp, sample and render one depth frame
pub fn handle_depth_frame(
    frame: DepthFrame,
    strategy: SampleStrategy,
    colormap: DepthColormap,
) -> Result<ProcessedDepth, DepthError> {
    let sequence = frame.sequence;
    let (buffer, point) = clamp_and_sample(frame.data, strategy)?;
    let reading = DepthReading::new(point, &buffer, sequence);
    let image = disparity_to_image(&buffer, colormap);
    Ok(ProcessedDepth {
        reading,
        buffer,
        image,
    })
}

async fn run_video_handler(mut frames: FrameReceiver, ui: Sender<UiUpdate>) {
    while let Some(frame) = frames.recv().await {
        let update = UiUpdate::Preview {
            image: Arc::new(handle_video_frame(&frame)),
            sequence: frame.sequence,
        };
        if ui.send(update).await.is_err() {
            debug!("UI closed, stopping video handler");
            break;
        }
    }
    debug!("Video handler finished");
}

async fn run_depth_handler(mut frames: DepthReceiver, ui: Sender<UiUpdate>, config: PipelineConfig) {
    while let Some(frame) = frames.recv().await {
        let sequence = frame.sequence;
        let update = match handle_depth_frame(frame, config.strategy, config.colormap) {
            Ok(processed) => UiUpdate::Depth {
                reading: processed.reading,
                buffer: Arc::new(processed.buffer),
                image: Arc::new(processed.image),
            },
            Err(e) => {
                warn!(sequence, strategy = %config.strategy, error = %e, "Depth sample failed");
                UiUpdate::SampleFailed {
                    sequence,
                    message: e.to_string(),
                }
            }
        };
        if ui.send(update).await.is_err() {
            debug!("UI closed, stopping depth handler");
            break;
        }
    }
    debug!("Depth handler finished");
}

/// A running session with its handler tasks
pub struct Pipeline {
    session: CaptureSession,
    updates: Receiver<UiUpdate>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the session and spawn one handler task per stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut session: CaptureSession, config: PipelineConfig) -> AppResult<Self> {
        let streams = session.start_running()?;
        let (ui_tx, updates) = mpsc::channel(config.ui_channel_capacity.max(1));

        let tasks = vec![
            tokio::spawn(run_video_handler(streams.video, ui_tx.clone())),
            tokio::spawn(run_depth_handler(streams.depth, ui_tx, config)),
        ];

        info!(strategy = %config.strategy, colormap = ?config.colormap, "Pipeline started");
        Ok(Self {
            session,
            updates,
            tasks,
        })
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Next update, or `None` once both handlers are done
    pub async fn recv(&mut self) -> Option<UiUpdate> {
        self.updates.recv().await
    }

    /// Every update that is ready right now, oldest first
    pub fn drain(&mut self) -> Vec<UiUpdate> {
        let mut pending = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            pending.push(update);
        }
        pending
    }

    /// Next depth outcome, skipping previews
    ///
    /// `Ok(None)` once both handlers are done. Fails with
    /// [`CameraError::NoDepthFrames`] when nothing arrives within `patience`.
    /// Cancel-safe.
    pub async fn next_reading(&mut self, patience: Duration) -> AppResult<Option<ReadingEvent>> {
        let next = async {
            while let Some(update) = self.updates.recv().await {
                match update {
                    UiUpdate::Preview { .. } => {}
                    UiUpdate::Depth { reading, .. } => return Some(ReadingEvent::Reading(reading)),
                    UiUpdate::SampleFailed { sequence, message } => {
                        return Some(ReadingEvent::Failed { sequence, message });
                    }
                }
            }
            None
        };
        tokio::time::timeout(patience, next)
            .await
            .map_err(|_| AppError::from(CameraError::NoDepthFrames(patience)))
    }

    /// Wait for a preview and the first depth reading after it
    ///
    /// Depth readings that arrive before any preview are skipped, as are
    /// failed samples. `None` if the handlers finish first.
    pub async fn next_frame_pair(&mut self) -> Option<FramePair> {
        let mut preview = None;
        while let Some(update) = self.updates.recv().await {
            match (update, preview.take()) {
                (UiUpdate::Preview { image, sequence }, _) => preview = Some((image, sequence)),
                (
                    UiUpdate::Depth {
                        reading,
                        buffer,
                        image,
                    },
                    Some((preview, preview_sequence)),
                ) => {
                    return Some(FramePair {
                        preview,
                        preview_sequence,
                        reading,
                        buffer,
                        image,
                    });
                }
                (UiUpdate::Depth { reading, .. }, None) => {
                    debug!(frame = reading.frame_index, "Depth before any preview, skipping");
                }
                (UiUpdate::SampleFailed { sequence, message }, kept) => {
                    debug!(sequence, message = %message, "Skipping failed sample");
                    preview = kept;
                }
            }
        }
        None
    }

    /// Whether the capture thread is still producing
    pub fn is_capturing(&self) -> bool {
        self.session.is_running()
    }

    /// Close the UI side, stop capturing and wait for the handlers
    pub async fn shutdown(self) {
        let Self {
            mut session,
            updates,
            tasks,
        } = self;
        drop(updates);
        session.stop_running();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Handler task failed");
            }
        }
        info!("Pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::DepthData;
    use std::time::Instant;

    fn depth_frame(width: u32, height: u32, value: f32) -> DepthFrame {
        DepthFrame {
            data: DepthData::Disparity(DepthBuffer::filled(width, height, value).unwrap()),
            filtered: true,
            sequence: 7,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_depth_handler_reads_half() {
        let processed = handle_depth_frame(
            depth_frame(240, 320, 0.5),
            SampleStrategy::Center,
            DepthColormap::Grayscale,
        )
        .unwrap();
        assert_eq!(processed.reading.value, 0.5);
        assert_eq!(processed.reading.label(), "0.5");
        assert_eq!(processed.reading.frame_index, 7);
        assert_eq!((processed.image.width(), processed.image.height()), (240, 320));
    }

    #[test]
    fn test_depth_handler_clamps_negative() {
        let processed = handle_depth_frame(
            depth_frame(240, 320, -3.0),
            SampleStrategy::LegacyFixedIndex,
            DepthColormap::Turbo,
        )
        .unwrap();
        assert_eq!(processed.reading.value, 0.0);
        assert_eq!((processed.reading.row, processed.reading.column), (160, 120));
        assert!(processed.buffer.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_depth_handler_reports_out_of_range_legacy_index() {
        let err = handle_depth_frame(
            depth_frame(120, 160, 0.5),
            SampleStrategy::LegacyFixedIndex,
            DepthColormap::Grayscale,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DepthError::IndexOutOfRange {
                index: 38_520,
                len: 19_200
            }
        );
    }

    #[test]
    fn test_video_handler_swaps_bgra() {
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(vec![10u8, 20, 30, 255, 1, 2, 3, 255]),
            format: crate::backends::camera::PixelFormat::BGRA,
            stride: 8,
            sequence: 0,
            captured_at: Instant::now(),
        };
        let image = handle_video_frame(&frame);
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [3, 2, 1, 255]);
    }
}
