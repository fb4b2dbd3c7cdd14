// SPDX-License-Identifier: GPL-3.0-only

//! Depth Sample - a depth camera viewer
//!
//! This library reads color and depth frames from a dual camera, clamps the
//! disparity map into `[0, 1]` and takes a single depth reading from it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and capture session
//! - [`depth`]: Depth buffers, conversion, clamping and sampling
//! - [`pipeline`]: Per-stream frame handlers feeding the UI
//! - [`terminal`]: Terminal viewer
//! - [`config`]: User configuration handling
//! - [`storage`]: Snapshot export
//!
//! # Example
//!
//! ```no_run
//! use depth_sample::backends::camera::{CaptureSession, SessionConfig, SyntheticBackend};
//! use depth_sample::depth::{SampleStrategy, clamp_and_sample};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(SyntheticBackend::default());
//! let mut session = CaptureSession::configure(backend, &SessionConfig::default()).unwrap();
//! let mut streams = session.start_running().unwrap();
//! if let Some(frame) = streams.depth.blocking_recv() {
//!     let (_, point) = clamp_and_sample(frame.data, SampleStrategy::Center).unwrap();
//!     println!("{}", point.value);
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod depth;
pub mod errors;
pub mod pipeline;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use depth::{DepthBuffer, DepthReading, SampleStrategy};
pub use errors::{AppError, AppResult};
pub use pipeline::{FramePair, Pipeline, PipelineConfig, ReadingEvent, UiUpdate};
