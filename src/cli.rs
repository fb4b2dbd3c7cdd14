// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for headless operation
//!
//! This module provides command-line functionality for:
//! - Listing available cameras with their video and depth formats
//! - Printing depth readings
//! - Saving a snapshot of one frame pair

use depth_sample::backends::camera::{CaptureSession, get_backend_for_type};
use depth_sample::config::Config;
use depth_sample::constants::FIRST_FRAME_TIMEOUT;
use depth_sample::pipeline::{Pipeline, ReadingEvent};
use depth_sample::storage::{self, Snapshot};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

/// List all available cameras
pub fn list_cameras(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = get_backend_for_type(config.backend, &config.synthetic);
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({} backend):", backend.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let depth = if camera.device_type.supports_depth() {
            "depth"
        } else {
            "no depth"
        };
        println!("  [{}] {} ({:?}, {})", index, camera.name, camera.position, depth);

        // Highest resolution first
        let mut formats = backend.get_formats(camera);
        formats.sort_by_key(|f| std::cmp::Reverse(f.pixel_count()));
        for format in &formats {
            println!("      {} {}", format, format.pixel_format);
            for depth_format in &format.depth_formats {
                println!("          depth: {}", depth_format);
            }
        }
        println!();
    }

    Ok(())
}

/// Print depth readings until `frames` have been read (0 = until Ctrl+C)
pub fn probe(config: &Config, frames: u64, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let backend = get_backend_for_type(config.backend, &config.synthetic);
    let session = CaptureSession::configure(backend, &config.session)?;
    if !json {
        let (width, height) = session.depth_size();
        println!("Using camera: {}", session.device().name);
        println!(
            "Depth: {}x{} ({}), sampling {}",
            width,
            height,
            session.depth_format().data_type,
            config.sample_strategy
        );
    }
    let mut pipeline = Pipeline::start(session, config.pipeline_config())?;

    // Set up Ctrl+C handler
    let interrupted = Arc::new(Notify::new());
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.notify_one();
    })?;

    let result = runtime.block_on(print_readings(&mut pipeline, frames, json, &interrupted));
    runtime.block_on(pipeline.shutdown());
    result
}

/// Print readings until `frames` are printed, the stream ends or Ctrl+C
async fn print_readings(
    pipeline: &mut Pipeline,
    frames: u64,
    json: bool,
    interrupted: &Notify,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut count: u64 = 0;
    loop {
        let event = tokio::select! {
            _ = interrupted.notified() => return Ok(()),
            event = pipeline.next_reading(FIRST_FRAME_TIMEOUT) => event?,
        };
        let Some(event) = event else {
            return Ok(());
        };
        print_reading(&event, json)?;
        count += 1;
        if frames > 0 && count >= frames {
            return Ok(());
        }
    }
}

fn print_reading(event: &ReadingEvent, json: bool) -> Result<(), serde_json::Error> {
    match event {
        ReadingEvent::Reading(reading) if json => println!("{}", serde_json::to_string(reading)?),
        ReadingEvent::Reading(reading) => println!(
            "frame {:>5}  depth {}  (row {}, col {})",
            reading.frame_index,
            reading.label(),
            reading.row,
            reading.column
        ),
        ReadingEvent::Failed { sequence, message } if json => {
            println!("{}", serde_json::json!({ "frame_index": sequence, "error": message }));
        }
        ReadingEvent::Failed { sequence, message } => {
            eprintln!("frame {:>5}  no reading: {}", sequence, message);
        }
    }
    Ok(())
}

/// Capture one frame pair and save it as a snapshot
pub fn snapshot(
    config: &Config,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let backend = get_backend_for_type(config.backend, &config.synthetic);
    let session = CaptureSession::configure(backend, &config.session)?;
    println!("Using camera: {}", session.device().name);
    let mut pipeline = Pipeline::start(session, config.pipeline_config())?;

    println!("Capturing...");
    let captured =
        runtime.block_on(tokio::time::timeout(FIRST_FRAME_TIMEOUT, pipeline.next_frame_pair()));
    runtime.block_on(pipeline.shutdown());

    let pair = captured
        .map_err(|_| "Timed out waiting for camera")?
        .ok_or("Camera stopped before delivering a depth frame")?;

    let dir = storage::resolve_snapshot_dir(output, config.snapshot_dir.as_deref());
    let paths = storage::save_snapshot(
        &dir,
        &Snapshot {
            preview: Some(pair.preview.as_ref()),
            depth_image: &pair.image,
            disparity: &pair.buffer,
            reading: &pair.reading,
            strategy: config.sample_strategy,
            colormap: config.colormap,
        },
    )?;

    println!("Depth: {}", pair.reading.label());
    if let Some(path) = &paths.preview {
        println!("Preview saved: {}", path.display());
    }
    println!("Depth image saved: {}", paths.depth_image.display());
    println!("Raw disparity saved: {}", paths.raw.display());
    println!("Metadata saved: {}", paths.metadata.display());
    Ok(())
}
