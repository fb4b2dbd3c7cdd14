// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot export
//!
//! A snapshot is a set of files sharing one stem:
//! - `<stem>_preview.png`: color preview (when one has arrived)
//! - `<stem>_depth.png`: clamped disparity rendered with the colormap
//! - `<stem>_disparity.f32`: raw clamped disparity, little-endian f32, row-major, no padding
//! - `<stem>.json`: reading and layout of the raw file

use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::depth::{DepthBuffer, DepthColormap, DepthReading, SampleStrategy};
use crate::errors::{AppError, AppResult};

/// Folder under the user's Pictures directory
const DEFAULT_SNAPSHOT_FOLDER: &str = "DepthSample";

/// Everything written for one snapshot
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub preview: Option<&'a RgbaImage>,
    pub depth_image: &'a RgbaImage,
    /// Clamped disparity map the reading was taken from
    pub disparity: &'a DepthBuffer,
    pub reading: &'a DepthReading,
    pub strategy: SampleStrategy,
    pub colormap: DepthColormap,
}

/// Paths of the files a snapshot produced
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPaths {
    pub preview: Option<PathBuf>,
    pub depth_image: PathBuf,
    pub raw: PathBuf,
    pub metadata: PathBuf,
}

#[derive(Serialize)]
struct SnapshotMetadata<'a> {
    version: &'static str,
    reading: &'a DepthReading,
    label: String,
    strategy: SampleStrategy,
    colormap: DepthColormap,
    raw_file: String,
    raw_format: &'static str,
    raw_width: u32,
    raw_height: u32,
}

/// Default snapshot directory: Pictures/DepthSample, or ~/DepthSample
pub fn default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SNAPSHOT_FOLDER)
}

/// Snapshot directory: `output` if given, else `configured`, else the default
pub fn resolve_snapshot_dir(output: Option<PathBuf>, configured: Option<&Path>) -> PathBuf {
    output
        .or_else(|| configured.map(Path::to_path_buf))
        .unwrap_or_else(default_snapshot_dir)
}

/// Write a snapshot into `dir`, creating it if needed
pub fn save_snapshot(dir: &Path, snapshot: &Snapshot<'_>) -> AppResult<SnapshotPaths> {
    std::fs::create_dir_all(dir)?;

    let timestamp = snapshot.reading.captured_at.format("%Y%m%d_%H%M%S");
    let stem = format!("depth_{}_{}", timestamp, snapshot.reading.frame_index);
    debug!(dir = %dir.display(), stem = %stem, "Saving snapshot");

    let preview = match snapshot.preview {
        Some(image) => {
            let path = dir.join(format!("{}_preview.png", stem));
            image.save(&path)?;
            Some(path)
        }
        None => None,
    };

    let depth_image = dir.join(format!("{}_depth.png", stem));
    snapshot.depth_image.save(&depth_image)?;

    let raw = dir.join(format!("{}_disparity.f32", stem));
    std::fs::write(&raw, disparity_le_bytes(snapshot.disparity))?;

    let metadata = dir.join(format!("{}.json", stem));
    let sidecar = SnapshotMetadata {
        version: env!("GIT_VERSION"),
        reading: snapshot.reading,
        label: snapshot.reading.label(),
        strategy: snapshot.strategy,
        colormap: snapshot.colormap,
        raw_file: raw
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        raw_format: "f32le",
        raw_width: snapshot.disparity.width(),
        raw_height: snapshot.disparity.height(),
    };
    let json = serde_json::to_string_pretty(&sidecar)
        .map_err(|e| AppError::Storage(format!("snapshot metadata: {}", e)))?;
    std::fs::write(&metadata, json)?;

    info!(path = %metadata.display(), reading = %snapshot.reading, "Snapshot saved");
    Ok(SnapshotPaths {
        preview,
        depth_image,
        raw,
        metadata,
    })
}

/// Row-major little-endian bytes of the visible pixels
fn disparity_le_bytes(buffer: &DepthBuffer) -> Vec<u8> {
    let words: Vec<u32> = buffer
        .rows()
        .flat_map(|row| row.iter().map(|v| v.to_bits().to_le()))
        .collect();
    bytemuck::cast_slice::<u32, u8>(&words).to_vec()
}
