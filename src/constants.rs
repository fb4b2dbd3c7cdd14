// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application name used for config and snapshot directories
pub const APP_NAME: &str = "depth-sample";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Depth map dimensions the fixed sample index was written against
///
/// Portrait 240x320 disparity map from a dual camera (width x height).
pub mod legacy {
    /// Width of the assumed depth map
    pub const DEPTH_WIDTH: u32 = 240;
    /// Height of the assumed depth map
    pub const DEPTH_HEIGHT: u32 = 320;
    /// Row 160, column 120 of a 240-wide buffer: 160 * 240 + 120
    pub const CENTER_INDEX: usize = 38_520;
}

/// Disparity values are normalized into this range by the clamp step
pub const DISPARITY_MIN: f32 = 0.0;
pub const DISPARITY_MAX: f32 = 1.0;

/// Number of frames buffered per capture stream before the capture thread blocks
pub const DEFAULT_FRAME_CHANNEL_CAPACITY: usize = 8;

/// Number of pending UI updates before the handlers wait for the UI to drain
pub const DEFAULT_UI_CHANNEL_CAPACITY: usize = 32;

/// Terminal redraw / input poll interval
pub const TERMINAL_TICK: Duration = Duration::from_millis(16);

/// How long headless commands wait for the first frame before giving up
pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of quantization bands for the turbo colormap
pub const DEPTH_COLORMAP_BANDS: f32 = 32.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_index_is_center_of_legacy_map() {
        let row = (legacy::DEPTH_HEIGHT / 2) as usize;
        let col = (legacy::DEPTH_WIDTH / 2) as usize;
        assert_eq!(
            row * legacy::DEPTH_WIDTH as usize + col,
            legacy::CENTER_INDEX
        );
    }
}
