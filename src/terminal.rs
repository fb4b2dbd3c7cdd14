// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based depth viewer
//!
//! Renders the color preview (or the depth map) to the terminal using Unicode
//! half-block characters for improved vertical resolution, with the depth
//! reading on a label line above the status bar.

use crate::backends::camera::{CaptureSession, get_backend_for_type};
use crate::config::Config;
use crate::constants::TERMINAL_TICK;
use crate::depth::{DepthBuffer, DepthReading};
use crate::pipeline::{Pipeline, UiUpdate};
use crate::storage::{self, Snapshot};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbaImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Run the terminal depth viewer
pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    // Configure before touching the terminal so errors print normally
    let backend = get_backend_for_type(config.backend, &config.synthetic);
    let session = CaptureSession::configure(backend, &config.session)?;
    let mut pipeline = Pipeline::start(session, config.pipeline_config())?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut pipeline, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.block_on(pipeline.shutdown());
    result
}

/// Which image fills the frame area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewMode {
    Color,
    Depth,
}

struct LatestDepth {
    reading: DepthReading,
    buffer: Arc<DepthBuffer>,
    image: Arc<RgbaImage>,
}

/// Everything the UI shows; later updates replace earlier ones
struct ViewState {
    mode: ViewMode,
    preview: Option<Arc<RgbaImage>>,
    depth: Option<LatestDepth>,
    label: String,
    capture_ended: bool,
}

impl ViewState {
    fn new() -> Self {
        Self {
            mode: ViewMode::Color,
            preview: None,
            depth: None,
            label: "Depth: -".to_string(),
            capture_ended: false,
        }
    }

    fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Preview { image, .. } => self.preview = Some(image),
            UiUpdate::Depth {
                reading,
                buffer,
                image,
            } => {
                self.label = format!(
                    "Depth: {}  (row {}, col {} of {}x{}, frame {})",
                    reading.label(),
                    reading.row,
                    reading.column,
                    reading.width,
                    reading.height,
                    reading.frame_index
                );
                self.depth = Some(LatestDepth {
                    reading,
                    buffer,
                    image,
                });
            }
            UiUpdate::SampleFailed { sequence, message } => {
                self.label = format!("Depth: unavailable (frame {}): {}", sequence, message);
            }
        }
    }

    fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            ViewMode::Color => ViewMode::Depth,
            ViewMode::Depth => ViewMode::Color,
        };
    }

    /// Image for the current mode and the sample point on it as (x, y)
    fn visible(&self, session: &CaptureSession) -> (Option<&RgbaImage>, Option<(u32, u32)>) {
        let sample = self.depth.as_ref().map(|d| (d.reading.row, d.reading.column));
        match self.mode {
            ViewMode::Color => (
                self.preview.as_deref(),
                sample.map(|(row, column)| session.depth_to_video(row, column)),
            ),
            ViewMode::Depth => (
                self.depth.as_ref().map(|d| d.image.as_ref()),
                sample.map(|(row, column)| (column, row)),
            ),
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    pipeline: &mut Pipeline,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = ViewState::new();
    let mut show_help = false;
    let mut status_message = build_status_message(state.mode);

    loop {
        // Drain all pending updates to get the latest frame and reading
        for update in pipeline.drain() {
            state.apply(update);
        }
        if !state.capture_ended && !pipeline.is_capturing() {
            state.capture_ended = true;
            status_message = "Capture ended | 'q' quit".to_string();
        }

        let (image, marker) = state.visible(pipeline.session());
        let frame_widget = FrameWidget {
            image,
            marker,
            placeholder: match state.mode {
                ViewMode::Color => "Waiting for camera...",
                ViewMode::Depth => "Waiting for depth...",
            },
        };

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve the bottom two lines for the depth label and status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };
            f.render_widget(&frame_widget, camera_area);

            let label_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &state.label,
                    fg: Color::Black,
                    bg: Color::Gray,
                },
                label_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                    fg: Color::White,
                    bg: Color::DarkGray,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(TERMINAL_TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char('q') => break,
                KeyCode::Char('d') => {
                    show_help = false;
                    state.toggle_mode();
                    status_message = build_status_message(state.mode);
                }
                KeyCode::Char('p') => {
                    show_help = false;
                    status_message = match save_snapshot(&state, config) {
                        Ok(Some(path)) => format!("Saved: {}", path.display()),
                        Ok(None) => "No depth frame yet".to_string(),
                        Err(e) => {
                            error!("Failed to save snapshot: {}", e);
                            format!("Error: {}", e)
                        }
                    };
                }
                KeyCode::Char('h') => {
                    show_help = !show_help;
                    status_message = if show_help {
                        build_help_message()
                    } else {
                        build_status_message(state.mode)
                    };
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn build_status_message(mode: ViewMode) -> String {
    let view = match mode {
        ViewMode::Color => "'d' depth view",
        ViewMode::Depth => "'d' color view",
    };
    format!("{} | 'p' snapshot | 'h' help | 'q' quit", view)
}

fn build_help_message() -> String {
    "d: Toggle color/depth | p: Save snapshot | h: Toggle help | q/Ctrl+C: Quit".to_string()
}

/// Save the latest frame pair, or `None` if no depth has arrived
fn save_snapshot(
    state: &ViewState,
    config: &Config,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let Some(depth) = &state.depth else {
        return Ok(None);
    };
    let dir = config
        .snapshot_dir
        .clone()
        .unwrap_or_else(storage::default_snapshot_dir);
    let paths = storage::save_snapshot(
        &dir,
        &Snapshot {
            preview: state.preview.as_deref(),
            depth_image: &depth.image,
            disparity: &depth.buffer,
            reading: &depth.reading,
            strategy: config.sample_strategy,
            colormap: config.colormap,
        },
    )?;
    info!(path = %paths.metadata.display(), "Snapshot saved from terminal");
    Ok(Some(paths.metadata))
}

/// Widget that renders an RGBA image using half-block characters
struct FrameWidget<'a> {
    image: Option<&'a RgbaImage>,
    /// Image pixel (x, y) to highlight
    marker: Option<(u32, u32)>,
    placeholder: &'a str,
}

/// Largest (width, height) in cells that fits `area` at the image's aspect ratio
///
/// Each cell shows two vertical pixels.
fn fit_cells(image_width: u32, image_height: u32, area: Rect) -> (u16, u16) {
    let frame_aspect = image_width as f64 / image_height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height as f64) * 2.0;

    if term_width / term_height > frame_aspect {
        // Terminal is wider - fit to height
        let h = term_height;
        let w = h * frame_aspect;
        (w as u16, (h / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let w = term_width;
        let h = w / frame_aspect;
        (w as u16, (h / 2.0) as u16)
    }
}

impl Widget for &FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = self.image.filter(|i| i.width() > 0 && i.height() > 0) else {
            let msg = self.placeholder;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        let (display_width, display_height) = fit_cells(image.width(), image.height(), area);
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = image.width() as f64 / display_width as f64;
        let y_scale = image.height() as f64 / (display_height as f64 * 2.0);
        let marker_cell = self.marker.map(|(mx, my)| {
            (
                (mx as f64 / x_scale) as u16,
                (my as f64 / (y_scale * 2.0)) as u16,
            )
        });

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let Some(cell) = buf.cell_mut((term_x, term_y)) else {
                    continue;
                };
                if marker_cell == Some((tx, ty)) {
                    cell.set_char('+');
                    cell.set_fg(Color::White);
                    cell.set_bg(Color::Red);
                    continue;
                }
                cell.set_char('▀');
                cell.set_fg(sample_pixel(image, src_x, src_y_top));
                cell.set_bg(sample_pixel(image, src_x, src_y_bottom));
            }
        }
    }
}

fn sample_pixel(image: &RgbaImage, x: u32, y: u32) -> Color {
    let x = x.min(image.width() - 1);
    let y = y.min(image.height() - 1);
    let [r, g, b, _] = image.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Single-line bar widget
struct StatusBar<'a> {
    message: &'a str,
    fg: Color,
    bg: Color,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(self.bg);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default().fg(self.fg).bg(self.bg),
        );
    }
}
