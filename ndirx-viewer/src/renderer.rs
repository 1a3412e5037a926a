//! Headless render adapter.
//!
//! Stands in for a texture uploader: it keeps frame statistics, logs
//! resolution changes and samples the centre pixel so a log line shows
//! that real pixels are flowing.

use std::time::{Duration, Instant};

use ndirx_core::{DecodedImage, RenderAdapter};
use tracing::info;

// ── PresentStats ─────────────────────────────────────────────────

/// Statistics over presented frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentStats {
    /// Smoothed frames per second.
    pub fps: f64,
    /// Total frames presented.
    pub total_frames: u64,
    /// Total decoded bytes presented.
    pub total_bytes: u64,
    /// Last frame width.
    pub width: u32,
    /// Last frame height.
    pub height: u32,
    /// RGBA of the centre pixel of the last frame.
    pub centre: [u8; 4],
}

// ── LogRenderer ──────────────────────────────────────────────────

pub struct LogRenderer {
    stats: PresentStats,
    last_present: Option<Instant>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self {
            stats: PresentStats::default(),
            last_present: None,
        }
    }

    pub fn stats(&self) -> &PresentStats {
        &self.stats
    }

    fn update_fps(&mut self, now: Instant) {
        if let Some(prev) = self.last_present.replace(now) {
            let dt = now.duration_since(prev).max(Duration::from_micros(1));
            let instant = 1.0 / dt.as_secs_f64();
            // Exponential moving average, alpha 0.1.
            self.stats.fps = if self.stats.fps == 0.0 {
                instant
            } else {
                self.stats.fps * 0.9 + instant * 0.1
            };
        }
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderAdapter for LogRenderer {
    fn present(&mut self, image: &DecodedImage) {
        let (width, height) = (image.width(), image.height());
        if (width, height) != (self.stats.width, self.stats.height) {
            info!(
                width,
                height,
                alpha = image.has_alpha(),
                format = ?image.source_format(),
                "resolution changed"
            );
            self.stats.width = width;
            self.stats.height = height;
        }

        self.update_fps(Instant::now());
        self.stats.total_frames += 1;
        self.stats.total_bytes += image.pixels().len() as u64;
        self.stats.centre = image.pixel(width / 2, height / 2);
    }
}

// ── Tests ────────────────────────────────────────────────────────
