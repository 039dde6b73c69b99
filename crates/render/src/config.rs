use lodview_common::Extent2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::diagnostics::Severity;

/// Frame driver tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Length of the frame-time history ring.
    pub history_len: usize,
    /// Minimum time between FPS recomputations.
    pub fps_window_secs: f64,
    /// Size the primary framebuffer is created with before the first frame.
    pub initial_view_extent: Extent2,
    pub plot_history_secs: f32,
    pub plot_y_max_ms: f32,
    pub plot_capacity: usize,
    pub diagnostic_threshold: Severity,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            history_len: 1000,
            fps_window_secs: 1.0,
            initial_view_extent: Extent2::new(128, 128),
            plot_history_secs: 2.0,
            plot_y_max_ms: 30.0,
            plot_capacity: 2000,
            diagnostic_threshold: Severity::High,
        }
    }
}

impl DriverConfig {
    pub fn fps_window(&self) -> Duration {
        Duration::from_secs_f64(self.fps_window_secs.max(0.0))
    }
}
