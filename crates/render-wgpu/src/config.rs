use anyhow::{Context, Result};
use lodview_common::Extent2;
use lodview_render::DriverConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    LowPower,
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Window and device settings for the desktop viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub size: Extent2,
    pub vsync: bool,
    pub power_preference: PowerPreference,
    pub driver: DriverConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "lodview".into(),
            size: Extent2::new(1280, 720),
            vsync: true,
            power_preference: PowerPreference::HighPerformance,
            driver: DriverConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_driver_section() {
        let cfg: ViewerConfig = serde_json::from_str(
            r#"{
                "title": "points",
                "vsync": false,
                "power_preference": "low_power",
                "driver": { "plot_y_max_ms": 50.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.title, "points");
        assert_eq!(cfg.size, Extent2::new(1280, 720));
        assert_eq!(cfg.present_mode(), wgpu::PresentMode::AutoNoVsync);
        assert_eq!(
            wgpu::PowerPreference::from(cfg.power_preference),
            wgpu::PowerPreference::LowPower
        );
        assert_eq!(cfg.driver.plot_y_max_ms, 50.0);
        assert_eq!(cfg.driver.history_len, 1000);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ViewerConfig::load(Path::new("/nonexistent/lodview.json")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
