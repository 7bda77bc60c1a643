use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use facetrack_core::recording::infrastructure::download_dir_delivery::DownloadDirDelivery;
use facetrack_core::shared::constants::APP_DIR_NAME;
use facetrack_core::shared::runtime_config::{AssetOrigin, RuntimeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Platform camera device; `None` uses the backend default.
    pub camera_device: Option<String>,
    /// Where recordings are written; `None` means the downloads folder.
    pub recordings_dir: Option<PathBuf>,
    /// Overrides `FACETRACK_ASSET_ORIGIN` when set.
    pub asset_origin: Option<String>,
    pub draw_landmarks: bool,
    pub appearance: Appearance,
    pub high_contrast: bool,
    pub font_scale: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_device: None,
            recordings_dir: None,
            asset_origin: None,
            draw_landmarks: false,
            appearance: Appearance::System,
            high_contrast: false,
            font_scale: 1.0,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                if let Err(e) = fs::write(&path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
        }
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(DownloadDirDelivery::default_dir)
    }

    /// Environment configuration with this app's overrides applied.
    pub fn runtime_config(&self) -> RuntimeConfig {
        let config = RuntimeConfig::from_env();
        match self.asset_origin.as_deref().map(str::trim) {
            Some(origin) if !origin.is_empty() => config.with_asset_origin(AssetOrigin::parse(origin)),
            _ => config,
        }
    }
}
