//! Persistent playback settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use firstream_core::engine::{DEFAULT_BLOCK_SIZE, DEFAULT_KERNEL_LENGTH};
use firstream_core::{EngineConfig, FilterStrength};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct PlaybackSettings {
    pub input_path: Option<PathBuf>,
    /// `"light"` or `"strong"`.
    pub strength: String,
    /// Explicit decay rate; wins over `strength` when set.
    pub decay_rate: Option<f64>,
    pub block_size: usize,
    pub kernel_length: usize,
    pub preferred_output_device: Option<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            input_path: None,
            strength: FilterStrength::Light.as_str().into(),
            decay_rate: None,
            block_size: DEFAULT_BLOCK_SIZE,
            kernel_length: DEFAULT_KERNEL_LENGTH,
            preferred_output_device: None,
        }
    }
}

impl PlaybackSettings {
    pub fn normalize(&mut self) {
        self.strength = normalize_strength(&self.strength).as_str().into();
        self.decay_rate = self
            .decay_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0);
        if self.block_size == 0 {
            self.block_size = DEFAULT_BLOCK_SIZE;
        }
        if self.kernel_length == 0 {
            self.kernel_length = DEFAULT_KERNEL_LENGTH;
        }
        self.preferred_output_device = self
            .preferred_output_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.input_path = self
            .input_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            block_size: self.block_size,
            kernel_length: self.kernel_length,
            decay_rate: self
                .decay_rate
                .unwrap_or_else(|| normalize_strength(&self.strength).decay_rate()),
        }
    }
}

/// Unknown strength names fall back to the light preset.
pub fn normalize_strength(raw: &str) -> FilterStrength {
    FilterStrength::parse(raw).unwrap_or(FilterStrength::Light)
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("firstream")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("firstream")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> PlaybackSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<PlaybackSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings file: {e}");
            PlaybackSettings::default()
        }),
        Err(_) => PlaybackSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &PlaybackSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
