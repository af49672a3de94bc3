use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use pianola_core::KeyMode;

/// User defaults layered under the command line. A missing or unreadable
/// file falls back to defaults.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_global_speed")]
    pub global_speed: f64,
    #[serde(default)]
    pub key_mode: KeyMode,
    #[serde(default = "default_multi_voice")]
    pub multi_voice: bool,
}

fn default_global_speed() -> f64 {
    1.0
}

fn default_multi_voice() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global_speed: 1.0,
            key_mode: KeyMode::default(),
            multi_voice: true,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pianola").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(contents) = toml::to_string_pretty(self) {
            let _ = fs::write(&path, contents);
        }
    }
}
