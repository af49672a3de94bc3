//! Playlist definitions loaded from TOML.
//!
//! A playlist names the songs to perform, in order, plus the repeat policy
//! applied when the list runs out. Song files are looked up by name under
//! the assets root at load time, not here.

use std::path::Path;

use pianola_transport::RepeatMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default, rename = "song")]
    pub songs: Vec<SongEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongEntry {
    /// MIDI file name under the assets root, without the `.mid` extension.
    pub file: String,
    /// Display title; falls back to the file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Per-song playback speed multiplier.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Free-form description shown alongside the title.
    #[serde(default)]
    pub details: Option<String>,
}

fn default_speed() -> f64 {
    1.0
}

impl SongEntry {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.file)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Playlist parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Playlist {
    pub fn load(path: &Path) -> Result<Self, PlaylistError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, PlaylistError> {
        Ok(toml::from_str(text)?)
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }
}
