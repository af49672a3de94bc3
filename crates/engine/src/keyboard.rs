//! The pitch-name → key lookup table and the sustain pedal.
//!
//! The table is built once at setup by explicit registration from an
//! ordered sample list; nothing is discovered reflectively at play time,
//! and the table holds no reference back to whatever schedules against it.

use std::collections::HashMap;

use pianola_transport::{pitch_name, pitch_number};
use regex::Regex;

use crate::key::PianoKey;

/// Static description of a keyboard: which samples it has and where on
/// the pitch axis they start.
#[derive(Debug, Clone)]
pub struct KeyboardLayout {
    /// Ordered audio sample names, one per key.
    pub samples: Vec<String>,
    /// Pitch class of the first sample, e.g. `"A"` for a full piano.
    pub start_key: String,
    /// Octave of the first sample, e.g. `0` for a full piano.
    pub start_octave: i32,
    /// Sort the sample list before assigning pitches.
    pub sort: bool,
    /// When sorting, order by this pattern's first match in each name
    /// instead of the whole name.
    pub sort_regex: Option<String>,
}

impl KeyboardLayout {
    pub fn new(samples: Vec<String>, start_key: &str, start_octave: i32) -> Self {
        Self {
            samples,
            start_key: start_key.to_string(),
            start_octave,
            sort: false,
            sort_regex: None,
        }
    }
}

pub struct Keyboard {
    keys: HashMap<String, PianoKey>,
}

impl Keyboard {
    /// Build the lookup table: sample `i` sounds the pitch `i` semitones
    /// above the configured start key.
    pub fn from_layout(layout: &KeyboardLayout) -> anyhow::Result<Self> {
        let mut samples = layout.samples.clone();
        if layout.sort {
            match layout.sort_regex.as_deref().filter(|p| !p.is_empty()) {
                Some(pattern) => {
                    let regex = Regex::new(pattern)?;
                    samples.sort_by_key(|name| {
                        regex
                            .find(name)
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default()
                    });
                }
                None => samples.sort(),
            }
        }

        let start_name = format!("{}{}", layout.start_key, layout.start_octave);
        let start = pitch_number(&start_name)
            .ok_or_else(|| anyhow::anyhow!("invalid start key {start_name:?}"))?;

        let mut keys = HashMap::with_capacity(samples.len());
        for (offset, sample) in samples.into_iter().enumerate() {
            let Ok(key_number) = u8::try_from(start as usize + offset) else {
                anyhow::bail!("keyboard extends past the MIDI key range");
            };
            if key_number > 127 {
                anyhow::bail!("keyboard extends past the MIDI key range");
            }
            keys.insert(pitch_name(key_number), PianoKey::new(sample));
        }

        log::info!("registered {} keys starting at {start_name}", keys.len());
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, pitch: &str) -> bool {
        self.keys.contains_key(pitch)
    }

    pub fn key(&self, pitch: &str) -> Option<&PianoKey> {
        self.keys.get(pitch)
    }

    pub fn key_mut(&mut self, pitch: &str) -> Option<&mut PianoKey> {
        self.keys.get_mut(pitch)
    }

    pub fn keys(&self) -> impl Iterator<Item = (&String, &PianoKey)> {
        self.keys.iter()
    }

    pub fn keys_mut(&mut self) -> impl Iterator<Item = (&String, &mut PianoKey)> {
        self.keys.iter_mut()
    }
}

/// The sustain pedal: a pressed flag gating release fades, plus a lerp an
/// external renderer can map onto pedal rotation.
#[derive(Debug, Clone)]
pub struct SustainPedal {
    pub pressed: bool,
    pub released_angle: f32,
    pub pressed_angle: f32,
    lerp: f32,
}

/// Lerp speed toward the pedal's commanded position.
const PEDAL_LERP_PER_SEC: f32 = 3.5;

impl SustainPedal {
    pub fn new(released_angle: f32, pressed_angle: f32) -> Self {
        Self {
            pressed: false,
            released_angle,
            pressed_angle,
            lerp: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) {
        let direction = if self.pressed { 1.0 } else { -1.0 };
        self.lerp = (self.lerp + dt * direction * PEDAL_LERP_PER_SEC).clamp(0.0, 1.0);
    }

    /// Current pedal angle between the released and pressed positions.
    pub fn angle(&self) -> f32 {
        self.released_angle + (self.pressed_angle - self.released_angle) * self.lerp
    }
}

impl Default for SustainPedal {
    fn default() -> Self {
        Self::new(0.0, -10.0)
    }
}
