use serde::{Deserialize, Serialize};

/// The twelve pitch classes, ordered from C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Canonical note name for a MIDI key number, e.g. `60 -> "C4"`.
///
/// Every component that talks about pitches by name (the note extractor,
/// the keyboard lookup table) goes through this one function, so names
/// always agree regardless of where a keyboard was configured to start.
pub fn pitch_name(key: u8) -> String {
    let class = PITCH_CLASSES[key as usize % 12];
    let octave = key as i32 / 12 - 1;
    format!("{class}{octave}")
}

/// Inverse of [`pitch_name`]. Returns `None` for names outside the MIDI
/// key range or with an unknown pitch class.
pub fn pitch_number(name: &str) -> Option<u8> {
    let split = name
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .unwrap_or(name.len());
    let (class, octave) = name.split_at(split);
    let class = PITCH_CLASSES.iter().position(|&c| c == class)?;
    let octave: i32 = octave.parse().ok()?;
    let key = (octave + 1) * 12 + class as i32;
    u8::try_from(key).ok().filter(|&k| k < 128)
}

/// A Note-On extracted from a MIDI file, annotated with the tempo that
/// governs it. Immutable once extracted; a song's notes are rebuilt from
/// scratch on every load.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Absolute position in MIDI ticks.
    pub start_tick: u64,
    /// Source track index. The player keys its channel colours off the
    /// track a note came from, not the MIDI channel nibble.
    pub channel: usize,
    /// Canonical note name, e.g. `"C#4"`.
    pub pitch: String,
    /// MIDI velocity, 0..=127.
    pub velocity: u8,
    /// Distance to the paired Note-Off, in ticks.
    pub duration_ticks: u64,
    /// Governing tempo expressed as ticks per second
    /// (`ticks_per_quarter * bpm / 60`).
    pub tempo: f64,
}

impl NoteEvent {
    /// Audible length of the note in seconds at 1x speed.
    pub fn length_secs(&self) -> f64 {
        if self.tempo > 0.0 {
            self.duration_ticks as f64 / self.tempo
        } else {
            0.0
        }
    }
}

/// What happens when the last note of the last song has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop scheduling after the last song.
    #[default]
    NoRepeat,
    /// Wrap back to the first song after the last one.
    RepeatLoop,
    /// Replay the current song forever.
    RepeatOne,
}

/// How keys respond to fired notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyMode {
    /// Key motion is physically simulated; the observed mechanical angle
    /// triggers audio.
    #[default]
    Physical,
    /// Timer-driven playback only; note progress substitutes for the
    /// angle band.
    Show,
}

/// RGB tag for per-channel key colouring.
pub type Colour = [f32; 3];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_name_middle_c() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(69), "A4");
    }

    #[test]
    fn test_pitch_name_extremes() {
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(pitch_name(21), "A0");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn test_pitch_number_round_trip() {
        for key in 0..128u8 {
            assert_eq!(pitch_number(&pitch_name(key)), Some(key));
        }
    }

    #[test]
    fn test_pitch_number_rejects_garbage() {
        assert_eq!(pitch_number("H2"), None);
        assert_eq!(pitch_number("C"), None);
        assert_eq!(pitch_number("C99"), None);
        assert_eq!(pitch_number(""), None);
    }

    #[test]
    fn test_note_length_secs() {
        // 480 ticks at 960 ticks/sec is half a second.
        let note = NoteEvent {
            start_tick: 0,
            channel: 0,
            pitch: "C4".to_string(),
            velocity: 100,
            duration_ticks: 480,
            tempo: 960.0,
        };
        assert!((note.length_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_note_length_zero_tempo() {
        let note = NoteEvent {
            start_tick: 0,
            channel: 0,
            pitch: "C4".to_string(),
            velocity: 100,
            duration_ticks: 480,
            tempo: 0.0,
        };
        assert_eq!(note.length_secs(), 0.0);
    }
}
