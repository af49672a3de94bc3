//! Frame-driven note dispatch.
//!
//! The scheduler owns the extracted note list for the current song and a
//! tick-domain timer. Each frame the timer advances by elapsed wall time
//! scaled into ticks at the tempo of the note under the cursor, and every
//! note whose start tick the timer has reached fires onto the keyboard.

use pianola_transport::{Colour, NoteEvent};

use crate::key::KeyConfig;
use crate::keyboard::Keyboard;

#[derive(Debug, Default)]
pub struct Scheduler {
    notes: Vec<NoteEvent>,
    cursor: usize,
    /// Playback position in ticks.
    timer: f64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a song's notes and rewind to its start.
    pub fn load(&mut self, notes: Vec<NoteEvent>) {
        self.notes = notes;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.timer = 0.0;
    }

    pub fn finished(&self) -> bool {
        self.cursor >= self.notes.len()
    }

    pub fn position_ticks(&self) -> f64 {
        self.timer
    }

    pub fn remaining(&self) -> usize {
        self.notes.len() - self.cursor
    }

    /// Advance by `dt` seconds and fire every note now due. Returns the
    /// number of notes fired.
    ///
    /// The cursor moves past each due note unconditionally, so a chord of
    /// simultaneous notes fires within a single frame and a pitch the
    /// keyboard does not know can never stall playback.
    pub fn advance(
        &mut self,
        dt: f64,
        global_speed: f64,
        song_speed: f64,
        keyboard: &mut Keyboard,
        config: &KeyConfig,
        colours: &[Colour],
    ) -> usize {
        if self.finished() {
            return 0;
        }

        let speed = global_speed * song_speed;
        self.timer += dt * speed * self.notes[self.cursor].tempo;

        let mut fired = 0;
        while self.cursor < self.notes.len() && self.notes[self.cursor].start_tick as f64 <= self.timer
        {
            let note = &self.notes[self.cursor];
            self.cursor += 1;

            match keyboard.key_mut(&note.pitch) {
                Some(key) => {
                    let colour = config
                        .show_channel_colours
                        .then(|| colours.get(note.channel).copied())
                        .flatten();
                    key.play(config, note.velocity, note.length_secs(), speed, colour);
                    fired += 1;
                }
                None => {
                    log::warn!("no key registered for pitch {}", note.pitch);
                }
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyboardLayout;
    use pianola_transport::KeyMode;

    // 480 ticks per quarter at 120 BPM.
    const TEMPO: f64 = 960.0;

    fn note(start_tick: u64, pitch: &str) -> NoteEvent {
        NoteEvent {
            start_tick,
            channel: 0,
            pitch: pitch.to_string(),
            velocity: 100,
            duration_ticks: 480,
            tempo: TEMPO,
        }
    }

    fn show_config() -> KeyConfig {
        KeyConfig {
            key_mode: KeyMode::Show,
            ..KeyConfig::default()
        }
    }

    fn keyboard() -> Keyboard {
        // C4 through B4.
        let samples = (0..12).map(|i| format!("{i:02}.ogg")).collect();
        Keyboard::from_layout(&KeyboardLayout::new(samples, "C", 4)).expect("layout")
    }

    #[test]
    fn test_note_fires_exactly_once() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(480, "C4")]);
        let mut kb = keyboard();
        let cfg = show_config();

        let mut total = 0;
        // Half a second reaches tick 480 exactly; keep going well past it.
        for _ in 0..100 {
            total += scheduler.advance(0.01, 1.0, 1.0, &mut kb, &cfg, &[]);
        }
        assert_eq!(total, 1);
        assert!(scheduler.finished());
    }

    #[test]
    fn test_note_at_tick_zero_fires_on_first_frame() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(0, "C4")]);
        let mut kb = keyboard();
        let fired = scheduler.advance(0.0, 1.0, 1.0, &mut kb, &show_config(), &[]);
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_chord_fires_in_one_frame() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(0, "C4"), note(0, "E4"), note(0, "G4")]);
        let mut kb = keyboard();
        let fired = scheduler.advance(0.01, 1.0, 1.0, &mut kb, &show_config(), &[]);
        assert_eq!(fired, 3);
        assert!(scheduler.finished());
    }

    #[test]
    fn test_unknown_pitch_never_stalls_playback() {
        let mut scheduler = Scheduler::new();
        // C9 is above the registered octave.
        scheduler.load(vec![note(0, "C9"), note(10, "C4")]);
        let mut kb = keyboard();
        let fired = scheduler.advance(0.1, 1.0, 1.0, &mut kb, &show_config(), &[]);
        assert_eq!(fired, 1, "only the known pitch sounds");
        assert!(scheduler.finished());
    }

    #[test]
    fn test_speed_scales_the_timer() {
        let mut slow = Scheduler::new();
        slow.load(vec![note(480, "C4")]);
        let mut fast = Scheduler::new();
        fast.load(vec![note(480, "C4")]);
        let mut kb = keyboard();
        let cfg = show_config();

        // At double speed a quarter second reaches tick 480; at unit speed
        // it does not.
        assert_eq!(slow.advance(0.25, 1.0, 1.0, &mut kb, &cfg, &[]), 0);
        assert_eq!(fast.advance(0.25, 2.0, 1.0, &mut kb, &cfg, &[]), 1);
    }

    #[test]
    fn test_channel_colour_applied_when_enabled() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(0, "C4")]);
        let mut kb = keyboard();
        let mut cfg = show_config();
        cfg.show_channel_colours = true;
        let colours = [[0.2, 0.4, 0.6]];

        scheduler.advance(0.01, 1.0, 1.0, &mut kb, &cfg, &colours);
        let (colour, _) = kb.key("C4").unwrap().colour_blend().expect("colour tag");
        assert_eq!(colour, [0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_channel_without_colour_plays_untagged() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(0, "C4")]);
        let mut kb = keyboard();
        let mut cfg = show_config();
        cfg.show_channel_colours = true;

        // Empty palette: the note still sounds, just without a colour.
        let fired = scheduler.advance(0.01, 1.0, 1.0, &mut kb, &cfg, &[]);
        assert_eq!(fired, 1);
        assert!(kb.key("C4").unwrap().colour_blend().is_none());
    }

    #[test]
    fn test_load_rewinds() {
        let mut scheduler = Scheduler::new();
        scheduler.load(vec![note(0, "C4")]);
        let mut kb = keyboard();
        scheduler.advance(0.01, 1.0, 1.0, &mut kb, &show_config(), &[]);
        assert!(scheduler.finished());

        scheduler.load(vec![note(0, "E4"), note(480, "G4")]);
        assert!(!scheduler.finished());
        assert_eq!(scheduler.position_ticks(), 0.0);
        assert_eq!(scheduler.remaining(), 2);
    }
}
