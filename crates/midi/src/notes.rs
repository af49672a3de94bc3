//! Note extraction: every Note-On across all tracks, annotated with the
//! tempo that governs it.

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use pianola_transport::{NoteEvent, pitch_name};

use crate::tempo::{DEFAULT_BPM, TempoMap};

/// The file-wide fallback tempo: the last tempo event encountered scanning
/// every track in order, or 120 BPM if the file has none. Applied to notes
/// that no explicit tempo segment covers.
fn file_default_bpm(smf: &Smf<'_>) -> f64 {
    let mut bpm = DEFAULT_BPM;
    for track in &smf.tracks {
        for event in track {
            if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
                let us = us.as_int();
                if us > 0 {
                    bpm = 60_000_000.0 / us as f64;
                }
            }
        }
    }
    bpm
}

/// A Note-On waiting for its Note-Off. Index points back into the track's
/// output so notes stay in source order once the duration resolves.
struct OpenNote {
    key: u8,
    index: usize,
}

/// Extract all Note-On events, durations resolved by pairing each with the
/// next Note-Off (or velocity-0 Note-On) for the same key on the same
/// track. An unmatched Note-On is malformed: it is skipped with a warning
/// rather than aborting the extraction.
///
/// The result is sorted by ascending start tick with a stable sort, so
/// notes sharing a tick keep their source (track-major) order.
pub fn extract_notes(smf: &Smf<'_>, tempo_map: &TempoMap) -> Vec<NoteEvent> {
    let ticks_per_quarter = tempo_map.ticks_per_quarter();
    let default_bpm = file_default_bpm(smf);

    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut resolved: Vec<bool> = Vec::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        let mut open: Vec<OpenNote> = Vec::new();

        for event in track {
            abs_tick += u64::from(event.delta.as_int());

            let TrackEventKind::Midi { message, .. } = event.kind else {
                continue;
            };
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    let key = key.as_int();
                    let bpm = tempo_map.explicit_bpm_at(abs_tick).unwrap_or(default_bpm);
                    let tempo = ticks_per_quarter as f64 * bpm / 60.0;

                    open.push(OpenNote {
                        key,
                        index: notes.len(),
                    });
                    notes.push(NoteEvent {
                        start_tick: abs_tick,
                        channel: track_index,
                        pitch: pitch_name(key),
                        velocity: vel.as_int(),
                        duration_ticks: 0,
                        tempo,
                    });
                    resolved.push(false);
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    // Velocity-0 Note-On is a Note-Off in disguise. Close
                    // the earliest open note for this key.
                    let key = key.as_int();
                    if let Some(pos) = open.iter().position(|o| o.key == key) {
                        let OpenNote { index, .. } = open.remove(pos);
                        notes[index].duration_ticks = abs_tick - notes[index].start_tick;
                        resolved[index] = true;
                    }
                }
                _ => {}
            }
        }

        if !open.is_empty() {
            log::warn!(
                "track {track_index}: {} unmatched note-on event(s) skipped",
                open.len()
            );
        }
    }

    let mut notes: Vec<NoteEvent> = notes
        .into_iter()
        .zip(resolved)
        .filter_map(|(note, ok)| ok.then_some(note))
        .collect();
    notes.sort_by_key(|n| n.start_tick);
    notes
}
