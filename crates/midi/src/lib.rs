pub mod notes;
pub mod tempo;

use std::fs;
use std::path::{Path, PathBuf};

use midly::{Smf, Timing};
use pianola_transport::NoteEvent;

pub use notes::extract_notes;
pub use tempo::{DEFAULT_BPM, TempoMap, TempoSegment};

const MIDI_ROOT: &str = "MIDI";

/// Fallback timing resolution when the file uses SMPTE timecode instead of
/// metrical ticks.
const FALLBACK_TICKS_PER_QUARTER: u16 = 480;

/// Resolve a song's file stem to its on-disk path:
/// `<assets_root>/MIDI/<name>.mid`.
pub fn midi_path(assets_root: &Path, name: &str) -> PathBuf {
    assets_root.join(MIDI_ROOT).join(format!("{name}.mid"))
}

/// Everything the engine needs from one MIDI file. Rebuilt from scratch on
/// every song load; nothing here survives a reload.
#[derive(Debug)]
pub struct SongData {
    pub ticks_per_quarter: u16,
    pub tempo_map: TempoMap,
    /// Sorted by ascending start tick; source order preserved for ties.
    pub notes: Vec<NoteEvent>,
}

/// Load and parse `<assets_root>/MIDI/<name>.mid`.
///
/// A missing file fails here, before any playback state is touched.
pub fn load_song(assets_root: &Path, name: &str) -> anyhow::Result<SongData> {
    let path = midi_path(assets_root, name);
    if !path.exists() {
        anyhow::bail!("MIDI file not found at {}", path.display());
    }
    let bytes = fs::read(&path)?;
    parse_song(&bytes)
}

/// Parse an in-memory Standard MIDI File.
pub fn parse_song(bytes: &[u8]) -> anyhow::Result<SongData> {
    let smf = Smf::parse(bytes)?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(..) => FALLBACK_TICKS_PER_QUARTER,
    };

    let track0: &[midly::TrackEvent<'_>] = smf
        .tracks
        .first()
        .map(|t| t.as_slice())
        .unwrap_or_default();
    let tempo_map = TempoMap::from_track(track0, ticks_per_quarter);
    let notes = extract_notes(&smf, &tempo_map);

    log::info!(
        "parsed MIDI: {} tracks, {} notes, {} tempo segments, tpq {}",
        smf.tracks.len(),
        notes.len(),
        tempo_map.segments().len(),
        ticks_per_quarter
    );

    Ok(SongData {
        ticks_per_quarter,
        tempo_map,
        notes,
    })
}
