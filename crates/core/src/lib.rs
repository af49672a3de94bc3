pub mod player;

pub use player::{DEFAULT_COLOURS, Player, PlayerEvent};

pub use pianola_engine::{
    KeyConfig, KeyInput, KeyMotion, KeyState, Keyboard, KeyboardLayout, PianoKey, Scheduler,
    SustainPedal,
};
pub use pianola_midi::{SongData, TempoMap, load_song, midi_path, parse_song};
pub use pianola_playlist::{Playlist, PlaylistError, SongEntry};
pub use pianola_transport::{Colour, KeyMode, NoteEvent, RepeatMode, pitch_name, pitch_number};
