//! Playback engine: voice pools, key state machines, the keyboard lookup
//! table, and the note scheduler that drives them.

pub mod key;
pub mod keyboard;
pub mod scheduler;
pub mod voice;

pub use key::{KeyConfig, KeyInput, KeyMotion, KeyState, PianoKey, REST_ANGLE};
pub use keyboard::{Keyboard, KeyboardLayout, SustainPedal};
pub use scheduler::Scheduler;
pub use voice::{VoicePool, VoiceSlot};
