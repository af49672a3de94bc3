use std::path::{Path, PathBuf};

use pianola_engine::{KeyConfig, KeyInput, Keyboard, KeyboardLayout, Scheduler, SustainPedal};
use pianola_midi::load_song;
use pianola_playlist::Playlist;
use pianola_transport::{Colour, KeyMode, RepeatMode};

/// Most events a never-polling caller can leave queued before the oldest
/// are dropped.
const MAX_PENDING_EVENTS: usize = 64;

/// Default per-channel colour palette, cycled by track index.
pub const DEFAULT_COLOURS: [Colour; 4] = [
    [0.9, 0.3, 0.3],
    [0.3, 0.6, 0.9],
    [0.3, 0.9, 0.5],
    [0.9, 0.8, 0.3],
];

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SongChanged {
        title: String,
        details: Option<String>,
    },
}

/// The playback facade: owns the playlist, the keyboard and the scheduler,
/// and drives one frame per [`Player::advance`] call.
///
/// Song transitions follow the playlist's repeat policy. A song whose MIDI
/// file has gone missing mid-playlist is skipped with a logged error; if a
/// full cycle through the playlist yields nothing loadable the player
/// disables itself rather than spinning.
pub struct Player {
    assets_root: PathBuf,
    playlist: Playlist,
    keyboard: Keyboard,
    scheduler: Scheduler,
    pedal: SustainPedal,
    config: KeyConfig,
    global_speed: f64,
    song_speed: f64,
    colours: Vec<Colour>,
    current: usize,
    enabled: bool,
    events: Vec<PlayerEvent>,
}

impl Player {
    pub fn new(
        playlist: Playlist,
        assets_root: &Path,
        layout: &KeyboardLayout,
        config: KeyConfig,
    ) -> anyhow::Result<Self> {
        let keyboard = Keyboard::from_layout(layout)?;
        Ok(Self {
            assets_root: assets_root.to_path_buf(),
            playlist,
            keyboard,
            scheduler: Scheduler::new(),
            pedal: SustainPedal::default(),
            config,
            global_speed: 1.0,
            song_speed: 1.0,
            colours: DEFAULT_COLOURS.to_vec(),
            current: 0,
            enabled: false,
            events: Vec::new(),
        })
    }

    /// Load the first song and enable scheduling. Unlike mid-playlist
    /// transitions this fails fast: a broken first song is a setup error.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.playlist.is_empty() {
            anyhow::bail!("playlist is empty");
        }
        self.current = 0;
        self.load_current()?;
        self.enabled = true;
        Ok(())
    }

    /// Advance one frame: fire due notes, run the pedal lerp and every
    /// key's state machine, then handle song transitions. Returns the
    /// number of notes fired this frame.
    ///
    /// No physics body feeds this entry point, so keys run timer-driven
    /// here whatever the configured mode; integrations that simulate key
    /// bodies call [`Player::advance_with_inputs`] instead.
    ///
    /// Keys keep updating after the player disables itself so release
    /// tails fade out instead of freezing.
    pub fn advance(&mut self, dt: f64) -> usize {
        let config = KeyConfig {
            key_mode: KeyMode::Show,
            ..self.config.clone()
        };
        let sustain = self.pedal.pressed;
        self.frame(dt, &config, |_| KeyInput::show(sustain))
    }

    /// Advance one frame with injected per-key inputs. `inputs` is called
    /// once per key with its pitch name and supplies the observed angle,
    /// physics step and pedal state, so a physical-mode configuration
    /// actually sounds through the facade.
    pub fn advance_with_inputs<F>(&mut self, dt: f64, inputs: F) -> usize
    where
        F: FnMut(&str) -> KeyInput,
    {
        let config = self.config.clone();
        self.frame(dt, &config, inputs)
    }

    fn frame<F>(&mut self, dt: f64, config: &KeyConfig, mut inputs: F) -> usize
    where
        F: FnMut(&str) -> KeyInput,
    {
        let mut fired = 0;
        if self.enabled {
            fired = self.scheduler.advance(
                dt,
                self.global_speed,
                self.song_speed,
                &mut self.keyboard,
                config,
                &self.colours,
            );
        }

        self.pedal.update(dt as f32);
        for (pitch, key) in self.keyboard.keys_mut() {
            let input = inputs(pitch);
            key.update(config, dt as f32, input);
        }

        if self.enabled && self.scheduler.finished() {
            self.next_song();
        }
        fired
    }

    /// Apply the repeat policy and load the song it selects, skipping
    /// unloadable entries.
    fn next_song(&mut self) {
        let len = self.playlist.len();
        for _ in 0..len {
            let next = match self.playlist.repeat {
                RepeatMode::RepeatOne => Some(self.current),
                RepeatMode::RepeatLoop => Some((self.current + 1) % len),
                RepeatMode::NoRepeat => {
                    Some(self.current + 1).filter(|&n| n < len)
                }
            };
            let Some(next) = next else {
                log::info!("playlist finished");
                self.enabled = false;
                return;
            };
            self.current = next;

            match self.load_current() {
                Ok(()) => return,
                Err(e) => {
                    let entry = &self.playlist.songs[self.current];
                    log::error!("skipping {:?}: {e:#}", entry.title());
                }
            }
        }

        log::error!("no loadable song in the playlist, stopping");
        self.enabled = false;
    }

    fn load_current(&mut self) -> anyhow::Result<()> {
        let entry = &self.playlist.songs[self.current];
        let song = load_song(&self.assets_root, &entry.file)?;
        log::info!("now playing {:?} ({} notes)", entry.title(), song.notes.len());

        self.song_speed = entry.speed;
        self.scheduler.load(song.notes);
        self.push_event(PlayerEvent::SongChanged {
            title: entry.title().to_string(),
            details: entry.details.clone(),
        });
        Ok(())
    }

    /// Queue an event for the next poll. A caller that never polls must
    /// not grow the queue without bound, so once full the oldest event is
    /// dropped.
    fn push_event(&mut self, event: PlayerEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.remove(0);
        }
        self.events.push(event);
    }

    /// Drain events accumulated since the last poll.
    pub fn poll_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_global_speed(&mut self, speed: f64) {
        self.global_speed = speed;
    }

    pub fn set_colours(&mut self, colours: Vec<Colour>) {
        self.colours = colours;
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut KeyConfig {
        &mut self.config
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn pedal(&self) -> &SustainPedal {
        &self.pedal
    }

    pub fn pedal_mut(&mut self) -> &mut SustainPedal {
        &mut self.pedal
    }
}
