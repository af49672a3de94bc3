//! Per-key voice allocation.
//!
//! A key needs more than one voice so a fresh attack never audibly cuts
//! off a still-decaying previous attack. Slots are cloned on demand and
//! the pool only grows; eviction is an explicit non-goal.

/// Fast fade applied to displaced voices: full volume to silence in ~0.5 s.
const FAST_FADE_PER_SEC: f32 = 2.0;

/// One audio-emitting slot. Playback itself is an external collaborator's
/// concern; the pool tracks volume and the playing flag.
#[derive(Debug, Clone)]
pub struct VoiceSlot {
    volume: f32,
    playing: bool,
    /// Sample this slot sounds. Cloned slots inherit it, mirroring how a
    /// duplicated audio source keeps its clip and mixer settings.
    sample: String,
}

impl VoiceSlot {
    fn new(sample: String) -> Self {
        Self {
            volume: 1.0,
            playing: false,
            sample,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Begin emitting at the given volume.
    pub fn start_at(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.playing = true;
    }

    /// Begin emitting at whatever volume the slot already has.
    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }
}

/// A key's pool of voice slots plus the fading set.
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<VoiceSlot>,
    current: usize,
    /// Indices of displaced voices on the fast fade. Indices stay valid
    /// because the pool never shrinks.
    fading: Vec<usize>,
}

impl VoicePool {
    pub fn new(sample: String) -> Self {
        Self {
            voices: vec![VoiceSlot::new(sample)],
            current: 0,
            fading: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn current(&self) -> &VoiceSlot {
        &self.voices[self.current]
    }

    pub fn current_mut(&mut self) -> &mut VoiceSlot {
        &mut self.voices[self.current]
    }

    pub fn any_playing(&self) -> bool {
        self.voices.iter().any(|v| v.playing)
    }

    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    /// Select the slot for a new attack. The caller starts it afterwards,
    /// possibly frames later once achieved displacement is known.
    ///
    /// With multi-voice disabled the single current slot is always
    /// restarted, accepting retrigger artifacts as a deliberate trade-off.
    /// Otherwise a silent or already-fading current slot is reused; else
    /// the first idle or faded-out slot is; else a clone of the current
    /// slot joins the pool. The displaced slot goes onto the fast fade.
    pub fn begin_attack(&mut self, multi_voice: bool) {
        let current = &self.voices[self.current];
        let reusable =
            !current.playing || current.volume <= 0.0 || self.fading.contains(&self.current);
        if !multi_voice || reusable {
            let index = self.current;
            self.fading.retain(|&f| f != index);
            return;
        }

        let displaced = self.current;
        let replacement = (0..self.voices.len())
            .find(|&i| i != displaced && (!self.voices[i].playing || self.voices[i].volume <= 0.0));
        match replacement {
            Some(index) => {
                self.current = index;
                self.fading.retain(|&f| f != index);
            }
            None => {
                let clone = self.voices[displaced].clone();
                self.voices.push(clone);
                self.current = self.voices.len() - 1;
            }
        }
        self.fading.push(displaced);
    }

    /// Advance the fast fade on displaced voices. A slot reaching zero is
    /// stopped and leaves the fading set.
    pub fn update_fading(&mut self, dt: f32) {
        let voices = &mut self.voices;
        self.fading.retain(|&i| {
            let voice = &mut voices[i];
            if !voice.playing {
                return false;
            }
            voice.volume -= dt * FAST_FADE_PER_SEC;
            if voice.volume <= 0.0 {
                voice.volume = 0.0;
                voice.stop();
                false
            } else {
                true
            }
        });
    }

    /// Full key-release fade on every audible slot, sustain-pedal gated:
    /// `sustain_secs` to silence with the pedal held, one second without.
    pub fn fade_all(&mut self, dt: f32, sustain_pressed: bool, sustain_secs: f32) {
        self.fading.clear();
        let divisor = if sustain_pressed { sustain_secs } else { 1.0 };
        for voice in &mut self.voices {
            if voice.playing {
                voice.volume -= dt / divisor;
                if voice.volume <= 0.0 {
                    voice.volume = 0.0;
                    voice.stop();
                }
            }
        }
    }
}
