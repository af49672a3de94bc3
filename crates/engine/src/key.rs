//! Per-key playback state machine.
//!
//! The key coordinates mechanical motion and voice emission. It never
//! polls a physics engine: the observed mechanical angle arrives as an
//! input each frame, and corrective motion goes back out as a
//! [`KeyMotion`] for an external body to apply. In show mode no angle is
//! sampled at all; note progress substitutes for the angle band.

use pianola_transport::{Colour, KeyMode};

use crate::voice::VoicePool;

/// Resting key angle in degrees. Pressing swings the angle downwards
/// through 359.5 and below.
pub const REST_ANGLE: f32 = 360.0;

/// Fully-pressed band: the attack fires when the angle enters it.
const PRESSED_BAND: (f32, f32) = (350.0, 359.5);

/// Physics steps to wait between arming an attack and sampling achieved
/// displacement for its volume.
const ATTACK_SAMPLE_STEPS: u64 = 2;

/// Behaviour flags shared by every key, injected per call so keys hold no
/// back-reference to their owner.
#[derive(Debug, Clone)]
pub struct KeyConfig {
    pub key_mode: KeyMode,
    /// When false, the single current voice is always restarted
    /// (retrigger artifacts accepted to save memory).
    pub multi_voice: bool,
    /// Release-fade length while the sustain pedal is held.
    pub sustain_secs: f32,
    /// Angle above which a decaying key still counts as depressed.
    pub press_angle_threshold: f32,
    /// Degrees per second a decaying key drifts back toward rest.
    pub press_angle_decay: f32,
    /// Hold the key near peak depression and release it slowly instead of
    /// springing back.
    pub angle_decay: bool,
    /// A note landing on a still-pressed key resets the angle outright
    /// instead of applying a corrective impulse.
    pub teleport_on_retrigger: bool,
    pub show_channel_colours: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_mode: KeyMode::default(),
            multi_voice: true,
            sustain_secs: 5.0,
            press_angle_threshold: 355.0,
            press_angle_decay: 1.0,
            angle_decay: true,
            teleport_on_retrigger: true,
            show_channel_colours: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Idle,
    Pressing,
    Releasing,
}

/// Per-frame observations fed into a key.
#[derive(Debug, Clone, Copy)]
pub struct KeyInput {
    /// Current mechanical angle in degrees, 360 at rest. Ignored in show
    /// mode.
    pub angle: f32,
    /// Monotonic physics-step counter, used to resolve pending attacks.
    pub physics_step: u64,
    pub sustain_pressed: bool,
}

impl KeyInput {
    /// Input for a show-mode frame, where no body is simulated.
    pub fn show(sustain_pressed: bool) -> Self {
        Self {
            angle: REST_ANGLE,
            physics_step: 0,
            sustain_pressed,
        }
    }
}

/// Corrective motion for an external physics body to apply this frame.
/// Negative torque presses the key down.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyMotion {
    pub torque: f32,
    /// Clamp the body's rotation to this angle.
    pub hold_angle: Option<f32>,
}

/// Armed attack waiting for the displacement sample.
#[derive(Debug, Clone, Copy)]
struct PendingAttack {
    deadline_step: u64,
    start_angle: f32,
}

#[derive(Debug)]
pub struct PianoKey {
    voices: VoicePool,
    state: KeyState,
    /// Note progress in [0, 1], advanced by `dt / length * speed`.
    progress: f32,
    velocity: f32,
    length: f32,
    speed: f32,
    colour: Option<Colour>,
    /// Deepest angle reached during the current press.
    key_angle: f32,
    depression: bool,
    /// Edge detector for the pressed band in physical mode.
    played: bool,
    attack: Option<PendingAttack>,
    active: bool,
}

impl PianoKey {
    pub fn new(sample: String) -> Self {
        Self {
            voices: VoicePool::new(sample),
            state: KeyState::Idle,
            progress: 0.0,
            velocity: 0.0,
            length: 1.0,
            speed: 1.0,
            colour: None,
            key_angle: REST_ANGLE,
            depression: false,
            played: false,
            attack: None,
            active: false,
        }
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    /// Colour tag and blend factor for an external renderer, present while
    /// a coloured note is in progress. Blend runs 0 (full channel colour)
    /// to 1 (resting colour) with note progress.
    pub fn colour_blend(&self) -> Option<(Colour, f32)> {
        if self.active {
            self.colour.map(|c| (c, self.progress.clamp(0.0, 1.0)))
        } else {
            None
        }
    }

    /// Fire a note on this key.
    ///
    /// Cancels any in-flight pending attack. In show mode the voice starts
    /// immediately at `velocity / 127`; in physical mode the attack waits
    /// until the body actually enters the pressed band. A note landing
    /// while the key is still pressing either teleports the angle back to
    /// rest or kicks the body with an extra impulse, per configuration.
    pub fn play(
        &mut self,
        config: &KeyConfig,
        velocity: u8,
        length_secs: f64,
        speed: f64,
        colour: Option<Colour>,
    ) -> KeyMotion {
        let mut motion = KeyMotion::default();
        self.key_angle = REST_ANGLE;

        if self.active {
            if config.teleport_on_retrigger {
                motion.hold_angle = Some(REST_ANGLE);
            } else {
                motion.torque = 127.0;
            }
        }

        self.velocity = velocity as f32;
        self.length = length_secs as f32;
        self.speed = speed as f32;
        self.progress = 0.0;
        self.active = true;
        self.depression = true;
        self.attack = None;
        self.colour = if config.show_channel_colours {
            colour
        } else {
            None
        };
        self.state = KeyState::Pressing;

        if config.key_mode == KeyMode::Show {
            self.voices.begin_attack(config.multi_voice);
            self.voices.current_mut().start_at(self.velocity / 127.0);
        }
        motion
    }

    /// Advance one frame. Returns corrective motion for the key body;
    /// always `KeyMotion::default()` in show mode.
    pub fn update(&mut self, config: &KeyConfig, dt: f32, input: KeyInput) -> KeyMotion {
        let mut motion = KeyMotion::default();

        if self.active {
            self.mechanics(config, dt, input.angle, &mut motion);
        }

        match config.key_mode {
            KeyMode::Physical => {
                let angle = input.angle;
                if angle > PRESSED_BAND.0 && angle < PRESSED_BAND.1 {
                    if !self.played {
                        self.voices.begin_attack(config.multi_voice);
                        self.attack = Some(PendingAttack {
                            deadline_step: input.physics_step + ATTACK_SAMPLE_STEPS,
                            start_angle: angle,
                        });
                        self.played = true;
                    }
                } else if angle > 359.9 || angle < PRESSED_BAND.0 {
                    self.voices
                        .fade_all(dt, input.sustain_pressed, config.sustain_secs);
                    self.played = false;
                }

                if let Some(pending) = self.attack {
                    if input.physics_step >= pending.deadline_step {
                        let displacement = (pending.start_angle - input.angle).abs();
                        let slot = self.voices.current_mut();
                        if displacement > 0.0 {
                            slot.start_at((displacement / 2.0).clamp(0.0, 1.0));
                        } else {
                            slot.start();
                        }
                        self.attack = None;
                    }
                }
            }
            KeyMode::Show => {
                if self.progress >= 1.0 {
                    self.voices
                        .fade_all(dt, input.sustain_pressed, config.sustain_secs);
                }
            }
        }

        self.voices.update_fading(dt);

        self.state = if self.active && self.progress < 1.0 {
            KeyState::Pressing
        } else if self.voices.any_playing() {
            KeyState::Releasing
        } else {
            KeyState::Idle
        };
        motion
    }

    /// Press mechanics while a note is in progress: corrective torque near
    /// rest, deepest-angle tracking, and the optional slow decay back to
    /// rest.
    fn mechanics(&mut self, config: &KeyConfig, dt: f32, angle: f32, motion: &mut KeyMotion) {
        if self.progress < 1.0 {
            if angle < 1.0 || angle > PRESSED_BAND.1 {
                motion.torque = -(self.velocity / 1024.0);
            }

            if angle > 1.0 {
                let tracking = (config.angle_decay
                    && self.depression
                    && angle > config.press_angle_threshold)
                    || (!config.angle_decay && angle < self.key_angle);
                if tracking {
                    self.key_angle = angle;
                } else {
                    if angle <= config.press_angle_threshold {
                        self.depression = false;
                    }
                    motion.hold_angle = Some(self.key_angle);
                    if config.angle_decay && !self.depression && angle < PRESSED_BAND.1 {
                        self.key_angle += dt * config.press_angle_decay;
                    }
                }
            }

            if self.length > 0.0 {
                self.progress += dt / self.length * self.speed;
            } else {
                self.progress = 1.0;
            }
        } else {
            // Spring and constant force take over externally.
            self.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show_config() -> KeyConfig {
        KeyConfig {
            key_mode: KeyMode::Show,
            ..KeyConfig::default()
        }
    }

    fn physical_config() -> KeyConfig {
        KeyConfig::default()
    }

    fn key() -> PianoKey {
        PianoKey::new("A0.ogg".to_string())
    }

    #[test]
    fn test_show_mode_attack_is_immediate() {
        let cfg = show_config();
        let mut k = key();
        k.play(&cfg, 127, 1.0, 1.0, None);
        assert!(k.voices().current().is_playing());
        assert!((k.voices().current().volume() - 1.0).abs() < 1e-6);
        assert_eq!(k.state(), KeyState::Pressing);
    }

    #[test]
    fn test_show_mode_velocity_maps_to_volume() {
        let cfg = show_config();
        let mut k = key();
        k.play(&cfg, 64, 1.0, 1.0, None);
        assert!((k.voices().current().volume() - 64.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_show_mode_full_cycle_returns_to_idle() {
        let cfg = show_config();
        let mut k = key();
        k.play(&cfg, 100, 0.1, 1.0, None);

        // Run well past the note length plus the release fade.
        for _ in 0..200 {
            k.update(&cfg, 0.02, KeyInput::show(false));
        }
        assert_eq!(k.state(), KeyState::Idle);
        assert!(!k.voices().any_playing());
    }

    #[test]
    fn test_show_mode_enters_releasing_after_progress() {
        let cfg = show_config();
        let mut k = key();
        k.play(&cfg, 100, 0.1, 1.0, None);

        // One frame past the note length: still audible, now releasing.
        k.update(&cfg, 0.15, KeyInput::show(false));
        k.update(&cfg, 0.01, KeyInput::show(false));
        assert_eq!(k.state(), KeyState::Releasing);
    }

    #[test]
    fn test_physical_attack_waits_for_pressed_band() {
        let cfg = physical_config();
        let mut k = key();
        k.play(&cfg, 100, 1.0, 1.0, None);

        // Key still at rest: nothing sounds.
        let input = KeyInput {
            angle: REST_ANGLE,
            physics_step: 0,
            sustain_pressed: false,
        };
        k.update(&cfg, 0.01, input);
        assert!(!k.voices().any_playing());

        // Body swings into the pressed band; attack arms, then fires two
        // steps later with displacement-derived volume.
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 358.0,
                physics_step: 1,
                sustain_pressed: false,
            },
        );
        assert!(!k.voices().any_playing(), "attack is pending, not fired");
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 357.0,
                physics_step: 3,
                sustain_pressed: false,
            },
        );
        assert!(k.voices().any_playing());
        // Displacement of 1 degree maps to volume 0.5.
        assert!((k.voices().current().volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_new_play_cancels_pending_attack() {
        let cfg = physical_config();
        let mut k = key();
        k.play(&cfg, 100, 1.0, 1.0, None);
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 358.0,
                physics_step: 1,
                sustain_pressed: false,
            },
        );
        assert!(k.attack.is_some());

        k.play(&cfg, 100, 1.0, 1.0, None);
        assert!(k.attack.is_none());
    }

    #[test]
    fn test_physical_release_band_fades() {
        let cfg = physical_config();
        let mut k = key();
        k.play(&cfg, 100, 10.0, 1.0, None);
        // Attack.
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 358.0,
                physics_step: 1,
                sustain_pressed: false,
            },
        );
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 356.0,
                physics_step: 3,
                sustain_pressed: false,
            },
        );
        assert!(k.voices().any_playing());

        // Key springs back past the band: release fade runs to silence.
        for step in 4..250 {
            k.update(
                &cfg,
                0.01,
                KeyInput {
                    angle: REST_ANGLE,
                    physics_step: step,
                    sustain_pressed: false,
                },
            );
        }
        assert!(!k.voices().any_playing());
    }

    #[test]
    fn test_retrigger_teleports_or_kicks() {
        let mut teleport_cfg = show_config();
        teleport_cfg.teleport_on_retrigger = true;
        let mut k = key();
        k.play(&teleport_cfg, 100, 1.0, 1.0, None);
        let motion = k.play(&teleport_cfg, 100, 1.0, 1.0, None);
        assert_eq!(motion.hold_angle, Some(REST_ANGLE));

        let mut kick_cfg = show_config();
        kick_cfg.teleport_on_retrigger = false;
        let mut k = key();
        k.play(&kick_cfg, 100, 1.0, 1.0, None);
        let motion = k.play(&kick_cfg, 100, 1.0, 1.0, None);
        assert_eq!(motion.torque, 127.0);
    }

    #[test]
    fn test_mechanics_torque_near_rest() {
        let cfg = physical_config();
        let mut k = key();
        k.play(&cfg, 100, 1.0, 1.0, None);
        let motion = k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: REST_ANGLE,
                physics_step: 0,
                sustain_pressed: false,
            },
        );
        assert!((motion.torque - (-100.0 / 1024.0)).abs() < 1e-6);
    }

    #[test]
    fn test_decay_mode_holds_then_drifts() {
        let mut cfg = physical_config();
        cfg.angle_decay = true;
        cfg.press_angle_decay = 10.0;
        let mut k = key();
        k.play(&cfg, 100, 10.0, 1.0, None);

        // Depress past the threshold, then rebound slightly: the key is
        // held at its deepest angle rather than springing straight back.
        k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 356.0,
                physics_step: 1,
                sustain_pressed: false,
            },
        );
        let motion = k.update(
            &cfg,
            0.01,
            KeyInput {
                angle: 354.0,
                physics_step: 2,
                sustain_pressed: false,
            },
        );
        assert_eq!(motion.hold_angle, Some(356.0));
    }

    #[test]
    fn test_colour_tag_only_when_enabled() {
        let mut cfg = show_config();
        cfg.show_channel_colours = false;
        let mut k = key();
        k.play(&cfg, 100, 1.0, 1.0, Some([1.0, 0.0, 0.0]));
        assert!(k.colour_blend().is_none());

        cfg.show_channel_colours = true;
        let mut k = key();
        k.play(&cfg, 100, 1.0, 1.0, Some([1.0, 0.0, 0.0]));
        let (colour, blend) = k.colour_blend().expect("colour tag set");
        assert_eq!(colour, [1.0, 0.0, 0.0]);
        assert_eq!(blend, 0.0);
    }

    #[test]
    fn test_zero_length_note_completes_immediately() {
        let cfg = show_config();
        let mut k = key();
        k.play(&cfg, 100, 0.0, 1.0, None);
        k.update(&cfg, 0.01, KeyInput::show(false));
        assert_ne!(k.state(), KeyState::Pressing);
    }
}
