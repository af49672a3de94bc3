mod config;

use std::path::PathBuf;

use clap::Parser;
use pianola_core::{KeyConfig, KeyboardLayout, Player, PlayerEvent, Playlist, pitch_name};

use crate::config::Config;

/// Headless piano playback: runs a playlist of MIDI files against a
/// virtual keyboard with a fixed frame step.
#[derive(Parser, Debug)]
#[command(name = "pianola", version)]
struct Args {
    /// Playlist TOML file.
    #[arg(long)]
    playlist: PathBuf,

    /// Directory containing the MIDI/ folder.
    #[arg(long)]
    assets_root: PathBuf,

    /// Stop after this many seconds of playback.
    #[arg(long, default_value_t = 120.0)]
    seconds: f64,

    /// Simulation frames per second.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,
}

/// A full 88-key piano, A0 through C8, with sample names derived from the
/// pitch names.
fn piano_layout() -> KeyboardLayout {
    let samples = (21..=108).map(|k| format!("{}.ogg", pitch_name(k))).collect();
    KeyboardLayout::new(samples, "A", 0)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = Config::load();

    let playlist = Playlist::load(&args.playlist)?;
    // Player::advance runs keys timer-driven regardless, since no physics
    // body exists here; the configured mode still reaches any embedding
    // that drives the keys itself.
    let key_config = KeyConfig {
        key_mode: config.key_mode,
        multi_voice: config.multi_voice,
        ..KeyConfig::default()
    };

    let mut player = Player::new(playlist, &args.assets_root, &piano_layout(), key_config)?;
    player.set_global_speed(config.global_speed);
    player.start()?;

    let dt = 1.0 / args.fps;
    let frames = (args.seconds * args.fps) as u64;
    let mut total = 0;

    for frame in 0..frames {
        let fired = player.advance(dt);
        total += fired;

        for event in player.poll_events() {
            let PlayerEvent::SongChanged { title, details } = event;
            match details {
                Some(details) => log::info!("song: {title} ({details})"),
                None => log::info!("song: {title}"),
            }
        }
        if fired > 0 {
            log::debug!("frame {frame}: {fired} note(s) fired");
        }

        if !player.is_enabled() {
            break;
        }
    }

    log::info!("done: {total} notes fired");
    Ok(())
}
