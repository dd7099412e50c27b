//! Mashup Player - live stem mashups in the terminal
//!
//! Loads every channel's stems, starts the audio system and reads commands
//! from stdin. Track switches land on the next bar boundary; the beat ring
//! is redrawn on every tick.
//!
//! ## Command line
//!
//! ```text
//! mashup-player [CONFIG] [--init] [--headless]
//! ```
//!
//! - `CONFIG`: session file (default: `~/.config/mashup/config.yaml`)
//! - `--init`: write the default session file and exit
//! - `--headless`: render on a paced thread instead of the sound device

mod commands;
mod display;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;

use mashup_core::audio::{open_output, open_paced_output, start_audio_system, PlayerHandle};
use mashup_core::config::{default_config_path, load_config, read_config, save_config, MashupConfig};
use mashup_core::engine::{BeatEvent, BeatRing, PlaybackController};
use mashup_core::host::SoftwareHost;
use mashup_core::loader::{load_mixer, FileLoader};

use commands::{Command, HELP};

struct Args {
    config_path: Option<PathBuf>,
    init: bool,
    headless: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config_path: None,
        init: false,
        headless: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--init" => args.init = true,
            "--headless" => args.headless = true,
            _ => args.config_path = Some(PathBuf::from(arg)),
        }
    }
    args
}

fn load_session(args: &Args) -> Result<MashupConfig> {
    let (path, mut config) = match &args.config_path {
        // An explicit file must exist and parse
        Some(path) => (path.clone(), read_config::<MashupConfig>(path)?),
        None => {
            let path = default_config_path();
            let config = load_config::<MashupConfig>(&path);
            (path, config)
        }
    };
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    config.validate().context("Invalid session config")?;
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args();
    if args.init {
        let path = args.config_path.clone().unwrap_or_else(default_config_path);
        save_config(&MashupConfig::default(), &path)?;
        println!("Wrote default session to {}", path.display());
        return Ok(());
    }

    log::info!("mashup-player starting up");
    let config = load_session(&args)?;
    let bar = config.bar_config()?;
    log::info!(
        "Session: {} bpm, {} slices per bar ({:.3}s per slice), {} channels",
        bar.bpm(),
        bar.slices(),
        bar.seconds_per_slice(),
        config.channels.len()
    );

    let output = if args.headless {
        open_paced_output(&config.audio)
    } else {
        open_output(&config.audio)?
    };
    if !output.is_device() {
        log::info!("No sound device in use: rendering on a paced thread");
    }

    // Stems are decoded at the output rate so playback never resamples
    let mut host = SoftwareHost::new(output.sample_rate());
    let loader = FileLoader::new(output.sample_rate());
    let runtime = tokio::runtime::Runtime::new().context("Failed to start loader runtime")?;
    let mixer = runtime
        .block_on(load_mixer(&loader, &mut host, &config))
        .context("Failed to load stems")?;
    drop(runtime);

    let controller =
        PlaybackController::new(host, mixer, bar).with_start_master_gain(config.start_master_gain);
    let system = start_audio_system(output, controller, config.audio.tick_queue_capacity)?;
    let mut player = system.player;

    let display = spawn_display(system.beat_events, &player, bar.slices())?;

    println!("{}", HELP);
    print_status(&player);
    run_console(&mut player)?;

    // Stopping the audio thread drops the beat sender, which ends the display
    drop(system.handle);
    if display.join().is_err() {
        log::error!("Display thread panicked");
    }
    log::info!("mashup-player shut down");
    Ok(())
}

fn spawn_display(
    beat_events: Receiver<BeatEvent>,
    player: &PlayerHandle,
    total_slices: u32,
) -> Result<JoinHandle<()>> {
    let atomics = player.atomics();
    std::thread::Builder::new()
        .name("mashup-display".to_string())
        .spawn(move || {
            let mut ring = BeatRing::new();
            for event in beat_events.iter() {
                if ring.apply(&event).is_none() {
                    continue;
                }
                print!(
                    "\r{}  {}  ",
                    display::ring_line(&ring, total_slices),
                    display::transport_line(&atomics)
                );
                let _ = std::io::stdout().flush();
            }
        })
        .context("Failed to spawn display thread")
}

fn print_status(player: &PlayerHandle) {
    let atomics = player.atomics();
    println!("{}", display::transport_line(&atomics));
    for line in display::channel_lines(player.layout(), &atomics) {
        println!("  {}", line);
    }
}

fn run_console(player: &mut PlayerHandle) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        let result = match command {
            Command::Start => player.start(),
            Command::Toggle => player.toggle_play(),
            Command::Stop => player.stop(),
            Command::Select { channel, track } => player.select_track(&channel, track),
            Command::Master(level) => player.set_master_volume(level),
            Command::Volume { channel, level } => player.set_channel_volume(&channel, level),
            Command::Status => {
                print_status(player);
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => break,
        };
        if let Err(e) = result {
            println!("error: {}", e);
        }
    }
    Ok(())
}
