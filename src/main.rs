// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use airstrum::audio;
use airstrum::chords::ChordSymbol;
use airstrum::clock::MonotonicClock;
use airstrum::config::{Audio, InstrumentConfig};
use airstrum::controller::{jsonl, Controller};
use airstrum::pipeline::Orchestrator;
use airstrum::samples::Playback;
use clap::{crate_version, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A gesture-driven virtual instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will run the instrument, reading landmark frames as JSON lines.
    Start {
        /// The path to the instrument config.
        config_path: PathBuf,
        /// The file to read frames from. Reads stdin when omitted.
        frames_path: Option<PathBuf>,
    },
    /// Runs recorded frames through the pipeline without sound and prints what would play.
    Replay {
        /// The file to read frames from.
        frames_path: PathBuf,
        /// The path to the instrument config.
        #[arg[short, long]]
        config_path: Option<PathBuf>,
    },
    /// Plays a single chord through the audio interface.
    Play {
        /// The chord to play.
        chord: String,
        /// The path to the instrument config.
        #[arg[short, long]]
        config_path: Option<PathBuf>,
    },
    /// Prints the chord table.
    Chords {},
    /// Lists the available audio output devices.
    Devices {},
}

fn load_config(path: Option<&PathBuf>) -> Result<InstrumentConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => InstrumentConfig::load(path)?,
        None => InstrumentConfig::default(),
    })
}

/// Opens the configured device. An unusable device leaves the instrument silent.
fn open_device(config: Option<&Audio>) -> Option<Arc<dyn audio::Device>> {
    match audio::get_device(config) {
        Ok(device) => device,
        Err(e) => {
            warn!(err = %e, "Unable to open audio output, running silently");
            None
        }
    }
}

fn input(path: Option<PathBuf>) -> jsonl::Input {
    match path {
        Some(path) => jsonl::Input::File(path),
        None => jsonl::Input::Stdin,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config_path,
            frames_path,
        } => {
            let config = InstrumentConfig::load(&config_path)?;
            let device = open_device(config.audio());
            let orchestrator =
                Orchestrator::from_config(&config, device, Arc::new(MonotonicClock::new()))?;
            let driver = Arc::new(jsonl::Driver::new(input(frames_path)));

            Controller::new(orchestrator, driver).join().await?;
        }
        Commands::Replay {
            frames_path,
            config_path,
        } => {
            let config = load_config(config_path.as_ref())?.without_audio();
            let orchestrator =
                Orchestrator::from_config(&config, None, Arc::new(MonotonicClock::new()))?;
            // Recordings without timestamps are spaced at a nominal frame rate.
            let driver = Arc::new(
                jsonl::Driver::new(jsonl::Input::File(frames_path))
                    .with_frame_interval(jsonl::DEFAULT_FRAME_INTERVAL),
            );
            let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();

            let mut controller = Controller::with_reports(orchestrator, driver, reports_tx);
            let (mut frames, mut strums) = (0, 0);
            while let Some(report) = reports_rx.recv().await {
                frames += 1;
                let at_ms = report.at.as_secs_f64() * 1000.0;
                if report.chord_changed {
                    if let Some(chord) = report.stable_chord {
                        println!("{:>10.1}ms chord {}", at_ms, chord);
                    }
                }
                if report.strummed {
                    strums += 1;
                    match report.stable_chord {
                        Some(chord) => println!("{:>10.1}ms strum {}", at_ms, chord),
                        None => println!("{:>10.1}ms strum (no chord)", at_ms),
                    }
                }
            }
            controller.join().await?;
            println!("{} frames, {} strums", frames, strums);
        }
        Commands::Play { chord, config_path } => {
            let config = load_config(config_path.as_ref())?;
            let audio_config = config
                .audio()
                .cloned()
                .unwrap_or_else(|| Audio::new(airstrum::config::DEFAULT_AUDIO_DEVICE));
            let device = audio::get_device(Some(&audio_config))?;
            let mut orchestrator =
                Orchestrator::from_config(&config, device, Arc::new(MonotonicClock::new()))?;
            orchestrator.start().await;
            // Playing from the command line is the interaction.
            orchestrator.interaction();

            let playback = orchestrator.engine().play_named(&chord);
            if playback != Playback::Silent {
                tokio::time::sleep(config.synth().settings()?.stop + Duration::from_millis(250))
                    .await;
            }
            orchestrator.stop();
            println!("{}: {:?}", chord, playback);
        }
        Commands::Chords {} => {
            println!("Chords:");
            for chord in ChordSymbol::ALL {
                let triad = chord.triad();
                println!(
                    "- {:<4} {} ({:.2}Hz, {:.2}Hz, {:.2}Hz)",
                    chord.to_string(),
                    chord.fingerprint(),
                    triad[0],
                    triad[1],
                    triad[2]
                );
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}
