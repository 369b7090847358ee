//! exhale - Respiration-driven MIDI

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use exhale::config::{self, SourceConfig};
use exhale::engine::{list_midi_ports, relay, CancellationToken, MidiPlayer, Session};
use exhale::mapping::Mapping;
use exhale::sources::{StreamResolver, UdpResolver};
use exhale::viz::{run_viz, LogCapture, VizState};
use log::info;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Routed through a capture so the TUI can take log lines off the terminal
    let log = LogCapture::new();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(log.clone())))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config: config_path,
            headless,
        } => {
            info!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;

            // Source first, then the port: a missing stream never opens MIDI
            let session = Session::open(&cfg)?;
            let title = session.title();
            let midi = MidiPlayer::new(&cfg.midi.port)?;

            let token = CancellationToken::new();
            {
                let token = token.clone();
                ctrlc::set_handler(move || {
                    info!("Ctrl+C detected. Stopping...");
                    token.cancel();
                })?;
            }

            let (tx, rx) = relay::bounded(cfg.relay.capacity);
            let run = session.spawn(midi, tx, &token)?;

            let stats = if cfg.viz.enabled && !headless {
                let state = VizState::new(title, &cfg.viz).with_log(log);
                let tick = Duration::from_millis(cfg.viz.tick_ms);
                let viz_result = run_viz(rx, state, tick, &token, || run.is_finished());
                // Whatever ended the display also ends the run, and the
                // note-off goes out before any display error is reported
                let stats = run.stop();
                viz_result?;
                stats?
            } else {
                info!("{} (Ctrl+C to stop)", title);
                drop(rx);
                run.join()?
            };

            if let Some(range) = stats.range {
                println!(
                    "Played {} samples over amplitude range [{:.3}, {:.3}]",
                    stats.samples, range.min, range.max
                );
            } else {
                println!("Stopped during calibration after {} samples", stats.samples);
            }
        }

        Commands::Ports => {
            let ports = list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI output ports available");
            } else {
                println!("MIDI output ports:");
                for port in ports {
                    println!("  - {}", port);
                }
            }
        }

        Commands::Streams { config: config_path } => {
            let cfg = config::load_config(&config_path)?;
            match &cfg.source {
                SourceConfig::Live(live) => {
                    let resolver = UdpResolver::new(live.streams.clone());
                    let streams = resolver.resolve()?;
                    if streams.is_empty() {
                        println!("No streams configured");
                    }
                    for stream in streams {
                        let marker = if stream.name.contains(&live.stream_filter) {
                            "*"
                        } else {
                            " "
                        };
                        println!(
                            "{} {} ({}, {:.1} Hz)",
                            marker,
                            stream.name,
                            stream.locator,
                            stream.effective_rate()
                        );
                    }
                }
                SourceConfig::Prerecorded(_) => {
                    println!("Configuration uses a prerecorded source; no streams to list");
                }
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    match &cfg.source {
                        SourceConfig::Live(live) => {
                            println!("  Source: live ('{}' #{})", live.stream_filter, live.stream_index);
                            println!("  Sensor channel: {}", live.channel);
                            println!("  Calibration: {:.0}s", live.calibration_secs);
                        }
                        SourceConfig::Prerecorded(rec) => {
                            println!("  Source: {:?}", rec.input_file);
                            println!("  Sampling rate: {} Hz", rec.sampling_rate);
                        }
                    }
                    println!("  Cutoff: {} Hz", cfg.filter.cutoff);
                    println!("  MIDI port: {}", cfg.midi.port);
                    match cfg.mapping {
                        Mapping::ToNote {
                            note_low,
                            note_high,
                            velocity,
                            channel,
                        } => println!(
                            "  Mapping: notes {}-{} velocity {} on channel {}",
                            note_low, note_high, velocity, channel
                        ),
                        Mapping::ToController { cc, channel } => {
                            println!("  Mapping: CC {} on channel {}", cc, channel)
                        }
                    }
                }
                Err(e) => {
                    println!("Configuration is invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../exhale.example.yaml");

            let path = "exhale.yaml";
            if std::path::Path::new(path).exists() {
                println!("exhale.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created exhale.yaml with example configuration.");
            }
        }
    }

    Ok(())
}
