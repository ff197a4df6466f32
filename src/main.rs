use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use crossbeam::channel::Receiver;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use loopscore::audio::SoundLibrary;
use loopscore::events::Event;
use loopscore::score::{alignment, lint_sounds};
use loopscore::timing::{Action, CompiledScore, Timeline};
use loopscore::{
    EngineCommand, EngineError, EngineUpdate, Host, LogHost, MidiHost, PlaybackConfig, Score,
    ScoreError, piano_pizza, spawn_engine, watch_score,
};

/// loopscore - play live-coded loop scores
#[derive(Parser)]
#[command(name = "loopscore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a score and show how its loops line up
    Check {
        /// RON score file (default: the built-in piano pizza score)
        score: Option<PathBuf>,
    },

    /// Print the events of the first beats of a score
    Timeline {
        /// RON score file (default: the built-in piano pizza score)
        score: Option<PathBuf>,

        /// Number of beats to print
        #[arg(short, long, default_value_t = 16.0, value_parser = parse_beats)]
        beats: f64,
    },

    /// Write the built-in score as RON
    Export {
        /// Output file
        path: PathBuf,
    },

    /// Play a score in real time
    Play {
        /// RON score file (default: the built-in piano pizza score)
        score: Option<PathBuf>,

        /// Stop after this many beats instead of waiting for Enter
        #[arg(short, long, value_parser = parse_beats)]
        beats: Option<f64>,

        /// Send to the MIDI output whose name contains PORT instead of logging
        #[arg(long, value_name = "PORT")]
        midi: Option<String>,

        /// Reload the score whenever the file is saved
        #[arg(short, long)]
        watch: bool,

        /// Playback config file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List MIDI output ports
    Ports,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("engine stopped unexpectedly")]
    EngineGone,
}

fn parse_beats(s: &str) -> Result<f64, String> {
    let beats: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if beats.is_finite() && beats >= 0.0 {
        Ok(beats)
    } else {
        Err(format!("{s} is not a number of beats"))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Play {
            config: Some(path), ..
        } => match PlaybackConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
        },
        _ => PlaybackConfig::default(),
    };
    init_logging(cli.log.as_deref().unwrap_or(&config.log_filter));

    let result = match cli.command {
        Commands::Check { score } => check(score.as_deref()),
        Commands::Timeline { score, beats } => timeline(score.as_deref(), beats),
        Commands::Export { path } => export(&path),
        Commands::Play {
            score,
            beats,
            midi,
            watch,
            config: _,
        } => play(score.as_deref(), beats, midi, watch, config),
        Commands::Ports => ports(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_score(path: Option<&Path>) -> Result<Score, ScoreError> {
    match path {
        Some(path) => Score::load(path),
        None => Ok(piano_pizza()),
    }
}

fn check(path: Option<&Path>) -> Result<(), CliError> {
    let score = load_score(path)?;
    println!(
        "{}: {} bpm, {} loop(s)",
        score.name,
        score.bpm,
        score.loops.len()
    );

    for row in alignment(&score) {
        match &row.sync {
            Some(target) => println!(
                "  {:<12} {:>6} beats  sync {:<12} {}",
                row.name, row.cycle_beats, target, row.alignment
            ),
            None => println!("  {:<12} {:>6} beats  {}", row.name, row.cycle_beats, row.alignment),
        }
    }

    for warning in lint_sounds(&score, &SoundLibrary::default()) {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn timeline(path: Option<&Path>, beats: f64) -> Result<(), CliError> {
    let score = load_score(path)?;
    let compiled = Arc::new(CompiledScore::compile(&score).map_err(ScoreError::Invalid)?);
    let mut timeline = Timeline::new(Arc::clone(&compiled));

    for event in timeline.events_between(0.0, beats) {
        let loop_name = &compiled.loops[event.loop_id].name;
        match &event.event {
            Event::Cue => println!(
                "{:>8.3}  {:<12} cycle {}",
                event.beat, loop_name, event.iteration
            ),
            Event::Trigger {
                action:
                    Action::Play {
                        synth,
                        pitch,
                        params,
                    },
                ..
            } => println!(
                "{:>8.3}  {:<12} play {} on {} release {} amp {}",
                event.beat,
                loop_name,
                pitch,
                synth,
                params.release_or_default(),
                params.amp_or_default()
            ),
            Event::Trigger {
                action: Action::Sample { name, params },
                ..
            } => println!(
                "{:>8.3}  {:<12} sample {} rate {} amp {}",
                event.beat,
                loop_name,
                name,
                params.rate_or_default(),
                params.amp_or_default()
            ),
        }
    }
    Ok(())
}

fn export(path: &Path) -> Result<(), CliError> {
    piano_pizza().save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn ports() -> Result<(), CliError> {
    let names = MidiHost::port_names().map_err(EngineError::Midi)?;
    if names.is_empty() {
        println!("no MIDI output ports");
    }
    for (i, name) in names.iter().enumerate() {
        println!("{i}: {name}");
    }
    Ok(())
}

fn play(
    path: Option<&Path>,
    beats: Option<f64>,
    midi: Option<String>,
    watch: bool,
    config: PlaybackConfig,
) -> Result<(), CliError> {
    let score = load_score(path)?;
    let clock = CompiledScore::compile(&score)
        .map_err(ScoreError::Invalid)?
        .clock;

    let library = SoundLibrary::default();
    for warning in lint_sounds(&score, &library) {
        warn!(%warning, "the host may refuse this");
    }

    let host: Box<dyn Host + Send> = match midi.or_else(|| config.midi_port.clone()) {
        Some(port) => {
            let midi = MidiHost::connect(Some(&port), config.midi_channel, library)
                .map_err(EngineError::Midi)?;
            println!("Playing to {}", midi.port_name());
            Box::new(midi)
        }
        None => Box::new(LogHost::new(library)),
    };

    let engine = spawn_engine(host, config);
    engine
        .command_tx
        .send(EngineCommand::LoadScore(score))
        .map_err(|_| CliError::EngineGone)?;
    engine
        .command_tx
        .send(EngineCommand::Play)
        .map_err(|_| CliError::EngineGone)?;

    let _watcher = match (watch, path) {
        (true, Some(path)) => Some(watch_score(path, engine.command_tx.clone())?),
        (true, None) => {
            warn!("--watch needs a score file, the built-in score cannot change");
            None
        }
        (false, _) => None,
    };

    let stop = match beats {
        Some(beats) => crossbeam::channel::after(clock.beats_to_duration(beats)),
        None => {
            println!("Press Enter to stop");
            enter_pressed()
        }
    };

    loop {
        crossbeam::select! {
            recv(engine.update_rx) -> update => match update {
                Ok(EngineUpdate::ScoreLoaded { name, bpm }) => info!(score = %name, bpm, "ready"),
                Ok(EngineUpdate::Fault { loop_name, step, message }) => {
                    warn!(loop_name = %loop_name, step, "{message}")
                }
                Ok(EngineUpdate::Error { message }) => error!("{message}"),
                Ok(EngineUpdate::PlaybackState { playing: false }) => break,
                Ok(EngineUpdate::PlaybackState { playing: true }) => {}
                Err(_) => return Err(CliError::EngineGone),
            },
            recv(stop) -> _ => break,
        }
    }

    let _ = engine.command_tx.send(EngineCommand::Shutdown);
    // the engine hangs up once the host is quiet
    while engine.update_rx.recv().is_ok() {}
    Ok(())
}

fn enter_pressed() -> Receiver<std::time::Instant> {
    let (tx, rx) = crossbeam::channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(std::time::Instant::now());
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_with_every_option() {
        let cli = Cli::try_parse_from([
            "loopscore",
            "play",
            "song.ron",
            "--beats",
            "32",
            "--midi",
            "IAC",
            "--watch",
            "--config",
            "playback.ron",
        ])
        .unwrap();
        match cli.command {
            Commands::Play {
                score,
                beats,
                midi,
                watch,
                config,
            } => {
                assert_eq!(score, Some(PathBuf::from("song.ron")));
                assert_eq!(beats, Some(32.0));
                assert_eq!(midi.as_deref(), Some("IAC"));
                assert!(watch);
                assert_eq!(config, Some(PathBuf::from("playback.ron")));
            }
            _ => panic!("expected play command"),
        }
    }

    #[test]
    fn score_is_optional() {
        let cli = Cli::try_parse_from(["loopscore", "check"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { score: None }));

        let cli = Cli::try_parse_from(["loopscore", "timeline"]).unwrap();
        match cli.command {
            Commands::Timeline { score, beats } => {
                assert!(score.is_none());
                assert_eq!(beats, 16.0);
            }
            _ => panic!("expected timeline command"),
        }
    }

    #[test]
    fn beats_must_be_finite_and_not_negative() {
        for bad in ["-1", "inf", "NaN", "four"] {
            assert!(
                Cli::try_parse_from(["loopscore", "play", "--beats", bad]).is_err(),
                "{bad}"
            );
        }
        let cli = Cli::try_parse_from(["loopscore", "timeline", "--beats", "1e20"]).unwrap();
        assert!(matches!(cli.command, Commands::Timeline { beats, .. } if beats == 1e20));
    }

    #[test]
    fn export_needs_a_path() {
        assert!(Cli::try_parse_from(["loopscore", "export"]).is_err());
    }

    #[test]
    fn log_filter_is_global() {
        let cli = Cli::try_parse_from(["loopscore", "check", "--log", "debug"]).unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
    }
}
