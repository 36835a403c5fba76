use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use storywalk_core::{
    AppConfig, Effect, PlaybackSink, Reading, SessionStatus, SharedPlayback, StoryError,
    StoryLibrary, StorySession,
};
use tracing_subscriber::EnvFilter;

fn main() -> storywalk_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List { root } => run_list(&root, &config),
        Commands::Inspect { root, title } => run_inspect(&root, &title, &config),
        Commands::Replay {
            root,
            title,
            track,
            clip_readings,
        } => run_replay(&root, &title, &track, clip_readings, &config),
    }
}

fn load_config(path: Option<&Path>) -> storywalk_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_list(root: &Path, config: &AppConfig) -> storywalk_core::Result<()> {
    let library = StoryLibrary::load_lenient(root, &config.library)?;
    for title in library.titles() {
        println!("{title}");
    }
    Ok(())
}

fn run_inspect(root: &Path, title: &str, config: &AppConfig) -> storywalk_core::Result<()> {
    let library = StoryLibrary::load(root, &config.library)?;
    let story = library.get(title)?;
    println!("{}", to_json(story, true)?);
    Ok(())
}

fn run_replay(
    root: &Path,
    title: &str,
    track: &Path,
    clip_readings: u32,
    config: &AppConfig,
) -> storywalk_core::Result<()> {
    let library = StoryLibrary::load(root, &config.library)?;
    let story = library.get(title)?.clone();
    let readings: Vec<Reading> = serde_json::from_str(&std::fs::read_to_string(track)?)
        .map_err(|err| StoryError::msg(format!("invalid track {}: {err}", track.display())))?;
    tracing::info!(title, readings = readings.len(), "replaying track");

    let mut session = StorySession::new(story, &config.session);
    let mut player = SharedPlayback::new();
    // Readings left before the simulated player finishes the current clip.
    let mut remaining = None;

    let effects = session.start(&mut player)?;
    if player.is_playing() {
        remaining = Some(clip_readings);
    }
    emit(&effects)?;

    for reading in readings {
        if session.status() == SessionStatus::Finished {
            break;
        }

        let effects = match session.on_reading(reading, &mut player) {
            Ok(effects) => effects,
            Err(StoryError::Interrupted { effects, source }) => {
                emit(&effects)?;
                return Err(*source);
            }
            Err(err) => return Err(err),
        };
        emit(&effects)?;

        if effects.iter().any(|effect| matches!(effect, Effect::PlayRequest { .. })) {
            remaining = Some(clip_readings);
            continue;
        }

        remaining = match remaining {
            Some(0) | Some(1) => {
                if let Some(clip) = player.finish()? {
                    tracing::debug!(clip, "clip finished");
                }
                emit(&session.on_playback_finished())?;
                None
            }
            Some(left) => Some(left - 1),
            None => None,
        };
    }

    tracing::info!(status = ?session.status(), "replay finished");
    Ok(())
}

fn emit(effects: &[Effect]) -> storywalk_core::Result<()> {
    for effect in effects {
        println!("{}", to_json(effect, false)?);
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> storywalk_core::Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|err| StoryError::msg(format!("could not serialise output: {err}")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Location-based audio story player", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the titles of every story in a library.
    List {
        /// Library root containing the stories folder.
        #[arg(short, long)]
        root: PathBuf,
    },
    /// Print a compiled story as JSON.
    Inspect {
        #[arg(short, long)]
        root: PathBuf,
        #[arg(short, long)]
        title: String,
    },
    /// Run a story against a recorded track of location readings.
    Replay {
        #[arg(short, long)]
        root: PathBuf,
        #[arg(short, long)]
        title: String,
        /// JSON array of readings (`latitude`, `longitude`, `accuracy`).
        #[arg(long)]
        track: PathBuf,
        /// Readings after which the simulated player finishes a clip.
        #[arg(long, default_value_t = 3)]
        clip_readings: u32,
    },
}
