#![forbid(unsafe_code)]

mod color;
mod config;
mod constants;
mod error;
mod event_handler;
mod gesture;
mod keysym;
mod layout_watcher;
mod overlay;
mod pidfile;
mod record;
mod snap;
mod types;
mod x11_utils;
mod zones;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;

use config::Settings;
use error::{ConfigError, ProfileError, QueryError};
use event_handler::GestureHandler;
use gesture::GestureStateMachine;
use layout_watcher::{LayoutTargets, X11LayoutSource};
use overlay::{OverlayCommand, OverlayThread};
use pidfile::PidFile;
use record::InputRecorder;
use types::Rect;
use x11_utils::{CachedAtoms, X11Windows};
use zones::{SharedProfile, ZoneProfile};

#[derive(Debug, Parser)]
#[command(name = "snapzones", version, about = "Snap windows into screen zones by dragging them with a trigger key held")]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/snapzones/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the snapping daemon (default)
    Run,
    /// Stop the running daemon
    Stop,
    /// Print the computed zones and exit
    Zones {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_level(name: &str) -> Option<TraceLevel> {
    match name.trim().to_lowercase().as_str() {
        "trace" => Some(TraceLevel::TRACE),
        "debug" => Some(TraceLevel::DEBUG),
        "info" => Some(TraceLevel::INFO),
        "warn" => Some(TraceLevel::WARN),
        "error" => Some(TraceLevel::ERROR),
        _ => None,
    }
}

/// `-v` wins, then `LOG_LEVEL`, then the settings file, then info
fn log_level(verbose: bool, settings_level: Option<&str>) -> TraceLevel {
    if verbose {
        return TraceLevel::DEBUG;
    }
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| parse_level(&level))
        .or_else(|| settings_level.and_then(parse_level))
        .unwrap_or(TraceLevel::INFO)
}

fn subscriber(level: TraceLevel) -> FmtSubscriber {
    FmtSubscriber::builder().with_max_level(level).finish()
}

/// `stop` only reads the PID file, so a broken settings file cannot block it
fn needs_settings(command: &Command) -> bool {
    !matches!(command, Command::Stop)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);
    let config_path = cli.config.clone().unwrap_or_else(Settings::default_path);

    // Settings decide the final log level, so loading them logs through a
    // temporary subscriber
    let settings = needs_settings(&command).then(|| {
        tracing::subscriber::with_default(subscriber(log_level(cli.verbose, None)), || {
            Settings::load(&config_path)
        })
    });

    let settings_level = settings.as_ref().and_then(|s| s.as_ref().ok()).map(|s| s.log_level.as_str());
    let level = log_level(cli.verbose, settings_level);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber(level)) {
        eprintln!("failed to install log subscriber: {e}");
    }

    let result = match settings {
        None => pidfile::stop(&pidfile::default_path()),
        Some(settings) => settings.map_err(anyhow::Error::from).and_then(|settings| match command {
            Command::Run => run(&settings, &config_path),
            Command::Stop => pidfile::stop(&pidfile::default_path()),
            Command::Zones { json } => print_zones(&settings, json),
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(e: &anyhow::Error) {
    let kind = if e.downcast_ref::<ConfigError>().is_some()
        || matches!(e.downcast_ref::<ProfileError>(), Some(ProfileError::Config(_)))
    {
        "Configuration error"
    } else if e.downcast_ref::<QueryError>().is_some()
        || matches!(e.downcast_ref::<ProfileError>(), Some(ProfileError::Query(_)))
    {
        "Window system query failed"
    } else {
        "Fatal error"
    };
    error!(error = ?e, "{kind}");
}

fn run(settings: &Settings, config_path: &Path) -> Result<()> {
    info!(config = %config_path.display(), "Starting snapzones");

    // Resolve everything from the settings before touching the X server
    let gesture_config = settings.gesture_config()?;
    let spec = settings.zone_spec()?;
    let merge_zone_size = settings.merge_zone_size();
    let snap_config = settings.snap_config();
    let style = settings.overlay_style();

    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server")?;
    let root = conn.setup().roots[screen_num].root;
    info!(screen = screen_num, "Connected to X11");

    x11_utils::check_required_extensions(&conn)?;
    let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms")?;
    let profile = x11_utils::build_profile(&conn, root, &atoms, &spec, merge_zone_size)?;
    let desktop = x11_utils::current_desktop(&conn, root, &atoms)?;

    let pidfile = PidFile::create(&pidfile::default_path())?;

    let (overlay, overlay_thread) = overlay::spawn(style, profile.zones(desktop).to_vec())?;
    spawn_signal_handler(pidfile.path().to_path_buf(), overlay.clone(), overlay_thread.clone())?;

    let profile = Arc::new(SharedProfile::new(profile));
    let desktop = Arc::new(AtomicUsize::new(desktop));
    let _watcher_handles = layout_watcher::spawn(
        X11LayoutSource::connect(spec, merge_zone_size)?,
        LayoutTargets {
            profile: Arc::clone(&profile),
            desktop: Arc::clone(&desktop),
            overlay: overlay.clone(),
        },
        settings.layout_debounce(),
    )?;

    let keycodes = x11_utils::keycode_map(&conn)?;
    let recorder = InputRecorder::new(None)?;
    let windows = X11Windows {
        conn: &conn,
        root,
        atoms: &atoms,
    };
    let mut handler = GestureHandler::new(
        GestureStateMachine::new(gesture_config),
        windows,
        profile,
        desktop,
        overlay.clone(),
        snap_config,
    );

    info!("Listening for drag gestures");
    let result = recorder.run(&keycodes, |event| {
        handler.handle_event(event);
    });

    overlay_thread.shutdown(&overlay);
    drop(pidfile);
    result.context("Input recording stopped")
}

/// SIGINT/SIGTERM end the process from any state. The overlay gets to
/// destroy its window before the exit.
fn spawn_signal_handler(
    pid_path: PathBuf,
    overlay: Sender<OverlayCommand>,
    overlay_thread: OverlayThread,
) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal = signal, "Received termination signal, shutting down");
                overlay_thread.shutdown(&overlay);
                pidfile::remove(&pid_path);
                std::process::exit(0);
            }
        })
        .context("Failed to spawn signal handler thread")?;
    Ok(())
}

fn print_zones(settings: &Settings, json: bool) -> Result<()> {
    let spec = settings.zone_spec()?;
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server")?;
    let root = conn.setup().roots[screen_num].root;
    x11_utils::check_required_extensions(&conn)?;
    let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms")?;
    let profile = x11_utils::build_profile(&conn, root, &atoms, &spec, settings.merge_zone_size())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile).context("Failed to serialize zones")?);
    } else {
        print!("{}", describe(&profile));
    }
    Ok(())
}

fn describe_rect(rect: &Rect) -> String {
    format!("{}x{}+{}+{}", rect.width, rect.height, rect.x, rect.y)
}

fn describe(profile: &ZoneProfile) -> String {
    let mut out = String::new();
    for desktop in 0..profile.desktop_count() {
        out.push_str(&format!("desktop {desktop}\n"));
        for (index, zone) in profile.zones(desktop).iter().enumerate() {
            out.push_str(&format!(
                "  zone {index}: {} {}\n",
                describe_rect(&zone.rect),
                zone.orientation
            ));
        }
        for merge in profile.merge_zones(desktop) {
            out.push_str(&format!(
                "  merge {}+{}: probe {} -> {}\n",
                merge.zones.0.0,
                merge.zones.1.0,
                describe_rect(&merge.probe),
                describe_rect(&merge.surface.rect)
            ));
        }
    }
    out
}
