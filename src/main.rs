use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use sensehat::config::SenseConfig;
use sensehat::imu::settings;
use sensehat::stick::{StickError, StickSession, WatcherHandle};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Sense HAT diagnostics: find the joystick, watch it, check sensor settings
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the joystick device node
    Find,
    /// Print joystick events until Ctrl-C
    Watch,
    /// Show which fusion settings file would be used
    Sensors,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SenseConfig::load(path)?,
        None => SenseConfig::load_default()?,
    };

    match cli.command {
        Command::Find => find(&config),
        Command::Sensors => sensors(&config),
        Command::Watch => watch(config).await,
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn find(config: &SenseConfig) -> Result<()> {
    match config.stick.locator().locate(&config.stick.device_name) {
        Ok(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Err(StickError::NotFound(name)) => Err(eyre!("Joystick {:?} is not attached", name)),
        Err(e) => Err(eyre!("Lookup failed: {}", e)),
    }
}

fn sensors(config: &SenseConfig) -> Result<()> {
    let settings_path = settings::resolve_settings(
        &config.imu.global_settings,
        &config.imu.local_settings,
        &settings::home_dir(),
    )
    .map_err(|e| eyre!("{}", e))?;

    info!("Fusion settings: {}.ini", settings_path.display());
    warn!("No fusion backend is linked into this binary; nothing to read");
    Ok(())
}

async fn watch(config: SenseConfig) -> Result<()> {
    let path = config
        .stick
        .locator()
        .locate(&config.stick.device_name)
        .map_err(|e| eyre!("Cannot find joystick: {}", e))?;

    let options = config.stick.session_options();
    let session = tokio::task::spawn_blocking(move || StickSession::open_with(path, &options))
        .await
        .map_err(|e| eyre!("Failed to open joystick: {}", e))?;
    if let Some(reason) = session.failure() {
        return Err(eyre!("Cannot open {}: {}", session.path().display(), reason));
    }

    let (handle, mut events) =
        WatcherHandle::spawn(session, 100).map_err(|e| eyre!("Failed to start watcher: {}", e))?;
    info!("Watching joystick, Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let at = event
                        .local_time()
                        .map(|t| t.format("%H:%M:%S%.3f").to_string())
                        .unwrap_or_else(|| format!("{:.3}", event.timestamp));
                    println!("{} {:?} {:?}", at, event.direction, event.action);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                let mut session = handle
                    .stop()
                    .await
                    .map_err(|e| eyre!("Watcher stopped: {}", e))?;
                session.close();
                return Ok(());
            }
        }
    }

    match handle.join().await {
        Ok(count) => {
            info!("Watcher finished after {} events", count);
            Ok(())
        }
        Err(e) => {
            error!("Watcher stopped: {}", e);
            Err(eyre!("{}", e))
        }
    }
}
