use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptz_director::config::{AppConfig, ConfigStore, CONFIG_FILE_NAME};
use ptz_director::events::EventBus;
use ptz_director::feed;
use ptz_director::ptz::UdpTransport;
use ptz_director::state::AppState;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// PTZ director command line arguments
#[derive(Parser, Debug)]
#[command(name = "ptz-director")]
#[command(
    version,
    about = "Drive a VISCA-over-IP PTZ camera and an OBS-WebSocket switcher from a JSON line feed",
    long_about = None
)]
struct CliArgs {
    /// Configuration file (default: <data dir>/ptz-director.toml)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory path (default: /etc/ptz-director)
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Camera IP address (overrides config)
    #[arg(long, value_name = "IP")]
    camera: Option<String>,

    /// Camera VISCA port (overrides config)
    #[arg(long, value_name = "PORT")]
    camera_port: Option<u16>,

    /// Switcher host; enables the switcher (overrides config)
    #[arg(long, value_name = "HOST")]
    switcher: Option<String>,

    /// Switcher port (overrides config)
    #[arg(long, value_name = "PORT")]
    switcher_port: Option<u16>,

    /// Switcher password (overrides config)
    #[arg(long, value_name = "PASSWORD")]
    password: Option<String>,

    /// Start tracking immediately
    #[arg(short = 't', long)]
    track: bool,

    /// Print events matching this topic to stdout as JSON lines (e.g. "*", "switcher.*")
    #[arg(short = 'e', long, value_name = "TOPIC")]
    events: Option<String>,

    /// Write the effective configuration (with overrides) back to the config file
    #[arg(long)]
    save_config: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting PTZ director v{}", env!("CARGO_PKG_VERSION"));

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            let data_dir = args.data_dir.clone().unwrap_or_else(get_data_dir);
            tracing::info!("Data directory: {}", data_dir.display());
            data_dir.join(CONFIG_FILE_NAME)
        }
    };
    tracing::info!("Configuration file: {}", config_path.display());

    let loaded = ConfigStore::new(&config_path).await?;
    let mut config = (*loaded.get()).clone();
    apply_overrides(&mut config, &args);
    config.validate()?;

    let config_store = if args.save_config {
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        loaded.set(config).await?;
        tracing::info!("Configuration saved");
        loaded
    } else {
        ConfigStore::with_config(&config_path, config)
    };

    let events = Arc::new(EventBus::new());
    let state = AppState::from_config(
        config_store,
        Arc::new(UdpTransport::new()),
        events.clone(),
    )?;
    state.spawn_config_watcher();

    if let Some(topic) = args.events.clone() {
        spawn_event_printer(&state, topic);
    }

    if let Some(switcher) = &state.switcher {
        tracing::info!("Connecting to switcher at {}", switcher.endpoint());
        if let Err(e) = switcher.connect().await {
            tracing::error!("Switcher unavailable: {}", e);
        }
    }

    if args.track {
        state.tracking.start();
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let feed_task = tokio::spawn(feed::run(stdin, state.clone(), state.shutdown.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        _ = state.shutdown.cancelled() => {}
        result = wait_feed(feed_task) => {
            match result {
                Ok(stats) => tracing::info!(
                    "Feed finished: {} lines, {} malformed, {} detections ignored",
                    stats.lines, stats.malformed, stats.ignored_detections
                ),
                Err(e) => tracing::error!("Feed failed: {}", e),
            }
        }
    }

    state.shutdown().await;

    // The stdin reader may still be parked in a blocking read
    std::process::exit(0)
}

async fn wait_feed(
    task: tokio::task::JoinHandle<ptz_director::Result<feed::FeedStats>>,
) -> anyhow::Result<feed::FeedStats> {
    Ok(task.await??)
}

/// Apply CLI argument overrides to config (only if explicitly specified)
fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(address) = &args.camera {
        config.camera.address = Some(address.clone());
    }
    if let Some(port) = args.camera_port {
        config.camera.port = port;
    }
    if let Some(host) = &args.switcher {
        config.switcher.enabled = true;
        config.switcher.host = host.clone();
    }
    if let Some(port) = args.switcher_port {
        config.switcher.port = port;
    }
    if let Some(password) = &args.password {
        config.switcher.password = Some(password.clone());
    }
}

/// Print matching events to stdout, one JSON object per line
fn spawn_event_printer(state: &Arc<AppState>, topic: String) {
    let mut rx = state.events.subscribe();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => event,
            };
            match event {
                Ok(event) if event.matches_topic(&topic) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to serialize event: {}", e),
                },
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event printer lagged, {} events skipped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "ptz_director=error",
        LogLevel::Warn => "ptz_director=warn",
        LogLevel::Info => "ptz_director=info",
        LogLevel::Verbose => "ptz_director=debug,tokio_tungstenite=info",
        LogLevel::Debug => "ptz_director=debug,tokio_tungstenite=debug",
        LogLevel::Trace => "ptz_director=trace,tokio_tungstenite=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    // stdout carries the event stream, so logs go to stderr
    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the application data directory
fn get_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("PTZ_DIRECTOR_DATA_DIR") {
        return PathBuf::from(path);
    }

    PathBuf::from("/etc/ptz-director")
}
