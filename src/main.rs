use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use surface_keys::{config::Config, App, Options};

#[derive(Parser, Debug)]
#[command(name = "surface-keys")]
#[command(about = "Turn a MIDI control surface or joystick into a macro pad")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/surface-keys/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log raw events and every key sent
    #[arg(short, long)]
    debug: bool,

    /// Log keystrokes instead of sending them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// List MIDI input ports and exit
    #[cfg(feature = "midi")]
    #[arg(long)]
    list_ports: bool,

    /// Read a joystick device instead of the configured source
    #[arg(long, value_name = "PATH")]
    joystick: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up SIGCHLD handler to auto-reap child processes (prevents zombies)
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }

    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    #[cfg(feature = "midi")]
    if cli.list_ports {
        return list_ports();
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if cli.check {
        return check(&config);
    }

    info!("Starting surface-keys");

    let options = Options {
        dry_run: cli.dry_run,
        joystick: cli.joystick,
    };
    let mut app = App::new(&config, &options)?;

    // Set up signal handlers for graceful shutdown
    let (stop, shutdown) = watch::channel(false);
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
        let _ = stop.send(true);
    });

    let result = app.run(shutdown).await;

    // Always run shutdown
    app.shutdown();
    result
}

fn check(config: &Config) -> Result<()> {
    let table = config.table()?;
    config.layout()?;

    println!("✓ Configuration is valid");
    for mode in table.modes() {
        let marker = if mode == table.initial_mode() { " (initial)" } else { "" };
        println!("  mode '{}'{}", mode, marker);
        for (control, binding) in table.bindings(mode) {
            println!("    {:>10}  {}", control.to_string(), binding.label());
        }
    }
    Ok(())
}

#[cfg(feature = "midi")]
fn list_ports() -> Result<()> {
    let ports = surface_keys::device::midi::list_ports()?;
    if ports.is_empty() {
        println!("No MIDI input ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}
