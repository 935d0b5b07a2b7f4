use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use unifying_core::{DriverConfig, HidrawTransport, UnifyingDevice, list_receivers};

#[derive(Parser, Debug)]
#[command(author, version, about = "Logitech Unifying receiver tool", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML driver configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List receivers attached over USB
    List,
    /// Read and print the identity of a receiver
    Info {
        /// hidraw node, e.g. /dev/hidraw0
        path: PathBuf,
    },
    /// Print paired-device notifications
    Watch {
        path: PathBuf,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Switch the receiver into its bootloader
    Detach { path: PathBuf },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => DriverConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DriverConfig::default(),
    };

    match args.command {
        Command::List => {
            let receivers = list_receivers()?;
            if receivers.is_empty() {
                info!("No receivers found");
            }
            for receiver in receivers {
                println!("{}", receiver);
            }
        }
        Command::Info { path } => {
            let mut device = ready_device(path, config)?;
            println!("{}", device);
            device.close()?;
        }
        Command::Watch { path, seconds } => {
            let mut device = ready_device(path, config)?;
            info!(seconds, "Watching for notifications");
            let deadline = Instant::now() + Duration::from_secs(seconds);
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match device.events().recv_timeout(remaining) {
                    Ok(event) => println!("{}", event),
                    Err(e) if e.is_timeout() => break,
                    Err(_) => {
                        warn!("Event stream closed");
                        break;
                    }
                }
            }
            device.close()?;
        }
        Command::Detach { path } => {
            let mut device = ready_device(path, config)?;
            device.detach()?;
            info!("Receiver detached, wait for it to re-enumerate in bootloader mode");
            device.close()?;
        }
    }
    Ok(())
}

fn ready_device(path: PathBuf, config: DriverConfig) -> Result<UnifyingDevice<HidrawTransport>> {
    let mut device = UnifyingDevice::hidraw(path, config)?;
    device.probe()?;
    device.open()?;
    device.setup()?;
    Ok(device)
}
