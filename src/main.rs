/// Version injected at compile time via NBSYNC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("NBSYNC_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nbsync::config::Config;
use nbsync::design::load_design_file;
use nbsync::inventory::{DeviceClassRegistry, DynamicInventory};
use nbsync::netbox::NetboxClient;
use nbsync::sync::{push_devices, SyncOptions};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Push network designs into NetBox
#[derive(Parser, Debug)]
#[command(name = "nbsync", version = VERSION, about, long_about = None)]
struct Args {
    /// NetBox base URL (default: $NETBOX_ADDR)
    #[arg(long, global = true)]
    netbox_url: Option<String>,

    /// NetBox API token (default: $NETBOX_TOKEN)
    #[arg(long, global = true)]
    netbox_token: Option<String>,

    /// Config file (default: <config dir>/nbsync/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Push design devices, interfaces, addresses and cabling into NetBox
    Push {
        /// Design file(s)
        #[arg(long = "design", required = true)]
        designs: Vec<PathBuf>,

        /// Only push these devices
        #[arg(long = "device")]
        devices: Vec<String>,

        /// NetBox device status
        #[arg(long, value_enum, default_value = "planned")]
        status: DeviceStatus,

        /// Skip cabling reconciliation
        #[arg(long)]
        no_cabling: bool,

        /// Delete NetBox interfaces not in the design (exclusive devices only)
        #[arg(long)]
        prune_interfaces: bool,

        /// Keep NetBox IP addresses that are not in the design
        #[arg(long)]
        keep_ip_addresses: bool,
    },

    /// Build an inventory from NetBox device records
    Inventory {
        /// Device filter, e.g. "site:hq,role:leaf"
        #[arg(long)]
        filter: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceStatus {
    Planned,
    Active,
    Staged,
}

impl DeviceStatus {
    fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Planned => "planned",
            DeviceStatus::Active => "active",
            DeviceStatus::Staged => "staged",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Logs go to stderr, or to `log_file` through a non-blocking writer.
/// `RUST_LOG` overrides the level when set.
fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nbsync={}", tracing_level.as_str().to_lowercase())));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr.with_max_level(tracing_level))
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("nbsync {} started with log level: {:?}", VERSION, level);
    Ok(Some(guard))
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config.with_connection(args.netbox_url.clone(), args.netbox_token.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    let config = load_config(&args)?;
    let client = NetboxClient::from_config(&config)?;

    match args.command {
        Command::Push {
            designs,
            devices,
            status,
            no_cabling,
            prune_interfaces,
            keep_ip_addresses,
        } => {
            let mut registry = DeviceClassRegistry::new();
            let designs = designs
                .iter()
                .map(|path| load_design_file(path, &mut registry))
                .collect::<Result<Vec<_>>>()?;

            let options = SyncOptions {
                devices,
                prune_interfaces,
                prune_ip_addresses: !keep_ip_addresses,
                no_cabling,
            };

            let summary = push_devices(&client, &designs, status.as_str(), &options).await;
            println!(
                "pushed {} device(s), {} failed, {} site(s) created",
                summary.pushed.len(),
                summary.failed.len(),
                summary.sites_created
            );
            if let Some(cabling) = &summary.cabling {
                println!(
                    "cabling: {} created, {} removed, {} failed, {} skipped",
                    cabling.created, cabling.deleted, cabling.failed, cabling.skipped
                );
            }
            if !summary.failed.is_empty() {
                bail!("failed devices: {}", summary.failed.join(", "));
            }
        }

        Command::Inventory { filter } => {
            let params = match filter.as_deref() {
                Some(expr) => NetboxClient::parse_qfilter(expr)?,
                None => Default::default(),
            };

            let mut inventory = DynamicInventory::new();
            inventory.fetch_devices(&client, params).await?;

            for (id, device) in inventory.devices() {
                let remote_id = inventory.origin_of(id).map(|rec| rec.id).unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}",
                    remote_id,
                    device.name,
                    device.class,
                    device.primary_ip().unwrap_or("-")
                );
            }
            println!("{} device(s), {} device class(es)", inventory.len(), inventory.registry().len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_error_is_reported() {
        let blocker = std::env::temp_dir().join(format!("nbsync-log-blocker-{}", std::process::id()));
        std::fs::write(&blocker, "not a directory").unwrap();

        let log_file = blocker.join("logs").join("nbsync.log");
        let err = setup_logging(LogLevel::Info, Some(&log_file)).unwrap_err();
        std::fs::remove_file(&blocker).unwrap();

        assert!(err.to_string().starts_with("Failed to create log directory"), "{}", err);
    }
}
