use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use air352_poller::logging::{self, LoggingMode};
use air352_poller::{PollerConfig, RefreshOutcome, SensorPoller};
use air352_protocol::{DeviceAddress, DEFAULT_MULTICAST_GROUP, DEFAULT_PORT};

pub mod output;

/// Read 352Air M25 PM2.5 sensors over UDP multicast
#[derive(Parser, Debug)]
#[command(name = "air352")]
#[command(about = "Poll 352Air M25 PM2.5 sensors on the local network")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Seconds to wait for a sensor to answer
    #[arg(short, long, global = true, default_value = "15")]
    pub timeout: u64,

    /// Multicast group the sensors listen on
    #[arg(long, global = true, default_value_t = DEFAULT_MULTICAST_GROUP)]
    pub group: Ipv4Addr,

    /// UDP port the sensors listen and answer on
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Local interface to join the group on
    #[arg(long, global = true, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub interface: Ipv4Addr,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Read one sensor once
    Read {
        /// Device address as 12 hex digits, separators allowed
        #[arg(short, long)]
        mac: DeviceAddress,
    },
    /// Poll sensors until Ctrl-C
    Watch {
        /// Device addresses to poll
        #[arg(short, long, required = true, num_args = 1..)]
        mac: Vec<DeviceAddress>,

        /// Seconds between polls of each sensor
        #[arg(short, long, default_value = "60")]
        interval: u64,
    },
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(anyhow::anyhow!("Timeout must be positive"));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Port must not be 0"));
        }

        if let Command::Watch { interval: 0, .. } = self.command {
            return Err(anyhow::anyhow!("Interval must be positive"));
        }

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        Ok(())
    }

    /// Apply `AIR352_*` overrides from a variable lookup
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(timeout) = var("AIR352_TIMEOUT") {
            self.timeout = timeout
                .parse()
                .context("Invalid AIR352_TIMEOUT environment variable")?;
        }

        if let Some(interval) = var("AIR352_INTERVAL") {
            if let Command::Watch { interval: current, .. } = &mut self.command {
                *current = interval
                    .parse()
                    .context("Invalid AIR352_INTERVAL environment variable")?;
            }
        }

        if let Some(port) = var("AIR352_PORT") {
            self.port = port
                .parse()
                .context("Invalid AIR352_PORT environment variable")?;
        }

        if let Some(group) = var("AIR352_GROUP") {
            self.group = group
                .parse()
                .context("Invalid AIR352_GROUP environment variable")?;
        }

        if let Some(log_level) = var("AIR352_LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub poller: PollerConfig,
    pub json: bool,
    pub log_level: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut poller = PollerConfig::default()
            .with_group(args.group, args.port)
            .with_interface(args.interface)
            .with_response_timeout(Duration::from_secs(args.timeout));
        if let Command::Watch { interval, .. } = args.command {
            poller = poller.with_poll_interval(Duration::from_secs(interval));
        }

        Self {
            command: args.command,
            poller,
            json: args.json,
            log_level: args.log_level,
        }
    }
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();
        args.apply_env(|name| std::env::var(name).ok())?;
        Self::from_args(args)
    }

    fn from_args(args: Args) -> Result<Self> {
        args.validate()?;
        let config = Config::from(args);
        config
            .poller
            .validate()
            .context("Invalid poller configuration")?;
        Ok(config)
    }
}

/// Initialize logging on stderr with the specified log level
///
/// `AIR352_LOG_MODE` picks the output mode; compact development output
/// is the default.
fn init_tracing(log_level: &str) -> Result<()> {
    let mode = logging::mode_from_env().unwrap_or(LoggingMode::Development);
    logging::init_logging_with_level(mode, &log_level.to_lowercase())?;
    Ok(())
}

/// Refresh one sensor and print the result
async fn read_once(config: &Config, mac: DeviceAddress) -> Result<()> {
    let poller = SensorPoller::new(config.poller.clone()).context("Failed to create poller")?;
    let handle = poller.register(mac)?;

    info!("Querying {}", mac);
    let outcome = poller.refresh_now(handle).await?;
    let state = poller.current_state(handle)?;

    if config.json {
        println!("{}", output::outcome_json(mac, &outcome, &state)?);
    } else {
        println!("{}", output::format_outcome(mac, &outcome, &state));
    }

    poller.shutdown().await;

    match outcome {
        RefreshOutcome::Success(_) => Ok(()),
        RefreshOutcome::Failed(reason) => Err(anyhow::anyhow!(
            "{} did not report: {}",
            output::device_label(mac),
            reason
        )),
    }
}

/// Poll every sensor on its interval and print updates until Ctrl-C
async fn watch(config: &Config, macs: &[DeviceAddress]) -> Result<()> {
    let poller = SensorPoller::new(config.poller.clone()).context("Failed to create poller")?;
    let mut updates = poller.subscribe();

    for mac in macs {
        let handle = poller
            .register(*mac)
            .with_context(|| format!("Failed to register {}", mac))?;
        poller.start_polling(handle)?;
        info!("Watching {} as {}", mac, handle);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C, stopping");
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if config.json {
                        println!("{}", output::update_json(&update)?);
                    } else {
                        println!("{}", output::format_update(&update));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, skipped {} update(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    poller.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_env().context("Failed to parse configuration")?;

    init_tracing(&config.log_level).context("Failed to initialize logging")?;

    match config.command.clone() {
        Command::Read { mac } => read_once(&config, mac).await,
        Command::Watch { mac, .. } => watch(&config, &mac).await,
    }
}
