//! Process configuration: CLI flags merged over a YAML config file
//!
//! Every flag can also be given as a kebab-case key in the YAML file passed
//! with `-c/--config`; an explicit flag always wins over the file value. The
//! modem options have no sensible defaults, so startup fails with a usage
//! error naming every missing one.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::bridge::DEFAULT_RECONNECT_DELAY;
use crate::protocol::DEFAULT_TOPIC_PREFIX;

pub const MQTT_DEFAULT_HOST: &str = "localhost";
pub const MQTT_DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Bridge AirLink modem SMS datagrams to MQTT.
#[derive(Debug, Parser)]
#[command(name = "airlink2mqtt", version, about)]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// MQTT broker host.
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(short = 'o', long)]
    pub mqtt_port: Option<u16>,

    /// MQTT username.
    #[arg(short = 'u', long)]
    pub mqtt_user: Option<String>,

    /// MQTT password.
    #[arg(short = 'p', long)]
    pub mqtt_password: Option<String>,

    /// MQTT topic prefix.
    #[arg(short = 't', long)]
    pub mqtt_topic_prefix: Option<String>,

    /// AirLink modem host.
    #[arg(short = 'H', long)]
    pub airlink_host: Option<String>,

    /// AirLink modem port.
    #[arg(short = 'P', long)]
    pub airlink_port: Option<u16>,

    /// Local UDP port to listen on for modem datagrams.
    #[arg(short = 'L', long)]
    pub airlink_listen_port: Option<u16>,

    /// Local address to bind the modem socket to.
    #[arg(short = 'A', long)]
    pub airlink_bind_addr: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Keys accepted in the YAML configuration file. Kebab-case, mirroring the
/// command-line flag names.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: Option<String>,
    pub airlink_host: Option<String>,
    pub airlink_port: Option<u16>,
    pub airlink_listen_port: Option<u16>,
    pub airlink_bind_addr: Option<String>,
    /// File-only key: seconds to wait between broker reconnect attempts.
    pub reconnect_delay_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Broker-side settings, owned by the bridge after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub reconnect_delay: Duration,
}

/// Modem-side settings for the UDP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub listen_port: u16,
    pub bind_addr: String,
}

/// Fully resolved process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mqtt: MqttConfig,
    pub device: DeviceConfig,
    pub verbose: bool,
}

/// Configuration loading errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error(
        "the following options are required either via command line or config file: {}",
        .0.join(", ")
    )]
    MissingOptions(Vec<String>),
}

impl Settings {
    /// Load the config file named on the command line (if any) and merge it
    /// under the explicit flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Merge CLI flags over file values and apply defaults. The modem host,
    /// port and listen port must come from one of the two sources.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let airlink_host = cli.airlink_host.clone().or(file.airlink_host);
        let airlink_port = cli.airlink_port.or(file.airlink_port);
        let airlink_listen_port = cli.airlink_listen_port.or(file.airlink_listen_port);

        let mut missing = Vec::new();
        if airlink_host.is_none() {
            missing.push("--airlink-host".to_string());
        }
        if airlink_port.is_none() {
            missing.push("--airlink-port".to_string());
        }
        if airlink_listen_port.is_none() {
            missing.push("--airlink-listen-port".to_string());
        }

        let (Some(airlink_host), Some(airlink_port), Some(airlink_listen_port)) =
            (airlink_host, airlink_port, airlink_listen_port)
        else {
            return Err(ConfigError::MissingOptions(missing));
        };

        Ok(Self {
            mqtt: MqttConfig {
                host: cli
                    .mqtt_host
                    .clone()
                    .or(file.mqtt_host)
                    .unwrap_or_else(|| MQTT_DEFAULT_HOST.to_string()),
                port: cli.mqtt_port.or(file.mqtt_port).unwrap_or(MQTT_DEFAULT_PORT),
                username: cli.mqtt_user.clone().or(file.mqtt_user),
                password: cli.mqtt_password.clone().or(file.mqtt_password),
                topic_prefix: cli
                    .mqtt_topic_prefix
                    .clone()
                    .or(file.mqtt_topic_prefix)
                    .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string()),
                reconnect_delay: file
                    .reconnect_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RECONNECT_DELAY),
            },
            device: DeviceConfig {
                host: airlink_host,
                port: airlink_port,
                listen_port: airlink_listen_port,
                bind_addr: cli
                    .airlink_bind_addr
                    .clone()
                    .or(file.airlink_bind_addr)
                    .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            },
            verbose: cli.verbose,
        })
    }
}
