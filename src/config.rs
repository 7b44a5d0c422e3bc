//! Configuration management for Astrape
//!
//! Host processes describe each charger (vendor, transport, addressing,
//! vendor flags) and the process-wide logging setup in YAML. Every field
//! carries a default so minimal configurations stay short; `validate()`
//! catches the mistakes a device would otherwise report much later.

use crate::error::{AstrapeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a host process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// One entry per managed charger
    pub chargers: Vec<ChargerConfig>,
}

/// Configuration for a single charger adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerConfig {
    /// Vendor key understood by the registry (e.g. "heidelberg", "alfen")
    pub vendor: String,

    /// Transport and addressing
    pub connection: ConnectionConfig,

    /// Connector index for multi-connector hardware (1-based)
    #[serde(default = "default_connector")]
    pub connector: u8,

    /// Vendor flag: legacy firmware register scaling / write-only coils
    #[serde(default)]
    pub legacy: bool,
}

/// Modbus connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// TCP or RTU transport selection and parameters
    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Modbus slave/unit ID; vendor default applies when unset
    #[serde(default)]
    pub slave_id: Option<u8>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum delay between consecutive requests in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
}

/// Transport selection, tagged by the `transport` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Modbus TCP
    Tcp {
        /// Hostname or IP address of the charger
        host: String,

        /// TCP port
        #[serde(default = "default_tcp_port")]
        port: u16,
    },

    /// Modbus RTU over a serial line
    Rtu {
        /// Serial device path (e.g. /dev/ttyUSB0)
        device: String,

        /// Baud rate
        #[serde(default = "default_baudrate")]
        baudrate: u32,

        /// Parity: "N", "E" or "O"
        #[serde(default = "default_parity")]
        parity: String,

        /// Data bits (5-8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,

        /// Stop bits (1 or 2)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level override
    pub console_level: Option<String>,

    /// Optional file-specific level override
    pub file_level: Option<String>,

    /// Log file path or directory for the rolling appender
    pub file: String,

    /// Whether to also log to the console when file logging is active
    pub console_output: bool,

    /// Emit JSON-formatted log lines
    pub json_format: bool,

    /// Number of rotated log files to keep
    pub backup_count: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/var/log/astrape".to_string(),
            console_output: true,
            json_format: false,
            backup_count: 3,
        }
    }
}

fn default_connector() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_tcp_port() -> u16 {
    502
}

fn default_baudrate() -> u32 {
    19200
}

fn default_parity() -> String {
    "N".to_string()
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AstrapeError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            AstrapeError::config(format!(
                "Failed to write config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        for charger in &self.chargers {
            charger.validate()?;
        }
        Ok(())
    }
}

impl ChargerConfig {
    /// Parse a single charger entry from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ChargerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate this charger entry
    pub fn validate(&self) -> Result<()> {
        if self.vendor.trim().is_empty() {
            return Err(AstrapeError::validation("vendor", "vendor cannot be empty"));
        }
        if self.connector == 0 {
            return Err(AstrapeError::validation(
                "connector",
                "connector index is 1-based",
            ));
        }
        self.connection.validate()
    }
}

impl ConnectionConfig {
    /// Validate transport parameters
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(AstrapeError::validation(
                "connection.timeout_ms",
                "timeout must be greater than zero",
            ));
        }
        match &self.transport {
            TransportConfig::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(AstrapeError::validation(
                        "connection.host",
                        "host cannot be empty",
                    ));
                }
                if *port == 0 {
                    return Err(AstrapeError::validation(
                        "connection.port",
                        "port must be greater than zero",
                    ));
                }
            }
            TransportConfig::Rtu {
                device,
                baudrate,
                parity,
                data_bits,
                stop_bits,
            } => {
                if device.trim().is_empty() {
                    return Err(AstrapeError::validation(
                        "connection.device",
                        "serial device cannot be empty",
                    ));
                }
                if *baudrate == 0 {
                    return Err(AstrapeError::validation(
                        "connection.baudrate",
                        "baudrate must be greater than zero",
                    ));
                }
                if !matches!(parity.to_uppercase().as_str(), "N" | "E" | "O") {
                    return Err(AstrapeError::validation(
                        "connection.parity",
                        "parity must be one of N, E, O",
                    ));
                }
                if !(5..=8).contains(data_bits) {
                    return Err(AstrapeError::validation(
                        "connection.data_bits",
                        "data bits must be between 5 and 8",
                    ));
                }
                if !(1..=2).contains(stop_bits) {
                    return Err(AstrapeError::validation(
                        "connection.stop_bits",
                        "stop bits must be 1 or 2",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl LoggingConfig {
    /// Validate logging parameters
    pub fn validate(&self) -> Result<()> {
        for level in std::iter::once(&self.level)
            .chain(self.console_level.iter())
            .chain(self.file_level.iter())
        {
            if !matches!(
                level.to_uppercase().as_str(),
                "TRACE" | "DEBUG" | "INFO" | "WARN" | "ERROR"
            ) {
                return Err(AstrapeError::validation(
                    "logging.level",
                    format!("invalid log level: {}", level),
                ));
            }
        }
        if self.file.trim().is_empty() {
            return Err(AstrapeError::validation(
                "logging.file",
                "log file path cannot be empty",
            ));
        }
        Ok(())
    }
}
