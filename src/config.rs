//! Runtime configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so a
//! partial file (or no file at all) yields a usable configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BACKLOG, DEFAULT_QUEUE_CAPACITY, DEFAULT_SAMPLE_RATE, MAX_OUTPUT_LINES,
};
use crate::drivers::LineId;
use crate::error::{Error, Result};
use crate::network::Address;

const CONFIG_FILE: &str = "kernel-io.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub socket: SocketConfig,
    pub queue: QueueConfig,
    pub converter: ConverterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Set SO_REUSEADDR on newly opened sockets
    pub reuse_address: bool,
    pub default_backlog: i32,
    pub bind_address: String,
    pub port: u16,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            reuse_address: true,
            default_backlog: DEFAULT_BACKLOG,
            bind_address: "0.0.0.0".into(),
            port: 7000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Ring capacity in bytes
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Samples per second per line
    pub sample_rate: u32,
    pub lines: Vec<LineId>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lines: vec![0],
        }
    }
}

impl AppConfig {
    /// Parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the per-user config directory, falling back to defaults
    /// when no file exists there.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, raw)?;
        Ok(())
    }

    /// `<config dir>/kernel-io/kernel-io.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kernel-io").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.socket.default_backlog < 0 {
            return Err(Error::Config(format!(
                "socket.default_backlog must not be negative, got {}",
                self.socket.default_backlog
            )));
        }
        self.socket.bind_addr()?;

        if self.queue.capacity == 0 {
            return Err(Error::Config("queue.capacity must be positive".into()));
        }

        if self.converter.sample_rate == 0 {
            return Err(Error::Config("converter.sample_rate must be positive".into()));
        }
        let lines = self.converter.lines.len();
        if lines == 0 || lines > MAX_OUTPUT_LINES {
            return Err(Error::Config(format!(
                "converter.lines must name 1 to {} lines, got {}",
                MAX_OUTPUT_LINES, lines
            )));
        }
        Ok(())
    }
}

impl SocketConfig {
    /// Address to bind listening sockets to
    pub fn bind_addr(&self) -> Result<Address> {
        Ok(Address::parse(&self.bind_address, self.port)?)
    }
}
