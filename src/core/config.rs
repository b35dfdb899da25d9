//! Configuration file support
//!
//! Supports loading configuration from a TOML file.
//! Configuration is looked up in this order:
//! - `./scanwatch.toml` (current directory)
//! - the platform config directory (`<config_dir>/scanwatch/config.toml`)
//!
//! Values here are only the middle layer: command-line flags override them
//! and built-in defaults fill the gaps. The merge happens once, in
//! [`crate::core::settings::resolve`].

use crate::device::traits::ColorMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "scanwatch";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file name looked up in the working directory
const LOCAL_CONFIG_FILE_NAME: &str = "scanwatch.toml";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Initialize the configuration file if it doesn't exist.
///
/// Creates the config directory and writes the default config template.
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device settings
    pub device: DeviceConfig,

    /// Output folders and naming
    pub output: OutputConfig,

    /// Scan parameters
    pub scan: ScanDefaults,

    /// ADF auto-scan settings
    pub adf: AdfConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Scanner address (host, host:port or full URL); discovered when unset
    pub address: Option<String>,

    /// Label shown on the device panel in push mode
    pub label: String,

    /// Interval between reachability probes while waiting for the device
    pub reachability_poll_ms: u64,

    /// How long discovery may take before giving up
    pub discovery_timeout_secs: u64,

    /// Timeout for a single HTTP request to the device
    pub request_timeout_secs: u64,
}

/// Output directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for scans (a temp folder is generated when unset)
    pub directory: Option<PathBuf>,

    /// Working directory for pages in flight (generated when unset)
    pub temp_directory: Option<PathBuf>,

    /// File name template; must contain `{no}`, may contain strftime fields
    pub filename_pattern: String,
}

/// Scan parameter defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanDefaults {
    /// Resolution in DPI
    pub resolution: u32,

    /// Width in 1/300 inch units
    pub width: u32,

    /// Height in 1/300 inch units
    pub height: u32,

    /// Color mode
    pub color: ColorMode,
}

/// ADF auto-scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdfConfig {
    /// Capture both sides of each sheet
    pub duplex: bool,

    /// Merge the pages of a batch into one PDF instead of one JPEG per page
    pub pdf: bool,

    /// Interval between paper presence checks
    pub poll_interval_ms: u64,

    /// Settle delay between paper detection and scan start
    pub start_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: None,
            label: "scanwatch".to_string(),
            reachability_poll_ms: 1000,
            discovery_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            temp_directory: None,
            filename_pattern: "scan{no}".to_string(),
        }
    }
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            resolution: 200,
            // A4 at 300 units per inch
            width: 2480,
            height: 3508,
            color: ColorMode::Color,
        }
    }
}

impl Default for AdfConfig {
    fn default() -> Self {
        Self {
            duplex: false,
            pdf: false,
            poll_interval_ms: 1000,
            start_delay_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./scanwatch.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::parse(&content).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from default locations
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// First existing config file in the search order
    pub fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(".").join(LOCAL_CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        get_config_path().filter(|path| path.exists())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        Self::find_config_file()
            .or_else(get_config_path)
            .unwrap_or_else(|| PathBuf::from(".").join(LOCAL_CONFIG_FILE_NAME))
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// A resolved setting is unusable
    Invalid { setting: &'static str, reason: String },
    /// Output or temp folder could not be prepared
    FolderError(PathBuf, String),
    /// No device address configured and discovery failed
    NoDevice(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), err)
            }
            ConfigError::ParseError(path, err) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), err)
            }
            ConfigError::WriteError(path, err) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), err)
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::Invalid { setting, reason } => {
                write!(f, "Invalid setting '{}': {}", setting, reason)
            }
            ConfigError::FolderError(path, err) => {
                write!(f, "Cannot use folder '{}': {}", path.display(), err)
            }
            ConfigError::NoDevice(err) => {
                write!(f, "No scanner address configured and discovery failed: {}", err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
