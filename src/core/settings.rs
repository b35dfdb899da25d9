//! Run configuration resolution
//!
//! All option merging happens here, once, before a session is built:
//! command-line override > config file > built-in default. The result is an
//! immutable [`RunConfiguration`]; nothing downstream looks at raw options.

use crate::core::config::{Config, ConfigError};
use crate::core::folders::OutputFolderResolver;
use crate::core::naming::FilenamePattern;
use crate::device::discovery::{discover_with_timeout, DeviceDiscovery};
use crate::device::traits::{ColorMode, DeviceCapabilities};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which kind of session to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Wait for scans started from the device panel
    Listen,
    /// Poll the document feeder and scan whenever paper is loaded
    AdfAutoscan,
}

/// Output locations and naming
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    pub output: PathBuf,
    pub temp: PathBuf,
    pub pattern: FilenamePattern,
}

/// Scan parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Resolution in DPI
    pub resolution: u32,
    /// Width in 1/300 inch units
    pub width: u32,
    /// Height in 1/300 inch units
    pub height: u32,
    pub color: ColorMode,
}

impl ScanConfig {
    /// Adapt the settings to what the device supports
    ///
    /// Returns the adapted settings plus a description of every change.
    pub fn fit_to(&self, capabilities: &DeviceCapabilities) -> (ScanConfig, Vec<String>) {
        let mut fitted = *self;
        let mut changes = Vec::new();

        let resolution = capabilities.nearest_resolution(self.resolution);
        if resolution != self.resolution {
            changes.push(format!(
                "resolution {} dpi -> {} dpi",
                self.resolution, resolution
            ));
            fitted.resolution = resolution;
        }
        if capabilities.max_width > 0 && self.width > capabilities.max_width {
            changes.push(format!("width {} -> {}", self.width, capabilities.max_width));
            fitted.width = capabilities.max_width;
        }
        if capabilities.max_height > 0 && self.height > capabilities.max_height {
            changes.push(format!("height {} -> {}", self.height, capabilities.max_height));
            fitted.height = capabilities.max_height;
        }

        (fitted, changes)
    }
}

/// Push-mode settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// Label shown on the device panel
    pub label: String,
}

/// ADF auto-scan settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdfAutoScanConfig {
    pub duplex: bool,
    /// Merge pages into one PDF instead of one JPEG per page
    pub pdf: bool,
    pub poll_interval: Duration,
    pub start_delay: Duration,
}

/// Mode-specific part of the run configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ModeConfig {
    Listen(RegistrationConfig),
    AdfAutoscan(AdfAutoScanConfig),
}

/// Fully resolved, immutable settings for one session
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    /// Scanner address as configured or discovered
    pub device_address: String,
    pub request_timeout: Duration,
    /// Interval between probes while waiting for the device
    pub reachability_poll: Duration,
    pub directories: DirectoryConfig,
    pub scan: ScanConfig,
    pub mode: ModeConfig,
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub label: Option<String>,
    pub directory: Option<PathBuf>,
    pub temp_directory: Option<PathBuf>,
    pub filename_pattern: Option<String>,
    pub resolution: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub color: Option<ColorMode>,
    pub duplex: Option<bool>,
    pub pdf: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub start_delay_ms: Option<u64>,
    pub reachability_poll_ms: Option<u64>,
}

fn positive(setting: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            setting,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where and how to reach the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub address: String,
    pub request_timeout: Duration,
}

/// Resolve the scanner address and request timeout
///
/// The address comes from the override, then the config file, then
/// `discovery` (bounded by the configured timeout).
pub fn resolve_device(
    config: &Config,
    overrides: &ConfigOverrides,
    discovery: Option<Arc<dyn DeviceDiscovery>>,
) -> Result<DeviceEndpoint, ConfigError> {
    let request_timeout =
        Duration::from_secs(positive("request_timeout_secs", config.device.request_timeout_secs)?);

    let address = match non_blank(overrides.address.clone())
        .or_else(|| non_blank(config.device.address.clone()))
    {
        Some(address) => address,
        None => {
            let discovery = discovery.ok_or_else(|| {
                ConfigError::NoDevice(
                    "pass --address or set [device] address".to_string(),
                )
            })?;
            let timeout = Duration::from_secs(config.device.discovery_timeout_secs);
            let found = discover_with_timeout(discovery, timeout)
                .map_err(|e| ConfigError::NoDevice(e.to_string()))?;
            info!("Discovered scanner '{}' at {}", found.name, found.address);
            found.address
        }
    };

    Ok(DeviceEndpoint {
        address,
        request_timeout,
    })
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn shared_temp_error(folder: &Path) -> ConfigError {
    ConfigError::Invalid {
        setting: "temp_directory",
        reason: format!(
            "must differ from the output folder ({})",
            folder.display()
        ),
    }
}

/// Resolve the run configuration
///
/// Validates every setting before touching the filesystem, then prepares
/// the output and temp folders. When no device address is configured,
/// `discovery` is consulted (bounded by the configured timeout).
pub fn resolve(
    config: &Config,
    overrides: &ConfigOverrides,
    mode: SessionMode,
    folders: &dyn OutputFolderResolver,
    discovery: Option<Arc<dyn DeviceDiscovery>>,
) -> Result<RunConfiguration, ConfigError> {
    let pattern_text = overrides
        .filename_pattern
        .clone()
        .unwrap_or_else(|| config.output.filename_pattern.clone());
    let pattern = FilenamePattern::new(&pattern_text).map_err(|reason| ConfigError::Invalid {
        setting: "filename_pattern",
        reason,
    })?;

    let scan = ScanConfig {
        resolution: positive(
            "resolution",
            overrides.resolution.unwrap_or(config.scan.resolution) as u64,
        )? as u32,
        width: positive("width", overrides.width.unwrap_or(config.scan.width) as u64)? as u32,
        height: positive("height", overrides.height.unwrap_or(config.scan.height) as u64)? as u32,
        color: overrides.color.unwrap_or(config.scan.color),
    };

    let reachability_poll = Duration::from_millis(positive(
        "reachability_poll_ms",
        overrides
            .reachability_poll_ms
            .unwrap_or(config.device.reachability_poll_ms),
    )?);
    let mode = match mode {
        SessionMode::Listen => {
            let label = non_blank(overrides.label.clone())
                .or_else(|| non_blank(Some(config.device.label.clone())))
                .ok_or(ConfigError::Invalid {
                    setting: "label",
                    reason: "must not be empty".to_string(),
                })?;
            ModeConfig::Listen(RegistrationConfig { label })
        }
        SessionMode::AdfAutoscan => ModeConfig::AdfAutoscan(AdfAutoScanConfig {
            duplex: overrides.duplex.unwrap_or(config.adf.duplex),
            pdf: overrides.pdf.unwrap_or(config.adf.pdf),
            poll_interval: Duration::from_millis(positive(
                "poll_interval_ms",
                overrides.poll_interval_ms.unwrap_or(config.adf.poll_interval_ms),
            )?),
            start_delay: Duration::from_millis(
                overrides.start_delay_ms.unwrap_or(config.adf.start_delay_ms),
            ),
        }),
    };

    let device = resolve_device(config, overrides, discovery)?;

    let output_request = overrides
        .directory
        .clone()
        .or_else(|| config.output.directory.clone());
    let temp_request = overrides
        .temp_directory
        .clone()
        .or_else(|| config.output.temp_directory.clone());

    // Staged pages are moved by name, so one shared folder makes every save clash
    if let (Some(output), Some(temp)) = (&output_request, &temp_request) {
        if output == temp {
            return Err(shared_temp_error(output));
        }
    }

    let output = folders.resolve_folder(output_request.as_deref())?;
    let temp = folders.resolve_folder(temp_request.as_deref())?;
    if same_folder(&output, &temp) {
        return Err(shared_temp_error(&output));
    }

    Ok(RunConfiguration {
        device_address: device.address,
        request_timeout: device.request_timeout,
        reachability_poll,
        directories: DirectoryConfig {
            output,
            temp,
            pattern,
        },
        scan,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::folders::FsFolderResolver;
    use crate::testdb::StaticDiscovery;

    fn config_with_address() -> Config {
        let mut config = Config::default();
        config.device.address = Some("192.168.1.40".to_string());
        config
    }

    #[test]
    fn test_defaults_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());

        let run = resolve(
            &config_with_address(),
            &ConfigOverrides::default(),
            SessionMode::Listen,
            &resolver,
            None,
        )
        .unwrap();

        assert_eq!(run.device_address, "192.168.1.40");
        assert_eq!(run.reachability_poll, Duration::from_millis(1000));
        assert_eq!(run.scan.resolution, 200);
        assert!(run.directories.output.is_dir());
        assert!(run.directories.temp.is_dir());
        assert_ne!(run.directories.output, run.directories.temp);
        assert_eq!(
            run.mode,
            ModeConfig::Listen(RegistrationConfig {
                label: "scanwatch".to_string()
            })
        );
    }

    #[test]
    fn test_flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());

        let mut config = config_with_address();
        config.adf.pdf = false;
        config.adf.poll_interval_ms = 2000;
        config.scan.resolution = 300;

        let overrides = ConfigOverrides {
            address: Some("scanner.lan".to_string()),
            directory: Some(dir.path().join("out")),
            pdf: Some(true),
            resolution: Some(600),
            ..Default::default()
        };

        let run = resolve(&config, &overrides, SessionMode::AdfAutoscan, &resolver, None).unwrap();

        assert_eq!(run.device_address, "scanner.lan");
        assert_eq!(run.directories.output, dir.path().join("out"));
        assert_eq!(run.scan.resolution, 600);
        match run.mode {
            ModeConfig::AdfAutoscan(adf) => {
                assert!(adf.pdf);
                assert!(!adf.duplex);
                assert_eq!(adf.poll_interval, Duration::from_millis(2000));
                assert_eq!(adf.start_delay, Duration::from_millis(5000));
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_invalid_pattern_creates_no_folders() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let overrides = ConfigOverrides {
            filename_pattern: Some("scan".to_string()),
            ..Default::default()
        };

        let result = resolve(
            &config_with_address(),
            &overrides,
            SessionMode::Listen,
            &resolver,
            None,
        );

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                setting: "filename_pattern",
                ..
            })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let overrides = ConfigOverrides {
            poll_interval_ms: Some(0),
            ..Default::default()
        };

        let result = resolve(
            &config_with_address(),
            &overrides,
            SessionMode::AdfAutoscan,
            &resolver,
            None,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                setting: "poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_blank_label_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let overrides = ConfigOverrides {
            label: Some("   ".to_string()),
            ..Default::default()
        };

        let run = resolve(
            &config_with_address(),
            &overrides,
            SessionMode::Listen,
            &resolver,
            None,
        )
        .unwrap();
        assert_eq!(
            run.mode,
            ModeConfig::Listen(RegistrationConfig {
                label: "scanwatch".to_string()
            })
        );
    }

    #[test]
    fn test_discovery_used_without_address() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let discovery: Arc<dyn DeviceDiscovery> =
            Arc::new(StaticDiscovery::found("Office MFP", "10.0.0.9:8080"));

        let run = resolve(
            &Config::default(),
            &ConfigOverrides::default(),
            SessionMode::Listen,
            &resolver,
            Some(discovery),
        )
        .unwrap();
        assert_eq!(run.device_address, "10.0.0.9:8080");
    }

    #[test]
    fn test_missing_address_without_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());

        let result = resolve(
            &Config::default(),
            &ConfigOverrides::default(),
            SessionMode::Listen,
            &resolver,
            None,
        );
        assert!(matches!(result, Err(ConfigError::NoDevice(_))));
    }

    #[test]
    fn test_shared_output_and_temp_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let shared = dir.path().join("scans");
        let overrides = ConfigOverrides {
            directory: Some(shared.clone()),
            temp_directory: Some(shared.clone()),
            ..Default::default()
        };

        let result = resolve(
            &config_with_address(),
            &overrides,
            SessionMode::AdfAutoscan,
            &resolver,
            None,
        );

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                setting: "temp_directory",
                ..
            })
        ));
        assert!(!shared.exists());
    }

    #[test]
    fn test_same_folder_spelled_differently_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsFolderResolver::new("scanwatch").with_temp_root(dir.path());
        let overrides = ConfigOverrides {
            directory: Some(dir.path().join("scans")),
            temp_directory: Some(dir.path().join("scans").join("..").join("scans")),
            ..Default::default()
        };

        let result = resolve(
            &config_with_address(),
            &overrides,
            SessionMode::AdfAutoscan,
            &resolver,
            None,
        );

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                setting: "temp_directory",
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_device_precedence() {
        let config = config_with_address();

        let from_flag = resolve_device(
            &config,
            &ConfigOverrides {
                address: Some("from-flag".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(from_flag.address, "from-flag");

        let from_file = resolve_device(&config, &ConfigOverrides::default(), None).unwrap();
        assert_eq!(from_file.address, "192.168.1.40");
        assert_eq!(
            from_file.request_timeout,
            Duration::from_secs(config.device.request_timeout_secs)
        );

        assert!(matches!(
            resolve_device(&Config::default(), &ConfigOverrides::default(), None),
            Err(ConfigError::NoDevice(_))
        ));
    }

    #[test]
    fn test_fit_to_capabilities() {
        let scan = ScanConfig {
            resolution: 250,
            width: 3000,
            height: 3000,
            color: ColorMode::Color,
        };
        let caps = DeviceCapabilities {
            resolutions: vec![150, 300],
            max_width: 2550,
            max_height: 4200,
            ..Default::default()
        };

        let (fitted, changes) = scan.fit_to(&caps);
        assert_eq!(fitted.resolution, 300);
        assert_eq!(fitted.width, 2550);
        assert_eq!(fitted.height, 3000);
        assert_eq!(changes.len(), 2);
    }
}
