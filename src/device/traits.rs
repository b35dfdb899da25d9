//! Device abstraction traits for testability
//!
//! This module defines the boundary between the session machinery and a
//! concrete scanner. Both the HTTP client ([`crate::device::escl`]) and the
//! simulated scanner ([`crate::testdb::MockScanner`]) implement
//! [`ScannerClient`], so every session path can run without hardware.
//!
//! # Architecture
//!
//! - `ScannerClient` - everything the session needs from a device
//! - `DeviceCapabilities` - what the device reported at startup
//! - `ScanEvent` / `Registration` - push-mode notification types
//! - `ScanJob` / `ScannedPage` - one capture request and its output

use crate::core::error::Result;
use crate::core::session::Timestamped;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Where the paper is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    /// Flatbed glass
    #[default]
    Platen,
    /// Automatic document feeder, front side only
    Adf,
    /// Automatic document feeder, both sides
    AdfDuplex,
}

impl ScanSource {
    /// Check if this source uses the document feeder
    pub fn is_feeder(&self) -> bool {
        matches!(self, ScanSource::Adf | ScanSource::AdfDuplex)
    }

    /// Get a human-readable name for this source
    pub fn display_name(&self) -> &'static str {
        match self {
            ScanSource::Platen => "Flatbed",
            ScanSource::Adf => "Document feeder",
            ScanSource::AdfDuplex => "Document feeder (duplex)",
        }
    }
}

impl Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Color mode of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Color,
    Grayscale,
}

/// Output artifact kind requested for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JPEG file per page
    #[default]
    Jpeg,
    /// All pages merged into a single PDF
    Pdf,
}

/// Scan parameters reported by the device, read once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Make and model string (e.g., "HP OfficeJet Pro 9010")
    pub make_and_model: String,
    /// Serial number, if reported
    pub serial_number: Option<String>,
    /// Whether a flatbed is present
    pub has_platen: bool,
    /// Whether a document feeder is present
    pub has_adf: bool,
    /// Whether the feeder can capture both sides
    pub adf_duplex: bool,
    /// Supported resolutions in DPI, ascending
    pub resolutions: Vec<u32>,
    /// Maximum scan width in 1/300 inch units
    pub max_width: u32,
    /// Maximum scan height in 1/300 inch units
    pub max_height: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            make_and_model: "Unknown scanner".to_string(),
            serial_number: None,
            has_platen: true,
            has_adf: false,
            adf_duplex: false,
            resolutions: vec![75, 100, 200, 300, 600],
            max_width: 2550,
            max_height: 3508,
        }
    }
}

impl DeviceCapabilities {
    /// Pick the supported resolution closest to the requested one
    ///
    /// Ties resolve to the lower resolution. Returns the request unchanged when
    /// the device did not report any resolutions.
    pub fn nearest_resolution(&self, requested: u32) -> u32 {
        self.resolutions
            .iter()
            .copied()
            .min_by_key(|r| (r.abs_diff(requested), *r))
            .unwrap_or(requested)
    }

    /// Check whether the device can capture from the given source
    pub fn supports_source(&self, source: ScanSource) -> bool {
        match source {
            ScanSource::Platen => self.has_platen,
            ScanSource::Adf => self.has_adf,
            ScanSource::AdfDuplex => self.has_adf && self.adf_duplex,
        }
    }
}

/// A device-side subscription for scan-trigger notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Label shown on the device panel
    pub label: String,
    /// Identifier the device assigned to the subscription
    pub id: String,
}

/// A scan-trigger notification pushed by the device
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    /// Paper source selected on the device panel
    pub source: ScanSource,
    /// Output format selected on the device panel
    pub format: OutputFormat,
    /// Color mode selected on the device panel
    pub color: ColorMode,
    /// When the event was received
    pub received_at: DateTime<Local>,
}

impl ScanEvent {
    /// Create an event received now
    pub fn new(source: ScanSource, format: OutputFormat) -> Self {
        Self {
            source,
            format,
            color: ColorMode::Color,
            received_at: Local::now(),
        }
    }
}

impl Timestamped for ScanEvent {
    fn occurred_at(&self) -> DateTime<Local> {
        self.received_at
    }
}

/// A single capture request sent to the device
#[derive(Debug, Clone, PartialEq)]
pub struct ScanJob {
    pub source: ScanSource,
    pub color: ColorMode,
    /// Resolution in DPI
    pub resolution: u32,
    /// Width in 1/300 inch units
    pub width: u32,
    /// Height in 1/300 inch units
    pub height: u32,
}

/// One captured page as delivered by the device (JPEG bytes)
#[derive(Debug, Clone)]
pub struct ScannedPage {
    /// 1-based page index within the job
    pub index: usize,
    /// Encoded JPEG data
    pub data: Vec<u8>,
}

/// Everything the session needs from a scanner
///
/// Implementations must be usable behind an `Arc` from a single session
/// thread; calls never overlap within one session.
pub trait ScannerClient: Send + Sync {
    /// Single liveness check; never blocks beyond a short network timeout
    fn is_alive(&self) -> bool;

    /// Read the device's scan capabilities
    fn capabilities(&self) -> Result<DeviceCapabilities>;

    /// Whether the device can push scan-trigger notifications
    fn supports_push(&self) -> bool {
        true
    }

    /// Register this host as a scan destination under `label`
    fn register(&self, label: &str) -> Result<Registration>;

    /// Block until the device signals a scan for `registration`
    fn wait_scan_event(
        &self,
        capabilities: &DeviceCapabilities,
        registration: &Registration,
    ) -> Result<ScanEvent>;

    /// Whether paper is currently loaded in the document feeder
    fn adf_loaded(&self) -> Result<bool>;

    /// Run a capture and return its pages in order
    fn scan(&self, job: &ScanJob) -> Result<Vec<ScannedPage>>;
}
