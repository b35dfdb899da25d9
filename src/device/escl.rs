//! eSCL (AirScan) HTTP client
//!
//! Talks to network scanners over the eSCL REST interface using a blocking
//! reqwest client:
//!
//! - `GET  /eSCL/ScannerStatus` - liveness and feeder state
//! - `GET  /eSCL/ScannerCapabilities` - supported sources and resolutions
//! - `POST /eSCL/ScanJobs` - start a job; the `Location` header names it
//! - `GET  {job}/NextDocument` - fetch pages until the device answers 404
//!
//! Request and response bodies are (de)serialized with quick-xml. Element
//! names are matched on their local part, so the `scan:` and `pwg:`
//! prefixes a device picks do not matter when reading.
//!
//! eSCL has no push notification channel, so `register` and
//! `wait_scan_event` report [`ScanError::Unsupported`].

use crate::core::error::{Result, ScanError};
use crate::device::traits::{
    ColorMode, DeviceCapabilities, Registration, ScanEvent, ScanJob, ScanSource, ScannedPage,
    ScannerClient,
};
use log::{debug, trace, warn};
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Timeout for the liveness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between `NextDocument` attempts while the device is busy
const BUSY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Busy answers tolerated for one page before giving up
const MAX_BUSY_RETRIES: u32 = 60;

const ADF_LOADED: &str = "ScannerAdfLoaded";

const ESCL_NS: &str = "http://schemas.hp.com/imaging/escl/2011/05/03";
const PWG_NS: &str = "http://www.pwg.org/schemas/2010/12/sm";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// State reported by `GET /eSCL/ScannerStatus`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScannerStatus {
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "AdfState", default)]
    pub adf_state: Option<String>,
}

impl ScannerStatus {
    pub fn adf_loaded(&self) -> bool {
        self.adf_state.as_deref() == Some(ADF_LOADED)
    }
}

/// Blocking eSCL client for one scanner
pub struct EsclClient {
    base_url: String,
    http: Client,
    probe: Client,
    timeout: Duration,
}

impl EsclClient {
    /// Create a client for `address` (`host`, `host:port` or a full URL)
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let probe = Client::builder().timeout(PROBE_TIMEOUT).build()?;

        Ok(Self {
            base_url: base_url(address),
            http,
            probe,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/eSCL/{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> ScanError {
        if err.is_timeout() {
            ScanError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            ScanError::Unreachable(format!("{}: {}", self.base_url, err))
        } else {
            ScanError::Http(err)
        }
    }

    fn get_text(&self, path: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(ScanError::Protocol(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }
        response.text().map_err(|e| self.transport_error(e))
    }

    pub fn status(&self) -> Result<ScannerStatus> {
        let xml = self.get_text("ScannerStatus")?;
        parse_status(&xml)
    }

    fn create_job(&self, job: &ScanJob) -> Result<String> {
        let response = self
            .http
            .post(self.url("ScanJobs"))
            .header("Content-Type", "text/xml")
            .body(scan_settings(job)?)
            .send()
            .map_err(|e| self.transport_error(e))?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ScanError::DeviceError("scanner is busy".to_string()));
        }
        if response.status() == StatusCode::CONFLICT {
            return Err(ScanError::DeviceError(
                "scanner rejected the job (no paper?)".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(ScanError::Protocol(format!(
                "POST ScanJobs returned {}",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ScanError::Protocol("scan job has no Location header".to_string()))?;

        Ok(job_url(&self.base_url, location))
    }

    /// Next page of a job, or `None` once the job is exhausted
    fn next_document(&self, job_url: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/NextDocument", job_url.trim_end_matches('/'));

        for attempt in 0..=MAX_BUSY_RETRIES {
            let response = self
                .http
                .get(&url)
                .send()
                .map_err(|e| self.transport_error(e))?;

            match response.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::SERVICE_UNAVAILABLE => {
                    trace!("Scanner busy (attempt {}), retrying", attempt + 1);
                    thread::sleep(BUSY_RETRY_DELAY);
                }
                status if status.is_success() => {
                    let bytes = response.bytes().map_err(|e| self.transport_error(e))?;
                    return Ok(Some(bytes.to_vec()));
                }
                status => {
                    return Err(ScanError::Protocol(format!(
                        "NextDocument returned {}",
                        status
                    )))
                }
            }
        }

        Err(ScanError::Timeout(
            BUSY_RETRY_DELAY.as_secs() * MAX_BUSY_RETRIES as u64,
        ))
    }
}

impl ScannerClient for EsclClient {
    fn is_alive(&self) -> bool {
        match self.probe.get(self.url("ScannerStatus")).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                trace!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    fn capabilities(&self) -> Result<DeviceCapabilities> {
        let xml = self.get_text("ScannerCapabilities")?;
        parse_capabilities(&xml)
    }

    fn register(&self, _label: &str) -> Result<Registration> {
        Err(ScanError::Unsupported(
            "eSCL scanners cannot push scan events; use adf-autoscan".to_string(),
        ))
    }

    fn wait_scan_event(
        &self,
        _capabilities: &DeviceCapabilities,
        _registration: &Registration,
    ) -> Result<ScanEvent> {
        Err(ScanError::Unsupported(
            "eSCL scanners cannot push scan events".to_string(),
        ))
    }

    fn supports_push(&self) -> bool {
        false
    }

    fn adf_loaded(&self) -> Result<bool> {
        Ok(self.status()?.adf_loaded())
    }

    fn scan(&self, job: &ScanJob) -> Result<Vec<ScannedPage>> {
        let job_url = self.create_job(job)?;
        debug!("Scan job created: {}", job_url);

        let mut pages = Vec::new();
        while let Some(data) = self.next_document(&job_url)? {
            pages.push(ScannedPage {
                index: pages.len() + 1,
                data,
            });
            // Flatbed jobs deliver a single document
            if job.source == ScanSource::Platen {
                break;
            }
        }

        if pages.is_empty() {
            warn!("Scan job {} finished without pages", job_url);
            return Err(ScanError::EmptyScan { job: job_url });
        }
        Ok(pages)
    }
}

/// Normalize a configured address into a base URL without trailing slash
pub fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// Resolve a `Location` header against the scanner base URL
fn job_url(base_url: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!("{}/{}", base_url, location.trim_start_matches('/'))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CapabilitiesXml {
    #[serde(rename = "MakeAndModel", default)]
    make_and_model: Option<String>,
    #[serde(rename = "SerialNumber", default)]
    serial_number: Option<String>,
    #[serde(rename = "Platen", default)]
    platen: Option<PlatenXml>,
    #[serde(rename = "Adf", default)]
    adf: Option<AdfXml>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatenXml {
    #[serde(rename = "PlatenInputCaps", default)]
    input_caps: Option<InputCapsXml>,
}

#[derive(Debug, Default, Deserialize)]
struct AdfXml {
    #[serde(rename = "AdfSimplexInputCaps", default)]
    simplex: Option<InputCapsXml>,
    #[serde(rename = "AdfDuplexInputCaps", default)]
    duplex: Option<InputCapsXml>,
}

#[derive(Debug, Default, Deserialize)]
struct InputCapsXml {
    #[serde(rename = "MaxWidth", default)]
    max_width: Option<u32>,
    #[serde(rename = "MaxHeight", default)]
    max_height: Option<u32>,
    #[serde(rename = "SettingProfiles", default)]
    setting_profiles: Option<SettingProfilesXml>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingProfilesXml {
    #[serde(rename = "SettingProfile", default)]
    profiles: Vec<SettingProfileXml>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingProfileXml {
    #[serde(rename = "SupportedResolutions", default)]
    supported: Option<SupportedResolutionsXml>,
}

#[derive(Debug, Default, Deserialize)]
struct SupportedResolutionsXml {
    #[serde(rename = "DiscreteResolutions", default)]
    discrete: Option<DiscreteResolutionsXml>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscreteResolutionsXml {
    #[serde(rename = "DiscreteResolution", default)]
    resolutions: Vec<DiscreteResolutionXml>,
}

#[derive(Debug, Deserialize)]
struct DiscreteResolutionXml {
    #[serde(rename = "XResolution")]
    x: u32,
}

impl InputCapsXml {
    fn resolutions(&self) -> impl Iterator<Item = u32> + '_ {
        self.setting_profiles
            .iter()
            .flat_map(|p| &p.profiles)
            .filter_map(|p| p.supported.as_ref())
            .filter_map(|s| s.discrete.as_ref())
            .flat_map(|d| &d.resolutions)
            .map(|r| r.x)
    }
}

/// Parse a `ScannerStatus` document
pub fn parse_status(xml: &str) -> Result<ScannerStatus> {
    quick_xml::de::from_str(xml)
        .map_err(|e| ScanError::Protocol(format!("malformed ScannerStatus: {}", e)))
}

/// Parse a `ScannerCapabilities` document
pub fn parse_capabilities(xml: &str) -> Result<DeviceCapabilities> {
    let doc: CapabilitiesXml = quick_xml::de::from_str(xml)
        .map_err(|e| ScanError::Protocol(format!("malformed ScannerCapabilities: {}", e)))?;

    if doc.platen.is_none() && doc.adf.is_none() {
        return Err(ScanError::Protocol(
            "capabilities list neither a platen nor a feeder".to_string(),
        ));
    }

    let input_caps: Vec<&InputCapsXml> = doc
        .platen
        .iter()
        .filter_map(|p| p.input_caps.as_ref())
        .chain(
            doc.adf
                .iter()
                .flat_map(|a| a.simplex.iter().chain(a.duplex.iter())),
        )
        .collect();

    let mut resolutions: Vec<u32> = input_caps.iter().flat_map(|c| c.resolutions()).collect();
    resolutions.sort_unstable();
    resolutions.dedup();

    let max_of = |field: fn(&InputCapsXml) -> Option<u32>| {
        input_caps.iter().filter_map(|c| field(c)).max().unwrap_or(0)
    };

    Ok(DeviceCapabilities {
        make_and_model: doc
            .make_and_model
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown scanner".to_string()),
        serial_number: doc.serial_number.map(|s| s.trim().to_string()),
        has_platen: doc.platen.is_some(),
        has_adf: doc.adf.is_some(),
        adf_duplex: doc.adf.as_ref().is_some_and(|a| a.duplex.is_some()),
        resolutions,
        max_width: max_of(|c| c.max_width),
        max_height: max_of(|c| c.max_height),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename = "scan:ScanSettings")]
struct ScanSettings {
    #[serde(rename = "@xmlns:scan")]
    xmlns_scan: &'static str,
    #[serde(rename = "@xmlns:pwg")]
    xmlns_pwg: &'static str,
    #[serde(rename = "pwg:Version")]
    version: &'static str,
    #[serde(rename = "pwg:ScanRegions")]
    regions: ScanRegions,
    #[serde(rename = "pwg:InputSource")]
    input_source: &'static str,
    #[serde(rename = "scan:Duplex", skip_serializing_if = "Option::is_none")]
    duplex: Option<bool>,
    #[serde(rename = "scan:ColorMode")]
    color_mode: &'static str,
    #[serde(rename = "scan:XResolution")]
    x_resolution: u32,
    #[serde(rename = "scan:YResolution")]
    y_resolution: u32,
    #[serde(rename = "pwg:DocumentFormat")]
    document_format: &'static str,
}

#[derive(Debug, Serialize)]
struct ScanRegions {
    #[serde(rename = "pwg:ScanRegion")]
    region: ScanRegion,
}

#[derive(Debug, Serialize)]
struct ScanRegion {
    #[serde(rename = "pwg:ContentRegionUnits")]
    units: &'static str,
    #[serde(rename = "pwg:XOffset")]
    x_offset: u32,
    #[serde(rename = "pwg:YOffset")]
    y_offset: u32,
    #[serde(rename = "pwg:Width")]
    width: u32,
    #[serde(rename = "pwg:Height")]
    height: u32,
}

/// Build the `ScanSettings` request body for a job
pub fn scan_settings(job: &ScanJob) -> Result<String> {
    let settings = ScanSettings {
        xmlns_scan: ESCL_NS,
        xmlns_pwg: PWG_NS,
        version: "2.0",
        regions: ScanRegions {
            region: ScanRegion {
                units: "escl:ThreeHundredthsOfInches",
                x_offset: 0,
                y_offset: 0,
                width: job.width,
                height: job.height,
            },
        },
        input_source: if job.source.is_feeder() {
            "Feeder"
        } else {
            "Platen"
        },
        duplex: job
            .source
            .is_feeder()
            .then_some(job.source == ScanSource::AdfDuplex),
        color_mode: match job.color {
            ColorMode::Color => "RGB24",
            ColorMode::Grayscale => "Grayscale8",
        },
        x_resolution: job.resolution,
        y_resolution: job.resolution,
        document_format: "image/jpeg",
    };

    let body = quick_xml::se::to_string(&settings)
        .map_err(|e| ScanError::Protocol(format!("cannot encode ScanSettings: {}", e)))?;
    Ok(format!("{}\n{}", XML_DECLARATION, body))
}
