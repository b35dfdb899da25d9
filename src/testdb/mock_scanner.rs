//! Mock scanner implementation for testing without a real device
//!
//! [`MockScanner`] implements [`ScannerClient`] from scripted behavior:
//! liveness answers, event outcomes, feeder polls and scan failures are
//! queued up front and consumed one call at a time. When a script runs out
//! the scanner falls back to healthy defaults (alive, event delivered, paper
//! loaded, scan succeeds), so a scenario only has to describe what goes wrong.

use crate::core::error::{Result, ScanError};
use crate::core::session::Pacer;
use crate::device::discovery::{DeviceDiscovery, DiscoveredDevice};
use crate::device::traits::{
    DeviceCapabilities, OutputFormat, Registration, ScanEvent, ScanJob, ScanSource, ScannedPage,
    ScannerClient,
};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted outcome of `wait_scan_event`
#[derive(Debug, Clone)]
pub enum EventStep {
    /// Deliver an event from this source in this format
    Trigger(ScanSource, OutputFormat),
    /// Fail with a device error carrying this message
    Fail(String),
}

impl EventStep {
    /// Shorthand for a failing step
    pub fn fail(message: &str) -> Self {
        EventStep::Fail(message.to_string())
    }
}

/// Configuration for mock scanner behavior
#[derive(Debug, Clone)]
pub struct MockScannerConfig {
    /// Capabilities reported at startup
    pub capabilities: DeviceCapabilities,
    /// Fail the capabilities request (startup failure)
    pub fail_capabilities: bool,
    /// Pages produced per simplex scan (duplex doubles it)
    pub pages_per_scan: usize,
    /// Dimensions of generated pages in pixels
    pub page_width: u32,
    pub page_height: u32,
    /// Random event/scan failure rate (percentage 0-100)
    pub random_failure_rate: u8,
}

impl Default for MockScannerConfig {
    fn default() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                make_and_model: "Mock Scanner 3000".to_string(),
                serial_number: Some("MOCK-0001".to_string()),
                has_platen: true,
                has_adf: true,
                adf_duplex: true,
                resolutions: vec![75, 100, 150, 200, 300, 600],
                max_width: 2550,
                max_height: 4200,
            },
            fail_capabilities: false,
            pages_per_scan: 1,
            page_width: 64,
            page_height: 80,
            random_failure_rate: 0,
        }
    }
}

/// Number of calls made to each operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub is_alive: usize,
    pub capabilities: usize,
    pub register: usize,
    pub wait_scan_event: usize,
    pub adf_loaded: usize,
    pub scan: usize,
}

#[derive(Debug, Default)]
struct MockState {
    liveness: VecDeque<bool>,
    events: VecDeque<EventStep>,
    adf_polls: VecDeque<bool>,
    scan_failures: VecDeque<Option<String>>,
    calls: CallCounts,
    jobs: Vec<ScanJob>,
    pages_generated: u64,
}

/// Scripted in-memory scanner
#[derive(Debug)]
pub struct MockScanner {
    config: MockScannerConfig,
    state: Mutex<MockState>,
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScanner {
    /// Create a healthy scanner with default capabilities
    pub fn new() -> Self {
        Self::with_config(MockScannerConfig::default())
    }

    /// Create with specific configuration
    pub fn with_config(config: MockScannerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &MockScannerConfig {
        &self.config
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the script from the others
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue answers for `is_alive`
    pub fn script_liveness(&self, answers: impl IntoIterator<Item = bool>) -> &Self {
        self.state().liveness.extend(answers);
        self
    }

    /// Queue outcomes for `wait_scan_event`
    pub fn script_events(&self, steps: impl IntoIterator<Item = EventStep>) -> &Self {
        self.state().events.extend(steps);
        self
    }

    /// Queue `n` consecutive event failures
    pub fn script_event_failures(&self, n: usize, message: &str) -> &Self {
        self.script_events((0..n).map(|_| EventStep::fail(message)))
    }

    /// Queue answers for `adf_loaded`
    pub fn script_adf_polls(&self, loaded: impl IntoIterator<Item = bool>) -> &Self {
        self.state().adf_polls.extend(loaded);
        self
    }

    /// Queue scan outcomes: `None` succeeds, `Some(message)` fails
    pub fn script_scans(&self, outcomes: impl IntoIterator<Item = Option<String>>) -> &Self {
        self.state().scan_failures.extend(outcomes);
        self
    }

    /// Snapshot of the call counters
    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Jobs received by `scan`, in order
    pub fn jobs(&self) -> Vec<ScanJob> {
        self.state().jobs.clone()
    }

    fn random_failure(&self) -> bool {
        if self.config.random_failure_rate == 0 {
            return false;
        }
        let roll = rand::random::<u8>() % 100;
        roll < self.config.random_failure_rate
    }
}

impl ScannerClient for MockScanner {
    fn is_alive(&self) -> bool {
        let mut state = self.state();
        state.calls.is_alive += 1;
        state.liveness.pop_front().unwrap_or(true)
    }

    fn capabilities(&self) -> Result<DeviceCapabilities> {
        self.state().calls.capabilities += 1;
        if self.config.fail_capabilities {
            return Err(ScanError::Protocol(
                "malformed capabilities document".to_string(),
            ));
        }
        Ok(self.config.capabilities.clone())
    }

    fn register(&self, label: &str) -> Result<Registration> {
        let mut state = self.state();
        state.calls.register += 1;
        Ok(Registration {
            label: label.to_string(),
            id: format!("mock-registration-{}", state.calls.register),
        })
    }

    fn wait_scan_event(
        &self,
        _capabilities: &DeviceCapabilities,
        _registration: &Registration,
    ) -> Result<ScanEvent> {
        let step = {
            let mut state = self.state();
            state.calls.wait_scan_event += 1;
            state.events.pop_front()
        };

        match step {
            Some(EventStep::Fail(message)) => Err(ScanError::DeviceError(message)),
            _ if self.random_failure() => {
                Err(ScanError::DeviceError("simulated random failure".to_string()))
            }
            Some(EventStep::Trigger(source, format)) => Ok(ScanEvent::new(source, format)),
            None => Ok(ScanEvent::new(ScanSource::Platen, OutputFormat::Jpeg)),
        }
    }

    fn adf_loaded(&self) -> Result<bool> {
        let mut state = self.state();
        state.calls.adf_loaded += 1;
        Ok(state.adf_polls.pop_front().unwrap_or(true))
    }

    fn scan(&self, job: &ScanJob) -> Result<Vec<ScannedPage>> {
        let (outcome, seed) = {
            let mut state = self.state();
            state.calls.scan += 1;
            state.jobs.push(job.clone());
            (state.scan_failures.pop_front().flatten(), state.pages_generated)
        };

        if let Some(message) = outcome {
            return Err(ScanError::DeviceError(message));
        }
        if self.random_failure() {
            return Err(ScanError::DeviceError("simulated random failure".to_string()));
        }

        let count = if job.source == ScanSource::AdfDuplex {
            self.config.pages_per_scan * 2
        } else {
            self.config.pages_per_scan
        };

        let mut pages = Vec::with_capacity(count);
        for i in 0..count {
            pages.push(ScannedPage {
                index: i + 1,
                data: synthetic_page(
                    self.config.page_width,
                    self.config.page_height,
                    seed + i as u64,
                )?,
            });
        }
        self.state().pages_generated += count as u64;

        Ok(pages)
    }
}

/// Generate a small JPEG page with a seed-dependent gradient
pub fn synthetic_page(width: u32, height: u32, seed: u64) -> Result<Vec<u8>> {
    let shift = (seed % 256) as u32;
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x * 255 / width.max(1) + shift) % 256) as u8);
            pixels.push(((y * 255 / height.max(1)) % 256) as u8);
            pixels.push(((x + y + shift) % 256) as u8);
        }
    }

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, 85).encode(
        &pixels,
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(data)
}

/// Pacer that records requested pauses instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pauses requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        match self.pauses.lock() {
            Ok(pauses) => pauses.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of pauses of exactly `duration`
    pub fn count_of(&self, duration: Duration) -> usize {
        self.pauses().iter().filter(|d| **d == duration).count()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        match self.pauses.lock() {
            Ok(mut pauses) => pauses.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}

/// Discovery backend with a fixed answer
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    answer: Option<DiscoveredDevice>,
    delay: Duration,
}

impl StaticDiscovery {
    /// Always find this device
    pub fn found(name: &str, address: &str) -> Self {
        Self {
            answer: Some(DiscoveredDevice {
                name: name.to_string(),
                address: address.to_string(),
            }),
            delay: Duration::ZERO,
        }
    }

    /// Never find anything
    pub fn not_found() -> Self {
        Self {
            answer: None,
            delay: Duration::ZERO,
        }
    }

    /// Answer only after `delay`
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl DeviceDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<DiscoveredDevice> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.answer
            .clone()
            .ok_or_else(|| ScanError::Unreachable("no scanner announced itself".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_defaults() {
        let scanner = MockScanner::new();
        let caps = scanner.capabilities().unwrap();
        let reg = scanner.register("desk").unwrap();

        assert!(scanner.is_alive());
        assert!(scanner.adf_loaded().unwrap());
        assert!(scanner.wait_scan_event(&caps, &reg).is_ok());
        assert_eq!(reg.label, "desk");

        let calls = scanner.calls();
        assert_eq!(calls.is_alive, 1);
        assert_eq!(calls.register, 1);
        assert_eq!(calls.wait_scan_event, 1);
    }

    #[test]
    fn test_scripts_consumed_in_order() {
        let scanner = MockScanner::new();
        scanner
            .script_liveness([false, true])
            .script_events([
                EventStep::fail("busy"),
                EventStep::Trigger(ScanSource::Adf, OutputFormat::Pdf),
            ]);
        let caps = scanner.capabilities().unwrap();
        let reg = scanner.register("desk").unwrap();

        assert!(!scanner.is_alive());
        assert!(scanner.is_alive());
        assert!(scanner.is_alive());

        assert!(scanner.wait_scan_event(&caps, &reg).is_err());
        let event = scanner.wait_scan_event(&caps, &reg).unwrap();
        assert_eq!(event.source, ScanSource::Adf);
        assert_eq!(event.format, OutputFormat::Pdf);
    }

    #[test]
    fn test_duplex_doubles_pages() {
        let scanner = MockScanner::with_config(MockScannerConfig {
            pages_per_scan: 2,
            ..Default::default()
        });
        let job = ScanJob {
            source: ScanSource::AdfDuplex,
            color: Default::default(),
            resolution: 300,
            width: 2550,
            height: 3508,
        };

        let pages = scanner.scan(&job).unwrap();
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[3].index, 4);
        assert_eq!(scanner.jobs(), vec![job]);
    }

    #[test]
    fn test_scripted_scan_failure() {
        let scanner = MockScanner::new();
        scanner.script_scans([Some("paper jam".to_string()), None]);
        let job = ScanJob {
            source: ScanSource::Adf,
            color: Default::default(),
            resolution: 200,
            width: 100,
            height: 100,
        };

        assert!(matches!(scanner.scan(&job), Err(ScanError::DeviceError(ref m)) if m == "paper jam"));
        assert_eq!(scanner.scan(&job).unwrap().len(), 1);
    }

    #[test]
    fn test_synthetic_page_is_jpeg() {
        let data = synthetic_page(16, 16, 3).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_ne!(data, synthetic_page(16, 16, 4).unwrap());
    }

    #[test]
    fn test_recording_pacer() {
        let pacer = RecordingPacer::new();
        pacer.pause(Duration::from_millis(5));
        pacer.pause(Duration::from_millis(5));
        pacer.pause(Duration::from_millis(9));
        assert_eq!(pacer.count_of(Duration::from_millis(5)), 2);
        assert_eq!(pacer.pauses().len(), 3);
    }
}
