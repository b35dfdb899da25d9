//! Session collaborators backed by a [`ScannerClient`]
//!
//! These adapters let the generic session loop talk to any client: the HTTP
//! client in production, the mock scanner in tests and simulations.

use crate::core::error::Result;
use crate::core::session::{EventSource, Pacer, ReachabilityProbe, Timestamped};
use crate::core::settings::AdfAutoScanConfig;
use crate::device::traits::{DeviceCapabilities, Registration, ScanEvent, ScannerClient};
use chrono::{DateTime, Local};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Reachability probe that asks the client directly
pub struct ClientProbe<C: ScannerClient> {
    client: Arc<C>,
}

impl<C: ScannerClient> ClientProbe<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

impl<C: ScannerClient> ReachabilityProbe for ClientProbe<C> {
    fn is_alive(&self) -> bool {
        self.client.is_alive()
    }
}

/// Push-mode event source: waits for scans started on the device panel
pub struct PushEventSource<C: ScannerClient> {
    client: Arc<C>,
    capabilities: DeviceCapabilities,
    registration: Registration,
}

impl<C: ScannerClient> PushEventSource<C> {
    /// Register with the device under `label`
    ///
    /// Called once at startup; a failure here fails the session start.
    pub fn register(client: Arc<C>, capabilities: DeviceCapabilities, label: &str) -> Result<Self> {
        let registration = client.register(label)?;
        info!(
            "Registered as '{}' on {} (id {})",
            registration.label, capabilities.make_and_model, registration.id
        );
        Ok(Self {
            client,
            capabilities,
            registration,
        })
    }
}

impl<C: ScannerClient> EventSource for PushEventSource<C> {
    type Trigger = ScanEvent;

    fn wait(&mut self) -> Result<ScanEvent> {
        let event = self
            .client
            .wait_scan_event(&self.capabilities, &self.registration)?;
        debug!(
            "Scan event: {} as {:?}",
            event.source.display_name(),
            event.format
        );
        Ok(event)
    }
}

/// Paper detected in the document feeder and settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdfTrigger {
    pub detected_at: DateTime<Local>,
}

impl AdfTrigger {
    pub fn now() -> Self {
        Self {
            detected_at: Local::now(),
        }
    }
}

impl Timestamped for AdfTrigger {
    fn occurred_at(&self) -> DateTime<Local> {
        self.detected_at
    }
}

/// ADF-mode event source: polls for paper, then waits for it to settle
pub struct AdfEventSource<C: ScannerClient> {
    client: Arc<C>,
    poll_interval: Duration,
    start_delay: Duration,
    pacer: Arc<dyn Pacer>,
}

impl<C: ScannerClient> AdfEventSource<C> {
    pub fn new(client: Arc<C>, config: &AdfAutoScanConfig, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval,
            start_delay: config.start_delay,
            pacer,
        }
    }
}

impl<C: ScannerClient> EventSource for AdfEventSource<C> {
    type Trigger = AdfTrigger;

    fn wait(&mut self) -> Result<AdfTrigger> {
        while !self.client.adf_loaded()? {
            self.pacer.pause(self.poll_interval);
        }

        let trigger = AdfTrigger::now();
        info!(
            "Paper detected in feeder, starting in {} ms",
            self.start_delay.as_millis()
        );
        if !self.start_delay.is_zero() {
            self.pacer.pause(self.start_delay);
        }
        Ok(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::{EventStep, MockScanner, RecordingPacer};

    fn adf_config() -> AdfAutoScanConfig {
        AdfAutoScanConfig {
            duplex: false,
            pdf: false,
            poll_interval: Duration::from_millis(500),
            start_delay: Duration::from_millis(3000),
        }
    }

    #[test]
    fn test_adf_source_polls_then_settles() {
        let scanner = Arc::new(MockScanner::new());
        scanner.script_adf_polls([false, false, false, true]);
        let pacer = Arc::new(RecordingPacer::new());

        let mut source = AdfEventSource::new(scanner.clone(), &adf_config(), pacer.clone());
        source.wait().unwrap();

        assert_eq!(scanner.calls().adf_loaded, 4);
        assert_eq!(
            pacer.pauses(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(3000),
            ]
        );
    }

    #[test]
    fn test_push_source_registers_once() {
        let scanner = Arc::new(MockScanner::new());
        scanner.script_events([EventStep::fail("busy")]);
        let caps = scanner.capabilities().unwrap();

        let mut source = PushEventSource::register(scanner.clone(), caps, "Office").unwrap();
        assert!(source.wait().is_err());
        assert!(source.wait().is_ok());

        assert_eq!(scanner.calls().register, 1);
        assert_eq!(scanner.calls().wait_scan_event, 2);
    }

    #[test]
    fn test_reachability_delegates_to_client() {
        let scanner = Arc::new(MockScanner::new());
        scanner.script_liveness([false]);
        let probe = ClientProbe::new(scanner);

        assert!(!probe.is_alive());
        assert!(probe.is_alive());
    }
}
