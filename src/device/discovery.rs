//! One-shot scanner discovery
//!
//! Discovery runs once, before a session exists, and either yields a single
//! address or gives up after a timeout.

use crate::core::error::{Result, ScanError};
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::debug;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A scanner found on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Announced service name
    pub name: String,
    /// Address usable by the HTTP client (`host:port`)
    pub address: String,
}

/// A way of finding a scanner
pub trait DeviceDiscovery: Send + Sync {
    /// Block until one scanner is found
    fn discover(&self) -> Result<DiscoveredDevice>;
}

/// Run `discovery` on a worker thread and wait at most `timeout` for it
///
/// A worker that is still running when the timeout fires is left to finish
/// on its own; its answer is dropped.
pub fn discover_with_timeout(
    discovery: Arc<dyn DeviceDiscovery>,
    timeout: Duration,
) -> Result<DiscoveredDevice> {
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name("scanner-discovery".to_string())
        .spawn(move || {
            let _ = tx.send(discovery.discover());
        })?;

    debug!("Waiting up to {} s for scanner discovery", timeout.as_secs());
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ScanError::Timeout(timeout.as_secs())),
        Err(RecvTimeoutError::Disconnected) => Err(ScanError::DeviceError(
            "discovery worker stopped without an answer".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::StaticDiscovery;

    #[test]
    fn test_discovery_answer_returned() {
        let found = discover_with_timeout(
            Arc::new(StaticDiscovery::found("Desk MFP", "10.1.1.5:80")),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(found.address, "10.1.1.5:80");
    }

    #[test]
    fn test_discovery_error_propagates() {
        let result = discover_with_timeout(
            Arc::new(StaticDiscovery::not_found()),
            Duration::from_secs(2),
        );
        assert!(matches!(result, Err(ScanError::Unreachable(_))));
    }

    #[test]
    fn test_discovery_times_out() {
        let slow = StaticDiscovery::found("Slow", "10.1.1.6").after(Duration::from_millis(500));
        let result = discover_with_timeout(Arc::new(slow), Duration::from_millis(50));
        assert!(matches!(result, Err(ScanError::Timeout(_))));
    }
}
