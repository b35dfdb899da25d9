//! Session startup
//!
//! The one-time phase before the loop: wait for the device, read its
//! capabilities, fit the scan settings, register or check the feeder, then
//! build the mode-specific [`Session`] and run it. Errors in this phase are
//! returned to the caller; once the loop runs, nothing is.

use crate::core::error::Result;
use crate::core::numbering::DirectoryScanNumberAllocator;
use crate::core::persist::{AdfPersister, EventPersister};
use crate::core::session::{
    NoopObserver, Pacer, ReachabilityProbe, Session, SessionObserver, SessionPolicy,
    SessionSummary, ThreadPacer, ADF_SEQUENCE_START,
};
use crate::core::settings::{ModeConfig, RunConfiguration};
use crate::device::adapters::{AdfEventSource, ClientProbe, PushEventSource};
use crate::device::traits::ScannerClient;
use log::{info, warn};
use std::sync::Arc;

/// Pacing and observation hooks for a session
#[derive(Clone)]
pub struct SessionHooks {
    pub pacer: Arc<dyn Pacer>,
    pub observer: Arc<dyn SessionObserver>,
}

impl Default for SessionHooks {
    fn default() -> Self {
        Self {
            pacer: Arc::new(ThreadPacer),
            observer: Arc::new(NoopObserver),
        }
    }
}

/// Prepare and run a session against `client`
pub fn run_session<C: ScannerClient>(
    client: Arc<C>,
    run: &RunConfiguration,
    policy: SessionPolicy,
    hooks: SessionHooks,
) -> Result<SessionSummary> {
    let probe = ClientProbe::new(client.clone());
    probe.wait_until_up(run.reachability_poll, &*hooks.pacer);

    let capabilities = client.capabilities()?;
    info!(
        "Connected to {}{}",
        capabilities.make_and_model,
        capabilities
            .serial_number
            .as_ref()
            .map(|s| format!(" (serial {})", s))
            .unwrap_or_default()
    );

    let (scan, changes) = run.scan.fit_to(&capabilities);
    for change in &changes {
        warn!("Adjusted scan setting to device limits: {}", change);
    }

    info!(
        "Saving scans to {} as {}",
        run.directories.output.display(),
        run.directories.pattern
    );

    let summary = match &run.mode {
        ModeConfig::Listen(registration) => {
            let source =
                PushEventSource::register(client.clone(), capabilities.clone(), &registration.label)?;
            let persister = EventPersister::new(client, capabilities, scan);
            Session::new(
                probe,
                source,
                persister,
                DirectoryScanNumberAllocator,
                run.directories.clone(),
                policy,
            )
            .with_pacer(hooks.pacer)
            .with_observer(hooks.observer)
            .run()
        }
        ModeConfig::AdfAutoscan(adf) => {
            let persister = AdfPersister::new(client.clone(), &capabilities, scan, adf)?;
            info!(
                "Watching the document feeder ({}, {})",
                persister.source(),
                if adf.pdf { "PDF" } else { "JPEG pages" }
            );
            let source = AdfEventSource::new(client, adf, hooks.pacer.clone());
            Session::new(
                probe,
                source,
                persister,
                DirectoryScanNumberAllocator,
                run.directories.clone(),
                policy.with_sequence_start(ADF_SEQUENCE_START),
            )
            .with_pacer(hooks.pacer)
            .with_observer(hooks.observer)
            .run()
        }
    };

    Ok(summary)
}
