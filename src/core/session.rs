//! Session orchestration loop
//!
//! A [`Session`] drives one unattended run against a scanner: it waits for
//! the device, blocks on an [`EventSource`] until a scan is triggered,
//! allocates a scan number, hands the trigger to a [`ScanPersister`] and
//! classifies every failure.
//!
//! # States
//!
//! ```text
//!  AwaitingDeviceUp --(device answers)--> AwaitingEvent
//!  AwaitingEvent    --(trigger)---------> Persisting
//!  AwaitingEvent    --(error)-----------> Backoff
//!  Persisting       --(saved or error)--> Backoff
//!  Backoff          --(saved)-----------> AwaitingEvent        (after pacing)
//!  Backoff          --(error, alive)----> AwaitingEvent        (failures + 1, after pacing)
//!  Backoff          --(error, alive)----> Terminated           (failure budget reached)
//!  Backoff          --(error, down)-----> AwaitingDeviceUp
//! ```
//!
//! A device that stops answering is waited for indefinitely and does not
//! count against the failure budget. Errors from a device that still answers
//! are counted; the session ends once [`FAILURE_BUDGET`] of them accumulate.
//! The failure count is never reset by a successful scan.
//!
//! The loop never returns an error. Every failure inside it is logged and
//! absorbed; the returned [`SessionSummary`] only says why it stopped.

use crate::core::error::{Result, ScanError};
use crate::core::numbering::ScanNumberAllocator;
use crate::core::settings::{DirectoryConfig, RunConfiguration};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Transient failures tolerated before a session ends
pub const FAILURE_BUDGET: u32 = 50;

/// Pause after every completed iteration
pub const PACING: Duration = Duration::from_millis(1000);

/// Default interval between probes while the device is down
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Sequence value before the first feeder scan
pub const ADF_SEQUENCE_START: u64 = 1;

// ============================================================================
// Collaborator seams
// ============================================================================

/// Suspends the session thread
///
/// Every delay in the loop goes through a pacer.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

/// Pacer backed by `thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Answers whether the device is reachable
pub trait ReachabilityProbe {
    /// Single liveness check
    fn is_alive(&self) -> bool;

    /// Block until the device answers, probing every `poll_interval`
    ///
    /// There is no attempt limit: an offline scanner is expected to come back.
    fn wait_until_up(&self, poll_interval: Duration, pacer: &dyn Pacer) {
        let mut attempts: u64 = 0;
        while !self.is_alive() {
            attempts += 1;
            if attempts == 1 {
                info!("Device not reachable, waiting for it to come back");
            } else {
                debug!("Device still unreachable after {} probes", attempts);
            }
            pacer.pause(poll_interval);
        }
        if attempts > 0 {
            info!("Device reachable again after {} probes", attempts + 1);
        }
    }
}

/// A scan trigger that knows when it happened
///
/// File names are rendered from this time, not from when saving starts.
pub trait Timestamped {
    fn occurred_at(&self) -> DateTime<Local>;
}

/// Blocking source of scan triggers
pub trait EventSource {
    type Trigger: Timestamped;

    /// Block until a scan should start
    fn wait(&mut self) -> Result<Self::Trigger>;
}

/// Everything a persister needs to know about the scan it is saving
#[derive(Debug, Clone)]
pub struct PersistRequest<'a> {
    /// Allocated scan number
    pub number: u64,
    pub directories: &'a DirectoryConfig,
    /// Trigger time, used to render the file name pattern
    pub at: DateTime<Local>,
}

/// Result of a successful persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedScan {
    pub number: u64,
    /// Final locations of the written files
    pub files: Vec<PathBuf>,
    /// Number of pages captured
    pub pages: usize,
}

/// Captures and stores the artifacts for one trigger
pub trait ScanPersister<T> {
    fn persist(&mut self, trigger: T, request: &PersistRequest<'_>) -> Result<SavedScan>;
}

// ============================================================================
// State and context
// ============================================================================

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    AwaitingDeviceUp,
    AwaitingEvent,
    Persisting,
    Backoff,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingDeviceUp => "waiting for device",
            SessionState::AwaitingEvent => "waiting for scan",
            SessionState::Persisting => "saving scan",
            SessionState::Backoff => "pausing",
            SessionState::Terminated => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// How a failed iteration was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The device still answers; counted against the budget
    Transient,
    /// The device stopped answering; not counted
    DeviceDown,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FailureBudgetExhausted,
    ScanLimitReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::FailureBudgetExhausted => write!(f, "failure budget exhausted"),
            StopReason::ScanLimitReached => write!(f, "scan limit reached"),
        }
    }
}

/// Loop-local counters, owned by a single [`Session::run`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub state: SessionState,
    /// Passes through `AwaitingEvent`, for logging only
    pub iteration: u64,
    /// Classified transient failures; never decreases
    pub failures: u32,
    /// Last scan number issued, or the sequence start before the first scan
    pub last_scan_number: u64,
    pub scans_saved: u64,
}

impl SessionContext {
    fn new(sequence_start: u64) -> Self {
        Self {
            state: SessionState::AwaitingDeviceUp,
            iteration: 0,
            failures: 0,
            last_scan_number: sequence_start,
            scans_saved: 0,
        }
    }
}

/// Final counters of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub iterations: u64,
    pub failures: u32,
    pub scans_saved: u64,
    pub last_scan_number: u64,
    pub stop: StopReason,
}

/// Hooks for watching a session from the outside
///
/// All methods default to doing nothing.
pub trait SessionObserver {
    fn on_transition(&self, _from: SessionState, _to: SessionState, _ctx: &SessionContext) {}
    fn on_scan_saved(&self, _scan: &SavedScan, _ctx: &SessionContext) {}
    fn on_failure(&self, _kind: FailureKind, _error: &ScanError, _ctx: &SessionContext) {}
    fn on_stop(&self, _summary: &SessionSummary) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Timing and stop conditions for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub pacing: Duration,
    pub failure_budget: u32,
    pub device_poll_interval: Duration,
    /// Stop normally after this many saved scans
    pub scan_limit: Option<u64>,
    /// Sequence value the allocator starts counting from
    pub sequence_start: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            pacing: PACING,
            failure_budget: FAILURE_BUDGET,
            device_poll_interval: DEVICE_POLL_INTERVAL,
            scan_limit: None,
            sequence_start: 0,
        }
    }
}

impl SessionPolicy {
    /// Default policy using the resolved reachability poll interval
    pub fn for_run(run: &RunConfiguration) -> Self {
        Self {
            device_poll_interval: run.reachability_poll,
            ..Default::default()
        }
    }

    pub fn with_scan_limit(mut self, limit: Option<u64>) -> Self {
        self.scan_limit = limit;
        self
    }

    pub fn with_sequence_start(mut self, start: u64) -> Self {
        self.sequence_start = start;
        self
    }
}

// ============================================================================
// Session
// ============================================================================

/// Outcome of the work done before `Backoff`
enum Outcome {
    Saved,
    Failed(ScanError),
}

/// One orchestrated scanning session
pub struct Session<P, E, S, A>
where
    P: ReachabilityProbe,
    E: EventSource,
    S: ScanPersister<E::Trigger>,
    A: ScanNumberAllocator,
{
    probe: P,
    source: E,
    persister: S,
    allocator: A,
    directories: DirectoryConfig,
    policy: SessionPolicy,
    pacer: Arc<dyn Pacer>,
    observer: Arc<dyn SessionObserver>,
}

impl<P, E, S, A> Session<P, E, S, A>
where
    P: ReachabilityProbe,
    E: EventSource,
    S: ScanPersister<E::Trigger>,
    A: ScanNumberAllocator,
{
    pub fn new(
        probe: P,
        source: E,
        persister: S,
        allocator: A,
        directories: DirectoryConfig,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            probe,
            source,
            persister,
            allocator,
            directories,
            policy,
            pacer: Arc::new(ThreadPacer),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn enter(&self, ctx: &mut SessionContext, next: SessionState) {
        if ctx.state != next {
            debug!("Session state: {:?} -> {:?}", ctx.state, next);
        }
        let from = ctx.state;
        ctx.state = next;
        self.observer.on_transition(from, next, ctx);
    }

    /// Run until the failure budget or the scan limit is reached
    pub fn run(&mut self) -> SessionSummary {
        let mut ctx = SessionContext::new(self.policy.sequence_start);
        let mut pending: Option<E::Trigger> = None;
        let mut outcome = Outcome::Saved;
        let mut stop = None;

        info!(
            "Session started (failure budget {}, pacing {} ms)",
            self.policy.failure_budget,
            self.policy.pacing.as_millis()
        );

        while ctx.state != SessionState::Terminated {
            match ctx.state {
                SessionState::AwaitingDeviceUp => {
                    self.probe
                        .wait_until_up(self.policy.device_poll_interval, &*self.pacer);
                    self.enter(&mut ctx, SessionState::AwaitingEvent);
                }
                SessionState::AwaitingEvent => {
                    ctx.iteration += 1;
                    debug!("Iteration {}: waiting for scan trigger", ctx.iteration);
                    match self.source.wait() {
                        Ok(trigger) => {
                            pending = Some(trigger);
                            self.enter(&mut ctx, SessionState::Persisting);
                        }
                        Err(e) => {
                            outcome = Outcome::Failed(e);
                            self.enter(&mut ctx, SessionState::Backoff);
                        }
                    }
                }
                SessionState::Persisting => {
                    outcome = match pending.take() {
                        Some(trigger) => self.persist(&mut ctx, trigger),
                        None => Outcome::Failed(ScanError::Protocol(
                            "no pending trigger to persist".to_string(),
                        )),
                    };
                    self.enter(&mut ctx, SessionState::Backoff);
                }
                SessionState::Backoff => {
                    let current = std::mem::replace(&mut outcome, Outcome::Saved);
                    let (next, reason) = self.backoff(&mut ctx, current);
                    stop = reason;
                    self.enter(&mut ctx, next);
                }
                SessionState::Terminated => {}
            }
        }

        let summary = SessionSummary {
            iterations: ctx.iteration,
            failures: ctx.failures,
            scans_saved: ctx.scans_saved,
            last_scan_number: ctx.last_scan_number,
            stop: stop.unwrap_or(StopReason::FailureBudgetExhausted),
        };

        match summary.stop {
            StopReason::FailureBudgetExhausted => error!(
                "Session stopped abnormally: {} failures after {} iterations ({} scans saved)",
                summary.failures, summary.iterations, summary.scans_saved
            ),
            StopReason::ScanLimitReached => info!(
                "Session finished: {} scans saved in {} iterations ({} failures)",
                summary.scans_saved, summary.iterations, summary.failures
            ),
        }
        self.observer.on_stop(&summary);

        summary
    }

    fn persist(&mut self, ctx: &mut SessionContext, trigger: E::Trigger) -> Outcome {
        let at = trigger.occurred_at();
        let number = match self.allocator.next_scan_number(
            &self.directories.output,
            ctx.last_scan_number,
            &self.directories.pattern,
            &at,
        ) {
            Ok(number) => number,
            Err(e) => return Outcome::Failed(e),
        };

        let request = PersistRequest {
            number,
            directories: &self.directories,
            at,
        };

        match self.persister.persist(trigger, &request) {
            Ok(saved) => {
                ctx.last_scan_number = number;
                ctx.scans_saved += 1;
                info!(
                    "Scan #{} saved ({} page(s), {} file(s))",
                    saved.number,
                    saved.pages,
                    saved.files.len()
                );
                self.observer.on_scan_saved(&saved, ctx);
                Outcome::Saved
            }
            Err(e) => Outcome::Failed(e),
        }
    }

    fn backoff(
        &mut self,
        ctx: &mut SessionContext,
        outcome: Outcome,
    ) -> (SessionState, Option<StopReason>) {
        let err = match outcome {
            Outcome::Saved => {
                if let Some(limit) = self.policy.scan_limit {
                    if ctx.scans_saved >= limit {
                        return (SessionState::Terminated, Some(StopReason::ScanLimitReached));
                    }
                }
                self.pacer.pause(self.policy.pacing);
                return (SessionState::AwaitingEvent, None);
            }
            Outcome::Failed(err) => err,
        };

        if !self.probe.is_alive() {
            warn!(
                "Iteration {} failed and the device is not answering: {}",
                ctx.iteration, err
            );
            self.observer.on_failure(FailureKind::DeviceDown, &err, ctx);
            return (SessionState::AwaitingDeviceUp, None);
        }

        ctx.failures += 1;
        warn!(
            "Iteration {} failed ({}/{}): {}",
            ctx.iteration, ctx.failures, self.policy.failure_budget, err
        );
        self.observer.on_failure(FailureKind::Transient, &err, ctx);

        if ctx.failures >= self.policy.failure_budget {
            return (
                SessionState::Terminated,
                Some(StopReason::FailureBudgetExhausted),
            );
        }

        self.pacer.pause(self.policy.pacing);
        (SessionState::AwaitingEvent, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::FilenamePattern;
    use crate::core::numbering::DirectoryScanNumberAllocator;
    use crate::core::persist::EventPersister;
    use crate::core::settings::ScanConfig;
    use crate::device::adapters::{ClientProbe, PushEventSource};
    use crate::device::traits::{DeviceCapabilities, ScanEvent, ScannerClient};
    use crate::testdb::{EventStep, MockScanner, RecordingPacer};
    use std::sync::Mutex;

    /// Records everything the session reports
    #[derive(Default)]
    struct Recorder {
        transitions: Mutex<Vec<(SessionState, SessionState)>>,
        numbers: Mutex<Vec<u64>>,
        failures: Mutex<Vec<(FailureKind, u32)>>,
    }

    impl Recorder {
        fn numbers(&self) -> Vec<u64> {
            self.numbers.lock().unwrap().clone()
        }

        fn failures(&self) -> Vec<(FailureKind, u32)> {
            self.failures.lock().unwrap().clone()
        }

        fn transitions(&self) -> Vec<(SessionState, SessionState)> {
            self.transitions.lock().unwrap().clone()
        }
    }

    impl SessionObserver for Recorder {
        fn on_transition(&self, from: SessionState, to: SessionState, _ctx: &SessionContext) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn on_scan_saved(&self, scan: &SavedScan, _ctx: &SessionContext) {
            self.numbers.lock().unwrap().push(scan.number);
        }

        fn on_failure(&self, kind: FailureKind, _error: &ScanError, ctx: &SessionContext) {
            self.failures.lock().unwrap().push((kind, ctx.failures));
        }
    }

    struct Harness {
        scanner: Arc<MockScanner>,
        pacer: Arc<RecordingPacer>,
        recorder: Arc<Recorder>,
        _dir: tempfile::TempDir,
        directories: DirectoryConfig,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let directories = DirectoryConfig {
                output: dir.path().join("out"),
                temp: dir.path().join("tmp"),
                pattern: FilenamePattern::new("scan{no}").unwrap(),
            };
            std::fs::create_dir_all(&directories.output).unwrap();
            std::fs::create_dir_all(&directories.temp).unwrap();

            Self {
                scanner: Arc::new(MockScanner::new()),
                pacer: Arc::new(RecordingPacer::new()),
                recorder: Arc::new(Recorder::default()),
                _dir: dir,
                directories,
            }
        }

        fn run(&self, scan_limit: Option<u64>) -> SessionSummary {
            let caps = self.scanner.capabilities().unwrap();
            let source = PushEventSource::register(self.scanner.clone(), caps.clone(), "test")
                .unwrap();
            let persister = EventPersister::new(self.scanner.clone(), caps, scan_config());
            let policy = SessionPolicy::default().with_scan_limit(scan_limit);

            Session::new(
                ClientProbe::new(self.scanner.clone()),
                source,
                persister,
                DirectoryScanNumberAllocator,
                self.directories.clone(),
                policy,
            )
            .with_pacer(self.pacer.clone())
            .with_observer(self.recorder.clone())
            .run()
        }
    }

    fn scan_config() -> ScanConfig {
        ScanConfig {
            resolution: 300,
            width: 2550,
            height: 3508,
            color: Default::default(),
        }
    }

    #[test]
    fn test_healthy_device_numbers_scans() {
        let h = Harness::new();
        let summary = h.run(Some(3));

        assert_eq!(h.recorder.numbers(), vec![1, 2, 3]);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.stop, StopReason::ScanLimitReached);
        assert!(h.directories.output.join("scan3.jpg").is_file());
        // pacing after the first two scans only
        assert_eq!(h.pacer.count_of(PACING), 2);
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let h = Harness::new();
        h.scanner.script_event_failures(49, "malformed event");

        let summary = h.run(Some(1));

        assert_eq!(summary.failures, 49);
        assert_eq!(summary.stop, StopReason::ScanLimitReached);
        assert_eq!(summary.iterations, 50);
        assert_eq!(h.recorder.numbers(), vec![1]);
        assert_eq!(h.scanner.calls().wait_scan_event, 50);
        assert_eq!(h.scanner.calls().scan, 1);
    }

    #[test]
    fn test_terminates_when_failures_exhausted() {
        let h = Harness::new();
        h.scanner.script_event_failures(60, "timeout");

        let summary = h.run(None);

        assert_eq!(summary.stop, StopReason::FailureBudgetExhausted);
        assert_eq!(summary.failures, FAILURE_BUDGET);
        // no 51st wait
        assert_eq!(h.scanner.calls().wait_scan_event, 50);
        assert_eq!(h.scanner.calls().scan, 0);
        // no pacing after the terminal failure
        assert_eq!(h.pacer.count_of(PACING), 49);
        assert_eq!(
            h.recorder.transitions().last(),
            Some(&(SessionState::Backoff, SessionState::Terminated))
        );
    }

    #[test]
    fn test_device_outage_not_counted() {
        let h = Harness::new();
        // startup probe, classification probe, then two failed wait probes
        h.scanner
            .script_liveness([true, false, false, false, true])
            .script_events([EventStep::fail("connection reset")]);

        let summary = h.run(Some(1));

        assert_eq!(summary.failures, 0);
        assert_eq!(summary.stop, StopReason::ScanLimitReached);
        assert_eq!(h.recorder.numbers(), vec![1]);
        assert_eq!(h.pacer.count_of(DEVICE_POLL_INTERVAL), 2);
        assert_eq!(h.scanner.calls().is_alive, 5);
        assert_eq!(h.recorder.failures(), vec![(FailureKind::DeviceDown, 0)]);
        assert!(h
            .recorder
            .transitions()
            .contains(&(SessionState::Backoff, SessionState::AwaitingDeviceUp)));
    }

    #[test]
    fn test_failures_never_reset_by_success() {
        let h = Harness::new();
        h.scanner.script_events([
            EventStep::fail("a"),
            EventStep::Trigger(Default::default(), Default::default()),
            EventStep::fail("b"),
            EventStep::Trigger(Default::default(), Default::default()),
            EventStep::fail("c"),
        ]);

        let summary = h.run(Some(3));

        assert_eq!(summary.failures, 3);
        let counts: Vec<u32> = h.recorder.failures().iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_persist_failure_counts_like_event_failure() {
        let h = Harness::new();
        h.scanner
            .script_scans([Some("paper jam".to_string()), None]);

        let summary = h.run(Some(1));

        assert_eq!(summary.failures, 1);
        assert_eq!(h.recorder.numbers(), vec![1]);
        assert_eq!(h.scanner.calls().scan, 2);
    }

    #[test]
    fn test_numbers_continue_after_existing_files() {
        let h = Harness::new();
        std::fs::write(h.directories.output.join("scan7.jpg"), b"x").unwrap();

        h.run(Some(2));

        assert_eq!(h.recorder.numbers(), vec![8, 9]);
    }

    #[test]
    fn test_initial_wait_blocks_event_source() {
        let h = Harness::new();
        h.scanner.script_liveness([false, false, false, true]);

        h.run(Some(1));

        assert_eq!(h.pacer.count_of(DEVICE_POLL_INTERVAL), 3);
        let transitions = h.recorder.transitions();
        assert_eq!(
            transitions.first(),
            Some(&(SessionState::AwaitingDeviceUp, SessionState::AwaitingEvent))
        );
    }

    /// Source whose failures are scripted per call and which records calls
    struct ScriptedSource {
        results: Vec<bool>,
        calls: Arc<Mutex<usize>>,
    }

    impl EventSource for ScriptedSource {
        type Trigger = ScanEvent;

        fn wait(&mut self) -> Result<ScanEvent> {
            let mut calls = self.calls.lock().unwrap();
            let ok = self.results.get(*calls).copied().unwrap_or(true);
            *calls += 1;
            if ok {
                Ok(ScanEvent::new(Default::default(), Default::default()))
            } else {
                Err(ScanError::Protocol("bad".to_string()))
            }
        }
    }

    #[test]
    fn test_fewer_than_budget_failures_never_terminate() {
        for n in [1usize, 10, 49] {
            let h = Harness::new();
            let calls = Arc::new(Mutex::new(0));
            let source = ScriptedSource {
                results: vec![false; n],
                calls: calls.clone(),
            };
            let persister = EventPersister::new(
                h.scanner.clone(),
                DeviceCapabilities::default(),
                scan_config(),
            );

            let summary = Session::new(
                ClientProbe::new(h.scanner.clone()),
                source,
                persister,
                DirectoryScanNumberAllocator,
                h.directories.clone(),
                SessionPolicy::default().with_scan_limit(Some(1)),
            )
            .with_pacer(h.pacer.clone())
            .run();

            assert_eq!(summary.stop, StopReason::ScanLimitReached, "n = {}", n);
            assert_eq!(summary.failures as usize, n);
            assert_eq!(*calls.lock().unwrap(), n + 1);
        }
    }

    #[test]
    fn test_custom_budget() {
        let h = Harness::new();
        h.scanner.script_event_failures(5, "x");
        let caps = h.scanner.capabilities().unwrap();

        let summary = Session::new(
            ClientProbe::new(h.scanner.clone()),
            PushEventSource::register(h.scanner.clone(), caps.clone(), "t").unwrap(),
            EventPersister::new(h.scanner.clone(), caps, scan_config()),
            DirectoryScanNumberAllocator,
            h.directories.clone(),
            SessionPolicy {
                failure_budget: 3,
                ..Default::default()
            },
        )
        .with_pacer(h.pacer.clone())
        .run();

        assert_eq!(summary.failures, 3);
        assert_eq!(h.scanner.calls().wait_scan_event, 3);
    }

    #[test]
    fn test_sequence_start_offsets_first_number() {
        let h = Harness::new();
        let caps = h.scanner.capabilities().unwrap();

        let summary = Session::new(
            ClientProbe::new(h.scanner.clone()),
            PushEventSource::register(h.scanner.clone(), caps.clone(), "t").unwrap(),
            EventPersister::new(h.scanner.clone(), caps, scan_config()),
            DirectoryScanNumberAllocator,
            h.directories.clone(),
            SessionPolicy::default()
                .with_scan_limit(Some(2))
                .with_sequence_start(ADF_SEQUENCE_START),
        )
        .with_pacer(h.pacer.clone())
        .with_observer(h.recorder.clone())
        .run();

        assert_eq!(h.recorder.numbers(), vec![2, 3]);
        assert_eq!(summary.last_scan_number, 3);
    }

    /// Source delivering events stamped with a fixed time
    struct FixedTimeSource {
        at: DateTime<Local>,
    }

    impl EventSource for FixedTimeSource {
        type Trigger = ScanEvent;

        fn wait(&mut self) -> Result<ScanEvent> {
            let mut event = ScanEvent::new(Default::default(), Default::default());
            event.received_at = self.at;
            Ok(event)
        }
    }

    #[test]
    fn test_file_names_use_trigger_time() {
        use chrono::TimeZone;

        let h = Harness::new();
        let mut directories = h.directories.clone();
        directories.pattern = FilenamePattern::new("scan_%Y-%m-%d_{no}").unwrap();
        let at = Local.with_ymd_and_hms(2020, 1, 2, 23, 59, 0).unwrap();

        Session::new(
            ClientProbe::new(h.scanner.clone()),
            FixedTimeSource { at },
            EventPersister::new(h.scanner.clone(), DeviceCapabilities::default(), scan_config()),
            DirectoryScanNumberAllocator,
            directories.clone(),
            SessionPolicy::default().with_scan_limit(Some(1)),
        )
        .with_pacer(h.pacer.clone())
        .run();

        assert!(directories.output.join("scan_2020-01-02_1.jpg").is_file());
    }

    #[test]
    fn test_wait_until_up_returns_immediately_when_alive() {
        let scanner = Arc::new(MockScanner::new());
        let pacer = RecordingPacer::new();
        ClientProbe::new(scanner.clone()).wait_until_up(Duration::from_millis(250), &pacer);
        assert!(pacer.pauses().is_empty());
        assert_eq!(scanner.calls().is_alive, 1);
    }
}
