//! Scenario runner
//!
//! Runs [`TestScenario`]s as real sessions against their scripted scanner,
//! writing into a fresh folder per scenario, and compares the outcome with
//! the scenario's expectations.

use super::mock_scanner::RecordingPacer;
use super::scenarios::{ScenarioLibrary, TestScenario};
use crate::core::config::ConfigError;
use crate::core::folders::{FsFolderResolver, OutputFolderResolver};
use crate::core::launch::{run_session, SessionHooks};
use crate::core::naming::FilenamePattern;
use crate::core::session::{
    NoopObserver, Pacer, SessionObserver, SessionPolicy, SessionSummary, ThreadPacer,
};
use crate::core::settings::{
    AdfAutoScanConfig, DirectoryConfig, ModeConfig, RegistrationConfig, RunConfiguration,
    ScanConfig, SessionMode,
};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of running a single scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Whether the outcome matched the expectations
    pub passed: bool,
    /// Execution time
    pub duration: Duration,
    /// Session counters, when the session started at all
    pub summary: Option<SessionSummary>,
    /// Files found in the output folder afterwards
    pub files: usize,
    /// Where the scenario wrote its scans
    pub output: PathBuf,
    /// Every difference from the expected outcome
    pub mismatches: Vec<String>,
}

/// Summary of a scenario run
#[derive(Debug, Clone, Default)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_duration: Duration,
    pub results: Vec<ScenarioResult>,
}

impl TestSummary {
    /// Calculate pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct TestRunnerConfig {
    /// Folder under which each scenario gets its own directory
    pub output_root: PathBuf,
    /// Sleep for real instead of recording pauses
    pub real_time: bool,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        Self {
            output_root: std::env::temp_dir(),
            real_time: false,
        }
    }
}

/// Runs scenarios and collects their results
pub struct TestRunner {
    config: TestRunnerConfig,
    observer: Arc<dyn SessionObserver>,
}

impl TestRunner {
    pub fn with_config(config: TestRunnerConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Watch every scenario session with `observer`
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn prepare_directories(&self, scenario: &TestScenario) -> Result<DirectoryConfig, ConfigError> {
        let root = FsFolderResolver::new(&scenario.name)
            .with_temp_root(&self.config.output_root)
            .resolve_folder(None)?;
        let resolver = FsFolderResolver::new(&scenario.name);

        let pattern = FilenamePattern::new("scan{no}").map_err(|reason| ConfigError::Invalid {
            setting: "filename_pattern",
            reason,
        })?;

        Ok(DirectoryConfig {
            output: resolver.resolve_folder(Some(&root.join("out")))?,
            temp: resolver.resolve_folder(Some(&root.join("tmp")))?,
            pattern,
        })
    }

    fn run_configuration(scenario: &TestScenario, directories: DirectoryConfig) -> RunConfiguration {
        let mode = match scenario.mode {
            SessionMode::Listen => ModeConfig::Listen(RegistrationConfig {
                label: "scanwatch-sim".to_string(),
            }),
            SessionMode::AdfAutoscan => ModeConfig::AdfAutoscan(AdfAutoScanConfig {
                duplex: scenario.duplex,
                pdf: scenario.pdf,
                poll_interval: Duration::from_millis(200),
                start_delay: Duration::from_millis(500),
            }),
        };

        RunConfiguration {
            device_address: "simulated".to_string(),
            request_timeout: Duration::from_secs(5),
            reachability_poll: Duration::from_millis(200),
            directories,
            scan: ScanConfig {
                resolution: 200,
                width: 2550,
                height: 3508,
                color: Default::default(),
            },
            mode,
        }
    }

    /// Run one scenario
    pub fn run_scenario(&self, scenario: &TestScenario) -> ScenarioResult {
        let start = Instant::now();
        let mut mismatches = Vec::new();

        let directories = match self.prepare_directories(scenario) {
            Ok(dirs) => dirs,
            Err(e) => {
                return ScenarioResult {
                    name: scenario.name.clone(),
                    passed: false,
                    duration: start.elapsed(),
                    summary: None,
                    files: 0,
                    output: self.config.output_root.clone(),
                    mismatches: vec![format!("could not prepare folders: {}", e)],
                }
            }
        };
        let output = directories.output.clone();
        let run = Self::run_configuration(scenario, directories);

        let pacer: Arc<dyn Pacer> = if self.config.real_time {
            Arc::new(ThreadPacer)
        } else {
            Arc::new(RecordingPacer::new())
        };
        let hooks = SessionHooks {
            pacer,
            observer: self.observer.clone(),
        };
        let policy = SessionPolicy::for_run(&run).with_scan_limit(scenario.scan_limit);

        let scanner = Arc::new(scenario.script.build());
        let summary = match run_session(scanner, &run, policy, hooks) {
            Ok(summary) => Some(summary),
            Err(e) => {
                mismatches.push(format!("session did not start: {}", e));
                None
            }
        };

        let files = count_files(&output);
        let expected = &scenario.expected;
        if let Some(summary) = &summary {
            if summary.scans_saved != expected.scans_saved {
                mismatches.push(format!(
                    "scans saved: expected {}, got {}",
                    expected.scans_saved, summary.scans_saved
                ));
            }
            if summary.failures != expected.failures {
                mismatches.push(format!(
                    "failures: expected {}, got {}",
                    expected.failures, summary.failures
                ));
            }
            if summary.stop != expected.stop {
                mismatches.push(format!(
                    "stop reason: expected {}, got {}",
                    expected.stop, summary.stop
                ));
            }
        }
        if files != expected.files {
            mismatches.push(format!("files: expected {}, got {}", expected.files, files));
        }

        ScenarioResult {
            name: scenario.name.clone(),
            passed: mismatches.is_empty(),
            duration: start.elapsed(),
            summary,
            files,
            output,
            mismatches,
        }
    }

    /// Run the given scenarios in order
    pub fn run_scenarios(&self, scenarios: &[TestScenario]) -> TestSummary {
        let start = Instant::now();
        let mut summary = TestSummary::default();

        for scenario in scenarios {
            info!("Running scenario '{}'", scenario.name);
            let result = self.run_scenario(scenario);
            summary.total += 1;
            if result.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }

        summary.total_duration = start.elapsed();
        summary
    }

    /// Run every scenario in the library
    pub fn run_all(&self) -> TestSummary {
        self.run_scenarios(&ScenarioLibrary::all_scenarios())
    }
}

fn count_files(folder: &Path) -> usize {
    fs::read_dir(folder)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}
