//! Predefined session scenarios
//!
//! Each scenario scripts a [`MockScanner`], picks a session mode and states
//! what the session should end with. They back the `simulate` command and the
//! scenario tests.

use super::mock_scanner::{EventStep, MockScanner, MockScannerConfig};
use crate::core::session::{StopReason, FAILURE_BUDGET};
use crate::core::settings::SessionMode;
use crate::device::traits::{OutputFormat, ScanSource};

/// Script applied to a fresh mock scanner
#[derive(Debug, Clone, Default)]
pub struct ScannerScript {
    pub config: MockScannerConfig,
    pub liveness: Vec<bool>,
    pub events: Vec<EventStep>,
    pub adf_polls: Vec<bool>,
    pub scans: Vec<Option<String>>,
}

impl ScannerScript {
    /// Build a scanner that follows this script
    pub fn build(&self) -> MockScanner {
        let scanner = MockScanner::with_config(self.config.clone());
        scanner
            .script_liveness(self.liveness.iter().copied())
            .script_events(self.events.iter().cloned())
            .script_adf_polls(self.adf_polls.iter().copied())
            .script_scans(self.scans.iter().cloned());
        scanner
    }
}

/// Expected outcome of a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedResults {
    pub scans_saved: u64,
    pub failures: u32,
    pub stop: StopReason,
    /// Files expected in the output folder
    pub files: usize,
}

/// A named, scripted session
#[derive(Debug, Clone)]
pub struct TestScenario {
    /// Scenario name for identification
    pub name: String,
    /// Description of what this scenario exercises
    pub description: String,
    pub mode: SessionMode,
    pub script: ScannerScript,
    /// Stop after this many scans (`None` runs until the budget is spent)
    pub scan_limit: Option<u64>,
    /// Merge ADF pages into a PDF
    pub pdf: bool,
    pub duplex: bool,
    pub expected: ExpectedResults,
    /// Tags for filtering scenarios
    pub tags: Vec<String>,
}

impl TestScenario {
    pub fn new(
        name: &str,
        description: &str,
        mode: SessionMode,
        script: ScannerScript,
        expected: ExpectedResults,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            mode,
            script,
            scan_limit: Some(expected.scans_saved),
            pdf: false,
            duplex: false,
            expected,
            tags: Vec::new(),
        }
    }

    /// Add tags to the scenario
    pub fn with_tags(mut self, tags: Vec<&str>) -> Self {
        self.tags = tags.into_iter().map(String::from).collect();
        self
    }

    pub fn with_scan_limit(mut self, limit: Option<u64>) -> Self {
        self.scan_limit = limit;
        self
    }
}

/// Collection of all predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    /// Device answers, every event succeeds
    pub fn happy_path() -> TestScenario {
        TestScenario::new(
            "happy_path",
            "Three scans in a row from a healthy scanner",
            SessionMode::Listen,
            ScannerScript::default(),
            ExpectedResults {
                scans_saved: 3,
                failures: 0,
                stop: StopReason::ScanLimitReached,
                files: 3,
            },
        )
        .with_tags(vec!["listen", "basic"])
    }

    /// 49 transient failures, then a scan
    pub fn flaky_device() -> TestScenario {
        TestScenario::new(
            "flaky_device",
            "49 failed waits with the device answering, then one scan",
            SessionMode::Listen,
            ScannerScript {
                events: (0..FAILURE_BUDGET - 1)
                    .map(|_| EventStep::fail("unexpected response"))
                    .collect(),
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 1,
                failures: FAILURE_BUDGET - 1,
                stop: StopReason::ScanLimitReached,
                files: 1,
            },
        )
        .with_tags(vec!["listen", "failure"])
    }

    /// The failure budget runs out
    pub fn budget_exhausted() -> TestScenario {
        TestScenario::new(
            "budget_exhausted",
            "Every wait fails while the device answers; the session gives up",
            SessionMode::Listen,
            ScannerScript {
                events: (0..FAILURE_BUDGET + 10)
                    .map(|_| EventStep::fail("protocol error"))
                    .collect(),
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 0,
                failures: FAILURE_BUDGET,
                stop: StopReason::FailureBudgetExhausted,
                files: 0,
            },
        )
        .with_scan_limit(None)
        .with_tags(vec!["listen", "failure"])
    }

    /// The device drops off the network and comes back
    pub fn device_outage() -> TestScenario {
        TestScenario::new(
            "device_outage",
            "One failure while the device is down; recovery is not counted",
            SessionMode::Listen,
            ScannerScript {
                // startup, loop entry, classification, two failed probes
                liveness: vec![true, true, false, false, false, true],
                events: vec![EventStep::fail("connection reset")],
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 2,
                failures: 0,
                stop: StopReason::ScanLimitReached,
                files: 2,
            },
        )
        .with_tags(vec!["listen", "outage"])
    }

    /// Platen and feeder events with PDF output chosen on the panel
    pub fn panel_formats() -> TestScenario {
        TestScenario::new(
            "panel_formats",
            "Events pick source and format on the device panel",
            SessionMode::Listen,
            ScannerScript {
                config: MockScannerConfig {
                    pages_per_scan: 2,
                    ..Default::default()
                },
                events: vec![
                    EventStep::Trigger(ScanSource::Platen, OutputFormat::Jpeg),
                    EventStep::Trigger(ScanSource::Adf, OutputFormat::Pdf),
                ],
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 2,
                failures: 0,
                stop: StopReason::ScanLimitReached,
                // two JPEG pages, one PDF
                files: 3,
            },
        )
        .with_tags(vec!["listen", "format"])
    }

    /// Feeder batches merged into PDFs
    pub fn adf_batch() -> TestScenario {
        let mut scenario = TestScenario::new(
            "adf_batch",
            "Paper appears in the feeder three times, duplex pages merged to PDF",
            SessionMode::AdfAutoscan,
            ScannerScript {
                config: MockScannerConfig {
                    pages_per_scan: 3,
                    ..Default::default()
                },
                adf_polls: vec![false, false, true, false, true, true],
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 3,
                failures: 0,
                stop: StopReason::ScanLimitReached,
                files: 3,
            },
        )
        .with_tags(vec!["adf", "basic"]);
        scenario.pdf = true;
        scenario.duplex = true;
        scenario
    }

    /// A paper jam in the middle of a feeder session
    pub fn adf_paper_jam() -> TestScenario {
        TestScenario::new(
            "adf_paper_jam",
            "A jammed feeder fails one capture; the next batch succeeds",
            SessionMode::AdfAutoscan,
            ScannerScript {
                scans: vec![None, Some("paper jam".to_string()), None],
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 2,
                failures: 1,
                stop: StopReason::ScanLimitReached,
                files: 2,
            },
        )
        .with_tags(vec!["adf", "failure"])
    }

    /// Every feeder capture fails while the scanner keeps answering
    pub fn adf_failing_scanner() -> TestScenario {
        TestScenario::new(
            "adf_failing_scanner",
            "Paper is always loaded but every capture fails; the session gives up",
            SessionMode::AdfAutoscan,
            ScannerScript {
                config: MockScannerConfig {
                    random_failure_rate: 100,
                    ..Default::default()
                },
                ..Default::default()
            },
            ExpectedResults {
                scans_saved: 0,
                failures: FAILURE_BUDGET,
                stop: StopReason::FailureBudgetExhausted,
                files: 0,
            },
        )
        .with_scan_limit(None)
        .with_tags(vec!["adf", "failure"])
    }

    /// Get all scenarios
    pub fn all_scenarios() -> Vec<TestScenario> {
        vec![
            Self::happy_path(),
            Self::flaky_device(),
            Self::budget_exhausted(),
            Self::device_outage(),
            Self::panel_formats(),
            Self::adf_batch(),
            Self::adf_paper_jam(),
            Self::adf_failing_scanner(),
        ]
    }

    /// Get scenarios by tag
    pub fn scenarios_by_tag(tag: &str) -> Vec<TestScenario> {
        Self::all_scenarios()
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Find a scenario by name
    pub fn by_name(name: &str) -> Option<TestScenario> {
        Self::all_scenarios().into_iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_have_unique_names() {
        let scenarios = ScenarioLibrary::all_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_scenarios_by_tag() {
        let adf = ScenarioLibrary::scenarios_by_tag("adf");
        assert!(adf.iter().all(|s| s.mode == SessionMode::AdfAutoscan));
        assert_eq!(adf.len(), 3);
    }

    #[test]
    fn test_by_name() {
        assert!(ScenarioLibrary::by_name("device_outage").is_some());
        assert!(ScenarioLibrary::by_name("nope").is_none());
    }

    #[test]
    fn test_full_failure_rate_fails_every_capture() {
        use crate::device::traits::{ScanJob, ScannerClient};

        let scanner = ScenarioLibrary::adf_failing_scanner().script.build();
        let job = ScanJob {
            source: ScanSource::Adf,
            color: Default::default(),
            resolution: 200,
            width: 100,
            height: 100,
        };
        for _ in 0..20 {
            assert!(scanner.scan(&job).is_err());
        }
        assert!(scanner.adf_loaded().unwrap());
    }

    #[test]
    fn test_script_builds_scanner() {
        let scanner = ScenarioLibrary::budget_exhausted().script.build();
        use crate::device::traits::ScannerClient;
        let caps = scanner.capabilities().unwrap();
        let reg = scanner.register("x").unwrap();
        assert!(scanner.wait_scan_event(&caps, &reg).is_err());
    }
}
