//! Test Database Module
//!
//! Scripted scanners and session scenarios, so every session path can be
//! exercised without a scanner on the network.
//!
//! # Features
//!
//! - **Mock Scanner**: [`MockScanner`] with scripted liveness, events, feeder
//!   polls and scan failures, plus call counters
//! - **Generated Pages**: small JPEG pages from [`synthetic_page`]
//! - **Instant Pacing**: [`RecordingPacer`] records pauses instead of sleeping
//! - **Scenarios**: named sessions with expected outcomes ([`ScenarioLibrary`])
//! - **Runner**: runs scenarios as real sessions ([`TestRunner`])
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scanwatch::testdb::{TestRunner, TestRunnerConfig};
//!
//! let runner = TestRunner::with_config(TestRunnerConfig::default());
//! let summary = runner.run_all();
//! println!("Passed: {}/{}", summary.passed, summary.total);
//! ```
//!
//! # Available Scenarios
//!
//! - `happy_path` - three scans from a healthy scanner
//! - `flaky_device` - 49 transient failures, then a scan
//! - `budget_exhausted` - the failure budget runs out
//! - `device_outage` - the device drops off and comes back
//! - `panel_formats` - source and format chosen on the panel
//! - `adf_batch` - duplex feeder batches merged into PDFs
//! - `adf_paper_jam` - one failed capture in a feeder session
//! - `adf_failing_scanner` - every capture fails until the session gives up

pub mod mock_scanner;
pub mod runner;
pub mod scenarios;

// Re-export commonly used types for convenience
pub use mock_scanner::{
    synthetic_page, CallCounts, EventStep, MockScanner, MockScannerConfig, RecordingPacer,
    StaticDiscovery,
};
pub use runner::{ScenarioResult, TestRunner, TestRunnerConfig, TestSummary};
pub use scenarios::{ExpectedResults, ScannerScript, ScenarioLibrary, TestScenario};

/// Get a list of all available scenario names
pub fn list_scenario_names() -> Vec<String> {
    ScenarioLibrary::all_scenarios()
        .into_iter()
        .map(|s| s.name)
        .collect()
}

/// Get a list of all available tags
pub fn list_tags() -> Vec<String> {
    let mut tags: Vec<String> = ScenarioLibrary::all_scenarios()
        .into_iter()
        .flat_map(|s| s.tags)
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_functions() {
        let names = list_scenario_names();
        assert!(names.contains(&"device_outage".to_string()));

        let tags = list_tags();
        assert!(tags.contains(&"adf".to_string()));
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
    }
}
