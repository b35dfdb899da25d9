//! scanwatch Library
//!
//! Unattended scan-to-folder sessions for network scanners. A session waits
//! for the scanner, blocks until a scan is triggered (a button on the device
//! panel, or paper in the document feeder), saves the pages under a
//! numbered file name and keeps going through network hiccups and scanner
//! outages.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error handling, naming and numbering,
//!   persistence and the session loop
//! - [`device`] - The scanner client boundary, the eSCL HTTP client and the
//!   session adapters
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Mock scanner and scripted scenarios for testing
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use scanwatch::core::config::Config;
//! use scanwatch::core::folders::FsFolderResolver;
//! use scanwatch::core::launch::{run_session, SessionHooks};
//! use scanwatch::core::session::SessionPolicy;
//! use scanwatch::core::settings::{resolve, ConfigOverrides, SessionMode};
//! use scanwatch::device::EsclClient;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let overrides = ConfigOverrides {
//!         address: Some("192.168.1.40".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let run = resolve(
//!         &config,
//!         &overrides,
//!         SessionMode::AdfAutoscan,
//!         &FsFolderResolver::new("scanwatch"),
//!         None,
//!     )?;
//!
//!     let client = Arc::new(EsclClient::new(&run.device_address, run.request_timeout)?);
//!     let summary = run_session(
//!         client,
//!         &run,
//!         SessionPolicy::for_run(&run),
//!         SessionHooks::default(),
//!     )?;
//!     println!("Stopped: {}", summary.stop);
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without a Scanner
//!
//! ```rust,no_run
//! use scanwatch::testdb::{TestRunner, TestRunnerConfig};
//!
//! let summary = TestRunner::with_config(TestRunnerConfig::default()).run_all();
//! println!("Passed: {}/{}", summary.passed, summary.total);
//! ```

pub mod cli;
pub mod core;
pub mod device;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
