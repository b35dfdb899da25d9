//! Device interaction module
//!
//! Everything that talks to a scanner lives here.
//!
//! # Submodules
//!
//! - `traits` - The [`ScannerClient`] boundary and the types crossing it
//! - `escl` - Blocking HTTP client for eSCL (AirScan) scanners
//! - `adapters` - Session collaborators built on any `ScannerClient`
//! - `discovery` - One-shot scanner discovery with a timeout
//!
//! Both the HTTP client and the mock scanner in `testdb` implement
//! `ScannerClient`, so the session runs the same way against either.

pub mod adapters;
pub mod discovery;
pub mod escl;
pub mod traits;

// Re-export commonly used types for convenience
pub use adapters::{AdfEventSource, AdfTrigger, ClientProbe, PushEventSource};
pub use discovery::{discover_with_timeout, DeviceDiscovery, DiscoveredDevice};
pub use escl::EsclClient;
pub use traits::{
    ColorMode, DeviceCapabilities, OutputFormat, Registration, ScanEvent, ScanJob, ScanSource,
    ScannedPage, ScannerClient,
};
