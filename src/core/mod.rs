//! Core functionality module
//!
//! This module contains the session machinery: configuration, error types,
//! output naming and numbering, persistence and the orchestration loop.
//!
//! # Submodules
//!
//! - `config` - Configuration file loading, saving, and management
//! - `settings` - Resolution of flags and config into a `RunConfiguration`
//! - `error` - Error types and result aliases
//! - `folders` - Output and temp folder preparation
//! - `naming` - File name patterns
//! - `numbering` - Scan number allocation from existing files
//! - `pdf` - PDF assembly from JPEG pages
//! - `persist` - Writing scans to the output folder
//! - `session` - The orchestration loop and its collaborator traits
//! - `launch` - Session startup and mode wiring

pub mod config;
pub mod error;
pub mod folders;
pub mod launch;
pub mod naming;
pub mod numbering;
pub mod pdf;
pub mod persist;
pub mod session;
pub mod settings;
