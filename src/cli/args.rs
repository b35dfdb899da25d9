//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use crate::core::settings::ConfigOverrides;
use crate::device::traits::ColorMode;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Unattended scan-to-folder sessions for network scanners
#[derive(Parser, Debug)]
#[command(name = "scanwatch")]
#[command(author = "Vihaan Reddy M")]
#[command(version)]
#[command(about = "Watch a network scanner and save every scan to a folder", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Scanner address: host, host:port or URL (overrides config)
    #[arg(short, long, global = true)]
    pub address: Option<String>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

/// Color mode accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorArg {
    Color,
    Grayscale,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Color => ColorMode::Color,
            ColorArg::Grayscale => ColorMode::Grayscale,
        }
    }
}

/// Options shared by both session modes
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Output directory for scans (overrides config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for pages in flight (overrides config)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// File name pattern, must contain {no}; strftime fields allowed
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Resolution in DPI
    #[arg(short, long)]
    pub resolution: Option<u32>,

    /// Scan width in 1/300 inch
    #[arg(long)]
    pub width: Option<u32>,

    /// Scan height in 1/300 inch
    #[arg(long)]
    pub height: Option<u32>,

    /// Color mode
    #[arg(long, value_enum)]
    pub color: Option<ColorArg>,

    /// Interval between probes while the scanner is unreachable (ms)
    #[arg(long)]
    pub reachability_poll_ms: Option<u64>,

    /// Stop after this many scans instead of running indefinitely
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_scans: Option<u64>,

    /// Hide the status spinner
    #[arg(short, long)]
    pub quiet: bool,
}

impl SessionArgs {
    /// Overrides shared by both modes
    pub fn overrides(&self, address: Option<String>) -> ConfigOverrides {
        ConfigOverrides {
            address,
            directory: self.output.clone(),
            temp_directory: self.temp_dir.clone(),
            filename_pattern: self.pattern.clone(),
            resolution: self.resolution,
            width: self.width,
            height: self.height,
            color: self.color.map(ColorMode::from),
            reachability_poll_ms: self.reachability_poll_ms,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wait for scans started from the scanner's panel
    ///
    /// Needs a scanner that pushes scan events. The built-in eSCL client
    /// cannot, so this refuses to start against it; use adf-autoscan.
    Listen {
        #[command(flatten)]
        session: SessionArgs,

        /// Name shown on the scanner panel (overrides config)
        #[arg(long)]
        label: Option<String>,
    },

    /// Scan automatically whenever paper is loaded in the document feeder
    AdfAutoscan {
        #[command(flatten)]
        session: SessionArgs,

        /// Scan both sides of each sheet
        #[arg(long)]
        duplex: Option<bool>,

        /// Merge the pages of each batch into one PDF
        #[arg(long)]
        pdf: Option<bool>,

        /// Interval between feeder checks (ms)
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Delay between detecting paper and starting the scan (ms)
        #[arg(long)]
        start_delay_ms: Option<u64>,
    },

    /// Check whether the scanner answers and show its feeder state
    Status,

    /// Show what the scanner supports
    Capabilities {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or create the configuration file
    ///
    /// The config file is looked up at:
    /// - ./scanwatch.toml
    /// - Linux: ~/.config/scanwatch/config.toml
    /// - Windows: %APPDATA%\scanwatch\config.toml
    Config {
        /// Show the config file path only
        #[arg(long)]
        path: bool,

        /// Write a commented default config (to the standard location, or OUTPUT)
        #[arg(long)]
        generate: bool,

        /// Where to write the generated config
        #[arg(short, long, requires = "generate")]
        output: Option<PathBuf>,

        /// Print the effective configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run simulated sessions against a scripted scanner
    ///
    /// No scanner required: each scenario scripts device behavior and
    /// states the expected outcome.
    Simulate {
        /// Scenario names (comma-separated); all scenarios when empty
        #[arg(value_delimiter = ',')]
        scenarios: Vec<String>,

        /// Only run scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// List scenarios instead of running them
        #[arg(long)]
        list: bool,

        /// Folder for scenario output (defaults to the system temp dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Really wait for pacing and poll intervals
        #[arg(long)]
        real_time: bool,
    },
}
