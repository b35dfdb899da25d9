//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::args::{Args, Commands, SessionArgs};
use crate::cli::progress::{
    print_error, print_header, print_info, print_success, print_warning, SessionStatus,
};
use crate::core::config::{init_config, Config};
use crate::core::folders::FsFolderResolver;
use crate::core::launch::{run_session, SessionHooks};
use crate::core::session::{SessionObserver, SessionPolicy, StopReason, ThreadPacer};
use crate::core::settings::{resolve, resolve_device, ConfigOverrides, SessionMode};
use crate::device::escl::EsclClient;
use crate::device::traits::ScannerClient;
use crate::testdb::{ScenarioLibrary, TestRunner, TestRunnerConfig, TestScenario};
use anyhow::{anyhow, bail, Result};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Dispatch the parsed command
pub fn run_command(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Commands::Listen { session, label } => {
            let mut overrides = session.overrides(args.address.clone());
            overrides.label = label.clone();
            run_live_session(config, SessionMode::Listen, overrides, session)
        }
        Commands::AdfAutoscan {
            session,
            duplex,
            pdf,
            poll_interval_ms,
            start_delay_ms,
        } => {
            let overrides = ConfigOverrides {
                duplex: *duplex,
                pdf: *pdf,
                poll_interval_ms: *poll_interval_ms,
                start_delay_ms: *start_delay_ms,
                ..session.overrides(args.address.clone())
            };
            run_live_session(config, SessionMode::AdfAutoscan, overrides, session)
        }
        Commands::Status => show_status(config, args.address.clone()),
        Commands::Capabilities { json } => show_capabilities(config, args.address.clone(), *json),
        Commands::Config {
            path,
            generate,
            output,
            json,
        } => handle_config_command(config, *path, *generate, output.clone(), *json),
        Commands::Simulate {
            scenarios,
            tag,
            list,
            output,
            real_time,
        } => simulate(scenarios, tag.as_deref(), *list, output.clone(), *real_time),
    }
}

/// Resolve the configuration and run a session against the configured scanner
fn run_live_session(
    config: &Config,
    mode: SessionMode,
    overrides: ConfigOverrides,
    session: &SessionArgs,
) -> Result<()> {
    let device = resolve_device(config, &overrides, None)?;
    let client = Arc::new(EsclClient::new(&device.address, device.request_timeout)?);
    if mode == SessionMode::Listen && !client.supports_push() {
        bail!(
            "{} is an eSCL scanner, which cannot push scan events; use adf-autoscan instead",
            client.base_url()
        );
    }

    let resolver = FsFolderResolver::new("scanwatch");
    let run = resolve(config, &overrides, mode, &resolver, None)?;

    info!("Scanner: {}", run.device_address);
    info!("Output folder: {}", run.directories.output.display());
    info!("Temp folder: {}", run.directories.temp.display());

    let observer: Arc<dyn SessionObserver> = if session.quiet {
        Arc::new(SessionStatus::hidden())
    } else {
        Arc::new(SessionStatus::new())
    };
    let hooks = SessionHooks {
        pacer: Arc::new(ThreadPacer),
        observer,
    };
    let policy = SessionPolicy::for_run(&run).with_scan_limit(session.max_scans);

    let summary = run_session(client, &run, policy, hooks)?;

    match summary.stop {
        StopReason::ScanLimitReached => Ok(()),
        StopReason::FailureBudgetExhausted => {
            error!("Giving up: the scanner kept failing while reachable");
            bail!(
                "session stopped after {} failures ({} scans saved)",
                summary.failures,
                summary.scans_saved
            )
        }
    }
}

fn client_for(config: &Config, address: Option<String>) -> Result<EsclClient> {
    let overrides = ConfigOverrides {
        address,
        ..Default::default()
    };
    let device = resolve_device(config, &overrides, None)?;
    Ok(EsclClient::new(&device.address, device.request_timeout)?)
}

/// Show whether the scanner answers and what state it is in
pub fn show_status(config: &Config, address: Option<String>) -> Result<()> {
    let client = client_for(config, address)?;
    print_header("SCANNER STATUS");
    print_info(&format!("Address: {}", client.base_url()));

    if !client.is_alive() {
        print_error("Scanner is not answering");
        bail!("scanner at {} is unreachable", client.base_url());
    }
    print_success("Scanner is reachable");

    let status = client.status()?;
    if let Some(state) = &status.state {
        print_info(&format!("State: {}", state));
    }
    match &status.adf_state {
        Some(adf) => print_info(&format!("Feeder: {}", adf)),
        None => print_info("Feeder: not reported"),
    }

    Ok(())
}

/// Show the scanner's capabilities
pub fn show_capabilities(config: &Config, address: Option<String>, json: bool) -> Result<()> {
    let client = client_for(config, address)?;
    let caps = client.capabilities()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&caps)?);
        return Ok(());
    }

    print_header("SCANNER CAPABILITIES");
    print_info(&format!("Model: {}", caps.make_and_model));
    if let Some(serial) = &caps.serial_number {
        print_info(&format!("Serial: {}", serial));
    }
    print_info(&format!("Flatbed: {}", if caps.has_platen { "yes" } else { "no" }));
    print_info(&format!(
        "Document feeder: {}",
        match (caps.has_adf, caps.adf_duplex) {
            (true, true) => "yes (duplex)",
            (true, false) => "yes",
            _ => "no",
        }
    ));
    let resolutions: Vec<String> = caps.resolutions.iter().map(|r| r.to_string()).collect();
    print_info(&format!("Resolutions: {} dpi", resolutions.join(", ")));
    print_info(&format!(
        "Maximum area: {} x {} (1/300 in)",
        caps.max_width, caps.max_height
    ));

    Ok(())
}

/// Show, locate or generate the configuration file
pub fn handle_config_command(
    config: &Config,
    show_path: bool,
    generate: bool,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if generate {
        let path = match output {
            Some(path) => {
                if path.exists() {
                    bail!("{} already exists, not overwriting", path.display());
                }
                std::fs::write(&path, Config::generate_default_config())?;
                path
            }
            None => init_config()?,
        };
        print_success(&format!("Configuration file: {}", path.display()));
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if !path.exists() {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    show_config(config)
}

/// Print the effective configuration as TOML
pub fn show_config(config: &Config) -> Result<()> {
    let path = Config::get_active_config_path();
    println!("# Configuration file: {}", path.display());
    if !path.exists() {
        println!("# (no config file found, showing defaults)");
    }
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn select_scenarios(names: &[String], tag: Option<&str>) -> Result<Vec<TestScenario>> {
    let mut selected = if names.is_empty() {
        ScenarioLibrary::all_scenarios()
    } else {
        names
            .iter()
            .map(|name| {
                ScenarioLibrary::by_name(name).ok_or_else(|| anyhow!("unknown scenario '{}'", name))
            })
            .collect::<Result<Vec<_>>>()?
    };

    if let Some(tag) = tag {
        selected.retain(|s| s.tags.iter().any(|t| t == tag));
    }
    Ok(selected)
}

/// List or run simulated scenarios
pub fn simulate(
    names: &[String],
    tag: Option<&str>,
    list: bool,
    output: Option<PathBuf>,
    real_time: bool,
) -> Result<()> {
    let scenarios = select_scenarios(names, tag)?;

    if list {
        print_header("SIMULATION SCENARIOS");
        for scenario in &scenarios {
            println!(
                "  {:<18} {} [{}]",
                scenario.name,
                scenario.description,
                scenario.tags.join(", ")
            );
        }
        return Ok(());
    }

    if scenarios.is_empty() {
        print_warning("No scenarios match");
        return Ok(());
    }

    let runner = TestRunner::with_config(TestRunnerConfig {
        output_root: output.unwrap_or_else(std::env::temp_dir),
        real_time,
    });

    print_header("SIMULATED SESSIONS");
    let summary = runner.run_scenarios(&scenarios);
    for result in &summary.results {
        if result.passed {
            print_success(&format!(
                "{} ({:.2}s, {} files in {})",
                result.name,
                result.duration.as_secs_f64(),
                result.files,
                result.output.display()
            ));
        } else {
            print_error(&result.name);
            for mismatch in &result.mismatches {
                println!("      {}", mismatch);
            }
        }
    }

    println!();
    println!(
        "  {}/{} passed ({:.0}%) in {:.2}s",
        summary.passed,
        summary.total,
        summary.pass_rate(),
        summary.total_duration.as_secs_f64()
    );

    if !summary.all_passed() {
        bail!("{} scenario(s) failed", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_address_precedence() {
        let mut config = Config::default();
        config.device.address = Some("from-config".to_string());

        let client = client_for(&config, Some("from-flag".to_string())).unwrap();
        assert_eq!(client.base_url(), "http://from-flag");
        let client = client_for(&config, None).unwrap();
        assert_eq!(client.base_url(), "http://from-config");
        assert!(client_for(&Config::default(), None).is_err());
    }

    #[test]
    fn test_listen_refused_before_folders_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let mut config = Config::default();
        config.device.address = Some("127.0.0.1:9".to_string());
        let session = SessionArgs {
            output: Some(output.clone()),
            temp_dir: Some(dir.path().join("tmp")),
            ..Default::default()
        };

        let result = run_live_session(
            &config,
            SessionMode::Listen,
            session.overrides(None),
            &session,
        );

        let message = result.unwrap_err().to_string();
        assert!(message.contains("adf-autoscan"), "{}", message);
        assert!(!output.exists());
    }

    #[test]
    fn test_select_scenarios() {
        let all = select_scenarios(&[], None).unwrap();
        assert_eq!(all.len(), ScenarioLibrary::all_scenarios().len());

        let named = select_scenarios(&["adf_batch".to_string()], None).unwrap();
        assert_eq!(named.len(), 1);

        let tagged = select_scenarios(&[], Some("outage")).unwrap();
        assert!(tagged.iter().all(|s| s.tags.contains(&"outage".to_string())));

        assert!(select_scenarios(&["missing".to_string()], None).is_err());
    }

    #[test]
    fn test_generate_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanwatch.toml");
        std::fs::write(&path, "keep").unwrap();

        let result =
            handle_config_command(&Config::default(), false, true, Some(path.clone()), false);

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
    }

    #[test]
    fn test_generate_writes_parsable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanwatch.toml");

        handle_config_command(&Config::default(), false, true, Some(path.clone()), false).unwrap();

        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_simulate_selected_scenario() {
        let dir = tempfile::tempdir().unwrap();
        simulate(
            &["happy_path".to_string()],
            None,
            false,
            Some(dir.path().to_path_buf()),
            false,
        )
        .unwrap();
    }
}
