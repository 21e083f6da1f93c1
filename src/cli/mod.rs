//! TPL-010: CLI subcommands — validate, show, fill, simulate.

use crate::audit::{eventlog, hasher};
use crate::core::{executor, parser, resolver, revert, types};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a script and report identifier problems
    Validate {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the canonical rendering and its fingerprint
    Show {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Fill holes and print what was bound
    Fill {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,

        /// Run config (YAML) with fills and policy
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hole fill, `name=value` (repeatable, overrides the config)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },

    /// Dry-run the script against a simulated provider
    Simulate {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,

        /// Run config (YAML) with fills and policy
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hole fill, `name=value` (repeatable, overrides the config)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Make the simulated provider fail on `action` or `action entity`
        #[arg(long)]
        fail_on: Vec<String>,

        /// Keep executing statements after a failure
        #[arg(long)]
        continue_on_error: bool,

        /// State directory for the event log
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Print the script that would undo the simulated changes
        #[arg(long)]
        revert: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Show { file } => cmd_show(&file),
        Commands::Fill {
            file,
            config,
            params,
        } => cmd_fill(&file, config.as_deref(), &params),
        Commands::Simulate {
            file,
            config,
            params,
            fail_on,
            continue_on_error,
            state_dir,
            revert,
        } => cmd_simulate(
            &file,
            config.as_deref(),
            &params,
            &fail_on,
            continue_on_error,
            &state_dir,
            revert,
        ),
    }
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let script = parser::parse_script_file(file)?;
    let warnings = parser::validate_script(&script);
    for w in &warnings {
        eprintln!("  WARN: {}", w);
    }

    println!(
        "OK: {} ({} statements, {} pending holes, {} pending references, {} warning(s))",
        file.display(),
        script.len(),
        resolver::pending_holes(&script).len(),
        resolver::pending_refs(&script).len(),
        warnings.len()
    );
    Ok(())
}

fn cmd_show(file: &Path) -> Result<(), String> {
    let script = parser::parse_script_file(file)?;
    println!("{}", script);
    println!();
    println!("fingerprint: {}", hasher::fingerprint(&script));
    Ok(())
}

fn cmd_fill(file: &Path, config: Option<&Path>, params: &[String]) -> Result<(), String> {
    let mut script = parser::parse_script_file(file)?;
    let (_, fills) = load_fills(config, params)?;

    for (scope, value) in resolver::fill_holes(&mut script, &fills) {
        println!("  bound {} = {}", scope, value);
    }

    let pending = resolver::pending_holes(&script);
    if !pending.is_empty() {
        println!("  needs input: {}", pending.join(", "));
    }
    println!();
    println!("{}", script);
    Ok(())
}

fn cmd_simulate(
    file: &Path,
    config: Option<&Path>,
    params: &[String],
    fail_on: &[String],
    continue_on_error: bool,
    state_dir: &Path,
    show_revert: bool,
) -> Result<(), String> {
    let script = parser::parse_script_file(file)?;
    for w in parser::validate_script(&script) {
        eprintln!("  WARN: {}", w);
    }

    let (mut run_config, fills) = load_fills(config, params)?;
    if continue_on_error {
        run_config.policy.failure = types::FailurePolicy::ContinueIndependent;
    }
    let name = script_name(file, &run_config)?;

    let mut exec = fail_on
        .iter()
        .fold(executor::SimulatedExecutor::new(), |e, p| e.failing_on(p.clone()));
    let cfg = executor::RunConfig {
        name: &name,
        policy: &run_config.policy,
        state_dir: Some(state_dir),
    };
    let (resolved, report) = executor::dry_run(&script, &fills, &mut exec, &cfg)?;

    print_report(&resolved, &report);

    if show_revert {
        println!();
        match revert::plan_revert(&report) {
            Ok(undo) if undo.is_empty() => println!("Revert: nothing to undo."),
            Ok(undo) => println!("Revert:\n{}", undo),
            Err(e) => eprintln!("  WARN: {}", e),
        }
    }

    if report.failed > 0 {
        return Err(format!("{} command(s) failed", report.failed));
    }
    Ok(())
}

/// Display a run report to stdout, one line per statement.
fn print_report(script: &crate::core::ast::Script, report: &types::RunReport) {
    println!("Simulating: {} ({})", report.run_id, report.fingerprint);
    println!();

    for (stat, outcome) in script.statements.iter().zip(&report.outcomes) {
        let detail = match outcome {
            types::StatementOutcome::Succeeded(change) => format!("  -> {}", change.result),
            types::StatementOutcome::Failed { error, .. } => format!("  ERROR: {}", error),
            types::StatementOutcome::Skipped { reason } => format!("  ({})", reason),
            types::StatementOutcome::Literal => String::new(),
        };
        println!("  {} {}{}", outcome.symbol(), stat, detail);
    }

    println!();
    println!(
        "Simulation: {} succeeded, {} failed, {} skipped ({:.3}s).",
        report.succeeded,
        report.failed,
        report.skipped,
        report.total_duration.as_secs_f64()
    );
}

/// Load the run config (if any) and layer `-p` flags over its fills.
fn load_fills(
    config: Option<&Path>,
    params: &[String],
) -> Result<(types::ScriptConfig, types::Fills), String> {
    let run_config = match config {
        Some(path) => parser::parse_config_file(path)?,
        None => types::ScriptConfig::default(),
    };
    let mut fills = run_config.fill_map();
    for flag in params {
        let (name, value) = parser::parse_fill_flag(flag)?;
        fills.insert(name, value);
    }
    Ok((run_config, fills))
}

/// Config name, else the file stem. Must be a single path component.
fn script_name(file: &Path, config: &types::ScriptConfig) -> Result<String, String> {
    let name = config
        .name
        .clone()
        .or_else(|| file.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "script".to_string());
    eventlog::check_script_name(&name)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_tpl010_validate_ok() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_script(dir.path(), "net.cs", "v = create vpc\ncreate subnet vpc=$v\n");
        assert!(cmd_validate(&file).is_ok());
    }

    #[test]
    fn test_tpl010_validate_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_script(dir.path(), "bad.cs", "create subnet cidr\n");
        let err = cmd_validate(&file).unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_tpl010_show_missing_file() {
        let err = cmd_show(Path::new("/nonexistent/x.cs")).unwrap_err();
        assert!(err.contains("failed to read"));
    }

    #[test]
    fn test_tpl010_load_fills_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_script(
            dir.path(),
            "run.yaml",
            "name: web\nfills:\n  region: us-east-1\n  count: 2\n",
        );
        let (cfg, fills) =
            load_fills(Some(&config), &["region=eu-west-1".to_string()]).unwrap();
        assert_eq!(cfg.name.as_deref(), Some("web"));
        assert_eq!(fills["region"], types::Value::from("eu-west-1"));
        assert_eq!(fills["count"], types::Value::Int(2));
    }

    #[test]
    fn test_tpl010_load_fills_bad_flag() {
        assert!(load_fills(None, &["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_tpl010_script_name() {
        let cfg = types::ScriptConfig::default();
        assert_eq!(
            script_name(Path::new("/tmp/web-stack.cs"), &cfg).unwrap(),
            "web-stack"
        );
        let named = types::ScriptConfig {
            name: Some("prod".to_string()),
            ..Default::default()
        };
        assert_eq!(
            script_name(Path::new("/tmp/web-stack.cs"), &named).unwrap(),
            "prod"
        );
    }

    #[test]
    fn test_tpl010_config_name_cannot_leave_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_script(dir.path(), "net.cs", "create vpc\n");
        let config = write_script(dir.path(), "run.yaml", "name: ../outside\n");
        let state = dir.path().join("state");
        let err = cmd_simulate(&file, Some(&config), &[], &[], false, &state, false).unwrap_err();
        assert!(err.contains("invalid script name"), "{}", err);
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn test_tpl010_simulate_writes_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_script(
            dir.path(),
            "net.cs",
            "v = create vpc cidr={cidr}\ncreate subnet vpc=$v\n",
        );
        let state = dir.path().join("state");
        cmd_simulate(
            &file,
            None,
            &["cidr=10.0.0.0/16".to_string()],
            &[],
            false,
            &state,
            true,
        )
        .unwrap();
        assert!(state.join("net/events.jsonl").exists());
        // Source file is never rewritten
        let source = std::fs::read_to_string(&file).unwrap();
        assert!(source.contains("{cidr}"));
    }

    #[test]
    fn test_tpl010_simulate_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_script(dir.path(), "net.cs", "create vpc\ncreate subnet\n");
        let state = dir.path().join("state");
        let err = cmd_simulate(
            &file,
            None,
            &[],
            &["create subnet".to_string()],
            true,
            &state,
            false,
        )
        .unwrap_err();
        assert!(err.contains("1 command(s) failed"));
    }
}
