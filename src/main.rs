//! CDSS CLI - clinical decision-support rule engine
//!
//! Usage: cdss <COMMAND>
//!
//! Commands:
//!   execute   Run protocols and rules against a subject
//!   analyze   Run rules and write back analysis fields
//!   validate  Compile and check a library directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cdss::application::DecisionEngine;
use cdss::config::EngineConfig;
use cdss::domain::entities::EngineOutput;
use cdss::domain::services::Severity;
use cdss::domain::value_objects::ExecutionParameters;
use cdss::infrastructure::{FileLibraryRepository, JsonPathAccessor, JsonTraceSink, LogObserver};

/// CDSS - clinical decision-support rule engine
#[derive(Parser, Debug)]
#[command(name = "cdss")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit newline-delimited JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to .cdss/config.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory of library documents
    #[arg(short, long, default_value = "libraries")]
    libraries: PathBuf,

    /// Root library ids; every loaded library is a root when omitted
    #[arg(short, long = "root")]
    roots: Vec<String>,

    /// Subject document (JSON)
    subject: PathBuf,

    /// Execution parameter (key=value, value parsed as JSON when possible)
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,

    /// Stream execution events to stderr as NDJSON
    #[arg(long)]
    trace: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run protocols and rules, print proposals and issues
    Execute(RunArgs),

    /// Run rules, print issues and the updated subject
    Analyze(RunArgs),

    /// Compile and check every library without evaluating it
    Validate {
        /// Directory of library documents
        #[arg(short, long, default_value = "libraries")]
        libraries: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Execute(args) => cmd_execute(&args, config, cli.json),
        Commands::Analyze(args) => cmd_analyze(&args, config, cli.json),
        Commands::Validate { libraries } => cmd_validate(&libraries, config, cli.json),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("CDSS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = explicit else {
        let cwd = std::env::current_dir().ok();
        return Ok(EngineConfig::load_or_default(cwd.as_deref()));
    };
    let (config, warnings) = EngineConfig::load_with_warnings(path)?;
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(config.with_env_overrides())
}

fn build_engine(
    libraries: &Path,
    roots: &[String],
    config: EngineConfig,
    trace: bool,
) -> Result<DecisionEngine> {
    let repository = FileLibraryRepository::load_dir(libraries)?;
    let root_libraries: Vec<_> = if roots.is_empty() {
        repository.libraries().cloned().collect()
    } else {
        let mut selected = Vec::new();
        for id in roots {
            let Some(library) = repository.libraries().find(|l| l.id() == id) else {
                bail!("no library '{}' in {}", id, libraries.display());
            };
            selected.push(library.clone());
        }
        selected
    };

    let accessor = Arc::new(JsonPathAccessor::from_config(&config));
    let mut engine = DecisionEngine::new(root_libraries, accessor)
        .with_config(config)
        .with_resolver(repository)
        .with_observer(Arc::new(LogObserver::new()));
    if trace {
        engine = engine.with_observer(Arc::new(JsonTraceSink::stderr()));
    }
    Ok(engine)
}

fn read_subject(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read subject {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn parse_params(raw: &[String]) -> Result<ExecutionParameters> {
    let mut params = ExecutionParameters::new();
    for text in raw {
        let (key, value) = ExecutionParameters::parse_assignment(text).map_err(anyhow::Error::msg)?;
        params.set(key, value);
    }
    Ok(params)
}

fn cmd_execute(args: &RunArgs, config: EngineConfig, json: bool) -> Result<()> {
    let engine = build_engine(&args.libraries, &args.roots, config, args.trace)?;
    let subject = read_subject(&args.subject)?;
    let params = parse_params(&args.params)?;

    let outputs = engine.execute(&subject, &params)?;

    if json {
        for output in &outputs {
            println!("{}", serde_json::to_string(output)?);
        }
        return Ok(());
    }

    println!("{} output(s)", outputs.len());
    for output in &outputs {
        match output {
            EngineOutput::Proposal(proposal) => {
                let protocol = proposal.attribution.protocol.as_deref().unwrap_or("-");
                println!("proposal {} (protocol {})", proposal.id, protocol);
                println!("{}", serde_json::to_string_pretty(&proposal.model)?);
            }
            EngineOutput::Issue(issue) => {
                println!("[{}] {}: {}", issue.priority, issue.issue_type, issue.text);
            }
            EngineOutput::Debug(session) => {
                println!("debug session: {} frame(s)", session.frame_count());
            }
        }
    }
    Ok(())
}

fn cmd_analyze(args: &RunArgs, config: EngineConfig, json: bool) -> Result<()> {
    let engine = build_engine(&args.libraries, &args.roots, config, args.trace)?;
    let mut subject = read_subject(&args.subject)?;
    let params = parse_params(&args.params)?;

    let issues = engine.analyze(&mut subject, &params)?;

    if json {
        for issue in &issues {
            println!("{}", serde_json::to_string(&serde_json::json!({ "event": "issue", "issue": issue }))?);
        }
        println!("{}", serde_json::to_string(&serde_json::json!({ "event": "subject", "subject": subject }))?);
        return Ok(());
    }

    for issue in &issues {
        println!("[{}] {}: {}", issue.priority, issue.issue_type, issue.text);
    }
    println!("{}", serde_json::to_string_pretty(&subject)?);
    Ok(())
}

fn cmd_validate(libraries: &Path, config: EngineConfig, json: bool) -> Result<()> {
    let repository = FileLibraryRepository::load_dir(libraries)?;
    let roots: Vec<_> = repository.libraries().cloned().collect();
    let count = roots.len();
    let engine = DecisionEngine::new(roots, Arc::new(JsonPathAccessor::from_config(&config)))
        .with_config(config)
        .with_resolver(repository);

    let issues = engine.validate();
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();

    if json {
        for issue in &issues {
            println!("{}", serde_json::to_string(issue)?);
        }
    } else {
        for issue in &issues {
            println!("{}", issue);
        }
        println!(
            "{} librar{} checked, {} error(s), {} other issue(s)",
            count,
            if count == 1 { "y" } else { "ies" },
            errors,
            issues.len() - errors
        );
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_execute() {
        let cli = Cli::parse_from([
            "cdss", "execute", "-l", "libs", "patient.json", "-p", "_debug=true", "-p", "limit=3",
        ]);
        let Commands::Execute(args) = cli.command else {
            panic!("expected execute");
        };
        assert_eq!(args.libraries, PathBuf::from("libs"));
        assert_eq!(args.subject, PathBuf::from("patient.json"));
        let params = parse_params(&args.params).unwrap();
        assert!(params.is_debug());
        assert_eq!(params.get("limit"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_bad_param_is_rejected() {
        assert!(parse_params(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cdss", "validate", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
