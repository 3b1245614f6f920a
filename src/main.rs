//! tf-checkpoint CLI - command-line interface for the challenge progress checker
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates arguments into a module selection and run options
//! - Handles external concerns like locating the challenge root, exit codes and terminal output
//! - Provides clean separation between user interface and checklist logic

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tf_checkpoint::{
    locate_root, Checker, CheckerConfig, CheckerError, EvaluationOptions, OutputFormat,
    ReportFormatter, ReportOptions,
};
use tf_checkpoint::config::VALIDATION_RULE_ID;
use tracing_subscriber::EnvFilter;

/// Exit code for command-line usage errors
const USAGE_ERROR: i32 = 2;

/// tf-checkpoint - check your progress on the Terraform remote state challenge
#[derive(Parser)]
#[command(name = "tf-checkpoint")]
#[command(version)]
#[command(about = "Check your progress on the Terraform remote state challenge")]
#[command(long_about = "Validates the backend, iam and compute modules against the challenge \
checklist: required files, active resource declarations, outputs and `terraform validate`.")]
#[command(after_help = "Exit codes:
  0  every check passed
  1  at least one check failed, or the configuration could not be loaded
  2  an unknown module was named; nothing was checked")]
struct Cli {
    /// Modules to check (defaults to all: backend, iam, compute); unknown names exit with 2
    modules: Vec<String>,

    /// Challenge root directory (defaults to the current directory or its parent)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormatArg,

    /// Do not run terraform init/validate
    #[arg(long)]
    skip_validate: bool,

    /// List modules and their rules, then exit
    #[arg(long)]
    list: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Junit,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let start = cli.root.clone().unwrap_or_else(|| cwd.clone());

    let config = load_config(cli.config.as_deref(), &start)?;

    if cli.list {
        print_rules(&config);
        return Ok(0);
    }

    let root = match cli.root {
        Some(root) => root,
        None => locate_root(&cwd, &config),
    };

    run_check(config, &root, &cli.modules, cli.format, cli.skip_validate, !cli.no_color).await
}

/// Explicit `--config`, else a default config file next to the challenge, else built-ins
fn load_config(config_path: Option<&Path>, start: &Path) -> anyhow::Result<CheckerConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => CheckerConfig::find_in(start)
            .or_else(|| start.parent().and_then(CheckerConfig::find_in)),
    };

    match path {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            CheckerConfig::load_from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => Ok(CheckerConfig::default()),
    }
}

async fn run_check(
    config: CheckerConfig,
    root: &Path,
    modules: &[String],
    format: OutputFormatArg,
    skip_validate: bool,
    use_colors: bool,
) -> anyhow::Result<i32> {
    let checker = build_checker(config, use_colors)?;
    let options = EvaluationOptions { run_validator: !skip_validate };

    let report = match checker.check_root(root, modules, &options).await {
        Ok(report) => report,
        Err(CheckerError::Validation { message }) => {
            eprintln!("Error: {message}");
            return Ok(USAGE_ERROR);
        }
        Err(e) => return Err(e.into()),
    };

    let formatted = checker.format_report(&report, format.into())?;
    print!("{formatted}");

    Ok(report.exit_code())
}

/// Checker whose report header and colors follow the loaded configuration
fn build_checker(config: CheckerConfig, use_colors: bool) -> anyhow::Result<Checker> {
    let checker = Checker::new_with_config(config)?;
    let title = checker.config().title.clone();
    Ok(checker.with_report_formatter(ReportFormatter::new(ReportOptions { use_colors, title })))
}

fn print_rules(config: &CheckerConfig) {
    for module in &config.modules {
        match &module.runs_with {
            Some(parent) => println!("{} (runs with {})", module.name, parent),
            None => println!("{}", module.name),
        }
        for file in &module.required_files {
            println!("  file:{file}");
        }
        for rule in &module.rules {
            let marker = if rule.advisory { " (advisory)" } else { "" };
            println!("  {} - {}{}", rule.id, rule.description, marker);
        }
        if module.validate {
            println!("  {} - {} validate", VALIDATION_RULE_ID, config.validator.program);
        }
    }
}

fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `RUST_LOG` directives win over the level picked by `--verbose`
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if verbose { "debug" } else { "warn" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
