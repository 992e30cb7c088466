//! venv-bootstrap - Create (if missing) and activate a Python virtual environment

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::{Command, ExitCode};
use venv_bootstrap::packages::PROXY_ENV_VAR;
use venv_bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapReport, Bootstrapper, Handoff, InterpreterVersion,
    Os, Overrides, SystemRunner,
};

#[derive(Parser, Debug)]
#[command(name = "venv-bootstrap")]
#[command(about = "Create (if missing) and activate a Python virtual environment", long_about = None)]
#[command(version)]
struct Args {
    /// Python major version to bind the environment to (2 or 3, default 3)
    #[arg(short, long)]
    python: Option<InterpreterVersion>,

    /// Environment directory (default: py2 or py3)
    #[arg(long)]
    env_dir: Option<PathBuf>,

    /// Directory for the tool log (default: logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Tool log file name inside the log directory (default: bootstrap.log)
    #[arg(long)]
    log_file: Option<String>,

    /// Environment creation tool (default: virtualenv)
    #[arg(long)]
    creator: Option<String>,

    /// Requirement to pip install after activation (repeatable)
    #[arg(long = "install", value_name = "PKG")]
    install: Vec<String>,

    /// Config file (default: ./venv-bootstrap.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show what would be done without doing it
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// More diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bootstrap, then print shell statements that activate the environment
    Env,
    /// Bootstrap, then start an interactive shell inside the environment
    Shell,
    /// Show platform, configuration and environment state
    Info,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<BootstrapError>() {
                Some(err) => {
                    if let Some(status) = err.tool_status() {
                        log::debug!("Tool exited with status {}", status);
                    }
                    eprintln!("{err}");
                }
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let overrides = Overrides {
        python: args.python,
        env_dir: args.env_dir,
        log_dir: args.log_dir,
        log_file: args.log_file,
        creator: args.creator,
        requirements: args.install,
    };
    let config = BootstrapConfig::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;
    let os = Os::detect()?;

    if let Some(Commands::Info) = args.command {
        print_info(&config, os)?;
        return Ok(ExitCode::SUCCESS);
    }

    let runner = SystemRunner;
    let bootstrapper = Bootstrapper::new(&config, os, &runner)
        .with_proxy(std::env::var(PROXY_ENV_VAR).ok());

    if args.dry_run {
        println!("Would:");
        for step in bootstrapper.plan() {
            println!("  - {}", step);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = bootstrapper.run()?;
    log_report(&report);

    match args.command {
        Some(Commands::Env) => {
            print!("{}", report.environment.render());
            eprintln!("{}", Handoff::Eval.success_message());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Shell) => {
            println!("{}", Handoff::Shell.success_message());
            spawn_shell(&report, os)
        }
        _ => {
            println!("{}", Handoff::Report.success_message());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn log_report(report: &BootstrapReport) {
    if report.created {
        log::info!("Environment created");
    }
    if report.installed > 0 {
        log::info!("Installed {} requirement(s)", report.installed);
    }
    log::info!("Tool output logged to {}", report.log_file.display());
}

/// Run the user's shell with the activated environment applied.
fn spawn_shell(report: &BootstrapReport, os: Os) -> Result<ExitCode> {
    let shell = os.user_shell();
    log::info!("Starting {}", shell.to_string_lossy());

    let mut command = Command::new(&shell);
    report.environment.apply(&mut command);

    let status = command
        .status()
        .with_context(|| format!("Failed to start {}", shell.to_string_lossy()))?;

    if status.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(failure_exit_code(status.code())))
    }
}

/// Exit code for a failed child; never 0, even when the code does not fit a byte.
fn failure_exit_code(code: Option<i32>) -> u8 {
    match code.map(u8::try_from) {
        Some(Ok(code)) if code != 0 => code,
        _ => 1,
    }
}

fn print_info(config: &BootstrapConfig, os: Os) -> Result<()> {
    let bootstrapper = Bootstrapper::new(config, os, &SystemRunner);
    let layout = bootstrapper.layout();

    println!("Platform: {}", os);
    println!("Interpreter: {}", config.python);
    println!();
    println!("Environment dir: {}", layout.root().display());
    println!("Environment exists: {}", layout.exists());
    println!("Activation script: {}", layout.activate_script().display());
    println!("Activation script exists: {}", layout.activate_script().exists());
    println!("Log file: {}", config.log_path().display());
    println!();
    println!("Resolved configuration:");
    print!("{}", config.to_toml()?);

    Ok(())
}
