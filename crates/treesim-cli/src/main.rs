#![forbid(unsafe_code)]

mod cmd;
mod progress;
mod report;

use clap::{CommandFactory, Parser, Subcommand};
use std::env;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use treesim_core::error::ErrorCode;
use treesim_core::timing::{self, Timings};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "treesim: structural similarity for Markdown documents",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare Markdown files pairwise and print a similarity report.
    Compare(cmd::compare::CompareArgs),

    /// Print the normalized tree of a Markdown file.
    Tree(cmd::tree::TreeArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    treesim completions bash > ~/.local/share/bash-completion/completions/treesim"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose || env::var("DEBUG").is_ok() {
        "treesim=debug,info"
    } else {
        "treesim=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TREESIM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let format = env::var("TREESIM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

/// Machine-readable code for the first typed error in the chain.
fn error_code(err: &anyhow::Error) -> ErrorCode {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<cmd::compare::InputError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<treesim_markdown::ParseError>() {
            return e.code();
        }
        if let Some(e) = cause.downcast_ref::<treesim_core::Error>() {
            return e.code();
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return ErrorCode::ConfigParseError;
        }
    }
    ErrorCode::InternalUnexpected
}

fn print_error(err: &anyhow::Error) {
    let code = error_code(err);
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error[{code}]: {err:#}");
    if let Some(hint) = code.hint() {
        let _ = writeln!(stderr, "  hint: {hint}");
    }
}

fn run(cli: &Cli, timings: &mut Timings) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Compare(args) => {
            cmd::compare::run_compare(args, &project_root, timings, &mut out)
        }
        Commands::Tree(args) => timings.timed("cmd.tree", || {
            cmd::tree::run_tree(args, &project_root, &mut out)
        }),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command(), &mut out)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(version = env!("CARGO_PKG_VERSION"), "treesim starting");
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let mut timings = Timings::new(cli.timing || timing::timing_enabled_from_env());
    let result = run(&cli, &mut timings);

    if timings.is_enabled() {
        let report = timings.report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            match serde_json::to_string_pretty(&report.to_json()) {
                Ok(json) => eprintln!("{json}"),
                Err(err) => eprintln!("timing report unavailable: {err}"),
            }
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}
