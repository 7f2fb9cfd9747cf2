//! `treesim tree` prints the normalized tree of one document.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use treesim_core::config::resolve_config;
use treesim_markdown::MarkdownNormalizer;

#[derive(Args, Debug)]
#[command(
    about = "Print the normalized tree of a Markdown file as JSON",
    after_help = "EXAMPLES:\n    # Inspect what the engine compares\n    treesim tree README.md"
)]
pub struct TreeArgs {
    /// Markdown file to normalize.
    pub file: PathBuf,

    /// Print compact JSON on one line.
    #[arg(long)]
    pub compact: bool,

    /// Config file (defaults to ./treesim.toml, then the user config).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Normalize `args.file` and write its tree as JSON to `out`.
///
/// # Errors
///
/// Returns an error if configuration or the file cannot be read.
pub fn run_tree(args: &TreeArgs, project_root: &Path, out: &mut dyn Write) -> Result<()> {
    let config = resolve_config(project_root, args.config.as_deref())?;
    let normalizer = MarkdownNormalizer::from_config(&config.engine);
    let tree = normalizer.parse_file(&args.file)?;

    if args.compact {
        serde_json::to_writer(&mut *out, &tree)
    } else {
        serde_json::to_writer_pretty(&mut *out, &tree)
    }
    .context("failed to serialize tree")?;
    writeln!(out)?;
    Ok(())
}
