//! `treesim compare` scores every pair of Markdown files.
//!
//! Files are validated and canonicalized, parsed in parallel into normalized
//! trees, compared on the batch worker pool, and rendered as a report on
//! stdout. Progress and logs go to stderr.

use crate::progress::StderrProgress;
use crate::report::{self, DEFAULT_TOP, ReportFormat};
use anyhow::{Context, Result};
use clap::Args;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use treesim_core::batch::{BatchComparator, TreeSet, all_pairs};
use treesim_core::config::{Config, MaxWorkers, resolve_config};
use treesim_core::error::ErrorCode;
use treesim_core::timing::Timings;
use treesim_core::tree::Node;
use treesim_markdown::{MarkdownNormalizer, ParseError};

#[derive(Args, Debug)]
#[command(
    about = "Compare Markdown files by document structure",
    long_about = "Compare every pair of Markdown files by their normalized syntax trees.\n\n\
                  Each pair scores in [0, 1]: text similarity of matching nodes weighted\n\
                  against how well their child sequences align. Code blocks, HTML blocks,\n\
                  links and images count structurally but their content is ignored.",
    after_help = "EXAMPLES:\n    # Similarity matrix of all notes\n    treesim compare notes/*.md\n\n\
                  # Five most similar pairs\n    treesim compare docs/*.md --format topn\n\n\
                  # Machine-readable output on 4 workers\n    treesim compare a.md b.md c.md --format json --workers 4"
)]
pub struct CompareArgs {
    /// Markdown files to compare. Non-.md files are skipped.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Matrix)]
    pub format: ReportFormat,

    /// Number of pairs listed by the topn report.
    #[arg(long, default_value_t = DEFAULT_TOP)]
    pub top: usize,

    /// Worker threads: a positive number or "auto".
    #[arg(long)]
    pub workers: Option<MaxWorkers>,

    /// Weight of text similarity in each node score.
    #[arg(long)]
    pub text_weight: Option<f64>,

    /// Weight of child alignment in each node score.
    #[arg(long)]
    pub structure_weight: Option<f64>,

    /// Cache repeated subtree comparisons within each worker.
    #[arg(long)]
    pub memoize: bool,

    /// Config file (defaults to ./treesim.toml, then the user config).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Input problems detected before any comparison runs.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a Markdown file: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("need at least two Markdown files to compare, got {0}")]
    TooFew(usize),
}

impl InputError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::DocumentNotFound,
            Self::Unsupported(_) => ErrorCode::UnsupportedDocument,
            Self::TooFew(_) => ErrorCode::InsufficientInput,
        }
    }
}

/// Run `treesim compare`, writing the report to `out`.
///
/// # Errors
///
/// Returns an error for invalid configuration, missing or unreadable files,
/// fewer than two Markdown inputs, or a worker pool that cannot start.
/// Individual pair failures are reported, not returned.
pub fn run_compare(
    args: &CompareArgs,
    project_root: &Path,
    timings: &mut Timings,
    out: &mut dyn Write,
) -> Result<()> {
    let config = effective_config(args, project_root)?;
    let files = timings.timed("compare.collect", || collect_markdown_files(&args.files))?;

    let normalizer = MarkdownNormalizer::from_config(&config.engine);
    let trees = timings.timed("compare.parse", || parse_all(&normalizer, &files))?;

    let comparator = BatchComparator::from_config(&config);
    let pairs = all_pairs(&files);
    let progress = StderrProgress::new();
    let run = timings.timed("compare.batch", || comparator.compare(&trees, &pairs, &progress))?;

    for (first, second, reason) in run.scores.failures() {
        warn!(
            first,
            second,
            reason,
            code = %ErrorCode::ComparisonFailed,
            "pair could not be compared"
        );
    }
    info!(
        files = files.len(),
        pairs = run.summary.total,
        failed = run.summary.failed,
        workers = run.summary.workers,
        elapsed_ms = run.summary.elapsed.as_millis(),
        "comparison complete"
    );

    timings.timed("compare.render", || {
        report::render(args.format, &run.scores, &files, args.top, out)
    })
}

/// Config file and environment, then command-line flags on top.
fn effective_config(args: &CompareArgs, project_root: &Path) -> Result<Config> {
    let mut config = resolve_config(project_root, args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.batch.max_workers = workers;
    }
    if let Some(weight) = args.text_weight {
        config.engine.text_weight = weight;
    }
    if let Some(weight) = args.structure_weight {
        config.engine.structure_weight = weight;
    }
    if args.memoize {
        config.batch.memoize = true;
    }
    config.validate()?;
    Ok(config)
}

/// Validate inputs: every path must exist, only `.md` files are kept (others
/// are logged as unsupported and skipped), identifiers are canonical paths
/// without duplicates, input order preserved.
fn collect_markdown_files(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut files: Vec<String> = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            return Err(InputError::NotFound(path.clone()).into());
        }
        if let Err(err) = check_markdown(path) {
            warn!(code = %err.code(), "skipping input: {err}");
            continue;
        }
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let id = canonical.to_string_lossy().into_owned();
        if !files.contains(&id) {
            files.push(id);
        }
    }

    if files.len() < 2 {
        return Err(InputError::TooFew(files.len()).into());
    }
    Ok(files)
}

fn check_markdown(path: &Path) -> Result<(), InputError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
    {
        Ok(())
    } else {
        Err(InputError::Unsupported(path.to_path_buf()))
    }
}

fn parse_all(normalizer: &MarkdownNormalizer, files: &[String]) -> Result<TreeSet, ParseError> {
    let parsed: Vec<(String, Node)> = files
        .par_iter()
        .map(|file| {
            normalizer
                .parse_file(Path::new(file))
                .map(|tree| (file.clone(), tree))
        })
        .collect::<Result<_, _>>()?;
    Ok(parsed.into_iter().collect())
}
