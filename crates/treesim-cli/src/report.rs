//! Report rendering for `treesim compare`.
//!
//! Three formats share one [`PairwiseScores`] input:
//!
//! - `matrix`: tab-separated square matrix of file names, two decimals.
//! - `topn`: the best-scoring pairs as percentages.
//! - `json`: every computed pair with full paths and a 4-decimal score;
//!   failed pairs carry `"score": null`, the reason and an `E####` code.
//!
//! Renderers write to any `&mut dyn Write` so they can be tested without
//! touching stdout.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use treesim_core::error::ErrorCode;
use treesim_core::scores::{PairOutcome, PairwiseScores};

/// Default number of pairs listed by the `topn` report.
pub const DEFAULT_TOP: usize = 5;

/// Output formats supported by `treesim compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Tab-separated similarity matrix.
    #[default]
    Matrix,
    /// Highest-scoring pairs, best first.
    Topn,
    /// Machine-readable JSON.
    Json,
}

/// Render `scores` for `files` (in display order) in the requested format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn render(
    format: ReportFormat,
    scores: &PairwiseScores,
    files: &[String],
    top: usize,
    w: &mut dyn Write,
) -> anyhow::Result<()> {
    match format {
        ReportFormat::Matrix => write_matrix(scores, files, w)?,
        ReportFormat::Topn => write_topn(scores, top, w)?,
        ReportFormat::Json => write_json(scores, w)?,
    }
    Ok(())
}

/// File name component of an identifier, or the identifier itself.
fn display_name(id: &str) -> String {
    Path::new(id)
        .file_name()
        .map_or_else(|| id.to_string(), |name| name.to_string_lossy().into_owned())
}

fn matrix_cell(scores: &PairwiseScores, a: &str, b: &str) -> String {
    if a == b {
        return format!("{:.2}", 1.0);
    }
    match scores.outcome(a, b) {
        Some(PairOutcome::Score(score)) => format!("{score:.2}"),
        Some(PairOutcome::Failed(_)) => "ERR".to_string(),
        None => format!("{:.2}", 0.0),
    }
}

pub fn write_matrix(scores: &PairwiseScores, files: &[String], w: &mut dyn Write) -> io::Result<()> {
    let header: Vec<String> = files.iter().map(|f| display_name(f)).collect();
    writeln!(w, "Files\t{}", header.join("\t"))?;
    for row in files {
        let cells: Vec<String> = files.iter().map(|col| matrix_cell(scores, row, col)).collect();
        writeln!(w, "{}\t{}", display_name(row), cells.join("\t"))?;
    }
    Ok(())
}

pub fn write_topn(scores: &PairwiseScores, n: usize, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Top {n} Similar Pairs:")?;
    for pair in scores.ranked().into_iter().take(n) {
        writeln!(
            w,
            "{:.2}% | {} <-> {}",
            pair.score * 100.0,
            display_name(pair.first),
            display_name(pair.second)
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    similarity_matrix: Vec<JsonEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    file1: &'a str,
    file2: &'a str,
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

pub fn write_json(scores: &PairwiseScores, w: &mut dyn Write) -> anyhow::Result<()> {
    let similarity_matrix = scores
        .iter()
        .map(|(file1, file2, outcome)| {
            let code = outcome.code().map(ErrorCode::code);
            match outcome {
                PairOutcome::Score(score) => JsonEntry {
                    file1,
                    file2,
                    score: Some(round4(*score)),
                    error: None,
                    code,
                },
                PairOutcome::Failed(reason) => JsonEntry {
                    file1,
                    file2,
                    score: None,
                    error: Some(reason),
                    code,
                },
            }
        })
        .collect();

    serde_json::to_writer_pretty(&mut *w, &JsonReport { similarity_matrix })?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn files() -> Vec<String> {
        vec![
            "/docs/a.md".to_string(),
            "/docs/b.md".to_string(),
            "/docs/c.md".to_string(),
        ]
    }

    fn scores() -> PairwiseScores {
        let mut scores = PairwiseScores::new();
        scores.insert("/docs/a.md", "/docs/b.md", PairOutcome::Score(0.876_54));
        scores.insert("/docs/a.md", "/docs/c.md", PairOutcome::Score(0.25));
        scores.insert("/docs/b.md", "/docs/c.md", PairOutcome::Failed("comparison panicked: boom".into()));
        scores
    }

    fn rendered(format: ReportFormat, top: usize) -> String {
        let mut out = Vec::new();
        render(format, &scores(), &files(), top, &mut out).expect("render");
        String::from_utf8(out).expect("utf8")
    }

    // ── matrix ──────────────────────────────────────────────────────────────

    #[test]
    fn matrix_has_header_and_symmetric_rows() {
        let out = rendered(ReportFormat::Matrix, DEFAULT_TOP);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Files\ta.md\tb.md\tc.md");
        assert_eq!(lines[1], "a.md\t1.00\t0.88\t0.25");
        assert_eq!(lines[2], "b.md\t0.88\t1.00\tERR");
        assert_eq!(lines[3], "c.md\t0.25\tERR\t1.00");
    }

    #[test]
    fn matrix_renders_missing_pairs_as_zero() {
        let mut out = Vec::new();
        write_matrix(&PairwiseScores::new(), &files()[..2], &mut out).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("a.md\t1.00\t0.00"));
    }

    // ── topn ────────────────────────────────────────────────────────────────

    #[test]
    fn topn_lists_best_pairs_as_percentages() {
        let out = rendered(ReportFormat::Topn, DEFAULT_TOP);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Top 5 Similar Pairs:");
        assert_eq!(lines[1], "87.65% | a.md <-> b.md");
        assert_eq!(lines[2], "25.00% | a.md <-> c.md");
        assert_eq!(lines.len(), 3, "failed pairs are not ranked");
    }

    #[test]
    fn topn_truncates_to_n() {
        let out = rendered(ReportFormat::Topn, 1);
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("Top 1 Similar Pairs:"));
    }

    // ── json ────────────────────────────────────────────────────────────────

    #[test]
    fn json_rounds_scores_and_reports_failures() {
        let out = rendered(ReportFormat::Json, DEFAULT_TOP);
        let json: Value = serde_json::from_str(&out).expect("valid json");
        let entries = json["similarity_matrix"].as_array().expect("array");
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0]["file1"], "/docs/a.md");
        assert_eq!(entries[0]["file2"], "/docs/b.md");
        assert_eq!(entries[0]["score"], 0.8765);
        assert!(entries[0].get("error").is_none());
        assert!(entries[0].get("code").is_none());

        let failed = &entries[2];
        assert!(failed["score"].is_null());
        assert_eq!(failed["error"], "comparison panicked: boom");
        assert_eq!(failed["code"], "E5002");
    }

    #[test]
    fn display_name_falls_back_to_identifier() {
        assert_eq!(display_name("/x/y/z.md"), "z.md");
        assert_eq!(display_name("plain"), "plain");
    }
}
