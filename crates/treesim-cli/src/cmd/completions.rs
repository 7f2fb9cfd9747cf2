use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `treesim completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn run_completions(
    shell: Shell,
    command: &mut clap::Command,
    out: &mut dyn std::io::Write,
) -> Result<()> {
    generate(shell, command, "treesim", out);
    out.flush()?;
    Ok(())
}
