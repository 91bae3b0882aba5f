use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write a completion script for `civic` to stdout.
///
/// # Errors
///
/// Infallible today; kept fallible to match other commands.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    generate(shell, command, "civic", &mut std::io::stdout());
    Ok(())
}
