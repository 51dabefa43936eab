//! Shell completions generation command
//!
//! Usage: `drsync completions bash > ~/.local/share/bash-completion/completions/drsync`

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use super::GlobalOptions;

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub async fn execute(&self, _options: &GlobalOptions) -> Result<()> {
        let mut cmd = crate::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "drsync", &mut io::stdout());
        Ok(())
    }
}
