//! Instructions command - print the catalog for generating samples by hand

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use seedtone_core::config::SeedtoneConfig;
use seedtone_core::instructions::render_manual;

use crate::catalog::CatalogArgs;

/// Arguments for the instructions command
#[derive(Args)]
pub struct InstructionsArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Output root the samples should be saved under
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the instructions command
pub fn execute(args: InstructionsArgs, config: SeedtoneConfig) -> Result<()> {
    let catalog = args.catalog.load(&config)?;
    let output = args.output.unwrap_or(config.output_dir);

    let stdout = std::io::stdout();
    render_manual(&catalog, &output, None, &mut stdout.lock())?;
    Ok(())
}
