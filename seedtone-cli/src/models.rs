//! Models command - show which models are installed and which one a run
//! would pick

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use seedtone_core::config::{available_models, SeedtoneConfig};
use seedtone_core::probe::select_model;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    /// Directory holding one subdirectory per installed model
    #[arg(long)]
    pub checkpoints: Option<PathBuf>,

    /// Model to prefer when several are installed
    #[arg(long)]
    pub model: Option<String>,
}

/// Execute the models command
pub fn execute(args: ModelsArgs, config: SeedtoneConfig) -> Result<()> {
    let checkpoints = args.checkpoints.unwrap_or(config.checkpoint_dir);
    let preferred = args.model.unwrap_or(config.preferred_model);

    println!("Checkpoint directory: {}", checkpoints.display());
    if !checkpoints.is_dir() {
        println!("  (missing: `seedtone generate` will print manual instructions)");
        return Ok(());
    }

    let models = available_models(&checkpoints)
        .with_context(|| format!("reading {}", checkpoints.display()))?;
    if models.is_empty() {
        println!("  No complete models found.");
        println!("  Each model needs text_encoder.onnx, decoder_model_merged.onnx,");
        println!("  encodec_decode.onnx and tokenizer.json in its own subdirectory.");
        return Ok(());
    }

    let selected = select_model(&models, &preferred);
    for model in &models {
        let marker = if Some(model) == selected.as_ref() { "*" } else { " " };
        println!("  {} {}", marker, model);
    }
    Ok(())
}
