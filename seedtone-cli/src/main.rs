//! seedtone - batch generator for the lo-fi sample catalog
//!
//! # Commands
//!
//! - `seedtone generate` - Generate every catalog sample (or print manual
//!   instructions when no model is installed)
//! - `seedtone instructions` - Print manual generation instructions only
//! - `seedtone models` - List installed models and the one that would be used
//! - `seedtone catalog` - Validate and summarize a catalog
//! - `seedtone init-config` - Write the effective configuration to disk
//!
//! Settings come from `<config dir>/seedtone/config.json`, overridden by
//! command line flags. `RUST_LOG` controls log verbosity.

mod catalog;
mod generate;
mod instructions;
mod models;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use seedtone_core::config::{self, SeedtoneConfig};

/// seedtone - batch generator for the lo-fi sample catalog
#[derive(Parser)]
#[command(name = "seedtone")]
#[command(about = "Generate a catalog of short audio samples with a local text-to-music model")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every sample in the catalog
    Generate(generate::GenerateArgs),

    /// Print instructions for generating the catalog by hand
    Instructions(instructions::InstructionsArgs),

    /// List installed models
    Models(models::ModelsArgs),

    /// Validate and summarize a catalog
    Catalog(catalog::CatalogCmdArgs),

    /// Write the effective configuration to the config file
    InitConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<SeedtoneConfig> {
    match path {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => config::load_config().context("loading user config"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Generate(args) => generate::execute(args, cfg),
        Commands::Instructions(args) => instructions::execute(args, cfg),
        Commands::Models(args) => models::execute(args, cfg),
        Commands::Catalog(args) => catalog::execute(args, cfg),
        Commands::InitConfig => {
            let path = match &cli.config {
                Some(path) => {
                    config::save_config_to(&cfg, path)?;
                    path.clone()
                }
                None => config::save_config(&cfg)?,
            };
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_flags() {
        let cli = Cli::try_parse_from([
            "seedtone",
            "generate",
            "--category",
            "drums",
            "--category",
            "bass",
            "--seed",
            "3",
            "--device",
            "cpu",
            "--no-overwrite",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.catalog.categories.len(), 2);
        assert_eq!(args.seed, Some(3));
        assert!(args.no_overwrite);
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!(Cli::try_parse_from(["seedtone", "instructions", "--category", "vocals"]).is_err());
    }
}
