//! Catalog command - validate a catalog and show what it contains
//!
//! Also home of the catalog flags shared by every command that walks one.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use seedtone_core::catalog::{Catalog, Category};
use seedtone_core::config::SeedtoneConfig;

/// Which catalog to use and which part of it
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Catalog JSON file (defaults to the configured one, then the built-in lo-fi catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Only process this category (repeatable)
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<Category>,
}

impl CatalogArgs {
    /// Load the selected catalog and apply the category filter.
    pub fn load(&self, config: &SeedtoneConfig) -> Result<Catalog> {
        let catalog = match self.catalog.as_ref().or(config.catalog_path.as_ref()) {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("loading catalog {}", path.display()))?,
            None => Catalog::builtin().context("loading built-in catalog")?,
        };
        Ok(catalog.filtered(&self.categories))
    }
}

/// Arguments for the catalog command
#[derive(Args)]
pub struct CatalogCmdArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Print the catalog as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

/// Execute the catalog command
pub fn execute(args: CatalogCmdArgs, config: SeedtoneConfig) -> Result<()> {
    let catalog = args.catalog.load(&config)?;

    if args.json {
        println!("{}", catalog.to_json().context("serializing catalog")?);
        return Ok(());
    }

    println!("Catalog '{}' is valid", catalog.name);
    for section in &catalog.sections {
        let seconds: u32 = section.samples.iter().map(|s| s.duration).sum();
        println!(
            "  {:<10} {:>3} samples  {:>4}s of audio",
            section.category.as_str(),
            section.samples.len(),
            seconds
        );
    }
    println!("  {:<10} {:>3} samples", "total", catalog.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flag_overrides_config_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        std::fs::write(
            &path,
            r#"{"name":"tiny","sections":[{"category":"bass","samples":[
                {"id":"sub-01","caption":"deep sub","duration":8,"bpm":70}]}]}"#,
        )
        .unwrap();

        let config = SeedtoneConfig {
            catalog_path: Some(dir.path().join("missing.json")),
            ..Default::default()
        };
        let args = CatalogArgs { catalog: Some(path), categories: Vec::new() };
        let catalog = args.load(&config).unwrap();
        assert_eq!(catalog.name, "tiny");
        assert_eq!(catalog.len(), 1);

        assert!(CatalogArgs::default().load(&config).is_err());
    }

    #[test]
    fn test_builtin_with_filter() {
        let args = CatalogArgs { catalog: None, categories: vec![Category::Ambient] };
        let catalog = args.load(&SeedtoneConfig::default()).unwrap();
        assert_eq!(catalog.len(), 4);
    }
}
