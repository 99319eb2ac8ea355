//! Generate command - probe for a model, then run the batch or fall back to
//! manual instructions

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use seedtone_core::batch::{BatchGenerator, OverwritePolicy};
use seedtone_core::config::SeedtoneConfig;
use seedtone_core::instructions::render_manual;
use seedtone_core::musicgen::MusicGenProvider;
use seedtone_core::probe::{probe, RunMode};
use seedtone_core::provider::Device;

use crate::catalog::CatalogArgs;

/// Arguments for the generate command
#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Output root; samples land in <OUTPUT>/<category>/<id>.wav
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory holding one subdirectory per installed model
    #[arg(long)]
    pub checkpoints: Option<PathBuf>,

    /// Model to prefer when several are installed
    #[arg(long)]
    pub model: Option<String>,

    /// Execution device (auto, cpu, cuda, metal)
    #[arg(long)]
    pub device: Option<Device>,

    /// Fixed seed for every sample (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Classifier-free guidance strength
    #[arg(long)]
    pub guidance: Option<f32>,

    /// Sampling step count passed to the provider
    #[arg(long)]
    pub steps: Option<u32>,

    /// Count existing output files as failures instead of replacing them
    #[arg(long)]
    pub no_overwrite: bool,

    /// Load the model for each sample instead of keeping it in memory
    #[arg(long)]
    pub offload: bool,

    /// Apply full graph optimization when loading the model
    #[arg(long)]
    pub compile: bool,

    /// Skip generation and print manual instructions
    #[arg(long)]
    pub manual: bool,
}

impl GenerateArgs {
    /// Flags win over the config file.
    fn apply(&self, config: &mut SeedtoneConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(checkpoints) = &self.checkpoints {
            config.checkpoint_dir = checkpoints.clone();
        }
        if let Some(model) = &self.model {
            config.preferred_model = model.clone();
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(guidance) = self.guidance {
            config.guidance_scale = guidance;
        }
        if let Some(steps) = self.steps {
            config.inference_steps = steps;
        }
        if self.no_overwrite {
            config.overwrite = OverwritePolicy::Refuse;
        }
        config.offload_to_cpu |= self.offload;
        config.compile_model |= self.compile;
    }
}

/// Execute the generate command
pub fn execute(args: GenerateArgs, mut config: SeedtoneConfig) -> Result<()> {
    args.apply(&mut config);
    let catalog = args.catalog.load(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if args.manual {
        render_manual(&catalog, &config.output_dir, None, &mut out)?;
        return Ok(());
    }

    let mode = probe(&config.checkpoint_dir, &config.preferred_model)
        .context("checking installed models")?;

    let model = match mode {
        RunMode::Manual { reason } => {
            tracing::warn!("{}; printing manual instructions", reason);
            render_manual(&catalog, &config.output_dir, Some(&reason), &mut out)?;
            return Ok(());
        }
        RunMode::Automated(model) => model,
    };

    writeln!(out, "Using model: {} ({})", model.name, model.dir.display())?;
    let (mut provider, status) = MusicGenProvider::initialize(&model, &config.init_options())
        .with_context(|| format!("initializing {}", model.name))?;
    writeln!(out, "Provider initialized: {}", status)?;

    let summary = BatchGenerator::new(&mut provider, &config.output_dir)
        .with_settings(config.generation_settings())
        .with_overwrite(config.overwrite)
        .run(&catalog, &mut out)?;

    tracing::info!("Batch finished: {}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> GenerateArgs {
        GenerateArgs {
            catalog: CatalogArgs::default(),
            output: None,
            checkpoints: None,
            model: None,
            device: None,
            seed: None,
            guidance: None,
            steps: None,
            no_overwrite: false,
            offload: false,
            compile: false,
            manual: false,
        }
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let mut config = SeedtoneConfig {
            seed: Some(5),
            guidance_scale: 4.0,
            ..Default::default()
        };
        let before = config.clone();
        bare_args().apply(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = SeedtoneConfig::default();
        let args = GenerateArgs {
            output: Some(PathBuf::from("out")),
            model: Some("musicgen-medium".into()),
            device: Some(Device::Cpu),
            seed: Some(11),
            steps: Some(20),
            no_overwrite: true,
            offload: true,
            ..bare_args()
        };
        args.apply(&mut config);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.preferred_model, "musicgen-medium");
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.inference_steps, 20);
        assert_eq!(config.overwrite, OverwritePolicy::Refuse);
        assert!(config.offload_to_cpu);
        assert!(!config.compile_model);
    }

    #[test]
    fn test_missing_checkpoints_falls_back_to_manual() {
        let dir = tempfile::tempdir().unwrap();
        let config = SeedtoneConfig {
            checkpoint_dir: dir.path().join("not-installed"),
            output_dir: dir.path().join("samples"),
            ..Default::default()
        };
        execute(bare_args(), config).unwrap();
        assert!(dir.path().join("samples/drums").is_dir());
        assert!(dir.path().join("samples/loops").is_dir());
    }

    #[test]
    fn test_empty_checkpoints_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = SeedtoneConfig {
            checkpoint_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("samples"),
            ..Default::default()
        };
        assert!(execute(bare_args(), config).is_err());
        assert!(!dir.path().join("samples").exists());
    }

    #[test]
    fn test_failed_init_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("checkpoints/musicgen-small");
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in [
            "text_encoder.onnx",
            "decoder_model_merged.onnx",
            "encodec_decode.onnx",
            "tokenizer.json",
        ] {
            std::fs::write(model_dir.join(file), b"").unwrap();
        }

        let config = SeedtoneConfig {
            checkpoint_dir: dir.path().join("checkpoints"),
            output_dir: dir.path().join("samples"),
            ..Default::default()
        };
        let args = GenerateArgs {
            device: Some(Device::Cuda),
            ..bare_args()
        };
        let err = execute(args, config).unwrap_err();
        assert!(format!("{err:#}").contains("initializing musicgen-small"));
        assert!(!dir.path().join("samples").exists());
    }
}
