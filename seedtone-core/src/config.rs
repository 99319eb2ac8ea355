use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::OverwritePolicy;
use crate::error::{Error, Result};
use crate::provider::{Device, GenerationSettings, InitOptions};

/// Model configuration picked when several are installed; the smallest
/// MusicGen export is the fastest.
pub const DEFAULT_MODEL: &str = "musicgen-small";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedtoneConfig {
    /// Directory holding one subdirectory per exported model.
    pub checkpoint_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Catalog to generate; the built-in lo-fi catalog when unset.
    pub catalog_path: Option<PathBuf>,
    pub preferred_model: String,
    pub device: Device,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
    pub overwrite: OverwritePolicy,
    pub compile_model: bool,
    pub offload_to_cpu: bool,
    pub use_flash_attention: bool,
    pub intra_threads: Option<usize>,
}

impl Default for SeedtoneConfig {
    fn default() -> Self {
        let settings = GenerationSettings::default();
        Self {
            checkpoint_dir: default_checkpoint_dir(),
            output_dir: PathBuf::from("public/samples/lofi"),
            catalog_path: None,
            preferred_model: DEFAULT_MODEL.to_string(),
            device: Device::Auto,
            inference_steps: settings.inference_steps,
            guidance_scale: settings.guidance_scale,
            seed: settings.seed,
            overwrite: OverwritePolicy::default(),
            compile_model: false,
            offload_to_cpu: false,
            use_flash_attention: false,
            intra_threads: None,
        }
    }
}

impl SeedtoneConfig {
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            inference_steps: self.inference_steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed,
        }
    }

    pub fn init_options(&self) -> InitOptions {
        InitOptions {
            device: self.device,
            checkpoint_dir: self.checkpoint_dir.clone(),
            use_flash_attention: self.use_flash_attention,
            compile_model: self.compile_model,
            offload_to_cpu: self.offload_to_cpu,
            intra_threads: self.intra_threads,
        }
    }
}

pub(crate) const REQUIRED_MODEL_FILES: &[&str] = &[
    "text_encoder.onnx",
    "decoder_model_merged.onnx",
    "encodec_decode.onnx",
    "tokenizer.json",
];

fn default_checkpoint_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("seedtone");
    path.push("checkpoints");
    path
}

pub fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("seedtone");
    path.push("config.json");
    path
}

/// Load the user config, falling back to defaults when none exists.
pub fn load_config() -> Result<SeedtoneConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<SeedtoneConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(SeedtoneConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn save_config(config: &SeedtoneConfig) -> Result<PathBuf> {
    let path = config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &SeedtoneConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn validate_model_dir(path: &Path) -> bool {
    REQUIRED_MODEL_FILES
        .iter()
        .all(|file| path.join(file).exists())
}

/// Names of the complete model directories under `checkpoint_dir`, sorted.
pub fn available_models(checkpoint_dir: &Path) -> Result<Vec<String>> {
    let mut models = Vec::new();
    for entry in std::fs::read_dir(checkpoint_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if validate_model_dir(&path) {
            models.push(entry.file_name().to_string_lossy().into_owned());
        } else {
            tracing::debug!("Skipping incomplete model dir {}", path.display());
        }
    }
    models.sort();
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_model;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg, SeedtoneConfig::default());
        assert_eq!(cfg.preferred_model, DEFAULT_MODEL);
        assert_eq!(cfg.overwrite, OverwritePolicy::Overwrite);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"seed": 7, "overwrite": "refuse", "device": "cpu"}"#).unwrap();
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.overwrite, OverwritePolicy::Refuse);
        assert_eq!(cfg.device, Device::Cpu);
        assert_eq!(cfg.inference_steps, 8);
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cfg = SeedtoneConfig {
            guidance_scale: 4.5,
            catalog_path: Some(PathBuf::from("my-catalog.json")),
            ..Default::default()
        };
        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn test_available_models_skips_incomplete() {
        let dir = tempdir().unwrap();
        fake_model(dir.path(), "musicgen-small");
        fake_model(dir.path(), "musicgen-medium");
        std::fs::create_dir_all(dir.path().join("half-downloaded")).unwrap();
        std::fs::write(dir.path().join("half-downloaded/tokenizer.json"), b"").unwrap();

        let models = available_models(dir.path()).unwrap();
        assert_eq!(models, vec!["musicgen-medium", "musicgen-small"]);
        assert!(validate_model_dir(&dir.path().join("musicgen-small")));
        assert!(!validate_model_dir(&dir.path().join("half-downloaded")));
    }
}
