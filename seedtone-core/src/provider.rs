//! The seam between the batch generator and whatever synthesizes audio.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::SampleSpec;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Text2Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    Random,
    Fixed(u64),
}

/// Run-wide knobs applied to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub inference_steps: u32,
    pub guidance_scale: f32,
    /// `None` draws a fresh seed for every sample.
    pub seed: Option<u64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            inference_steps: 8,
            guidance_scale: 3.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub caption: String,
    pub lyrics: String,
    pub instrumental: bool,
    pub duration_secs: f32,
    pub bpm: Option<u32>,
    pub keyscale: Option<String>,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub seed: Seed,
}

impl GenerationRequest {
    pub fn from_spec(spec: &SampleSpec, settings: &GenerationSettings) -> Self {
        Self {
            task: TaskKind::Text2Music,
            caption: spec.caption.clone(),
            lyrics: spec.lyrics.clone(),
            instrumental: true,
            duration_secs: spec.duration as f32,
            bpm: spec.bpm,
            keyscale: spec.keyscale.clone(),
            inference_steps: settings.inference_steps,
            guidance_scale: settings.guidance_scale,
            seed: settings.seed.map_or(Seed::Random, Seed::Fixed),
        }
    }
}

/// One audio file written by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationResult {
    pub success: bool,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub status_message: String,
}

impl GenerationResult {
    pub fn succeeded(artifacts: Vec<Artifact>, status_message: impl Into<String>) -> Self {
        Self {
            success: true,
            artifacts,
            error: None,
            status_message: status_message.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifacts: Vec::new(),
            error: Some(error.into()),
            status_message: String::new(),
        }
    }

    /// Best available explanation for an unsuccessful result.
    pub fn failure_reason(&self) -> String {
        match &self.error {
            Some(e) if !e.is_empty() => e.clone(),
            _ if !self.status_message.is_empty() => self.status_message.clone(),
            _ => "unknown error".to_string(),
        }
    }
}

/// A backend that turns a text request into audio files.
///
/// Calls are synchronous. An `Err` and an unsuccessful [`GenerationResult`]
/// are both per-sample failures as far as the batch is concerned.
pub trait SynthesisProvider {
    fn name(&self) -> &str;

    /// Generate one clip, writing any artifacts into `save_dir`.
    fn generate(&mut self, request: &GenerationRequest, save_dir: &Path)
        -> Result<GenerationResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device '{0}' (expected auto, cpu, cuda or metal)")]
pub struct ParseDeviceError(String);

impl FromStr for Device {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "metal" | "mps" => Ok(Device::Metal),
            _ => Err(ParseDeviceError(s.to_string())),
        }
    }
}

/// Options for bringing a provider up.
#[derive(Debug, Clone, PartialEq)]
pub struct InitOptions {
    pub device: Device,
    pub checkpoint_dir: PathBuf,
    pub use_flash_attention: bool,
    pub compile_model: bool,
    pub offload_to_cpu: bool,
    pub intra_threads: Option<usize>,
}
