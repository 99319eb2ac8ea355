//! Text-to-music provider backed by a MusicGen ONNX export.
//!
//! A model directory holds `text_encoder.onnx`, `decoder_model_merged.onnx`,
//! `encodec_decode.onnx` and `tokenizer.json`. Generation is autoregressive
//! over four EnCodec codebooks with the usual one-step delay pattern, guided
//! by classifier-free guidance against an all-zero text conditioning.
use std::collections::HashMap;
use std::path::Path;

use ndarray::{s, Array1, Array2, Array3, ArrayD, Axis, IxDyn};
use ort::session::Session;
use ort::value::Tensor;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::config::validate_model_dir;
use crate::error::{Error, Result};
use crate::model::{load_session, SessionOptions};
use crate::probe::ModelChoice;
use crate::provider::{
    Artifact, Device, GenerationRequest, GenerationResult, InitOptions, Seed, SynthesisProvider,
};
use crate::wav;

/// Output sample rate of the EnCodec decoder.
pub const SAMPLE_RATE: u32 = 32_000;
/// Codebook frames per second of audio.
pub const FRAME_RATE: f32 = 50.0;
/// The models were trained on clips of at most 30 s.
pub const MAX_FRAMES: usize = 1500;

const NUM_CODEBOOKS: usize = 4;
const NUM_HEADS: usize = 16;
const HEAD_DIM: usize = 64;
const NUM_LAYERS: usize = 24;
const BOS_TOKEN: i64 = 2048;
const PAD_TOKEN: i64 = 2048;
const TOP_K: usize = 50;

/// Number of codebook frames needed for `secs` of audio.
pub fn frames_for_duration(secs: f32) -> usize {
    ((secs.max(0.0) * FRAME_RATE).ceil() as usize).clamp(1, MAX_FRAMES)
}

/// MusicGen only reads text, so tempo, key and the instrumental flag are
/// folded into the prompt.
pub fn compose_prompt(request: &GenerationRequest) -> String {
    let mut prompt = request.caption.trim().to_string();
    if let Some(bpm) = request.bpm {
        prompt.push_str(&format!(", {bpm} bpm"));
    }
    if let Some(key) = request.keyscale.as_deref().filter(|k| !k.is_empty()) {
        prompt.push_str(&format!(", {key}"));
    }
    if request.instrumental && !prompt.to_lowercase().contains("instrumental") {
        prompt.push_str(", instrumental");
    }
    prompt
}

struct MusicGenPipeline {
    text_encoder: Session,
    decoder: Session,
    encodec_decode: Session,
    tokenizer: tokenizers::Tokenizer,
}

impl MusicGenPipeline {
    fn load(model_dir: &Path, options: &SessionOptions) -> Result<Self> {
        tracing::info!("Loading text_encoder.onnx...");
        let text_encoder = load_session(&model_dir.join("text_encoder.onnx"), options)?;
        tracing::info!("Loading decoder_model_merged.onnx...");
        let decoder = load_session(&model_dir.join("decoder_model_merged.onnx"), options)?;
        tracing::info!("Loading encodec_decode.onnx...");
        let encodec_decode = load_session(&model_dir.join("encodec_decode.onnx"), options)?;
        tracing::info!("Loading tokenizer...");
        let tokenizer = tokenizers::Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        tracing::info!("All models loaded from {}", model_dir.display());
        Ok(Self {
            text_encoder,
            decoder,
            encodec_decode,
            tokenizer,
        })
    }

    fn generate(
        &mut self,
        prompt: &str,
        frames: usize,
        guidance_scale: f32,
        rng: &mut impl Rng,
    ) -> Result<Vec<f32>> {
        // Tokenize with special tokens so the T5 EOS token is appended
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        let token_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let text_seq_len = token_ids.len();

        let input_ids = Array2::from_shape_vec((1, text_seq_len), token_ids)?;
        let attention_mask = Array2::from_shape_vec((1, text_seq_len), attention)?;

        let cond_hidden = {
            let input_ids_tensor = Tensor::from_array(input_ids)?;
            let attn_tensor = Tensor::from_array(attention_mask.clone())?;
            let outputs = self.text_encoder.run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attn_tensor,
            })?;
            outputs["last_hidden_state"]
                .try_extract_array::<f32>()?
                .to_owned()
        };

        // CFG batch: conditional rows first, unconditional (zeros) second
        let cond_hidden_3d = cond_hidden.into_dimensionality::<ndarray::Ix3>()?;
        let uncond_hidden = Array3::<f32>::zeros(cond_hidden_3d.raw_dim());
        let encoder_hidden_states = ndarray::concatenate(
            Axis(0),
            &[cond_hidden_3d.view(), uncond_hidden.view()],
        )?;

        let uncond_attn = Array2::<i64>::zeros(attention_mask.raw_dim());
        let encoder_attention_mask = ndarray::concatenate(
            Axis(0),
            &[attention_mask.view(), uncond_attn.view()],
        )?;

        // Delayed layout: codebook k is PAD until position k + 1, BOS at 0.
        let total_seq_len = frames + NUM_CODEBOOKS;
        let total_codebook_rows = 2 * NUM_CODEBOOKS;

        let mut all_tokens = Array2::from_elem((total_codebook_rows, total_seq_len), PAD_TOKEN);
        for r in 0..total_codebook_rows {
            all_tokens[[r, 0]] = BOS_TOKEN;
        }

        let batch_size = 2usize;
        let mut decoder_cache: HashMap<String, ArrayD<f32>> = HashMap::new();
        let mut encoder_cache: HashMap<String, ArrayD<f32>> = HashMap::new();
        for layer in 0..NUM_LAYERS {
            for kind in ["key", "value"] {
                decoder_cache.insert(
                    format!("past_key_values.{layer}.decoder.{kind}"),
                    ArrayD::zeros(IxDyn(&[batch_size, NUM_HEADS, 0, HEAD_DIM])),
                );
                encoder_cache.insert(
                    format!("past_key_values.{layer}.encoder.{kind}"),
                    ArrayD::zeros(IxDyn(&[batch_size, NUM_HEADS, 0, HEAD_DIM])),
                );
            }
        }

        let mut next_tokens = Array2::from_elem((total_codebook_rows, 1), BOS_TOKEN);
        let num_gen_steps = total_seq_len - 1;
        let mut last_reported = 0;

        for step in 0..num_gen_steps {
            let use_cache = step > 0;

            let mut inputs: Vec<(
                std::borrow::Cow<'_, str>,
                ort::session::SessionInputValue<'_>,
            )> = Vec::new();
            inputs.push((
                "encoder_attention_mask".into(),
                Tensor::from_array(encoder_attention_mask.clone())?.into(),
            ));
            inputs.push((
                "input_ids".into(),
                Tensor::from_array(next_tokens.clone())?.into(),
            ));
            inputs.push((
                "encoder_hidden_states".into(),
                Tensor::from_array(encoder_hidden_states.clone())?.into(),
            ));
            for layer in 0..NUM_LAYERS {
                for kind in ["key", "value"] {
                    let dk = format!("past_key_values.{layer}.decoder.{kind}");
                    let ek = format!("past_key_values.{layer}.encoder.{kind}");
                    inputs.push((
                        dk.clone().into(),
                        Tensor::from_array(decoder_cache[&dk].clone())?.into(),
                    ));
                    inputs.push((
                        ek.clone().into(),
                        Tensor::from_array(encoder_cache[&ek].clone())?.into(),
                    ));
                }
            }
            inputs.push((
                "use_cache_branch".into(),
                Tensor::from_array(Array1::from_vec(vec![use_cache]))?.into(),
            ));

            let outputs = self.decoder.run(inputs)?;
            let logits = outputs["logits"].try_extract_array::<f32>()?.to_owned();

            for layer in 0..NUM_LAYERS {
                for kind in ["key", "value"] {
                    let present = format!("present.{layer}.decoder.{kind}");
                    decoder_cache.insert(
                        format!("past_key_values.{layer}.decoder.{kind}"),
                        outputs[present.as_str()].try_extract_array::<f32>()?.to_owned(),
                    );
                }
            }
            // Cross-attention cache only comes out of the first step
            if !use_cache {
                for layer in 0..NUM_LAYERS {
                    for kind in ["key", "value"] {
                        let present = format!("present.{layer}.encoder.{kind}");
                        encoder_cache.insert(
                            format!("past_key_values.{layer}.encoder.{kind}"),
                            outputs[present.as_str()].try_extract_array::<f32>()?.to_owned(),
                        );
                    }
                }
            }

            let logits_3d = logits.into_dimensionality::<ndarray::Ix3>()?;
            let cond_logits = logits_3d.slice(s![..NUM_CODEBOOKS, .., ..]).to_owned();
            let uncond_logits = logits_3d.slice(s![NUM_CODEBOOKS.., .., ..]).to_owned();
            let cfg_logits = &uncond_logits + guidance_scale * (&cond_logits - &uncond_logits);

            let mut sampled = vec![PAD_TOKEN; total_codebook_rows];
            for cb in 0..NUM_CODEBOOKS {
                let row: Vec<f32> = cfg_logits.slice(s![cb, 0, ..]).iter().copied().collect();
                let token = top_k_sample(&row, TOP_K, rng)?;
                sampled[cb] = token;
                sampled[cb + NUM_CODEBOOKS] = token;
            }

            let pos = step + 1;
            for r in 0..total_codebook_rows {
                // codebook k has delay k
                if pos > r % NUM_CODEBOOKS {
                    all_tokens[[r, pos]] = sampled[r];
                }
            }
            next_tokens = Array2::zeros((total_codebook_rows, 1));
            for r in 0..total_codebook_rows {
                next_tokens[[r, 0]] = all_tokens[[r, pos]];
            }

            let pct = (step as f32 / num_gen_steps as f32 * 100.0) as u32;
            if pct >= last_reported + 10 {
                last_reported = pct - pct % 10;
                tracing::debug!("Decoding... {}%", last_reported);
            }
        }

        // Undelay: aligned frame t of codebook k sits at column 1 + k + t
        let mut audio_codes_flat = vec![0i64; NUM_CODEBOOKS * frames];
        for cb in 0..NUM_CODEBOOKS {
            for t in 0..frames {
                let val = all_tokens[[cb, 1 + cb + t]];
                audio_codes_flat[cb * frames + t] = if val == PAD_TOKEN { 0 } else { val };
            }
        }

        let codes_shape = [1usize, 1, NUM_CODEBOOKS, frames];
        let codes_tensor = Tensor::from_array((codes_shape, audio_codes_flat))?;
        let decode_outputs = self.encodec_decode.run(ort::inputs! {
            "audio_codes" => codes_tensor,
        })?;

        let audio_values = decode_outputs["audio_values"].try_extract_array::<f32>()?;
        let samples: Vec<f32> = audio_values.iter().copied().collect();
        Ok(samples)
    }
}

/// Sample a token index from the `k` largest logits.
fn top_k_sample(logits: &[f32], k: usize, rng: &mut impl Rng) -> Result<i64> {
    let k = k.min(logits.len());
    if k == 0 {
        return Err(Error::Sampling("empty logits".into()));
    }

    let mut indexed: Vec<(usize, f32)> = logits.iter().copied().enumerate().collect();
    indexed.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);

    let max_logit = indexed[0].1;
    let weights: Vec<f32> = indexed.iter().map(|(_, v)| (v - max_logit).exp()).collect();
    let dist = WeightedIndex::new(&weights).map_err(|e| Error::Sampling(e.to_string()))?;
    Ok(indexed[dist.sample(rng)].0 as i64)
}

/// Provider that runs MusicGen on the CPU through ONNX Runtime.
pub struct MusicGenProvider {
    model: ModelChoice,
    session_options: SessionOptions,
    /// Resident pipeline; `None` when sessions are loaded per request.
    pipeline: Option<MusicGenPipeline>,
}

impl MusicGenProvider {
    /// Bring up the provider for `model`, returning it with a status line.
    pub fn initialize(model: &ModelChoice, options: &InitOptions) -> Result<(Self, String)> {
        match options.device {
            Device::Auto | Device::Cpu => {}
            other => {
                return Err(Error::ProviderInit(format!(
                    "device '{other}' is not available in this build, use cpu"
                )))
            }
        }
        if !validate_model_dir(&model.dir) {
            return Err(Error::ProviderInit(format!(
                "{} is missing model files",
                model.dir.display()
            )));
        }
        if options.use_flash_attention {
            tracing::warn!("Flash attention has no ONNX Runtime equivalent, ignoring");
        }

        let session_options = SessionOptions {
            optimize_fully: options.compile_model,
            intra_threads: options.intra_threads,
        };
        let pipeline = if options.offload_to_cpu {
            None
        } else {
            let pipeline = MusicGenPipeline::load(&model.dir, &session_options)
                .map_err(|e| Error::ProviderInit(e.to_string()))?;
            Some(pipeline)
        };

        let status = format!(
            "{} ready on cpu ({})",
            model.name,
            if pipeline.is_some() { "sessions resident" } else { "loaded per request" }
        );
        Ok((
            Self {
                model: model.clone(),
                session_options,
                pipeline,
            },
            status,
        ))
    }
}

impl SynthesisProvider for MusicGenProvider {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        save_dir: &Path,
    ) -> Result<GenerationResult> {
        let prompt = compose_prompt(request);
        let frames = frames_for_duration(request.duration_secs);
        let mut rng = match request.seed {
            Seed::Fixed(seed) => StdRng::seed_from_u64(seed),
            Seed::Random => StdRng::from_entropy(),
        };
        tracing::debug!("Prompt: {} ({} frames)", prompt, frames);

        let samples = match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.generate(&prompt, frames, request.guidance_scale, &mut rng)?,
            None => MusicGenPipeline::load(&self.model.dir, &self.session_options)?.generate(
                &prompt,
                frames,
                request.guidance_scale,
                &mut rng,
            )?,
        };

        if samples.is_empty() {
            return Ok(GenerationResult::failed("model returned no audio"));
        }
        let path = wav::write_wav_unique(&samples, SAMPLE_RATE, save_dir)?;
        let status = format!(
            "{} samples ({:.1}s at {} Hz)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32,
            SAMPLE_RATE
        );
        Ok(GenerationResult::succeeded(
            vec![Artifact {
                path,
                sample_rate: SAMPLE_RATE,
            }],
            status,
        ))
    }
}
