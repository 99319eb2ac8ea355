use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::Result;

/// Write mono f32 samples to a WAV file at the given path.
pub fn write_wav(samples: &[f32], sample_rate: u32, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write mono f32 samples under a fresh random name in `dir`, returning the path.
pub fn write_wav_unique(samples: &[f32], sample_rate: u32, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut rng = rand::thread_rng();
    let path = loop {
        let candidate = dir.join(format!("seedtone-{:016x}.wav", rng.gen::<u64>()));
        if !candidate.exists() {
            break candidate;
        }
    };
    write_wav(samples, sample_rate, &path)?;
    Ok(path)
}
