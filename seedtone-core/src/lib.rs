//! Batch generation of a catalog of short audio samples.
//!
//! The [`catalog`] says what to make, a [`provider::SynthesisProvider`]
//! makes it, and the [`batch`] generator walks the catalog writing
//! `<output>/<category>/<id>.wav`. When no provider is installed the
//! [`instructions`] renderer prints the same catalog for doing it by hand;
//! [`probe`] decides which of the two applies.
pub mod batch;
pub mod catalog;
pub mod config;
pub mod instructions;
pub mod model;
pub mod musicgen;
pub mod probe;
pub mod provider;
pub mod wav;

mod error;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// A model directory with empty stand-ins for every required file.
    pub fn fake_model(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for file in crate::config::REQUIRED_MODEL_FILES {
            std::fs::write(dir.join(file), b"").unwrap();
        }
        dir
    }
}
