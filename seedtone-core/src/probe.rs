//! Decide up front whether samples can be generated automatically.
use std::path::{Path, PathBuf};

use crate::config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub name: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// A model is installed; drive it.
    Automated(ModelChoice),
    /// Nothing is installed; print instructions instead.
    Manual { reason: String },
}

/// Prefer `preferred` when it is installed, otherwise the first model.
pub fn select_model(available: &[String], preferred: &str) -> Option<String> {
    available
        .iter()
        .find(|m| m.as_str() == preferred)
        .or_else(|| available.first())
        .cloned()
}

/// A missing checkpoint directory means no provider is installed at all,
/// which selects the manual mode. A checkpoint directory without a complete
/// model is a broken install and an error.
pub fn probe(checkpoint_dir: &Path, preferred: &str) -> Result<RunMode> {
    if !checkpoint_dir.is_dir() {
        return Ok(RunMode::Manual {
            reason: format!("no checkpoint directory at {}", checkpoint_dir.display()),
        });
    }

    let available = config::available_models(checkpoint_dir)?;
    let name = select_model(&available, preferred)
        .ok_or_else(|| Error::NoModels(checkpoint_dir.to_path_buf()))?;
    if name != preferred {
        tracing::info!("Preferred model '{}' not installed, using '{}'", preferred, name);
    }
    Ok(RunMode::Automated(ModelChoice {
        dir: checkpoint_dir.join(&name),
        name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_model;
    use tempfile::tempdir;

    #[test]
    fn test_missing_root_is_manual() {
        let dir = tempdir().unwrap();
        let mode = probe(&dir.path().join("nope"), "musicgen-small").unwrap();
        assert!(matches!(mode, RunMode::Manual { .. }));
    }

    #[test]
    fn test_empty_root_is_fatal() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            probe(dir.path(), "musicgen-small"),
            Err(Error::NoModels(_))
        ));
    }

    #[test]
    fn test_prefers_configured_model() {
        let dir = tempdir().unwrap();
        fake_model(dir.path(), "musicgen-medium");
        fake_model(dir.path(), "musicgen-small");
        let mode = probe(dir.path(), "musicgen-small").unwrap();
        assert_eq!(
            mode,
            RunMode::Automated(ModelChoice {
                name: "musicgen-small".into(),
                dir: dir.path().join("musicgen-small"),
            })
        );
    }

    #[test]
    fn test_falls_back_to_first_model() {
        let available = vec!["musicgen-large".to_string(), "musicgen-medium".to_string()];
        assert_eq!(
            select_model(&available, "musicgen-small").as_deref(),
            Some("musicgen-large")
        );
        assert_eq!(select_model(&[], "musicgen-small"), None);
    }
}
