//! Drive a provider through a whole catalog, one sample at a time.
//!
//! Every per-sample problem (provider error, failed result, missing file,
//! refused overwrite) is written to the progress log, counted, and skipped.
//! Only failing to create the output directories stops a run, and that
//! happens before the first request.
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category, SampleSpec};
use crate::error::Result;
use crate::provider::{GenerationRequest, GenerationResult, GenerationSettings, SynthesisProvider};

/// What to do when `<category>/<id>.wav` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Leave it alone and count the sample as failed without generating.
    Refuse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFailure {
    pub category: Category,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub generated: usize,
    pub failed: usize,
    pub total: usize,
    pub output_root: PathBuf,
    pub failures: Vec<SampleFailure>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generated: {}/{}, failed: {}/{}",
            self.generated, self.total, self.failed, self.total
        )
    }
}

/// Create `<root>/<category>` for every section of the catalog.
pub fn ensure_output_dirs(catalog: &Catalog, output_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::with_capacity(catalog.sections.len());
    for section in &catalog.sections {
        let dir = output_root.join(section.category.as_str());
        std::fs::create_dir_all(&dir)?;
        dirs.push(dir);
    }
    Ok(dirs)
}

/// Where a sample ends up.
pub fn target_path(output_root: &Path, category: Category, spec: &SampleSpec) -> PathBuf {
    output_root.join(category.as_str()).join(spec.file_name())
}

pub struct BatchGenerator<'a, P: SynthesisProvider + ?Sized> {
    provider: &'a mut P,
    output_root: PathBuf,
    settings: GenerationSettings,
    overwrite: OverwritePolicy,
}

impl<'a, P: SynthesisProvider + ?Sized> BatchGenerator<'a, P> {
    pub fn new(provider: &'a mut P, output_root: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            output_root: output_root.into(),
            settings: GenerationSettings::default(),
            overwrite: OverwritePolicy::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Generate every sample of `catalog`, writing progress lines to `out`.
    ///
    /// A broken `out` never stops the batch; the first write error is logged
    /// and the remaining lines are dropped.
    pub fn run(&mut self, catalog: &Catalog, out: &mut impl Write) -> Result<BatchSummary> {
        ensure_output_dirs(catalog, &self.output_root)?;

        let total = catalog.len();
        let mut summary = BatchSummary {
            generated: 0,
            failed: 0,
            total,
            output_root: self.output_root.clone(),
            failures: Vec::new(),
        };
        let mut log = ProgressLog::new(out);

        tracing::info!("Generating {} samples with {}", total, self.provider.name());
        log.line(format_args!("Generating {} samples...", total));

        for section in &catalog.sections {
            log.line(format_args!(""));
            log.line(format_args!(
                "== {} ({} samples) ==",
                section.category.as_str().to_uppercase(),
                section.samples.len()
            ));

            for spec in &section.samples {
                log.line(format_args!("  Generating: {} ({}s)", spec.id, spec.duration));
                match self.generate_one(section.category, spec) {
                    Ok(path) => {
                        summary.generated += 1;
                        tracing::debug!("Saved {}", path.display());
                        log.line(format_args!("  \u{2713} Saved: {}", spec.file_name()));
                    }
                    Err(reason) => {
                        summary.failed += 1;
                        tracing::warn!("{}/{} failed: {}", section.category, spec.id, reason);
                        log.line(format_args!("  \u{2717} Failed: {}: {}", spec.id, reason));
                        summary.failures.push(SampleFailure {
                            category: section.category,
                            id: spec.id.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        log.line(format_args!(""));
        log.line(format_args!("GENERATION COMPLETE"));
        log.line(format_args!("  {}", summary));
        log.line(format_args!(
            "  Output directory: {}",
            display_path(&summary.output_root)
        ));
        Ok(summary)
    }

    fn generate_one(
        &mut self,
        category: Category,
        spec: &SampleSpec,
    ) -> std::result::Result<PathBuf, String> {
        let target = target_path(&self.output_root, category, spec);
        if self.overwrite == OverwritePolicy::Refuse && target.exists() {
            return Err(format!("{} already exists", target.display()));
        }

        let request = GenerationRequest::from_spec(spec, &self.settings);
        let save_dir = self.output_root.join(category.as_str());
        let result = self
            .provider
            .generate(&request, &save_dir)
            .map_err(|e| format!("Error: {e}"))?;

        let placed = place_first_artifact(&result, &target);
        // Whatever was not moved into place must not linger next to the samples.
        let kept = usize::from(placed.is_ok());
        for artifact in result.artifacts.iter().skip(kept) {
            discard(&artifact.path, &target);
        }
        placed.map(|()| target)
    }
}

fn place_first_artifact(
    result: &GenerationResult,
    target: &Path,
) -> std::result::Result<(), String> {
    if !result.success {
        return Err(result.failure_reason());
    }
    let artifact = result
        .artifacts
        .first()
        .ok_or_else(|| "provider returned no audio".to_string())?;
    if !artifact.path.is_file() {
        return Err(format!(
            "audio generated but file not found at {}",
            artifact.path.display()
        ));
    }
    move_file(&artifact.path, target)
        .map_err(|e| format!("could not move {}: {e}", artifact.path.display()))
}

fn discard(path: &Path, target: &Path) {
    if path == target {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Discarded {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Progress output that outlives its writer.
struct ProgressLog<'w, W: Write> {
    out: &'w mut W,
    broken: bool,
}

impl<'w, W: Write> ProgressLog<'w, W> {
    fn new(out: &'w mut W) -> Self {
        Self { out, broken: false }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.broken {
            return;
        }
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            tracing::warn!("Progress output unavailable, continuing without it: {}", e);
            self.broken = true;
        }
    }
}

/// Rename `from` to `to`, copying when the two are on different filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if from == to {
        return Ok(());
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn display_path(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
