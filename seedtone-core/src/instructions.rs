//! Manual fallback: print the catalog as instructions for generating each
//! sample by hand in an interactive text-to-music UI.
use std::io::Write;
use std::path::Path;

use crate::batch::ensure_output_dirs;
use crate::catalog::Catalog;
use crate::error::Result;

const RULE: &str = "============================================================";

/// Print every sample in catalog order, then create the output directories.
/// Returns the number of samples listed.
pub fn render_manual(
    catalog: &Catalog,
    output_root: &Path,
    reason: Option<&str>,
    out: &mut impl Write,
) -> Result<usize> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "  MANUAL SAMPLE GENERATION ({})", catalog.name)?;
    writeln!(out, "{RULE}")?;
    if let Some(reason) = reason {
        writeln!(out, "Automatic generation unavailable: {reason}")?;
    }
    writeln!(out, "Generate each sample below in a text-to-music UI, export it as WAV,")?;
    writeln!(out, "and save it under the file name shown.")?;

    let mut listed = 0;
    for section in &catalog.sections {
        writeln!(out)?;
        writeln!(out, "{RULE}")?;
        writeln!(
            out,
            "  {} ({} samples)",
            section.category.as_str().to_uppercase(),
            section.samples.len()
        )?;
        writeln!(
            out,
            "  Save to: {}",
            output_root.join(section.category.as_str()).display()
        )?;
        writeln!(out, "{RULE}")?;

        for spec in &section.samples {
            listed += 1;
            writeln!(out)?;
            writeln!(out, "--- {} ({}s) ---", spec.file_name(), spec.duration)?;
            let mut musical = Vec::new();
            if let Some(bpm) = spec.bpm {
                musical.push(format!("{bpm} BPM"));
            }
            if let Some(key) = &spec.keyscale {
                musical.push(key.clone());
            }
            if !musical.is_empty() {
                writeln!(out, "Tempo/key: {}", musical.join(", "))?;
            }
            if !spec.tags.is_empty() {
                writeln!(out, "Tags: {}", spec.tags)?;
            }
            writeln!(out, "Lyrics: {}", spec.lyrics)?;
            writeln!(out, "Prompt:")?;
            writeln!(out, "{}", spec.manual_prompt())?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "TOTAL: {listed} samples to generate")?;
    writeln!(out, "- Set the duration to the seconds shown for each sample")?;
    writeln!(out, "- Mark every sample instrumental (no vocals)")?;
    writeln!(out, "{RULE}")?;

    ensure_output_dirs(catalog, output_root)?;
    Ok(listed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use tempfile::tempdir;

    #[test]
    fn test_lists_whole_catalog_in_order() {
        let catalog = Catalog::builtin().unwrap();
        let root = tempdir().unwrap();
        let mut out = Vec::new();
        let listed = render_manual(&catalog, root.path(), Some("no models"), &mut out).unwrap();
        assert_eq!(listed, catalog.len());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Automatic generation unavailable: no models"));
        assert!(text.contains("TOTAL: 26 samples to generate"));

        let mut last = 0;
        for (_, spec) in catalog.iter() {
            let header = format!("--- {} ({}s) ---", spec.file_name(), spec.duration);
            let pos = text[last..]
                .find(&header)
                .unwrap_or_else(|| panic!("{header} missing or out of order"));
            last += pos + header.len();
        }
    }

    #[test]
    fn test_creates_directories_but_no_audio() {
        let catalog = Catalog::builtin().unwrap();
        let root = tempdir().unwrap();
        render_manual(&catalog, root.path(), None, &mut std::io::sink()).unwrap();
        for category in Category::ALL {
            let dir = root.path().join(category.as_str());
            assert!(dir.is_dir());
            assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_shows_tempo_and_key() {
        let catalog = Catalog::builtin().unwrap().filtered(&[Category::Chords]);
        let root = tempdir().unwrap();
        let mut out = Vec::new();
        render_manual(&catalog, root.path(), None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Tempo/key: 80 BPM, C Minor"));
        assert!(text.contains("Tags: lofi, chords, rhodes, jazz, Cm"));
        assert!(!text.contains("DRUMS"));
    }

    #[test]
    fn test_prefers_manual_prompt_over_caption() {
        let mut catalog = Catalog::builtin().unwrap().filtered(&[Category::Bass]);
        catalog.sections[0].samples[1].prompt = None;
        let root = tempdir().unwrap();
        let mut out = Vec::new();
        render_manual(&catalog, root.path(), None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let with_prompt = &catalog.sections[0].samples[0];
        assert!(text.contains(with_prompt.prompt.as_deref().unwrap()));
        assert!(!text.contains(&with_prompt.caption));
        assert!(text.contains(&catalog.sections[0].samples[1].caption));
    }
}
