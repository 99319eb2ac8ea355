//! The sample catalog: which clips to generate and how to describe them.
//!
//! A catalog is an ordered list of sections, one per [`Category`]. Section
//! order and sample order are the order in which both the automated and the
//! manual paths walk the catalog.
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lyrics marker meaning "no vocals".
pub const INSTRUMENTAL: &str = "[Instrumental]";

const BUILTIN_CATALOG: &str = include_str!("../catalog/lofi.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Drums,
    Chords,
    Melodies,
    Bass,
    Ambient,
    Loops,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Drums,
        Category::Chords,
        Category::Melodies,
        Category::Bass,
        Category::Ambient,
        Category::Loops,
    ];

    /// Name used for the output subdirectory.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Drums => "drums",
            Category::Chords => "chords",
            Category::Melodies => "melodies",
            Category::Bass => "bass",
            Category::Ambient => "ambient",
            Category::Loops => "loops",
        }
    }

    /// Whether samples of this category conventionally carry a tempo.
    pub fn is_tempo_bearing(self) -> bool {
        self != Category::Ambient
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected one of drums, chords, melodies, bass, ambient, loops)")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

fn default_lyrics() -> String {
    INSTRUMENTAL.to_string()
}

/// One clip to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub id: String,
    pub caption: String,
    /// Paste-ready text for generating by hand; the caption is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "default_lyrics")]
    pub lyrics: String,
    /// Target length in seconds.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyscale: Option<String>,
    /// Comma separated tags, shown when generating by hand.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
}

impl SampleSpec {
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.id)
    }

    /// Text to paste into an interactive generator.
    pub fn manual_prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(&self.caption)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub category: Category,
    pub samples: Vec<SampleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub sections: Vec<Section>,
}

impl Catalog {
    /// The lo-fi catalog shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        tracing::debug!(
            "Loaded catalog '{}' from {} ({} samples)",
            catalog.name,
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Check the catalog invariants. Ids only need to be unique within
    /// their own category.
    pub fn validate(&self) -> Result<()> {
        let mut seen_categories = HashSet::new();
        for section in &self.sections {
            if !seen_categories.insert(section.category) {
                return Err(Error::InvalidCatalog(format!(
                    "category '{}' appears in more than one section",
                    section.category
                )));
            }

            let mut seen_ids = HashSet::new();
            for spec in &section.samples {
                let where_ = format!("{}/{}", section.category, spec.id);
                if spec.id.is_empty()
                    || spec.id == "."
                    || spec.id == ".."
                    || spec.id.contains(['/', '\\'])
                {
                    return Err(Error::InvalidCatalog(format!(
                        "'{}' in {} is not a usable file name",
                        spec.id, section.category
                    )));
                }
                if !seen_ids.insert(spec.id.as_str()) {
                    return Err(Error::InvalidCatalog(format!("duplicate id {where_}")));
                }
                if spec.caption.trim().is_empty() {
                    return Err(Error::InvalidCatalog(format!("{where_} has an empty caption")));
                }
                if spec.duration == 0 {
                    return Err(Error::InvalidCatalog(format!("{where_} has a zero duration")));
                }
                if section.category.is_tempo_bearing() != spec.bpm.is_some() {
                    tracing::warn!(
                        "{} {} a tempo, unusual for {}",
                        where_,
                        if spec.bpm.is_some() { "has" } else { "lacks" },
                        section.category
                    );
                }
            }
        }
        Ok(())
    }

    /// Total number of samples across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every sample with its category, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &SampleSpec)> {
        self.sections
            .iter()
            .flat_map(|s| s.samples.iter().map(move |spec| (s.category, spec)))
    }

    /// Keep only the given categories, preserving catalog order. An empty
    /// filter keeps everything.
    pub fn filtered(&self, categories: &[Category]) -> Catalog {
        if categories.is_empty() {
            return self.clone();
        }
        Catalog {
            name: self.name.clone(),
            sections: self
                .sections
                .iter()
                .filter(|s| categories.contains(&s.category))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, duration: u32, bpm: Option<u32>) -> SampleSpec {
        SampleSpec {
            id: id.to_string(),
            caption: format!("caption for {id}"),
            prompt: None,
            lyrics: INSTRUMENTAL.to_string(),
            duration,
            bpm,
            keyscale: None,
            tags: String::new(),
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.name, "lofi");
        assert_eq!(catalog.len(), 26);
        let order: Vec<Category> = catalog.sections.iter().map(|s| s.category).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(catalog.iter().all(|(_, s)| s.lyrics == INSTRUMENTAL));
        assert!(catalog
            .iter()
            .all(|(c, s)| c.is_tempo_bearing() == s.bpm.is_some()));
        assert!(catalog
            .iter()
            .all(|(_, s)| s.prompt.as_deref().is_some_and(|p| p.starts_with('['))));
    }

    #[test]
    fn test_same_id_in_two_categories_is_allowed() {
        let catalog = Catalog::builtin().unwrap();
        let dreamy: Vec<Category> = catalog
            .iter()
            .filter(|(_, s)| s.id == "dreamy-Am-01")
            .map(|(c, _)| c)
            .collect();
        assert_eq!(dreamy, vec![Category::Chords, Category::Loops]);
    }

    #[test]
    fn test_duplicate_id_in_category_rejected() {
        let catalog = Catalog {
            name: "dup".into(),
            sections: vec![Section {
                category: Category::Drums,
                samples: vec![spec("a", 8, Some(80)), spec("a", 8, Some(80))],
            }],
        };
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate id drums/a"));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let catalog = Catalog {
            name: "zero".into(),
            sections: vec![Section {
                category: Category::Bass,
                samples: vec![spec("b", 0, Some(80))],
            }],
        };
        assert!(matches!(catalog.validate(), Err(Error::InvalidCatalog(_))));
    }

    #[test]
    fn test_repeated_section_rejected() {
        let catalog = Catalog {
            name: "twice".into(),
            sections: vec![
                Section { category: Category::Bass, samples: vec![spec("a", 8, Some(80))] },
                Section { category: Category::Bass, samples: vec![spec("b", 8, Some(80))] },
            ],
        };
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_path_like_id_rejected() {
        let json = r#"{"name":"x","sections":[{"category":"drums","samples":[
            {"id":"../escape","caption":"c","duration":8,"bpm":80}]}]}"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[test]
    fn test_defaults_when_parsing() {
        let json = r#"{"name":"x","sections":[{"category":"ambient","samples":[
            {"id":"rain-01","caption":"rain","duration":30}]}]}"#;
        let catalog = Catalog::from_json(json).unwrap();
        let (category, rain) = catalog.iter().next().unwrap();
        assert_eq!(category, Category::Ambient);
        assert_eq!(rain.lyrics, INSTRUMENTAL);
        assert_eq!(rain.bpm, None);
        assert_eq!(rain.file_name(), "rain-01.wav");
        assert_eq!(rain.prompt, None);
        assert_eq!(rain.manual_prompt(), "rain");
    }

    #[test]
    fn test_filtered_keeps_order() {
        let catalog = Catalog::builtin().unwrap();
        let filtered = catalog.filtered(&[Category::Loops, Category::Drums]);
        let order: Vec<Category> = filtered.sections.iter().map(|s| s.category).collect();
        assert_eq!(order, vec![Category::Drums, Category::Loops]);
        assert_eq!(filtered.len(), 9);
        assert_eq!(catalog.filtered(&[]).len(), catalog.len());
    }

    #[test]
    fn test_json_reload_matches() {
        let catalog = Catalog::builtin().unwrap();
        let again = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(again, catalog);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Melodies".parse::<Category>(), Ok(Category::Melodies));
        assert!("vocals".parse::<Category>().is_err());
    }
}
