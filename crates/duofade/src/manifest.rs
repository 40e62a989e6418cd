//! Optional TOML manifest with user-defined categories, pulse profiles, and
//! color schemes. Everything in it is additive on top of the built-ins.
//!
//! ```toml
//! [categories.birch]
//! images = ["shots/birch", "https://example.com/birch-07.jpg"]
//!
//! [profiles.slow-drift]
//! durations_ms = [12000, 9000, 14000]
//!
//! [schemes.ember]
//! primary = "#2B1B12"
//! secondary = "#F2A65A"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryEntry>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub schemes: BTreeMap<String, SchemeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryEntry {
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEntry {
    pub durations_ms: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SchemeEntry {
    pub primary: String,
    pub secondary: String,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        for (name, category) in &self.categories {
            if category.images.is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "category '{name}' has no images"
                )));
            }
        }
        for (name, profile) in &self.profiles {
            if profile.durations_ms.is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "profile '{name}' has no durations"
                )));
            }
            if profile.durations_ms.contains(&0) {
                return Err(ManifestError::Invalid(format!(
                    "profile '{name}' contains a zero duration"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_manifest() {
        let manifest = Manifest::from_toml_str(
            r##"
[categories.birch]
images = ["shots/birch/a.jpg", "https://example.com/b.jpg"]

[profiles.slow-drift]
durations_ms = [12000, 9000]

[schemes.ember]
primary = "#2B1B12"
secondary = "#F2A65A"
"##,
        )
        .unwrap();
        assert_eq!(manifest.categories["birch"].images.len(), 2);
        assert_eq!(manifest.profiles["slow-drift"].durations_ms, vec![12000, 9000]);
        assert_eq!(manifest.schemes["ember"].primary, "#2B1B12");
    }

    #[test]
    fn empty_category_is_rejected() {
        let result = Manifest::from_toml_str(
            r#"
[categories.hollow]
images = []
"#,
        );
        assert!(matches!(result, Err(ManifestError::Invalid(_))));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let result = Manifest::from_toml_str(
            r#"
[profiles.broken]
durations_ms = [1000, 0]
"#,
        );
        assert!(matches!(result, Err(ManifestError::Invalid(_))));
    }

    #[test]
    fn empty_manifest_is_fine() {
        let manifest = Manifest::from_toml_str("").unwrap();
        assert!(manifest.categories.is_empty());
    }
}
