//! Professional registry: display name → fixed identity block.
//!
//! Loaded from a TOML file owned outside the pipeline and injected into the
//! schema mapper at construction. Nothing here is read from global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::ProfessionalProfile;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot read registry file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid registry TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Professional listed twice: {0}")]
    Duplicate(String),

    #[error("Professional entry has an empty display name")]
    EmptyName,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    professionals: Vec<ProfessionalProfile>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfessionalRegistry {
    by_key: BTreeMap<String, ProfessionalProfile>,
}

/// Lookup key: uppercase with inner whitespace collapsed.
fn registry_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

impl ProfessionalRegistry {
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = ProfessionalProfile>,
    ) -> Result<Self, RegistryError> {
        let mut by_key = BTreeMap::new();
        for profile in profiles {
            let key = registry_key(&profile.display_name);
            if key.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if by_key.contains_key(&key) {
                return Err(RegistryError::Duplicate(profile.display_name));
            }
            by_key.insert(key, profile);
        }
        Ok(Self { by_key })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(raw)?;
        Self::from_profiles(file.professionals)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_toml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            professionals = registry.len(),
            "Professional registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, display_name: &str) -> Option<&ProfessionalProfile> {
        self.by_key.get(&registry_key(display_name))
    }

    /// Display names in sorted order, for selection lists.
    pub fn names(&self) -> Vec<&str> {
        self.by_key
            .values()
            .map(|p| p.display_name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
