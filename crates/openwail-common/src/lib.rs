//! Common configuration types shared across OpenWail crates

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// How two sound files are compared when reducing one to its differences.
///
/// `Together` treats a class as a unit: it is either kept whole or cleared.
/// `Separately` evaluates the 8-bit and 16-bit sound sets independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    Together,
    Separately,
}

impl Default for CompareMode {
    fn default() -> Self {
        CompareMode::Together
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareMode::Together => write!(f, "together"),
            CompareMode::Separately => write!(f, "separately"),
        }
    }
}

impl std::str::FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "together" => Ok(CompareMode::Together),
            "separately" => Ok(CompareMode::Separately),
            _ => Err(format!(
                "unknown compare mode '{}', expected 'together' or 'separately'",
                s
            )),
        }
    }
}

/// Editor-wide settings, stored as a TOML file next to the tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Comparison policy used by the compare command
    #[serde(default)]
    pub compare_mode: CompareMode,
    /// Text file mapping class indices to display names
    #[serde(default)]
    pub class_names_file: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            compare_mode: CompareMode::Together,
            class_names_file: None,
        }
    }
}

impl EditorConfig {
    /// Load a config file, or fall back to defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Write the config back out as TOML
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Display names for sound classes, loaded from a plain-text list.
///
/// One name per line, in class-index order. Lines starting with '#' are
/// comments. Classes past the end of the list (or with a blank line) fall
/// back to a generic "Class N" name.
#[derive(Debug, Clone, Default)]
pub struct ClassNameCatalog {
    names: Vec<String>,
}

impl ClassNameCatalog {
    /// Parse a catalog from the text of a names file
    pub fn parse(text: &str) -> Self {
        let names = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .map(|line| line.trim().to_string())
            .collect();
        Self { names }
    }

    /// Load a catalog from a names file on disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Number of named classes in the catalog
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display name for a class index, falling back to "Class N"
    pub fn name_for(&self, index: usize) -> String {
        match self.names.get(index) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Class {}", index),
        }
    }
}
