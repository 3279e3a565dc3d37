//! Manifest and index types
//!
//! These mirror the shape of `index.json` shipped inside the page archive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One (os, language) pair the manifest advertises for a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTarget {
    pub os: String,
    pub language: String,
}

/// Everything the manifest says about a single command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    pub name: String,
    /// Supported platforms; the first entry is the default
    pub platform: Vec<String>,
    /// Supported language codes in manifest order
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub target: Vec<CommandTarget>,
}

impl CommandMetadata {
    /// The platform whose page is read for this command
    pub fn default_platform(&self) -> Option<&str> {
        self.platform.first().map(String::as_str)
    }

    pub fn supports_language(&self, lang: &str) -> bool {
        self.language.iter().any(|l| l == lang)
    }
}

/// Top-level `index.json` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub commands: Vec<CommandMetadata>,
}

/// Parsed manifest held in memory
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    names: Vec<String>,
    commands: HashMap<String, CommandMetadata>,
}

impl CacheIndex {
    /// Build an index from manifest entries, keeping their order.
    ///
    /// A name that appears twice keeps its first position; the later entry's
    /// metadata wins.
    pub fn from_commands(entries: Vec<CommandMetadata>) -> Self {
        let mut names = Vec::with_capacity(entries.len());
        let mut commands = HashMap::with_capacity(entries.len());

        for entry in entries {
            if !commands.contains_key(&entry.name) {
                names.push(entry.name.clone());
            }
            commands.insert(entry.name.clone(), entry);
        }

        Self { names, commands }
    }

    /// Command names in manifest order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, name: &str) -> Option<&CommandMetadata> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Shared handle to a fully built index
pub type SharedIndex = Arc<CacheIndex>;
