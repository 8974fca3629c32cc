use anyhow::{Context, Result};
use cpp_harness::{HarnessConfig, MAX_CONSTRUCT};
use serde::Deserialize;
use std::path::Path;

pub const MAX_BASE_DEPTH: usize = 20;
pub const MAX_COMPOUND_DEPTH: usize = 3;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Written into the `Version:` field of every catalog.
    pub version: String,
    pub max_construct: usize,
    pub max_base_depth: usize,
    pub max_compound_depth: usize,
    pub expand_compound: bool,
    /// Globs of headers never scanned.
    pub exclude: Vec<String>,
    pub extensions: Vec<String>,
    pub jobs: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            max_construct: MAX_CONSTRUCT,
            max_base_depth: MAX_BASE_DEPTH,
            max_compound_depth: MAX_COMPOUND_DEPTH,
            expand_compound: true,
            exclude: vec!["**/classes.h".to_string(), "**/print.h".to_string()],
            extensions: ["h", "hh", "hpp", "hxx"].iter().map(|s| s.to_string()).collect(),
            jobs: None,
        }
    }
}

impl CatalogConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn harness(&self) -> HarnessConfig {
        HarnessConfig {
            max_construct: self.max_construct,
        }
    }
}
