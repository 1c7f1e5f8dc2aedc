use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::{Error, Result};

/// Finds the group a view file asks for, e.g. `<!-- @useCSS: home -->`.
pub trait DirectiveExtractor: Send + Sync {
    /// Raw group reference in `text`, if any. Empty captures count as absent.
    fn extract_group_reference(&self, text: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct RegexExtractor {
    regex: Regex,
}

impl RegexExtractor {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| Error::invalid_pattern(pattern, err))?;
        Ok(Self { regex })
    }
}

impl DirectiveExtractor for RegexExtractor {
    fn extract_group_reference(&self, text: &str) -> Option<String> {
        let captures = self.regex.captures(text)?;
        let reference = captures.get(1)?.as_str().trim();
        if reference.is_empty() {
            return None;
        }
        Some(reference.to_string())
    }
}

#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn DirectiveExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns(patterns: &BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (ext, pattern) in patterns {
            registry.register(ext, RegexExtractor::new(pattern)?);
        }
        Ok(registry)
    }

    pub fn register(&mut self, ext: &str, extractor: impl DirectiveExtractor + 'static) {
        self.extractors
            .insert(ext.to_ascii_lowercase(), Box::new(extractor));
    }

    pub fn get(&self, ext: &str) -> Option<&dyn DirectiveExtractor> {
        self.extractors
            .get(&ext.to_ascii_lowercase())
            .map(|extractor| extractor.as_ref())
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn DirectiveExtractor> {
        let ext = path.extension()?.to_str()?;
        self.get(ext)
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut exts = self
            .extractors
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>();
        exts.sort_unstable();
        exts
    }
}
