use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::directive::ExtractorRegistry;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiers {
    pub global: String,
    pub critical: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub views: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroupMap {
    tiers: Tiers,
    groups: BTreeMap<String, Group>,
}

impl Tiers {
    pub fn new(global: impl Into<String>, critical: impl Into<String>) -> Self {
        Self {
            global: global.into(),
            critical: critical.into(),
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.global || name == self.critical
    }
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: Vec::new(),
        }
    }
}

impl SourceGroupMap {
    pub fn new(tiers: Tiers) -> Self {
        let mut map = Self::without_tiers(tiers);
        let global = map.tiers.global.clone();
        let critical = map.tiers.critical.clone();
        map.declare(&global);
        map.declare(&critical);
        map
    }

    pub fn without_tiers(tiers: Tiers) -> Self {
        Self {
            tiers,
            groups: BTreeMap::new(),
        }
    }

    pub fn tiers(&self) -> &Tiers {
        &self.tiers
    }

    pub fn declare(&mut self, name: &str) -> &mut Group {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name))
    }

    pub fn assign(&mut self, name: &str, view: PathBuf) {
        self.declare(name).views.push(view);
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn page_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups
            .values()
            .filter(|group| !self.tiers.is_reserved(&group.name))
    }
}

pub fn group_name(reference: &str) -> String {
    let trimmed = reference.trim().trim_end_matches(['/', '\\']);
    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    base.strip_suffix(".css").unwrap_or(base).to_string()
}

/// Assign each view file to the group its directive names, or to the global
/// group. Files without a registered extractor or that cannot be read are
/// skipped with a warning.
pub fn resolve(views: &[PathBuf], extractors: &ExtractorRegistry, tiers: &Tiers) -> SourceGroupMap {
    let mut map = SourceGroupMap::new(tiers.clone());
    resolve_into(&mut map, views, extractors);
    map
}

pub fn resolve_into(map: &mut SourceGroupMap, views: &[PathBuf], extractors: &ExtractorRegistry) {
    let default_group = map.tiers.global.clone();
    let assignments = views
        .par_iter()
        .map(|view| classify_view(view, extractors, &default_group).map(|group| (group, view)))
        .collect::<Vec<_>>();

    for (group, view) in assignments.into_iter().flatten() {
        tracing::debug!("{} -> {}", view.display(), group);
        map.assign(&group, view.clone());
    }
}

fn classify_view(view: &Path, extractors: &ExtractorRegistry, default_group: &str) -> Option<String> {
    let Some(extractor) = extractors.for_path(view) else {
        let ext = view
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        tracing::warn!("unsupported view file type '{}': {}", ext, view.display());
        return None;
    };

    let text = match fs::read_to_string(view) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("failed to read view file {}: {}", view.display(), err);
            return None;
        }
    };

    let group = extractor
        .extract_group_reference(&text)
        .map(|reference| group_name(&reference))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_group.to_string());
    Some(group)
}

/// Declare a group for every `*.css` file already present in `source_dir`.
/// The extension match is case-sensitive, so `Promo.CSS` declares nothing.
///
/// A missing directory declares nothing; an unreadable one is an error.
pub fn declare_source_groups(map: &mut SourceGroupMap, source_dir: &Path) -> Result<()> {
    if !source_dir.exists() {
        tracing::debug!("source directory {} does not exist yet", source_dir.display());
        return Ok(());
    }

    let entries = fs::read_dir(source_dir)
        .map_err(|err| Error::io("failed to read source directory", source_dir, err))?;
    for entry in entries {
        let entry =
            entry.map_err(|err| Error::io("failed to read source directory", source_dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_css = path.extension().and_then(|ext| ext.to_str()) == Some("css");
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if is_css && !stem.is_empty() {
            map.declare(stem);
        }
    }

    Ok(())
}

pub fn stub_contents(group: &str, tiers: &Tiers) -> String {
    let mut contents = String::from("@import \"tailwindcss\" source(none);\n");
    if group == tiers.global {
        contents.push_str(&format!("@reference \"./{}.css\";\n", tiers.critical));
    } else if group != tiers.critical {
        contents.push_str(&format!("@reference \"./{}.css\";\n", tiers.global));
    }
    contents
}

pub fn ensure_source_stub(layout: &Layout, group: &str, tiers: &Tiers) -> Result<bool> {
    let path = layout.source_css_path(group);
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| Error::io("failed to create source directory", parent, err))?;
    }

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(Error::io("failed to create source stub", &path, err)),
    };
    file.write_all(stub_contents(group, tiers).as_bytes())
        .map_err(|err| Error::io("failed to write source stub", &path, err))?;

    tracing::info!("created source stub {}", path.display());
    Ok(true)
}

pub fn ensure_source_stubs(map: &SourceGroupMap, layout: &Layout) -> Result<usize> {
    let mut created = 0;
    for group in map.groups() {
        if ensure_source_stub(layout, &group.name, map.tiers())? {
            created += 1;
        }
    }
    Ok(created)
}
