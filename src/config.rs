use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::groups::group_name;
use crate::{Error, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "twstrata.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    #[serde(deserialize_with = "one_or_many")]
    pub views: Vec<String>,
    pub ignore: Vec<String>,
    pub global: String,
    pub critical: String,
    pub directives: BTreeMap<String, String>,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
}

pub fn load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|err| Error::Config {
        path: path.to_path_buf(),
        message: format!("failed to read: {}", err),
    })?;
    let config: Config = toml::from_str(&text).map_err(|err| Error::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let config = config.normalized();
    if config.global == config.critical {
        return Err(Error::Config {
            path: path.to_path_buf(),
            message: format!(
                "global and critical must be different groups, both are '{}'",
                config.global
            ),
        });
    }
    Ok(config)
}

/// Load `explicit` if given, else `twstrata.toml` under `root` when present,
/// else the defaults.
pub fn load_or_default(root: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        tracing::info!("loading config {}", path.display());
        return load(&root.join(path));
    }

    let path = root.join(DEFAULT_CONFIG_FILE);
    if path.is_file() {
        tracing::info!("loading config {}", path.display());
        return load(&path);
    }

    tracing::info!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
    Ok(Config::default())
}

impl Config {
    fn normalized(mut self) -> Self {
        self.global = group_name(&self.global);
        self.critical = group_name(&self.critical);
        self.views = self
            .views
            .iter()
            .map(|pattern| normalize_glob(pattern))
            .collect();
        self
    }

    /// Directive patterns per extension, user entries replacing defaults key by key.
    pub fn directive_patterns(&self) -> BTreeMap<String, String> {
        let mut patterns = default_directives();
        for (ext, pattern) in &self.directives {
            patterns.insert(ext.trim_start_matches('.').to_ascii_lowercase(), pattern.clone());
        }
        patterns
    }

    pub fn layout(&self, root: &Path) -> Layout {
        Layout {
            root: root.to_path_buf(),
            source_dir: root.join(&self.source_dir),
            out_dir: root.join(&self.out_dir),
        }
    }
}

impl Layout {
    pub fn source_css_path(&self, group: &str) -> PathBuf {
        self.source_dir.join(format!("{}.css", group))
    }

    pub fn output_path(&self, group: &str) -> PathBuf {
        self.out_dir.join(format!("{}.css", group))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("tw"),
            out_dir: PathBuf::from("dist"),
            views: vec![
                "views/**/*.html".to_string(),
                "views/**/*.liquid".to_string(),
                "views/**/*.cshtml".to_string(),
            ],
            ignore: Vec::new(),
            global: "theme".to_string(),
            critical: "critical".to_string(),
            directives: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["@tailwindcss/cli".to_string()],
        }
    }
}

fn default_directives() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "html".to_string(),
            r"(?i)<!--\s*@useCSS:\s*([\w./\\-]+)?\s*-->".to_string(),
        ),
        (
            "cshtml".to_string(),
            r"(?i)@\*\s*@useCSS:\s*([\w./\\-]+)?\s*\*@".to_string(),
        ),
        (
            "liquid".to_string(),
            r"(?i)\{%\s*comment\s*%\}\s*@useCSS:\s*([\w./\\-]+)?\s*\{%\s*endcomment\s*%\}"
                .to_string(),
        ),
    ])
}

fn normalize_glob(pattern: &str) -> String {
    pattern.trim_start_matches("./").to_string()
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
