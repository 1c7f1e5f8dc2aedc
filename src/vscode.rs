use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::Layout;
use crate::groups::SourceGroupMap;
use crate::{Error, Result};

pub const CONFIG_FILE_KEY: &str = "tailwindCSS.experimental.configFile";

/// Map of each group's source CSS to itself plus its views, relative to
/// `settings_root` (the directory holding `.vscode`).
pub fn settings_document(map: &SourceGroupMap, layout: &Layout, settings_root: &Path) -> Value {
    let mut files = Map::new();
    for group in map.groups() {
        let css_path = portable(&relative_to(&layout.source_css_path(&group.name), settings_root));
        let mut entries = vec![Value::String(css_path.clone())];
        entries.extend(
            group
                .views
                .iter()
                .map(|view| Value::String(portable(&relative_to(view, settings_root)))),
        );
        files.insert(css_path, Value::Array(entries));
    }

    let mut document = Map::new();
    document.insert(CONFIG_FILE_KEY.to_string(), Value::Object(files));
    Value::Object(document)
}

pub fn find_settings_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".vscode").is_dir())
        .map(Path::to_path_buf)
}

/// Merge the group settings into `.vscode/settings.json`, keeping every other
/// key. Returns the settings file path.
pub fn update_settings(map: &SourceGroupMap, layout: &Layout) -> Result<PathBuf> {
    let settings_root = find_settings_root(&layout.root).unwrap_or_else(|| layout.root.clone());
    let vscode_dir = settings_root.join(".vscode");
    fs::create_dir_all(&vscode_dir)
        .map_err(|err| Error::io("failed to create settings directory", &vscode_dir, err))?;
    let settings_path = vscode_dir.join("settings.json");

    let mut settings = if settings_path.is_file() {
        let text = fs::read_to_string(&settings_path)
            .map_err(|err| Error::io("failed to read settings", &settings_path, err))?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(Error::Settings {
                    path: settings_path,
                    message: "expected a JSON object".to_string(),
                });
            }
            Err(err) => {
                return Err(Error::Settings {
                    path: settings_path,
                    message: err.to_string(),
                });
            }
        }
    } else {
        Map::new()
    };

    if let Value::Object(document) = settings_document(map, layout, &settings_root) {
        settings.extend(document);
    }

    let text = serde_json::to_string_pretty(&Value::Object(settings)).map_err(|err| Error::Settings {
        path: settings_path.clone(),
        message: err.to_string(),
    })?;
    fs::write(&settings_path, text)
        .map_err(|err| Error::io("failed to write settings", &settings_path, err))?;

    tracing::info!("updated settings file {}", settings_path.display());
    Ok(settings_path)
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_components = path.components().collect::<Vec<_>>();
    let base_components = base.components().collect::<Vec<_>>();
    let common = path_components
        .iter()
        .zip(&base_components)
        .take_while(|(left, right)| left == right)
        .count();

    let mut relative = PathBuf::new();
    for component in &base_components[common..] {
        if !matches!(component, Component::CurDir) {
            relative.push("..");
        }
    }
    for component in &path_components[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

fn portable(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
