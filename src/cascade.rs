use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;

use crate::config::Layout;
use crate::css::{PathSet, Stylesheet, aggregate_paths, strip_at_rules, subtract};
use crate::engine::{ExpansionEngine, compose_input};
use crate::groups::{Group, SourceGroupMap};
use crate::{Error, Result};

#[derive(Debug)]
pub struct GroupFailure {
    pub group: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct CascadeOutput {
    pub sheets: BTreeMap<String, Stylesheet>,
    pub failures: Vec<GroupFailure>,
}

/// Expand one group through `engine` and parse the result. `@source`
/// directives echoed back by the engine are removed.
pub fn expand_group(group: &Group, layout: &Layout, engine: &dyn ExpansionEngine) -> Result<Stylesheet> {
    let source_path = layout.source_css_path(&group.name);
    let source_css = fs::read_to_string(&source_path)
        .map_err(|err| Error::io("failed to read source css", &source_path, err))?;

    if group.views.is_empty() {
        tracing::info!("expanding {} (no views)", group.name);
    } else {
        tracing::info!("expanding {} ({} views)", group.name, group.views.len());
    }

    let input = compose_input(&source_css, &group.views);
    let css = engine.expand(&group.name, &input, &layout.source_dir)?;
    let mut sheet = Stylesheet::parse(&css)
        .map_err(|err| Error::engine(&group.name, format!("unparsable output: {}", err)))?;
    strip_at_rules(&mut sheet, "source");
    Ok(sheet)
}

/// Run the full cascade over `map`.
///
/// Only a failure of the global tier is returned as an error; any other group
/// that fails is listed in [`CascadeOutput::failures`] and left out of
/// [`CascadeOutput::sheets`].
pub fn build_cascade(
    map: &SourceGroupMap,
    layout: &Layout,
    engine: &dyn ExpansionEngine,
) -> Result<CascadeOutput> {
    let tiers = map.tiers();
    let global = map
        .get(&tiers.global)
        .ok_or_else(|| Error::MissingGlobalGroup(tiers.global.clone()))?;
    let critical = map.get(&tiers.critical);

    let (critical_result, global_result) = rayon::join(
        || expand_critical(critical, &tiers.critical, layout, engine),
        || expand_group(global, layout, engine),
    );
    let mut global_sheet = global_result?;

    let mut output = CascadeOutput::default();
    let critical_paths = match critical_result {
        Ok(sheet) => {
            let paths = aggregate_paths(&sheet);
            output.sheets.insert(tiers.critical.clone(), sheet);
            paths
        }
        Err(error) => {
            tracing::error!("{}", error);
            output.failures.push(GroupFailure {
                group: tiers.critical.clone(),
                error,
            });
            PathSet::new()
        }
    };

    subtract(&mut global_sheet, &critical_paths);
    let mut base_paths = critical_paths;
    base_paths.extend(aggregate_paths(&global_sheet));
    output.sheets.insert(tiers.global.clone(), global_sheet);
    tracing::debug!("{} paths shared by critical and global tiers", base_paths.len());

    let pages = map.page_groups().collect::<Vec<_>>();
    let results = pages
        .par_iter()
        .map(|group| {
            let result = expand_group(group, layout, engine).map(|mut sheet| {
                subtract(&mut sheet, &base_paths);
                sheet
            });
            (group.name.clone(), result)
        })
        .collect::<Vec<_>>();

    for (name, result) in results {
        match result {
            Ok(sheet) => {
                output.sheets.insert(name, sheet);
            }
            Err(error) => {
                tracing::error!("{}", error);
                output.failures.push(GroupFailure { group: name, error });
            }
        }
    }

    Ok(output)
}

fn expand_critical(
    critical: Option<&Group>,
    name: &str,
    layout: &Layout,
    engine: &dyn ExpansionEngine,
) -> Result<Stylesheet> {
    match critical {
        Some(group) => expand_group(group, layout, engine),
        None if layout.source_css_path(name).is_file() => {
            expand_group(&Group::new(name), layout, engine)
        }
        None => {
            tracing::debug!("no {} group, using an empty critical tier", name);
            Ok(Stylesheet::default())
        }
    }
}
