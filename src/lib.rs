pub mod cascade;
pub mod config;
pub mod css;
pub mod directive;
pub mod engine;
pub mod groups;
pub mod output;
pub mod scanner;
pub mod vscode;

mod error;

pub use error::{Error, Result};

use globset::GlobSet;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::{Duration, Instant};

use crate::cascade::{GroupFailure, build_cascade};
use crate::config::{Config, Layout};
use crate::directive::ExtractorRegistry;
use crate::engine::{CommandEngine, ExpansionEngine};
use crate::groups::{SourceGroupMap, Tiers};
use crate::scanner::ScanGlobOptions;

const WATCH_QUIET_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Build {
        config: Option<String>,
        out: Option<String>,
    },
    Watch {
        config: Option<String>,
        out: Option<String>,
        poll: bool,
        poll_interval_ms: u64,
    },
    VsCode {
        config: Option<String>,
    },
    Help,
}

#[derive(Debug)]
pub struct BuildReport {
    pub groups: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<GroupFailure>,
    pub elapsed: Duration,
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Build { config, out } => run_build(config, out).map(|_| ()),
        Command::Watch {
            config,
            out,
            poll,
            poll_interval_ms,
        } => run_watch(WatchOptions {
            config,
            out,
            poll,
            poll_interval_ms,
        }),
        Command::VsCode { config } => run_vscode(config),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter().peekable();
    let first = iter.peek().cloned();
    let cmd = match first {
        None => return Ok(Command::Build { config: None, out: None }),
        Some(first) if first.starts_with('-') && !is_help_flag(&first) => "build".to_string(),
        Some(_) => iter.next().unwrap_or_default(),
    };

    match cmd.as_str() {
        "build" => parse_build_args(iter.collect()),
        "watch" => parse_watch_args(iter.collect()),
        "vscode" => parse_vscode_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(Error::usage(format!("unknown command: {}", cmd))),
    }
}

fn is_help_flag(arg: &str) -> bool {
    matches!(arg, "-h" | "--help")
}

fn parse_build_args(args: Vec<String>) -> Result<Command> {
    let mut config = None;
    let mut out = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => config = Some(flag_value(&args, &mut idx, "build", "--config")?),
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "build", "--out")?)
            }
            "--poll" | "--poll-interval" => {
                return Err(Error::usage(format!("{} is only supported with watch", args[idx])));
            }
            value => {
                return Err(Error::usage(format!("unexpected build argument: {}", value)));
            }
        }
        idx += 1;
    }

    Ok(Command::Build { config, out })
}

fn parse_watch_args(args: Vec<String>) -> Result<Command> {
    let mut config = None;
    let mut out = None;
    let mut poll = false;
    let mut poll_interval_ms = 500;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => config = Some(flag_value(&args, &mut idx, "watch", "--config")?),
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "watch", "--out")?)
            }
            "--poll" => {
                poll = true;
            }
            "--poll-interval" => {
                let value = flag_value(&args, &mut idx, "watch", "--poll-interval")?;
                poll = true;
                poll_interval_ms = parse_u64_arg(&value, "--poll-interval")?;
            }
            value => {
                return Err(Error::usage(format!("unexpected watch argument: {}", value)));
            }
        }
        idx += 1;
    }

    Ok(Command::Watch {
        config,
        out,
        poll,
        poll_interval_ms,
    })
}

fn parse_vscode_args(args: Vec<String>) -> Result<Command> {
    let mut config = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => config = Some(flag_value(&args, &mut idx, "vscode", "--config")?),
            value => {
                return Err(Error::usage(format!("unexpected vscode argument: {}", value)));
            }
        }
        idx += 1;
    }

    Ok(Command::VsCode { config })
}

fn flag_value(args: &[String], idx: &mut usize, command: &str, flag: &str) -> Result<String> {
    *idx += 1;
    args.get(*idx)
        .cloned()
        .ok_or_else(|| Error::usage(format!("{} requires a value for {}", command, flag)))
}

fn parse_u64_arg(value: &str, flag: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| Error::usage(format!("{} requires a positive integer, got '{}'", flag, value)))
}

fn load_project(config_path: Option<&str>, out: Option<&str>) -> Result<(PathBuf, Config)> {
    let root = env::current_dir()
        .map_err(|err| Error::io("failed to resolve current directory", ".", err))?;
    let mut config = config::load_or_default(&root, config_path.map(Path::new))?;
    if let Some(out) = out {
        config.out_dir = PathBuf::from(out);
    }
    Ok((root, config))
}

/// Group every view file under `layout.root` and make sure each group has a
/// source stylesheet.
pub fn resolve_source_groups(config: &Config, layout: &Layout) -> Result<SourceGroupMap> {
    let tiers = Tiers::new(config.global.clone(), config.critical.clone());
    let extractors = ExtractorRegistry::from_patterns(&config.directive_patterns())?;
    let options = ScanGlobOptions {
        base_path: layout.root.clone(),
        ..ScanGlobOptions::default()
    };
    let views = scanner::discover_views(&config.views, &config.ignore, &options)?;
    tracing::debug!("found {} view files", views.len());

    let mut map = SourceGroupMap::new(tiers);
    groups::declare_source_groups(&mut map, &layout.source_dir)?;
    groups::resolve_into(&mut map, &views, &extractors);
    groups::ensure_source_stubs(&map, layout)?;
    Ok(map)
}

pub fn build(root: &Path, config: &Config, engine: &dyn ExpansionEngine) -> Result<BuildReport> {
    let started = Instant::now();
    let layout = config.layout(root);
    tracing::info!(
        "source dir {}, views {}",
        layout.source_dir.display(),
        config.views.join(", ")
    );

    let map = resolve_source_groups(config, &layout)?;
    let output = build_cascade(&map, &layout, engine)?;
    let written = output::write_outputs(&layout, &output)?;

    Ok(BuildReport {
        groups: map.len(),
        written,
        failures: output.failures,
        elapsed: started.elapsed(),
    })
}

fn run_build(config_path: Option<String>, out: Option<String>) -> Result<BuildReport> {
    let (root, config) = load_project(config_path.as_deref(), out.as_deref())?;
    let engine = CommandEngine::from_config(&config.engine);
    let report = build(&root, &config, &engine)?;
    log_report(&report);
    Ok(report)
}

fn log_report(report: &BuildReport) {
    if report.failures.is_empty() {
        tracing::info!(
            "built {} stylesheets in {:.2?}",
            report.written.len(),
            report.elapsed
        );
    } else {
        let failed = report
            .failures
            .iter()
            .map(|failure| failure.group.as_str())
            .collect::<Vec<_>>();
        tracing::warn!(
            "built {} of {} stylesheets in {:.2?}, skipped: {}",
            report.written.len(),
            report.groups,
            report.elapsed,
            failed.join(", ")
        );
    }
}

fn run_vscode(config_path: Option<String>) -> Result<()> {
    let (root, config) = load_project(config_path.as_deref(), None)?;
    let layout = config.layout(&root);
    let map = resolve_source_groups(&config, &layout)?;
    vscode::update_settings(&map, &layout)?;
    Ok(())
}

fn print_help() {
    println!("twstrata");
    println!();
    println!("USAGE:");
    println!("  twstrata [build] [--config <path>] [--out <dir>]");
    println!(
        "  twstrata watch [--config <path>] [--out <dir>] [--poll] [--poll-interval <ms>]"
    );
    println!("  twstrata vscode [--config <path>]");
    println!();
    println!("EXAMPLES:");
    println!("  twstrata");
    println!("  twstrata build -c twstrata.toml -o public/css");
    println!("  twstrata watch --poll --poll-interval 250");
    println!("  twstrata vscode");
    println!();
    println!("Set RUST_LOG=debug for detailed output.");
}

#[derive(Debug, Clone)]
struct WatchOptions {
    config: Option<String>,
    out: Option<String>,
    poll: bool,
    poll_interval_ms: u64,
}

fn run_watch(options: WatchOptions) -> Result<()> {
    let WatchOptions {
        config: config_path,
        out,
        poll,
        poll_interval_ms,
    } = options;

    let (root, config) = load_project(config_path.as_deref(), out.as_deref())?;
    let engine = CommandEngine::from_config(&config.engine);
    let layout = config.layout(&root);
    let ignore_set = scanner::build_globset(&config.ignore)?;

    match build(&root, &config, &engine) {
        Ok(report) => log_report(&report),
        Err(err) => tracing::error!("build failed: {}", err),
    }

    let (tx, rx) = channel();
    let mut watcher: Box<dyn notify::Watcher> = if poll {
        Box::new(
            notify::PollWatcher::new(
                tx,
                notify::Config::default()
                    .with_poll_interval(Duration::from_millis(poll_interval_ms)),
            )
            .map_err(|err| Error::Watch(format!("failed to start poll watcher: {}", err)))?,
        )
    } else {
        Box::new(
            notify::recommended_watcher(tx)
                .map_err(|err| Error::Watch(format!("failed to start watcher: {}", err)))?,
        )
    };

    let config_file = config_path
        .as_deref()
        .map(|path| root.join(path))
        .unwrap_or_else(|| root.join(config::DEFAULT_CONFIG_FILE));
    let mut watched = 0;
    for watch_root in watch_roots(&layout, &config.views, &config_file) {
        if !watch_root.exists() {
            tracing::debug!("not watching missing path {}", watch_root.display());
            continue;
        }
        watcher
            .watch(&watch_root, notify::RecursiveMode::Recursive)
            .map_err(|err| Error::Watch(format!("failed to watch {}: {}", watch_root.display(), err)))?;
        tracing::info!("watching {}", watch_root.display());
        watched += 1;
    }
    if watched == 0 {
        return Err(Error::Watch("nothing to watch".to_string()));
    }

    if poll {
        tracing::info!("watching for changes (polling, press Ctrl+C to stop)...");
    } else {
        tracing::info!("watching for changes (press Ctrl+C to stop)...");
    }

    loop {
        let event = match rx.recv() {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                tracing::warn!("watch error: {}", err);
                continue;
            }
            Err(_) => break,
        };
        if should_ignore_event(&event, &layout, &ignore_set) {
            continue;
        }
        for path in &event.paths {
            tracing::info!("changed: {}", path.display());
        }

        // Coalesce the rest of the burst into this rebuild.
        loop {
            match rx.recv_timeout(WATCH_QUIET_PERIOD) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }

        tracing::info!("change detected, rebuilding...");
        match build(&root, &config, &engine) {
            Ok(report) => log_report(&report),
            Err(err) => tracing::error!("build failed: {}", err),
        }
    }

    Ok(())
}

/// Directories (and the config file) whose changes trigger a rebuild.
fn watch_roots(layout: &Layout, view_patterns: &[String], config_file: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let mut seen = HashSet::new();

    let candidates = std::iter::once(layout.source_dir.clone())
        .chain(view_patterns.iter().map(|pattern| layout.root.join(glob_root(pattern))))
        .chain(std::iter::once(config_file.to_path_buf()));
    for candidate in candidates {
        if seen.insert(candidate.clone()) {
            roots.push(candidate);
        }
    }

    roots
}

fn glob_root(pattern: &str) -> PathBuf {
    let first_meta = pattern.find(['*', '?', '[', '{']);
    let literal = match first_meta {
        Some(idx) => &pattern[..idx],
        None => {
            return Path::new(pattern)
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
        }
    };

    match literal.rfind(['/', '\\']) {
        Some(idx) if idx > 0 => PathBuf::from(&literal[..idx]),
        Some(_) => PathBuf::from("/"),
        None => PathBuf::from("."),
    }
}

/// True when every path of `event` is generated output or ignored.
fn should_ignore_event(event: &notify::Event, layout: &Layout, ignore_set: &GlobSet) -> bool {
    if event.paths.is_empty() {
        return false;
    }
    if matches!(event.kind, notify::EventKind::Access(_)) {
        return true;
    }
    event.paths.iter().all(|path| {
        let relative = path.strip_prefix(&layout.root).unwrap_or(path);
        path.starts_with(&layout.out_dir) || ignore_set.is_match(relative)
    })
}
