use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::config::EngineConfig;
use crate::{Error, Result};

/// Turns authored CSS with `@source` directives into fully expanded CSS.
pub trait ExpansionEngine: Send + Sync {
    /// Expand `input` for `group`, resolving relative references against
    /// `working_dir`.
    fn expand(&self, group: &str, input: &str, working_dir: &Path) -> Result<String>;
}

/// Engine input for a group: its authored CSS followed by one `@source`
/// directive per view file.
pub fn compose_input(source_css: &str, views: &[PathBuf]) -> String {
    let mut input = String::with_capacity(source_css.len() + views.len() * 64);
    input.push_str(source_css);
    if !input.is_empty() && !input.ends_with('\n') {
        input.push('\n');
    }
    for view in views {
        let path = view.to_string_lossy().replace('\\', "/");
        input.push_str(&format!("@source \"{}\";\n", path.replace('"', "\\\"")));
    }
    input
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut args = config.args.clone();
        args.push("--input".to_string());
        args.push("-".to_string());
        Self::new(config.command.clone(), args)
    }
}

impl ExpansionEngine for CommandEngine {
    fn expand(&self, group: &str, input: &str, working_dir: &Path) -> Result<String> {
        tracing::debug!(
            "running {} {} in {}",
            self.program,
            self.args.join(" "),
            working_dir.display()
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::engine(group, format!("failed to start {}: {}", self.program, err)))?;

        // Input is written while stdout and stderr drain; stdin closes when the
        // writer drops it.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(input.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output =
            output.map_err(|err| Error::engine(group, format!("failed to wait for engine: {}", err)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::engine(
                group,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(Error::engine(group, format!("failed to write input: {}", err)));
            }
            Err(_) => return Err(Error::engine(group, "input writer panicked")),
        }
        for line in stderr.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if is_progress_line(line) {
                tracing::debug!("{}: {}", group, line);
            } else {
                tracing::warn!("{}: {}", group, line);
            }
        }

        String::from_utf8(output.stdout)
            .map_err(|err| Error::engine(group, format!("output is not UTF-8: {}", err)))
    }
}

fn is_progress_line(line: &str) -> bool {
    line.starts_with('\u{2248}') || line.starts_with("Done in ")
}

#[cfg(test)]
mod tests {
    use super::{CommandEngine, ExpansionEngine, compose_input, is_progress_line};
    use crate::config::EngineConfig;
    use std::path::{Path, PathBuf};

    #[test]
    fn appends_one_source_directive_per_view() {
        let input = compose_input(
            "@import \"tailwindcss\" source(none);",
            &[PathBuf::from("/app/views/a.html"), PathBuf::from("/app/views/b.html")],
        );
        assert_eq!(
            input,
            "@import \"tailwindcss\" source(none);\n@source \"/app/views/a.html\";\n@source \"/app/views/b.html\";\n"
        );
    }

    #[test]
    fn group_without_views_passes_source_through() {
        assert_eq!(compose_input(".a { color: red; }\n", &[]), ".a { color: red; }\n");
        assert_eq!(compose_input("", &[]), "");
    }

    #[test]
    fn config_engine_reads_from_stdin() {
        let engine = CommandEngine::from_config(&EngineConfig::default());
        assert_eq!(
            engine,
            CommandEngine::new(
                "npx",
                vec!["@tailwindcss/cli".to_string(), "--input".to_string(), "-".to_string()]
            )
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_engine_pipes_input_through() {
        let engine = CommandEngine::new("cat", Vec::new());
        let css = engine
            .expand("theme", ".a { color: red; }\n", Path::new("."))
            .unwrap();
        assert_eq!(css, ".a { color: red; }\n");
    }

    #[cfg(unix)]
    #[test]
    fn large_input_streams_through_without_blocking() {
        let engine = CommandEngine::new("cat", Vec::new());
        let input = ".a { color: red; }\n".repeat(20_000);
        assert!(input.len() > 256 * 1024);

        let css = engine.expand("theme", &input, Path::new(".")).unwrap();
        assert_eq!(css.len(), input.len());
        assert_eq!(css, input);
    }

    #[cfg(unix)]
    #[test]
    fn engine_that_ignores_stdin_still_succeeds_on_small_input() {
        let engine = CommandEngine::new("sh", vec!["-c".to_string(), "printf '.b{}'".to_string()]);
        let css = engine.expand("home", "", Path::new(".")).unwrap();
        assert_eq!(css, ".b{}");
    }

    #[test]
    fn tailwind_banner_lines_are_progress() {
        assert!(is_progress_line("\u{2248} tailwindcss v4.1.3"));
        assert!(is_progress_line("Done in 42ms"));
        assert!(!is_progress_line("warn - unknown utility `p-foo`"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_engine_error() {
        let engine = CommandEngine::new("false", Vec::new());
        let err = engine.expand("home", "", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("expansion of 'home' failed"));
    }

    #[test]
    fn missing_program_is_an_engine_error() {
        let engine = CommandEngine::new("twstrata-no-such-engine", Vec::new());
        assert!(engine.expand("home", "", Path::new(".")).is_err());
    }
}
