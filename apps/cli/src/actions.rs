//! GitHub Actions plumbing: inputs, outputs and workflow-command progress.

use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use archdocs_core::{ProgressReporter, RunResult};
use indicatif::{ProgressBar, ProgressStyle};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Read an action input from `lookup`.
///
/// Docker actions keep hyphens (`INPUT_SITE-NAME`); local runs usually use
/// underscores (`INPUT_SITE_NAME`). Values are trimmed and blanks count as unset.
pub(crate) fn input_from<F>(name: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let upper = name.to_uppercase();
    let value = lookup(&format!("INPUT_{upper}"))
        .filter(|v| !v.trim().is_empty())
        .or_else(|| lookup(&format!("INPUT_{}", upper.replace('-', "_"))))?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Process environment lookup, treating blank values as unset.
pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Append `name=value` to `output_file`, or emit a `::set-output` command without one.
pub(crate) fn write_output(output_file: Option<&Path>, name: &str, value: &str) {
    let Some(path) = output_file else {
        println!("::set-output name={name}::{value}");
        return;
    };

    let appended = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{name}={value}"));
    if let Err(e) = appended {
        println!("::warning::Failed to write output {name}: {e}");
    }
}

/// Set an action output via `$GITHUB_OUTPUT`.
pub(crate) fn set_output(name: &str, value: &str) {
    let output_file = env_var("GITHUB_OUTPUT");
    write_output(output_file.as_deref().map(Path::new), name, value);
}

/// Whether we run inside a GitHub Actions job.
pub(crate) fn in_actions() -> bool {
    env_var("GITHUB_ACTIONS").is_some_and(|v| v == "true")
}

// ---------------------------------------------------------------------------
// Progress reporters
// ---------------------------------------------------------------------------

/// Progress as workflow commands: one collapsible log group per phase.
pub(crate) struct ActionsProgress;

impl ProgressReporter for ActionsProgress {
    fn phase(&self, name: &str) {
        println!("::group::{name}");
    }

    fn phase_done(&self) {
        println!("::endgroup::");
    }

    fn detail(&self, message: &str) {
        println!("{message}");
    }

    fn warning(&self, message: &str) {
        println!("::warning::{message}");
    }

    fn done(&self, _result: &RunResult) {
        println!("Architecture docs generated successfully!");
    }
}

/// CLI progress reporter using an indicatif spinner.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn phase_done(&self) {}

    fn detail(&self, message: &str) {
        self.spinner.println(format!("  {message}"));
    }

    fn warning(&self, message: &str) {
        self.spinner.println(format!("  warning: {message}"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

/// Workflow commands inside Actions or when piped, a spinner on a terminal.
pub(crate) fn reporter() -> Box<dyn ProgressReporter> {
    if in_actions() || !std::io::stdout().is_terminal() {
        Box::new(ActionsProgress)
    } else {
        Box::new(CliProgress::new())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn input_prefers_hyphenated_name() {
        let vars = env(&[
            ("INPUT_SITE-NAME", " Docker Name "),
            ("INPUT_SITE_NAME", "Local Name"),
        ]);
        let lookup = |k: &str| vars.get(k).cloned();
        assert_eq!(input_from("site-name", lookup).as_deref(), Some("Docker Name"));
    }

    #[test]
    fn input_falls_back_to_underscores() {
        let vars = env(&[("INPUT_SITE-NAME", "  "), ("INPUT_SITE_NAME", "Local Name")]);
        let lookup = |k: &str| vars.get(k).cloned();
        assert_eq!(input_from("site-name", lookup).as_deref(), Some("Local Name"));
    }

    #[test]
    fn blank_input_is_unset() {
        let vars = env(&[("INPUT_BASE_URL", " \t ")]);
        let lookup = |k: &str| vars.get(k).cloned();
        assert_eq!(input_from("base-url", lookup), None);
        assert_eq!(input_from("output-dir", |_: &str| None), None);
    }

    #[test]
    fn outputs_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("output");
        std::fs::write(&file, "existing=1\n").unwrap();

        write_output(Some(&file), "site-path", "/work/site");
        write_output(Some(&file), "page-count", "12");

        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "existing=1\nsite-path=/work/site\npage-count=12\n"
        );
    }
}
