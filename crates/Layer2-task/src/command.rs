//! Command building - turns a project and launch options into a process

use crate::process::LaunchOptions;
use ralph_foundation::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Environment every agent runs with: no TUI rendering, no colors
pub const AGENT_ENV: [(&str, &str); 3] = [("TERM", "dumb"), ("NO_COLOR", "1"), ("FORCE_COLOR", "0")];

/// Task files handed to the JSON tracker, first existing one wins
const PRD_CANDIDATES: [&str; 3] = ["tasks/tasks.json", ".ralph-tui/tasks.json", "prd.json"];

/// Fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: AGENT_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-quoted rendering for logs and status.
    pub fn display(&self) -> String {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(joined) => joined,
            Err(_) => std::iter::once(program.to_string())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Process builder with piped output streams and the agent environment.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Builds the command a launch runs
pub trait CommandBuilder: Send + Sync {
    fn build(&self, project: &str, workdir: &Path, options: &LaunchOptions) -> Result<CommandSpec>;
}

// ============================================================================
// RalphCommandBuilder
// ============================================================================

/// `ralph-tui run` for a project directory
#[derive(Debug, Clone)]
pub struct RalphCommandBuilder {
    executable: String,
}

impl RalphCommandBuilder {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Absolute path from `PATH` when found, the configured name otherwise
    /// (so a missing binary surfaces as a spawn failure, not a build error).
    pub fn program(&self) -> PathBuf {
        which::which(&self.executable).unwrap_or_else(|_| PathBuf::from(&self.executable))
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.executable).is_ok()
    }

    fn find_prd(workdir: &Path) -> Option<PathBuf> {
        PRD_CANDIDATES
            .iter()
            .map(|candidate| workdir.join(candidate))
            .find(|path| path.is_file())
    }
}

impl Default for RalphCommandBuilder {
    fn default() -> Self {
        Self::new("ralph-tui")
    }
}

impl CommandBuilder for RalphCommandBuilder {
    fn build(&self, project: &str, workdir: &Path, options: &LaunchOptions) -> Result<CommandSpec> {
        if options.max_iterations == 0 {
            return Err(Error::InvalidInput(
                "max_iterations must be greater than zero".into(),
            ));
        }

        let mut spec = CommandSpec::new(self.program(), workdir)
            .arg("run")
            .args(["--project", project])
            .args(["--max-iterations".to_string(), options.max_iterations.to_string()])
            .args(["--tracker", "json"]);

        if let Some(prd) = Self::find_prd(workdir) {
            spec = spec.arg("--prd").arg(prd.to_string_lossy());
        }
        if options.headless {
            spec = spec.arg("--headless");
        }
        if let Some(model) = &options.model {
            spec = spec.args(["--model", model.as_str()]);
        }
        if let Some(agent) = &options.agent {
            spec = spec.args(["--agent", agent.as_str()]);
        }
        Ok(spec)
    }
}
