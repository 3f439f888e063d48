//! Execution of external lifecycle commands.
//!
//! Every interaction with the ledger goes through an external CLI. A
//! `CommandSpec` describes one invocation fully (program, arguments and
//! environment); a `CommandRunner` executes it and captures both output
//! streams. The peer CLI writes its logs to stderr, so values such as the
//! package identifier have to be searched for in the diagnostic stream.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ExecError;

/// Executable specification for one external operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its value
    pub fn flag(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.into());
        self
    }

    /// Set an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(|value| value.as_str())
    }

    /// All values following each occurrence of `flag`.
    pub fn flag_values(&self, flag: &str) -> Vec<&str> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of one external operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// First match of `pattern` in the diagnostic stream.
    pub fn find_in_diagnostics(&self, pattern: &Regex) -> Option<String> {
        pattern
            .find(&self.stderr)
            .map(|found| found.as_str().to_string())
    }
}

/// Executes external operations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, failing on a non-zero exit.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;
}

/// Runs commands as child processes of the coordinator.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        tracing::debug!(command = %spec, "running external command");

        let output = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        // The peer CLI logs everything to stderr
        if !captured.stderr.is_empty() {
            tracing::debug!(program = %spec.program, "{}", captured.stderr.trim_end());
        }

        if !output.status.success() {
            return Err(ExecError::Exit {
                program: spec.program.clone(),
                code: output.status.code(),
                output: captured,
            });
        }

        Ok(captured)
    }
}
