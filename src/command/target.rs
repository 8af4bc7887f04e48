//! Command-line target parsing.
//!
//! parse_target -> CommandSpec { original, program, args }
//! Shell-style splitting (quotes, escapes) via `shell-words`.

use anyhow::{Context, Result, bail};
use shell_words::split as shell_split;
use std::fmt;

/// A parsed local command invocation.
///
/// Retains the original input for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub original: String,
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Append extra arguments, given as a shell-style string.
    pub fn with_args(&self, extra: &str) -> Result<CommandSpec> {
        let mut spec = self.clone();
        let parts = shell_split(extra.trim())
            .with_context(|| format!("Failed to parse arguments: '{extra}'"))?;
        spec.args.extend(parts);
        Ok(spec)
    }

    /// Append already-split arguments.
    pub fn with_arg_list(&self, extra: &[String]) -> CommandSpec {
        let mut spec = self.clone();
        spec.args.extend(extra.iter().cloned());
        spec
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Parse a `--target` value (or a tool's command line) into a [`CommandSpec`].
///
/// Examples:
/// - "docker" -> program "docker", no args
/// - "docker ps --format '{{.Names}}'" -> program "docker", 3 args
pub fn parse_target(raw: &str) -> Result<CommandSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Target string is empty");
    }

    let parts =
        shell_split(trimmed).context("Failed to parse command line (shell splitting)")?;
    let Some((program, args)) = parts.split_first() else {
        bail!("No tokens produced when parsing command target");
    };
    if program.is_empty() {
        bail!("Empty program name in command target");
    }
    Ok(CommandSpec {
        original: raw.to_string(),
        program: program.clone(),
        args: args.to_vec(),
    })
}
