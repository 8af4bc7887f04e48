/*!
Result mode for bridged commands.

Variants:
  last    (final stdout line)
  first   (first stdout line; the command is stopped early)
  collect (all stdout lines joined with '\n')

Helpers:
  - variants()
  - from_str_ci()
  - strategy()
*/

use std::fmt;

use crate::bridge::{self, Strategy};

/// How streamed output lines are reduced to a single result.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Last line wins
    #[default]
    Last,
    /// Stop after the first line
    First,
    /// Every line, newline-joined
    Collect,
}

impl Mode {
    /// Return a static slice of all variants (order matters for help display).
    pub const fn variants() -> &'static [Mode] {
        &[Mode::Last, Mode::First, Mode::Collect]
    }

    /// Case-insensitive parser not relying on `clap`, used for MCP tool arguments.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "last" => Some(Mode::Last),
            "first" => Some(Mode::First),
            "collect" | "all" => Some(Mode::Collect),
            _ => None,
        }
    }

    /// Build the strategy implementing this mode; `label` tags trace output.
    pub fn strategy(&self, label: &str) -> Strategy<String> {
        let base = bridge::trace_steps(label.to_string()).and_then(bridge::propagate_errors());
        match self {
            Mode::Last => base.and_then(bridge::keep_last_or(String::new())),
            Mode::First => base.and_then(bridge::first_value()),
            Mode::Collect => base.and_then(bridge::fold(String::new(), |acc, line: &String| {
                if acc.is_empty() {
                    line.clone()
                } else {
                    format!("{acc}\n{line}")
                }
            })),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Last => "last",
            Mode::First => "first",
            Mode::Collect => "collect",
        };
        f.write_str(s)
    }
}

/// Output lines are trimmed of trailing whitespace (and `\r`) before any
/// strategy sees them. Applying it twice is a no-op.
pub fn normalize_line(line: String) -> String {
    let trimmed = line.trim_end();
    if trimmed.len() == line.len() {
        line
    } else {
        trimmed.to_string()
    }
}

/* --------------------------------- Tests ---------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Bridge, BridgeError};
    use crate::command::scripted::{Event, ScriptedCommand};
    use std::time::Duration;

    fn run(mode: Mode, lines: &[&str]) -> Result<String, BridgeError> {
        let command = ScriptedCommand::values(lines.iter().map(|l| l.to_string()).collect());
        Bridge::with_ceiling(Duration::from_secs(2)).run_with(
            command,
            normalize_line,
            mode.strategy("test"),
        )
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(Mode::from_str_ci("LAST"), Some(Mode::Last));
        assert_eq!(Mode::from_str_ci(" first "), Some(Mode::First));
        assert_eq!(Mode::from_str_ci("all"), Some(Mode::Collect));
        assert_eq!(Mode::from_str_ci("middle"), None);
        assert_eq!(Mode::variants().len(), 3);
    }

    #[test]
    fn display_output() {
        for m in Mode::variants() {
            assert_eq!(Mode::from_str_ci(&m.to_string()), Some(*m));
        }
    }

    #[test]
    fn modes_reduce_lines() {
        let lines = ["alpha \r", "beta", "gamma  "];
        assert_eq!(run(Mode::Last, &lines).unwrap(), "gamma");
        assert_eq!(run(Mode::First, &lines).unwrap(), "alpha");
        assert_eq!(run(Mode::Collect, &lines).unwrap(), "alpha\nbeta\ngamma");
    }

    #[test]
    fn empty_output_per_mode() {
        assert_eq!(run(Mode::Last, &[]).unwrap(), "");
        assert_eq!(run(Mode::Collect, &[]).unwrap(), "");
        assert!(matches!(run(Mode::First, &[]), Err(BridgeError::Execution(_))));
    }

    #[test]
    fn errors_propagate_in_every_mode() {
        for mode in Mode::variants() {
            let command = ScriptedCommand::new(vec![
                Event::Start,
                Event::Error("no such container"),
                Event::Close,
            ]);
            let err = Bridge::with_ceiling(Duration::from_secs(2))
                .run(command, mode.strategy("test"))
                .unwrap_err();
            assert_eq!(err.kind(), "execution", "mode {mode}");
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_line("x \t\r".to_string());
        assert_eq!(once, "x");
        assert_eq!(normalize_line(once.clone()), once);
    }
}
