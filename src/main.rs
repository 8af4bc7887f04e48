use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mcp_bridge::cmd::{self, RunArgs, ServeArgs};
use mcp_bridge::config::Settings;
use mcp_bridge::utils;

/// MCP Bridge - run a command to completion and hand back one result.
///
/// Command layout:
///   mcp-bridge run [ARGS...] [--mode last|first|collect] [--json]
///   mcp-bridge serve [--server-name N] [--server-version V] [--max-concurrent N]
///
/// Global flags / env:
///   -v / -vv           Increase verbosity
///   -q / --quiet       Errors only
///   -t / --target      Base command line (or BRIDGE_TARGET env)
///   -c / --config      JSON or YAML settings file
///   --log-file         Append logs to a file (or BRIDGE_LOG_FILE env)
///   --log-level        Explicit level, overrides -v / -q
///   --timeout          Wait ceiling in seconds (or BRIDGE_TIMEOUT_SECS env; default 600)
///
/// Modes:
///   last     - final output line (empty if none)
///   first    - first output line; the command is stopped early
///   collect  - every output line, newline-joined
///
/// Examples:
///   mcp-bridge -t docker run ps --format '{{.Names}}' --mode collect
///   mcp-bridge run --json -- git rev-parse HEAD
///   mcp-bridge -t docker --timeout 120 serve
#[derive(Parser, Debug)]
#[command(
    name = "mcp-bridge",
    version,
    author,
    about = "MCP Bridge - blocking command execution for CLIs and MCP clients",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Base command line every invocation starts from
    #[arg(short = 't', long = "target", global = true, value_name = "TARGET")]
    target: Option<String>,

    /// Settings file (.json, .yaml, .yml)
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long = "log-file", global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Wait ceiling in seconds
    #[arg(long = "timeout", global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command once and print its result
    Run(RunArgs),

    /// Serve the bridge as an MCP stdio server
    Serve(ServeArgs),
}

impl Cli {
    /// Config file, then environment, then flags.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;

        if let Some(t) = &self.target {
            settings.target = Some(t.clone());
        }
        if let Some(secs) = self.timeout {
            settings.timeout_secs = secs;
        }
        if let Some(path) = &self.log_file {
            settings.log_file = Some(path.clone());
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match cli.settings().and_then(|s| s.validate().map(|_| s)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };

    let level = match cli.log_level.as_deref() {
        Some(raw) => match utils::parse_level(raw) {
            Some(level) => level,
            None => {
                eprintln!("Invalid log level '{raw}'");
                std::process::exit(2);
            }
        },
        None => utils::derive_level(cli.verbose, cli.quiet),
    };
    utils::init_logging(level, settings.log_file.as_deref())?;

    match cli.command {
        Commands::Run(args) => cmd::execute_run(args, &settings),
        Commands::Serve(args) => cmd::execute_serve(args, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_trailing_command() {
        let cli = Cli::try_parse_from([
            "mcp-bridge", "--timeout", "5", "run", "--mode", "collect", "--", "ls", "-la",
        ])
        .unwrap();
        assert_eq!(cli.timeout, Some(5));
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.mode, cmd::Mode::Collect);
                assert_eq!(args.args, vec!["ls", "-la"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from(["mcp-bridge", "-t", "docker", "--timeout", "9", "serve"]).unwrap();
        let s = cli.settings().unwrap();
        assert_eq!(s.target.as_deref(), Some("docker"));
        assert_eq!(s.timeout_secs, 9);
    }
}
