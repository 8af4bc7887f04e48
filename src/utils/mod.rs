//! Utilities: logging setup (verbosity flags -> tracing level, optional log file).
//!
//! Key items:
//!   init_logging / derive_level / parse_level
//!
//! Logs never go to stdout: it carries MCP frames (serve) and JSON output (run).

/// Logging helpers.
pub mod logging {
    use anyhow::{Context, Result};
    use std::fs::OpenOptions;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::filter::LevelFilter;

    /// Map -v / -q flags to a level: quiet = error, default info, -v debug, -vv trace.
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Parse an explicit `--log-level` value (case-insensitive).
    pub fn parse_level(raw: &str) -> Option<LevelFilter> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(LevelFilter::TRACE),
            "DEBUG" => Some(LevelFilter::DEBUG),
            "INFO" => Some(LevelFilter::INFO),
            "WARN" | "WARNING" => Some(LevelFilter::WARN),
            "ERROR" => Some(LevelFilter::ERROR),
            "OFF" => Some(LevelFilter::OFF),
            _ => None,
        }
    }

    fn filter(level: LevelFilter) -> EnvFilter {
        // RUST_LOG wins; `level` is only the default directive
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    }

    /// Install the global subscriber, writing to stderr or appending to `log_file`.
    pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter(level))
            .with_target(false);

        match log_file {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).with_context(|| {
                        format!("failed to create log directory: {}", dir.display())
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("failed to open log file: {}", path.display()))?;
                builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
            }
            None => builder.with_writer(std::io::stderr).try_init(),
        }
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
    }
}

pub use logging::{derive_level, init_logging, parse_level};
