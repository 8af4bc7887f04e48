/*!
config.rs - runtime settings.

Precedence (highest first):
  1. CLI flags (applied by main.rs)
  2. Environment: BRIDGE_TARGET, BRIDGE_TIMEOUT_SECS, BRIDGE_LOG_FILE
  3. Config file (--config, JSON or YAML by extension)
  4. Defaults
*/

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{BridgeConfig, DEFAULT_CEILING, DEFAULT_POLL_INTERVAL};

pub const ENV_TARGET: &str = "BRIDGE_TARGET";
pub const ENV_TIMEOUT_SECS: &str = "BRIDGE_TIMEOUT_SECS";
pub const ENV_LOG_FILE: &str = "BRIDGE_LOG_FILE";

pub const DEFAULT_SERVER_NAME: &str = "mcp_bridge";
pub const DEFAULT_MAX_CONCURRENT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base command line every invocation starts from (e.g. "docker")
    pub target: Option<String>,
    /// Bridge wait ceiling
    pub timeout_secs: u64,
    /// How often a blocked wait re-checks for interruption
    pub poll_interval_ms: u64,
    pub server_name: String,
    pub server_version: String,
    /// Upper bound on bridged commands running at once (server mode)
    pub max_concurrent: usize,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target: None,
            timeout_secs: DEFAULT_CEILING.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON or YAML file; missing keys keep defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let lower = path.to_string_lossy().to_ascii_lowercase();

        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            serde_yaml::from_str(&raw).context("failed to parse YAML config file")
        } else {
            serde_json::from_str(&raw).context("failed to parse JSON config file")
        }
    }

    /// Apply environment overrides using `lookup` (usually `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(t) = get(ENV_TARGET) {
            self.target = Some(t);
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"))?;
        }
        if let Some(p) = get(ENV_LOG_FILE) {
            self.log_file = Some(PathBuf::from(p));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be at least one millisecond");
        }
        if self.max_concurrent == 0 {
            bail!("max concurrent commands must be at least 1");
        }
        if self.server_name.trim().is_empty() {
            bail!("server name cannot be empty");
        }
        if let Some(t) = &self.target {
            crate::command::parse_target(t)
                .with_context(|| format!("invalid target '{t}'"))?;
        }
        Ok(())
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            ceiling: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_file(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mcp_bridge_{}_{name}", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_ten_minute_ceiling() {
        let s = Settings::default();
        assert_eq!(s.bridge_config().ceiling, Duration::from_secs(600));
        assert_eq!(s.max_concurrent, 100);
        s.validate().unwrap();
    }

    #[test]
    fn load_yaml_fills_defaults() {
        let path = temp_file("cfg.yaml", "target: docker\ntimeout_secs: 30\n");
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.target.as_deref(), Some("docker"));
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.server_name, DEFAULT_SERVER_NAME);
    }

    #[test]
    fn load_json_and_reject_unknown_keys() {
        let path = temp_file("cfg.json", r#"{ "max_concurrent": 4, "server_name": "ops" }"#);
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.max_concurrent, 4);
        assert_eq!(s.server_name, "ops");

        let bad = temp_file("bad.json", r#"{ "docker_host": "unix:///var/run/docker.sock" }"#);
        assert!(Settings::load(&bad).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_TARGET, "podman"),
            (ENV_TIMEOUT_SECS, " 45 "),
            (ENV_LOG_FILE, ""),
        ]
        .into_iter()
        .collect();
        let mut s = Settings {
            target: Some("docker".into()),
            ..Settings::default()
        };
        s.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.target.as_deref(), Some("podman"));
        assert_eq!(s.timeout_secs, 45);
        assert!(s.log_file.is_none(), "blank env values are ignored");
    }

    #[test]
    fn env_timeout_must_be_numeric() {
        let mut s = Settings::default();
        let err = s
            .apply_env(|k| (k == ENV_TIMEOUT_SECS).then(|| "10m".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        for s in [
            Settings { timeout_secs: 0, ..Settings::default() },
            Settings { poll_interval_ms: 0, ..Settings::default() },
            Settings { max_concurrent: 0, ..Settings::default() },
            Settings { server_name: " ".into(), ..Settings::default() },
            Settings { target: Some("  ".into()), ..Settings::default() },
        ] {
            assert!(s.validate().is_err(), "{s:?}");
        }
    }
}
