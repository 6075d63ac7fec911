//! Startup configuration.
//!
//! Resolved once, in order: built-in defaults → JSON config file → environment.
//! The config file is `<config dir>/cinder/config.json` unless `--config` names
//! another one. A missing default file is not an error; a missing explicit one is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use cinder_client::{HttpCompileClient, Sentinel};
use cinder_core::{ConsoleConfig, TranscriptMode};
use serde::{Deserialize, Serialize};

/// Used when neither the config file nor `CINDER_BACKEND_URL` name a service.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Scrollback cap (~256KB). Oldest entries trimmed when exceeded.
pub const DEFAULT_SCROLLBACK_BYTES: usize = 256 * 1024;

pub const ENV_BACKEND_URL: &str = "CINDER_BACKEND_URL";
pub const ENV_TIMEOUT_SECS: &str = "CINDER_TIMEOUT_SECS";
pub const ENV_TRANSCRIPT: &str = "CINDER_TRANSCRIPT";
pub const ENV_SENTINEL: &str = "CINDER_SENTINEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    /// Round-trip deadline. `None` or `0` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// `"reset"` or `"scrollback"`.
    pub transcript: String,
    pub scrollback_bytes: usize,
    /// Override for the waiting-for-input marker.
    pub sentinel: Option<String>,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: None,
            transcript: "reset".to_string(),
            scrollback_bytes: DEFAULT_SCROLLBACK_BYTES,
            sentinel: None,
            language: "c".to_string(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "cinder", "cinder")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        // 0 means no deadline, as for the environment variable.
        config.timeout_secs = config.timeout_secs.filter(|secs| *secs > 0);
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            self.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(mode) = lookup(ENV_TRANSCRIPT).filter(|v| !v.trim().is_empty()) {
            self.transcript = mode;
        }
        if let Some(marker) = lookup(ENV_SENTINEL).filter(|v| !v.is_empty()) {
            self.sentinel = Some(marker);
        }
        Ok(())
    }

    /// Defaults → file → environment.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::info!("Compile service: {}", config.backend_url);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("backend_url must be an http(s) URL, got {:?}", self.backend_url);
        }
        self.transcript_mode()?;
        Ok(())
    }

    pub fn transcript_mode(&self) -> Result<TranscriptMode> {
        TranscriptMode::from_str(&self.transcript).ok_or_else(|| {
            anyhow!(
                "Unknown transcript mode {:?} (expected \"reset\" or \"scrollback\")",
                self.transcript
            )
        })
    }

    pub fn console_config(&self) -> Result<ConsoleConfig> {
        Ok(ConsoleConfig {
            mode: self.transcript_mode()?,
            scrollback_limit: Some(self.scrollback_bytes),
        })
    }

    pub fn build_client(&self) -> HttpCompileClient {
        let mut client = HttpCompileClient::new(&self.backend_url);
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            client = client.with_timeout(Duration::from_secs(secs));
        }
        if let Some(marker) = &self.sentinel {
            client = client.with_sentinel(Sentinel::new(marker.clone()));
        }
        client
    }
}

// ────────────────────────────────────────────────────────────────
// Command line
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Source file to edit and run. Falls back to the built-in sample.
    pub source: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub help: bool,
}

pub const USAGE: &str = "usage: cinder [--config <path>] [source-file]";

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => out.help = true,
            "-c" | "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config needs a path\n{}", USAGE))?;
                out.config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => bail!("Unknown option {}\n{}", flag, USAGE),
            path => {
                if out.source.is_some() {
                    bail!("Only one source file may be given\n{}", USAGE);
                }
                out.source = Some(PathBuf::from(path));
            }
        }
    }
    Ok(out)
}
