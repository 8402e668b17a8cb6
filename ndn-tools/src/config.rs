//! Load config from file and environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndn_core::FaceConfig;
use serde::Deserialize;

/// Default NFD port for TCP faces.
pub const DEFAULT_TCP_PORT: u16 = 6363;

/// Client configuration. File: ~/.ndn/client.toml or /etc/ndn/client.toml.
/// Env overrides: NDN_CLIENT_TRANSPORT, NDN_CLIENT_LIFETIME_MS, NDN_LOG_FORMAT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Forwarder endpoint (default unix:///run/nfd.sock).
    #[serde(default = "default_transport")]
    pub transport: TransportUri,
    /// Log output: "compact" or "json".
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub face: FaceConfig,
}

fn default_transport() -> TransportUri {
    TransportUri::Unix(PathBuf::from("/run/nfd.sock"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            log_format: LogFormat::default(),
            face: FaceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::LogFormat(s.to_owned())),
        }
    }
}

/// Where the forwarder listens: `unix:///path` or `tcp://host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportUri {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported transport URI {0:?} (expected unix:// or tcp://)")]
    Transport(String),
    #[error("unknown log format {0:?}")]
    LogFormat(String),
}

impl FromStr for TransportUri {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Transport(s.to_owned());
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        let authority = s.strip_prefix("tcp://").ok_or_else(invalid)?;
        let authority = authority.trim_end_matches('/');
        let (host, port) = match authority.rsplit_once(':') {
            // Bracketed IPv6 without a port has a ':' inside the brackets.
            Some((host, port)) if !port.ends_with(']') => {
                (host, port.parse().map_err(|_| invalid())?)
            }
            _ => (authority, DEFAULT_TCP_PORT),
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Tcp {
            host: host.to_owned(),
            port,
        })
    }
}

impl fmt::Display for TransportUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

impl<'de> Deserialize<'de> for TransportUri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A setting that was ignored. Collected while loading and logged once the
/// subscriber is installed.
#[derive(Debug, thiserror::Error)]
pub enum Diagnostic {
    #[error("ignoring config file {}: {reason}", .path.display())]
    File { path: PathBuf, reason: String },
    #[error("ignoring {var}={value:?}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> (Config, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut c = match load_file() {
        Some(Ok(c)) => c,
        Some(Err(d)) => {
            diagnostics.push(d);
            Config::default()
        }
        None => Config::default(),
    };
    diagnostics.extend(apply_env(&mut c, |key| std::env::var(key).ok()));
    (c, diagnostics)
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) -> Vec<Diagnostic> {
    let mut ignored = Vec::new();
    let mut reject = |var: &'static str, value: String, reason: String| {
        ignored.push(Diagnostic::Env { var, value, reason })
    };
    if let Some(s) = var("NDN_CLIENT_TRANSPORT") {
        match s.parse() {
            Ok(t) => c.transport = t,
            Err(e) => reject("NDN_CLIENT_TRANSPORT", s, ConfigError::to_string(&e)),
        }
    }
    if let Some(s) = var("NDN_CLIENT_LIFETIME_MS") {
        match s.parse::<u64>() {
            Ok(ms) => c.face.default_interest_lifetime_ms = ms,
            Err(e) => reject("NDN_CLIENT_LIFETIME_MS", s, e.to_string()),
        }
    }
    if let Some(s) = var("NDN_LOG_FORMAT") {
        match s.parse() {
            Ok(format) => c.log_format = format,
            Err(e) => reject("NDN_LOG_FORMAT", s, ConfigError::to_string(&e)),
        }
    }
    ignored
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".ndn/client.toml"));
    }
    out.push(PathBuf::from("/etc/ndn/client.toml"));
    out
}

fn load_file() -> Option<Result<Config, Diagnostic>> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    Some(parse_file(&path))
}

fn parse_file(path: &Path) -> Result<Config, Diagnostic> {
    let ignored = |reason: String| Diagnostic::File {
        path: path.to_owned(),
        reason,
    };
    let s = std::fs::read_to_string(path).map_err(|e| ignored(e.to_string()))?;
    toml::from_str::<Config>(&s).map_err(|e| ignored(e.to_string()))
}
