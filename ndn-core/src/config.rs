//! Face configuration. Hosts load it however they like and pass it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Tunables for one [`Face`](crate::face::Face).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaceConfig {
    /// Lifetime of Interests that do not set one (default 4000 ms).
    #[serde(default = "default_interest_lifetime_ms")]
    pub default_interest_lifetime_ms: u64,
    /// Prefix of forwarder management commands (default /localhost/nfd).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: Name,
    /// Command Interest lifetime (default 10000 ms).
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_interest_lifetime_ms() -> u64 {
    4000
}
fn default_command_prefix() -> Name {
    Name::from_components(["localhost".into(), "nfd".into()])
}
fn default_command_timeout_ms() -> u64 {
    10_000
}

impl FaceConfig {
    pub fn default_interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.default_interest_lifetime_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            default_interest_lifetime_ms: default_interest_lifetime_ms(),
            command_prefix: default_command_prefix(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}
