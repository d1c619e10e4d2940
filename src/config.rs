//! Configuration for the mock server.
//!
//! Defines the listener address and logging switches.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Port the mock listener binds to.
pub const DEFAULT_PORT: u16 = 7070;

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Interface to listen on
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests that fall through to 404
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_matches: true,
            log_unmatched: true,
        }
    }
}

impl Settings {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("Listener port must be non-zero");
        }
        Ok(())
    }

    /// Address the listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
