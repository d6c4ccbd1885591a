//! Configuration types for the Joyride DNS service
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted delay between hosts scans (one day)
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Main Joyride configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoyrideConfig {
    /// DNS responder configuration
    #[serde(default)]
    pub dns: DnsConfig,

    /// Hosts directory detector configuration
    #[serde(default)]
    pub hosts: HostsConfig,
}

impl JoyrideConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.dns.validate()?;
        self.hosts.validate()?;
        Ok(())
    }
}

/// DNS responder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address the UDP socket binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port the responder listens on
    #[serde(default = "default_dns_port")]
    pub port: u16,
}

impl DnsConfig {
    /// Create a configuration listening on the given socket address
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            bind_address: listen_addr.ip(),
            port: listen_addr.port(),
        }
    }

    /// Socket address the responder binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate the DNS configuration
    ///
    /// Port 0 is accepted and means "pick an ephemeral port".
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.bind_address.is_multicast() {
            return Err(crate::Error::config(format!(
                "DNS bind address cannot be multicast: {}",
                self.bind_address
            )));
        }
        Ok(())
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_dns_port(),
        }
    }
}

/// Hosts directory detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Directory containing hosts-formatted files
    #[serde(default = "default_hosts_directory")]
    pub directory: PathBuf,

    /// Delay between directory scans (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Re-publish detected deltas as `dns.*` / `file.*` events
    #[serde(default = "default_publish_events")]
    pub publish_events: bool,
}

impl HostsConfig {
    /// Create a configuration watching the given directory
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Set the scan interval
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Enable or disable event publishing
    pub fn with_publish_events(mut self, publish: bool) -> Self {
        self.publish_events = publish;
        self
    }

    /// Scan interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the hosts configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.directory.as_os_str().is_empty() {
            return Err(crate::Error::config("Hosts directory cannot be empty"));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Hosts poll interval must be > 0"));
        }
        if self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Hosts poll interval must be at most {} seconds, got {}",
                MAX_POLL_INTERVAL_SECS, self.poll_interval_secs
            )));
        }
        Ok(())
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            directory: default_hosts_directory(),
            poll_interval_secs: default_poll_interval_secs(),
            publish_events: default_publish_events(),
        }
    }
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_dns_port() -> u16 {
    53
}

fn default_hosts_directory() -> PathBuf {
    PathBuf::from("/app/hosts")
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_publish_events() -> bool {
    true
}
