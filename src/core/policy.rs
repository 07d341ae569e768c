//! Daemon-level firewalld policy and the managed zone
//!
//! These are emitted once per catalog regardless of how many rules it holds.

use crate::config::PolicyConfig;
use serde::{Deserialize, Serialize};

/// Which denied packets firewalld logs
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogDenied {
    All,
    #[default]
    Unicast,
    Broadcast,
    Multicast,
    Off,
}

/// Packet filtering backend firewalld drives
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FirewallBackend {
    #[default]
    Nftables,
    Iptables,
}

/// Verdict for traffic the zone's rules do not match
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ZoneTarget {
    #[serde(rename = "default")]
    #[strum(serialize = "default")]
    Default,
    #[serde(rename = "ACCEPT")]
    #[strum(serialize = "ACCEPT")]
    Accept,
    #[serde(rename = "REJECT")]
    #[strum(serialize = "REJECT")]
    Reject,
    #[default]
    #[serde(rename = "DROP")]
    #[strum(serialize = "DROP")]
    Drop,
}

/// Global firewalld daemon settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonSettings {
    pub lockdown: bool,
    pub default_zone: String,
    pub log_denied: LogDenied,
    pub firewall_backend: FirewallBackend,
}

impl DaemonSettings {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            lockdown: config.lockdown,
            default_zone: config.default_zone.clone(),
            log_denied: config.log_denied,
            firewall_backend: config.firewall_backend,
        }
    }
}

/// The zone this tool owns outright
///
/// Purging means anything in the zone that the catalog did not put there is removed
/// on apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedZone {
    pub name: String,
    pub target: ZoneTarget,
    pub interfaces: Vec<String>,
    pub purge_rich_rules: bool,
    pub purge_services: bool,
    pub purge_ports: bool,
}

impl ManagedZone {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            name: config.default_zone.clone(),
            target: config.zone_target,
            interfaces: config.zone_interfaces.clone(),
            purge_rich_rules: config.purge,
            purge_services: config.purge,
            purge_ports: config.purge,
        }
    }
}

/// Name prefixes marking ipsets and services as owned by this tool
///
/// Owned resources absent from the catalog are stale and get removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cleanup {
    pub enabled: bool,
    pub ipset_prefix: String,
    pub service_prefix: String,
}

impl Cleanup {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            enabled: config.remove_stale,
            ipset_prefix: config.ipset_prefix.clone(),
            service_prefix: config.service_prefix(),
        }
    }
}
