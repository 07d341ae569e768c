//! Rule declarations and validated rule specifications
//!
//! A [`RuleDecl`] is the raw declarative input as it appears in a rules document.
//! Everything in it is a string or a number so that bad values surface as
//! [`Error::InvalidRuleSpec`]/[`Error::InvalidAddress`] with the rule title attached,
//! instead of as anonymous JSON errors.
//!
//! [`RuleSpec::from_decl`] validates a declaration against the policy configuration and
//! produces the immutable [`RuleSpec`] the expander consumes.
//!
//! # Example
//!
//! ```
//! use simpfw::config::PolicyConfig;
//! use simpfw::core::rule::{Protocol, RuleDecl, RuleSpec};
//!
//! let decl = RuleDecl::new("allow_tcp_listen", "tcp")
//!     .with_trusted_nets(["1.2.3.4/24", "3.4.5.6", "5.6.7.8/32"])
//!     .with_dports([1234u16]);
//!
//! let spec = RuleSpec::from_decl(&decl, &PolicyConfig::default()).unwrap();
//! assert_eq!(spec.protocol, Protocol::Tcp);
//! assert_eq!(spec.order, 11);
//! assert_eq!(spec.zone, "99_simp");
//! ```

use super::address::{AddressToken, classify};
use super::error::{Error, Result};
use super::rule_constraints::protocol_supports_ports;
use crate::config::PolicyConfig;
use crate::validators;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Highest rule order accepted (firewalld rich-rule priorities are 16-bit signed)
pub const MAX_ORDER: i64 = 32_767;

/// Network protocol matched by a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    /// Match all traffic from the source
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "icmp")]
    Icmp,
    /// IPsec Authentication Header
    #[strum(serialize = "ah")]
    Ah,
    /// IPsec Encapsulating Security Payload
    #[strum(serialize = "esp")]
    Esp,
}

impl Protocol {
    pub const fn as_str(self) -> &'static str {
        match self {
            Protocol::All => "all",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Ah => "ah",
            Protocol::Esp => "esp",
        }
    }
}

/// Rule action
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
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Action {
    #[default]
    #[strum(serialize = "accept")]
    Accept,
    #[strum(serialize = "drop")]
    Drop,
    #[strum(serialize = "reject")]
    Reject,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Drop => "drop",
            Action::Reject => "reject",
        }
    }
}

/// Address families a rule expands into
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
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ApplyTo {
    #[default]
    #[strum(serialize = "any")]
    Any,
    #[strum(serialize = "ipv4")]
    Ipv4,
    #[strum(serialize = "ipv6")]
    Ipv6,
}

/// Address family of a concrete rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[strum(serialize = "ipv4")]
    Ipv4,
    #[strum(serialize = "ipv6")]
    Ipv6,
}

impl Family {
    pub const fn as_str(self) -> &'static str {
        match self {
            Family::Ipv4 => "ipv4",
            Family::Ipv6 => "ipv6",
        }
    }

    /// Family name as used by firewalld ipset definitions
    pub const fn ipset_family(self) -> &'static str {
        match self {
            Family::Ipv4 => "inet",
            Family::Ipv6 => "inet6",
        }
    }

    pub fn of(net: &IpNetwork) -> Self {
        if net.is_ipv4() {
            Family::Ipv4
        } else {
            Family::Ipv6
        }
    }

    /// The full-range network of this family (`0.0.0.0/0` or `::/0`)
    pub fn wildcard(self) -> IpNetwork {
        let ip = match self {
            Family::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Family::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        IpNetwork::new(ip, 0).expect("prefix 0 is valid for both families")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = String;

    /// Parses `22`, `1000:2000`, or `1000-2000`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = match s.split_once([':', '-']) {
            Some((start, end)) => (start, end),
            None => (s, s),
        };

        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{s}'"))
        };

        let (start, end) = validators::validate_port_range(parse(start)?, parse(end)?)
            .map_err(|e| format!("port '{s}': {e}"))?;
        Ok(Self { start, end })
    }
}

/// A single `dports` entry as written: a number or a range string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    fn to_range(&self) -> std::result::Result<PortRange, String> {
        match self {
            PortValue::Number(n) => {
                let port = u16::try_from(*n).map_err(|_| format!("port {n} out of range"))?;
                validators::validate_port(port).map(PortRange::single)
            }
            PortValue::Text(s) => s.parse(),
        }
    }
}

impl From<u16> for PortValue {
    fn from(port: u16) -> Self {
        PortValue::Number(i64::from(port))
    }
}

impl From<&str> for PortValue {
    fn from(s: &str) -> Self {
        PortValue::Text(s.to_string())
    }
}

/// `dports` accepts one entry or a list of entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Dports {
    One(PortValue),
    Many(Vec<PortValue>),
}

impl Dports {
    fn values(&self) -> &[PortValue] {
        match self {
            Dports::One(v) => std::slice::from_ref(v),
            Dports::Many(vs) => vs,
        }
    }
}

/// A rule exactly as declared in a rules document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    pub title: String,
    pub protocol: String,
    /// Falls back to the configured default trusted networks when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_nets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dports: Option<Dports>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl RuleDecl {
    pub fn new(title: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            protocol: protocol.into(),
            trusted_nets: None,
            dports: None,
            order: None,
            apply_to: None,
            zone: None,
            action: None,
        }
    }

    pub fn with_trusted_nets<I, S>(mut self, nets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_nets = Some(nets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dports<I, P>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PortValue>,
    {
        self.dports = Some(Dports::Many(ports.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_apply_to(mut self, apply_to: impl Into<String>) -> Self {
        self.apply_to = Some(apply_to.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// A validated rule, ready for expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub title: String,
    pub protocol: Protocol,
    /// De-duplicated, in declaration order
    pub ports: Vec<PortRange>,
    /// Classified trusted networks, in declaration order
    pub trusted_nets: Vec<AddressToken>,
    pub order: u16,
    pub apply_to: ApplyTo,
    pub zone: String,
    pub action: Action,
}

impl RuleSpec {
    /// Validates a declaration, filling unset fields from the policy configuration.
    ///
    /// The whole declaration is rejected on the first problem; no partially valid
    /// spec is ever produced.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - the title is empty or unusable as a service name
    /// - protocol, `apply_to`, or action is not a known value
    /// - ports are malformed, or given for a protocol without ports
    /// - order is outside `0..=32767`
    /// - the zone name is invalid
    /// - any trusted network is malformed
    pub fn from_decl(decl: &RuleDecl, config: &PolicyConfig) -> Result<Self> {
        let title = decl.title.trim();
        validators::validate_title(title).map_err(|e| Error::invalid_rule(&decl.title, e))?;

        let protocol = Protocol::from_str(decl.protocol.trim()).map_err(|_| {
            Error::invalid_rule(
                title,
                format!(
                    "unknown protocol '{}' (expected all, tcp, udp, icmp, ah, esp)",
                    decl.protocol
                ),
            )
        })?;

        let ports = Self::parse_ports(title, protocol, decl.dports.as_ref())?;

        let apply_to = match decl.apply_to.as_deref() {
            Some(value) => ApplyTo::from_str(value.trim()).map_err(|_| {
                Error::invalid_rule(
                    title,
                    format!("apply_to '{value}' must be one of: any, ipv4, ipv6"),
                )
            })?,
            None => ApplyTo::default(),
        };

        let action = match decl.action.as_deref() {
            Some(value) => Action::from_str(value.trim()).map_err(|_| {
                Error::invalid_rule(
                    title,
                    format!("action '{value}' must be one of: accept, drop, reject"),
                )
            })?,
            None => Action::default(),
        };

        let order = decl.order.unwrap_or(i64::from(config.default_order));
        let order = u16::try_from(order)
            .ok()
            .filter(|o| i64::from(*o) <= MAX_ORDER)
            .ok_or_else(|| {
                Error::invalid_rule(title, format!("order {order} must be between 0 and {MAX_ORDER}"))
            })?;

        let zone = decl
            .zone
            .as_deref()
            .map_or_else(|| config.default_zone.clone(), |z| z.trim().to_string());
        validators::validate_zone_name(&zone).map_err(|e| Error::invalid_rule(title, e))?;

        let nets = decl
            .trusted_nets
            .as_ref()
            .unwrap_or(&config.default_trusted_nets);
        let trusted_nets = nets
            .iter()
            .map(|token| classify(token).map_err(|e| e.in_rule(title)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            title: title.to_string(),
            protocol,
            ports,
            trusted_nets,
            order,
            apply_to,
            zone,
            action,
        })
    }

    fn parse_ports(title: &str, protocol: Protocol, dports: Option<&Dports>) -> Result<Vec<PortRange>> {
        let values = dports.map(Dports::values).unwrap_or_default();

        if !values.is_empty() && !protocol_supports_ports(protocol) {
            return Err(Error::invalid_rule(
                title,
                format!("protocol '{protocol}' does not use ports, remove dports"),
            ));
        }

        let mut ports: Vec<PortRange> = Vec::with_capacity(values.len());
        for value in values {
            let range = value.to_range().map_err(|e| Error::invalid_rule(title, e))?;
            if !ports.contains(&range) {
                ports.push(range);
            }
        }
        Ok(ports)
    }
}
