//! Rule expansion
//!
//! Fans one [`RuleSpec`] out into concrete per-family rules. For each family that
//! survives partitioning:
//!
//! | Networks in the family | Rule source                                   |
//! |------------------------|-----------------------------------------------|
//! | 0                      | no rule                                       |
//! | 1                      | the network itself, inline                    |
//! | 2 or more              | an ipset named by the set's derived identifier |
//!
//! A full-range entry collapses each family to its single inline wildcard, so a
//! wildcard never goes through the ipset path.

use super::error::{Error, Result};
use super::identifier::{DerivedIdentifier, derive};
use super::partition::{NetworkSet, partition};
use super::rule::{Action, Family, RuleSpec};
use super::rule_constraints::{protocol_match_value, protocol_supports_ports, requires_custom_service};
use crate::config::PolicyConfig;
use ipnetwork::IpNetwork;
use serde::Serialize;

/// firewalld ipset type used for every derived set; it accepts host and network entries
pub const IPSET_TYPE: &str = "hash:net";

/// Where a concrete rule takes its source addresses from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RuleSource {
    /// A single network written straight into the rule
    Address(IpNetwork),
    /// A named ipset
    Ipset { ipset: String },
}

impl RuleSource {
    /// `true` for an inline `0.0.0.0/0` or `::/0`
    pub fn is_full_range(&self) -> bool {
        matches!(self, RuleSource::Address(net) if net.prefix() == 0)
    }
}

/// What a concrete rule matches beyond its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// Source only (`protocol: all`)
    Source,
    /// A bare protocol match, e.g. `esp` or `ipv6-icmp`
    Protocol(&'static str),
    /// Ports bundled into the rule's custom service
    Service,
}

/// One realized rule for one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteRule {
    pub family: Family,
    pub source: RuleSource,
    /// Identifier of the source set, whether or not an ipset backs it
    pub identifier: DerivedIdentifier,
    pub matcher: RuleMatch,
    pub action: Action,
    pub order: u16,
}

/// A named ipset to be created for a rule source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpsetResource {
    pub name: String,
    /// Serialized as firewalld spells it (`inet`/`inet6`)
    #[serde(serialize_with = "ipset_family")]
    pub family: Family,
    #[serde(rename = "type")]
    pub ipset_type: &'static str,
    pub entries: Vec<String>,
}

fn ipset_family<S: serde::Serializer>(
    family: &Family,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(family.ipset_family())
}

/// Non-fatal advisory surfaced alongside a rule's resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub name: String,
    pub message: String,
    pub loglevel: &'static str,
}

/// Everything one rule expands into, before zone binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub rules: Vec<ConcreteRule>,
    pub ipsets: Vec<IpsetResource>,
    pub diagnostic: Option<Notification>,
}

/// Expands a rule into concrete per-family rules.
///
/// # Errors
///
/// Returns `Err` if the rule carries ports for a protocol without ports. Rules built
/// through [`RuleSpec::from_decl`] never do; hand-built ones are checked here.
///
/// # Examples
///
/// ```
/// use simpfw::config::PolicyConfig;
/// use simpfw::core::expand::{expand, RuleSource};
/// use simpfw::core::rule::{RuleDecl, RuleSpec};
///
/// let config = PolicyConfig::default();
/// let decl = RuleDecl::new("allow_tcp_listen", "tcp")
///     .with_trusted_nets(["1.2.3.4/24", "3.4.5.6", "5.6.7.8/32"])
///     .with_dports([1234u16]);
/// let spec = RuleSpec::from_decl(&decl, &config).unwrap();
///
/// let expansion = expand(&spec, &config).unwrap();
/// assert_eq!(expansion.rules.len(), 1);
/// assert_eq!(expansion.ipsets[0].entries, ["1.2.3.0/24", "3.4.5.6/32", "5.6.7.8/32"]);
/// assert!(matches!(expansion.rules[0].source, RuleSource::Ipset { .. }));
/// ```
pub fn expand(spec: &RuleSpec, config: &PolicyConfig) -> Result<Expansion> {
    if !spec.ports.is_empty() && !protocol_supports_ports(spec.protocol) {
        return Err(Error::invalid_rule(
            &spec.title,
            format!("protocol '{}' does not use ports, remove dports", spec.protocol),
        ));
    }

    let parts = partition(&spec.trusted_nets, spec.apply_to);
    let diagnostic = hostname_warning(spec, &parts.hostnames, config);

    let mut rules = Vec::with_capacity(2);
    let mut ipsets = Vec::new();

    for set in parts.sets() {
        let identifier = derive(set, &config.ipset_prefix);
        let source = match set.members() {
            [single] => RuleSource::Address(*single),
            _ => {
                ipsets.push(ipset_for(set, &identifier));
                RuleSource::Ipset {
                    ipset: identifier.to_string(),
                }
            }
        };

        tracing::debug!(
            "rule '{}': {} source {} ({} networks)",
            spec.title,
            set.family(),
            identifier,
            set.len()
        );

        rules.push(ConcreteRule {
            family: set.family(),
            source,
            identifier,
            matcher: rule_match(spec, set.family()),
            action: spec.action,
            order: spec.order,
        });
    }

    if rules.is_empty() {
        tracing::debug!(
            "rule '{}': no networks in scope '{}', nothing to emit",
            spec.title,
            spec.apply_to
        );
    }

    Ok(Expansion {
        rules,
        ipsets,
        diagnostic,
    })
}

fn ipset_for(set: &NetworkSet, identifier: &DerivedIdentifier) -> IpsetResource {
    IpsetResource {
        name: identifier.to_string(),
        family: set.family(),
        ipset_type: IPSET_TYPE,
        entries: set.members().iter().map(ToString::to_string).collect(),
    }
}

fn rule_match(spec: &RuleSpec, family: Family) -> RuleMatch {
    if requires_custom_service(spec.protocol, &spec.ports) {
        return RuleMatch::Service;
    }

    match protocol_match_value(spec.protocol, family) {
        Some(value) => RuleMatch::Protocol(value),
        None => RuleMatch::Source,
    }
}

fn hostname_warning(
    spec: &RuleSpec,
    hostnames: &[String],
    config: &PolicyConfig,
) -> Option<Notification> {
    if hostnames.is_empty() {
        return None;
    }

    let listed = hostnames.join(", ");
    tracing::warn!(
        "rule '{}': hostnames are not supported in trusted_nets and were ignored: {}",
        spec.title,
        listed
    );

    Some(Notification {
        name: format!(
            "{}_firewalld::rule[{}] - hostname warning",
            config.namespace, spec.title
        ),
        message: format!(
            "{}_firewalld::rule[{}]: hostnames are not supported in trusted_nets and were ignored: {listed}",
            config.namespace, spec.title
        ),
        loglevel: "warning",
    })
}
