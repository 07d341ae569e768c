//! Zone and service binding
//!
//! Attaches an expansion to its zone: every concrete rule becomes a rich-rule
//! resource with a stable name, and tcp/udp rules with ports get the custom service
//! their rich rules reference. A service rule open to the full range of both
//! families is also listed among the zone's services.

use super::expand::{ConcreteRule, Expansion, IpsetResource, Notification, RuleMatch, RuleSource};
use super::rule::{Action, Family, PortRange, Protocol, RuleSpec};
use super::rule_constraints::requires_custom_service;
use crate::config::PolicyConfig;
use crate::validators::sanitize_service_name;
use serde::Serialize;
use std::fmt::Write as _;
use strum::IntoEnumIterator;

/// One port entry of a custom service (`1234/udp`, `234-567/udp`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePort {
    pub port: String,
    pub protocol: Protocol,
}

impl From<(PortRange, Protocol)> for ServicePort {
    fn from((range, protocol): (PortRange, Protocol)) -> Self {
        Self {
            port: range.to_string(),
            protocol,
        }
    }
}

/// A firewalld service generated for a single rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomService {
    pub name: String,
    pub short: String,
    pub description: String,
    pub ports: Vec<ServicePort>,
}

/// A rich rule placed in a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RichRuleResource {
    /// `<namespace>_<order>_<title>_<identifier>`
    pub name: String,
    pub zone: String,
    pub family: Family,
    pub source: RuleSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<&'static str>,
    pub action: Action,
    pub order: u16,
    pub ensure: &'static str,
}

impl RichRuleResource {
    /// Renders the rule in firewalld's rich language.
    ///
    /// ```
    /// use simpfw::config::PolicyConfig;
    /// use simpfw::core::binder::bind;
    /// use simpfw::core::expand::expand;
    /// use simpfw::core::rule::{RuleDecl, RuleSpec};
    ///
    /// let config = PolicyConfig::default();
    /// let spec = RuleSpec::from_decl(
    ///     &RuleDecl::new("allow_esp", "esp").with_trusted_nets(["10.0.0.0/8"]),
    ///     &config,
    /// )
    /// .unwrap();
    /// let bound = bind(expand(&spec, &config).unwrap(), &spec, &config);
    ///
    /// assert_eq!(
    ///     bound.rich_rules[0].to_rich_rule(),
    ///     r#"rule family="ipv4" priority="11" source address="10.0.0.0/8" protocol value="esp" accept"#
    /// );
    /// ```
    pub fn to_rich_rule(&self) -> String {
        let mut rule = format!(r#"rule family="{}" priority="{}""#, self.family, self.order);

        match &self.source {
            RuleSource::Address(net) => {
                let _ = write!(rule, r#" source address="{net}""#);
            }
            RuleSource::Ipset { ipset } => {
                let _ = write!(rule, r#" source ipset="{ipset}""#);
            }
        }

        if let Some(service) = &self.service {
            let _ = write!(rule, r#" service name="{service}""#);
        } else if let Some(protocol) = self.protocol {
            let _ = write!(rule, r#" protocol value="{protocol}""#);
        }

        rule.push(' ');
        rule.push_str(self.action.as_str());
        rule
    }
}

/// A custom service enabled zone-wide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneService {
    pub zone: String,
    pub service: String,
}

/// Everything one rule contributes to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResources {
    pub title: String,
    pub rich_rules: Vec<RichRuleResource>,
    pub ipsets: Vec<IpsetResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<CustomService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_service: Option<ZoneService>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

/// Name of the custom service generated for `title`
pub fn service_name(config: &PolicyConfig, title: &str) -> String {
    format!("{}{}", config.service_prefix(), sanitize_service_name(title))
}

/// Binds an expansion to the rule's zone and custom service.
///
/// The custom service is emitted even when no family survived scoping, so the
/// service definition does not flap as `apply_to` changes.
///
/// A zone-wide service entry applies to both families, so it is only added when
/// every family's rule is a full-range wildcard.
pub fn bind(expansion: Expansion, spec: &RuleSpec, config: &PolicyConfig) -> RuleResources {
    let service = requires_custom_service(spec.protocol, &spec.ports).then(|| CustomService {
        name: service_name(config, &spec.title),
        short: spec.title.clone(),
        description: format!("Ports opened by rule '{}'", spec.title),
        ports: spec
            .ports
            .iter()
            .map(|range| ServicePort::from((*range, spec.protocol)))
            .collect(),
    });

    let zone_service = service
        .as_ref()
        .filter(|_| open_to_all_families(&expansion.rules))
        .map(|s| ZoneService {
            zone: spec.zone.clone(),
            service: s.name.clone(),
        });

    let rich_rules = expansion
        .rules
        .into_iter()
        .map(|rule| rich_rule_for(rule, spec, config, service.as_ref()))
        .collect();

    RuleResources {
        title: spec.title.clone(),
        rich_rules,
        ipsets: expansion.ipsets,
        service,
        zone_service,
        notification: expansion.diagnostic,
    }
}

fn open_to_all_families(rules: &[ConcreteRule]) -> bool {
    Family::iter().all(|family| {
        rules
            .iter()
            .any(|r| r.family == family && r.source.is_full_range())
    })
}

fn rich_rule_for(
    rule: ConcreteRule,
    spec: &RuleSpec,
    config: &PolicyConfig,
    service: Option<&CustomService>,
) -> RichRuleResource {
    let (service, protocol) = match rule.matcher {
        RuleMatch::Service => (service.map(|s| s.name.clone()), None),
        RuleMatch::Protocol(value) => (None, Some(value)),
        RuleMatch::Source => (None, None),
    };

    RichRuleResource {
        name: format!(
            "{}_{}_{}_{}",
            config.namespace, rule.order, spec.title, rule.identifier
        ),
        zone: spec.zone.clone(),
        family: rule.family,
        source: rule.source,
        service,
        protocol,
        action: rule.action,
        order: rule.order,
        ensure: "present",
    }
}
