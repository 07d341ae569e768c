//! Catalog compilation
//!
//! A catalog is the full set of firewalld resources compiled from one rules
//! document: daemon settings, the managed zone, and the ipsets, services, and rich
//! rules of every rule. Compilation is all-or-nothing; one bad declaration fails
//! the whole document, since a partial rule set on a default-deny zone can lock
//! operators out.

use super::binder::{CustomService, RichRuleResource, RuleResources, ZoneService, bind};
use super::error::{Error, Result};
use super::expand::{IpsetResource, Notification, expand};
use super::policy::{Cleanup, DaemonSettings, ManagedZone};
use super::rule::{RuleDecl, RuleSpec};
use crate::config::PolicyConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Wrapped form of a rules document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesDocument {
    rules: Vec<RuleDecl>,
}

/// Parses a rules document: `{"rules": [...]}` or a bare array of rules.
///
/// # Errors
///
/// Returns `Err` if the JSON is malformed or a rule has unknown or mistyped fields.
///
/// # Examples
///
/// ```
/// use simpfw::core::catalog::parse_rules;
///
/// let wrapped = parse_rules(r#"{"rules": [{"title": "ssh", "protocol": "tcp", "dports": 22}]}"#).unwrap();
/// let bare = parse_rules(r#"[{"title": "ssh", "protocol": "tcp", "dports": 22}]"#).unwrap();
/// assert_eq!(wrapped, bare);
/// ```
pub fn parse_rules(json: &str) -> Result<Vec<RuleDecl>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let rules = if value.is_array() {
        serde_json::from_value::<Vec<RuleDecl>>(value)?
    } else {
        serde_json::from_value::<RulesDocument>(value)?.rules
    };
    Ok(rules)
}

/// Compiled firewalld resources for a whole rules document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub daemon: DaemonSettings,
    pub zone: ManagedZone,
    pub cleanup: Cleanup,
    /// De-duplicated by name, first-seen order
    pub ipsets: Vec<IpsetResource>,
    pub services: Vec<CustomService>,
    /// Services enabled zone-wide for rules open to every address
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zone_services: Vec<ZoneService>,
    pub rich_rules: Vec<RichRuleResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

impl Catalog {
    /// A catalog with policy resources and no rules
    pub fn empty(config: &PolicyConfig) -> Self {
        Self {
            daemon: DaemonSettings::from_config(config),
            zone: ManagedZone::from_config(config),
            cleanup: Cleanup::from_config(config),
            ipsets: Vec::new(),
            services: Vec::new(),
            zone_services: Vec::new(),
            rich_rules: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Compiles rule declarations into a catalog.
    ///
    /// # Errors
    ///
    /// Returns `Err` on the first declaration that fails validation, or if two
    /// declarations share a title or a generated service name.
    pub fn compile(decls: &[RuleDecl], config: &PolicyConfig) -> Result<Self> {
        config.validate()?;

        let mut catalog = Self::empty(config);
        let mut titles: HashSet<String> = HashSet::with_capacity(decls.len());
        let mut service_owner: Vec<(String, String)> = Vec::new();

        for decl in decls {
            let spec = RuleSpec::from_decl(decl, config)?;

            if !titles.insert(spec.title.clone()) {
                return Err(Error::invalid_rule(
                    &spec.title,
                    "duplicate rule title in document",
                ));
            }

            let resources = bind(expand(&spec, config)?, &spec, config);

            if let Some(service) = &resources.service {
                if let Some((_, owner)) = service_owner.iter().find(|(name, _)| *name == service.name) {
                    return Err(Error::invalid_rule(
                        &spec.title,
                        format!(
                            "duplicate service name '{}' (also generated by rule '{owner}')",
                            service.name
                        ),
                    ));
                }
                service_owner.push((service.name.clone(), spec.title.clone()));
            }

            catalog.add(resources);
        }

        tracing::info!(
            "Compiled {} rules into {} rich rules, {} ipsets, {} services",
            decls.len(),
            catalog.rich_rules.len(),
            catalog.ipsets.len(),
            catalog.services.len()
        );

        Ok(catalog)
    }

    fn add(&mut self, resources: RuleResources) {
        for ipset in resources.ipsets {
            // Identical member sets in different rules share one ipset
            if !self.ipsets.iter().any(|existing| existing.name == ipset.name) {
                self.ipsets.push(ipset);
            }
        }
        self.services.extend(resources.service);
        self.zone_services.extend(resources.zone_service);
        self.rich_rules.extend(resources.rich_rules);
        self.notifications.extend(resources.notification);
    }

    /// Zones referenced by rich rules or zone services, managed zone first
    pub fn zones(&self) -> Vec<&str> {
        let mut zones = vec![self.zone.name.as_str()];
        let referenced = self
            .rich_rules
            .iter()
            .map(|r| r.zone.as_str())
            .chain(self.zone_services.iter().map(|s| s.zone.as_str()));
        for zone in referenced {
            if !zones.contains(&zone) {
                zones.push(zone);
            }
        }
        zones
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 checksum of the catalog's JSON form
    ///
    /// Equal checksums mean an apply would change nothing.
    pub fn checksum(&self) -> Result<String> {
        let json_str = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(json_str.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Changed lines between two catalogs' JSON forms
    ///
    /// Only removed (`- `) and added (`+ `) lines are listed, without hunk headers or
    /// context. Returns `None` when the catalogs are identical.
    pub fn diff(&self, newer: &Catalog) -> Result<Option<String>> {
        let old_text = self.to_json()?;
        let new_text = newer.to_json()?;

        if old_text == new_text {
            return Ok(None);
        }

        let diff = similar::TextDiff::from_lines(&old_text, &new_text);
        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => "- ",
                similar::ChangeTag::Insert => "+ ",
                similar::ChangeTag::Equal => continue,
            };
            out.push_str(sign);
            out.push_str(change.value());
            if change.missing_newline() {
                out.push('\n');
            }
        }
        Ok(Some(out))
    }
}
