//! Catalog renderers
//!
//! Two text forms besides JSON:
//!
//! - [`rich_rules_text`]: the rich rules of every zone, one per line, for review
//! - [`firewall_cmd_script`]: a POSIX shell script that applies the catalog to the
//!   permanent configuration with `firewall-cmd` and reloads

use super::catalog::Catalog;
use crate::validators::shell_quote;
use std::fmt::Write as _;

const FIREWALL_CMD: &str = "firewall-cmd --permanent";

/// Renders rich rules grouped by zone.
///
/// ```
/// use simpfw::config::PolicyConfig;
/// use simpfw::core::catalog::Catalog;
/// use simpfw::core::render::rich_rules_text;
/// use simpfw::core::rule::RuleDecl;
///
/// let catalog = Catalog::compile(
///     &[RuleDecl::new("allow_ah", "ah").with_trusted_nets(["10.0.0.0/8"]).with_order(15)],
///     &PolicyConfig::default(),
/// )
/// .unwrap();
///
/// assert_eq!(
///     rich_rules_text(&catalog),
///     "# zone 99_simp\nrule family=\"ipv4\" priority=\"15\" source address=\"10.0.0.0/8\" protocol value=\"ah\" accept\n"
/// );
/// ```
pub fn rich_rules_text(catalog: &Catalog) -> String {
    let mut out = String::new();
    for zone in catalog.zones() {
        let _ = writeln!(out, "# zone {zone}");
        for rule in catalog.rich_rules.iter().filter(|r| r.zone == zone) {
            out.push_str(&rule.to_rich_rule());
            out.push('\n');
        }
    }
    out
}

/// Renders a `firewall-cmd` script that applies the catalog.
///
/// Order matters to firewalld: ipsets and services must exist before a rich rule
/// or zone references them, stale ipsets can only be deleted once no rule uses
/// them, and the default zone can only be set after a reload has made a new zone
/// known to the running daemon.
pub fn firewall_cmd_script(catalog: &Catalog) -> String {
    let mut out = String::new();
    let zone = &catalog.zone;

    out.push_str("#!/bin/sh\n");
    let _ = writeln!(out, "# Generated by simpfw {}", env!("CARGO_PKG_VERSION"));
    out.push_str("set -e\n\n");

    let _ = writeln!(
        out,
        "# FirewallBackend={} must be set in /etc/firewalld/firewalld.conf",
        catalog.daemon.firewall_backend
    );
    out.push('\n');

    out.push_str("# Managed zone\n");
    let _ = writeln!(
        out,
        "{FIREWALL_CMD} --get-zones | tr ' ' '\\n' | grep -qx {z} || {FIREWALL_CMD} --new-zone={z}",
        z = shell_quote(&zone.name)
    );
    let _ = writeln!(
        out,
        "{FIREWALL_CMD} --zone={} --set-target={}",
        shell_quote(&zone.name),
        zone.target
    );
    for iface in &zone.interfaces {
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --zone={} --change-interface={}",
            shell_quote(&zone.name),
            shell_quote(iface)
        );
    }
    out.push('\n');

    write_purge(&mut out, catalog);

    if !catalog.ipsets.is_empty() {
        out.push_str("# Ipsets\n");
    }
    for ipset in &catalog.ipsets {
        let name = shell_quote(&ipset.name);
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --get-ipsets | tr ' ' '\\n' | grep -qx {name} && {FIREWALL_CMD} --delete-ipset={name}"
        );
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --new-ipset={name} --type={} --option=family={}",
            ipset.ipset_type,
            ipset.family.ipset_family()
        );
        for entry in &ipset.entries {
            let _ = writeln!(out, "{FIREWALL_CMD} --ipset={name} --add-entry={entry}");
        }
    }
    if !catalog.ipsets.is_empty() {
        out.push('\n');
    }

    if !catalog.services.is_empty() {
        out.push_str("# Services\n");
    }
    for service in &catalog.services {
        let name = shell_quote(&service.name);
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --get-services | tr ' ' '\\n' | grep -qx {name} && {FIREWALL_CMD} --delete-service={name}"
        );
        let _ = writeln!(out, "{FIREWALL_CMD} --new-service={name}");
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --service={name} --set-short={}",
            shell_quote(&service.short)
        );
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --service={name} --set-description={}",
            shell_quote(&service.description)
        );
        for port in &service.ports {
            let _ = writeln!(
                out,
                "{FIREWALL_CMD} --service={name} --add-port={}/{}",
                port.port,
                port.protocol.as_str()
            );
        }
    }
    if !catalog.services.is_empty() {
        out.push('\n');
    }

    if !catalog.zone_services.is_empty() {
        out.push_str("# Zone services\n");
    }
    for bound in &catalog.zone_services {
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --zone={} --add-service={}",
            shell_quote(&bound.zone),
            shell_quote(&bound.service)
        );
    }
    if !catalog.zone_services.is_empty() {
        out.push('\n');
    }

    if !catalog.rich_rules.is_empty() {
        out.push_str("# Rich rules\n");
    }
    for rule in &catalog.rich_rules {
        let _ = writeln!(out, "# {}", rule.name);
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --zone={} --add-rich-rule={}",
            shell_quote(&rule.zone),
            shell_quote(&rule.to_rich_rule())
        );
    }
    if !catalog.rich_rules.is_empty() {
        out.push('\n');
    }

    write_stale_cleanup(&mut out, catalog);

    out.push_str("# Daemon\n");
    out.push_str("firewall-cmd --reload\n");
    let _ = writeln!(
        out,
        "firewall-cmd --set-default-zone={}",
        shell_quote(&catalog.daemon.default_zone)
    );
    let _ = writeln!(out, "firewall-cmd --set-log-denied={}", catalog.daemon.log_denied);
    if catalog.daemon.lockdown {
        out.push_str("firewall-cmd --lockdown-on\n");
    } else {
        out.push_str("firewall-cmd --lockdown-off\n");
    }

    out
}

fn write_purge(out: &mut String, catalog: &Catalog) {
    let zone = &catalog.zone;
    let z = shell_quote(&zone.name);

    if zone.purge_rich_rules || zone.purge_services || zone.purge_ports {
        out.push_str("# Purge unmanaged entries from the managed zone\n");
    }
    if zone.purge_rich_rules {
        let _ = writeln!(
            out,
            "{FIREWALL_CMD} --zone={z} --list-rich-rules | while IFS= read -r rule; do {FIREWALL_CMD} --zone={z} --remove-rich-rule=\"$rule\"; done"
        );
    }
    if zone.purge_services {
        let _ = writeln!(
            out,
            "for svc in $({FIREWALL_CMD} --zone={z} --list-services); do {FIREWALL_CMD} --zone={z} --remove-service=\"$svc\"; done"
        );
    }
    if zone.purge_ports {
        let _ = writeln!(
            out,
            "for port in $({FIREWALL_CMD} --zone={z} --list-ports); do {FIREWALL_CMD} --zone={z} --remove-port=\"$port\"; done"
        );
    }
    if zone.purge_rich_rules || zone.purge_services || zone.purge_ports {
        out.push('\n');
    }

    write_owned_removal(out, catalog);
}

/// Removes owned rich rules and services from zones the purge did not clear.
///
/// Without this a rule left behind in another zone could keep referencing an ipset
/// or service that stale cleanup deletes, and the next reload would fail.
fn write_owned_removal(out: &mut String, catalog: &Catalog) {
    let cleanup = &catalog.cleanup;
    if !cleanup.enabled {
        return;
    }

    let managed = &catalog.zone;
    let ipset_ref = shell_quote(&format!("ipset=\"{}", cleanup.ipset_prefix));
    let service_ref = shell_quote(&format!("service name=\"{}", cleanup.service_prefix));
    let service_prefix = shell_quote(&cleanup.service_prefix);

    let zones: Vec<(&str, bool, bool)> = catalog
        .zones()
        .into_iter()
        .map(|name| {
            let is_managed = name == managed.name;
            (
                name,
                !(is_managed && managed.purge_rich_rules),
                !(is_managed && managed.purge_services),
            )
        })
        .filter(|(_, rules, services)| *rules || *services)
        .collect();
    if zones.is_empty() {
        return;
    }

    out.push_str("# Remove owned entries from shared zones\n");
    for (name, rules, services) in zones {
        let z = shell_quote(name);
        if rules {
            let _ = writeln!(
                out,
                "{FIREWALL_CMD} --zone={z} --list-rich-rules | while IFS= read -r rule; do case \"$rule\" in *{ipset_ref}*|*{service_ref}*) {FIREWALL_CMD} --zone={z} --remove-rich-rule=\"$rule\" ;; esac; done"
            );
        }
        if services {
            let _ = writeln!(
                out,
                "for svc in $({FIREWALL_CMD} --zone={z} --list-services); do case \"$svc\" in {service_prefix}*) {FIREWALL_CMD} --zone={z} --remove-service=\"$svc\" ;; esac; done"
            );
        }
    }
    out.push('\n');
}

/// Deletes owned ipsets and services that the catalog no longer defines.
fn write_stale_cleanup(out: &mut String, catalog: &Catalog) {
    let cleanup = &catalog.cleanup;
    if !cleanup.enabled {
        return;
    }

    let keep_ipsets: Vec<&str> = catalog.ipsets.iter().map(|i| i.name.as_str()).collect();
    let keep_services: Vec<&str> = catalog.services.iter().map(|s| s.name.as_str()).collect();

    out.push_str("# Remove stale owned ipsets and services\n");
    let _ = writeln!(
        out,
        "for set in $({FIREWALL_CMD} --get-ipsets); do case \"$set\" in {}*) case \" {} \" in *\" $set \"*) ;; *) {FIREWALL_CMD} --delete-ipset=\"$set\" ;; esac ;; esac; done",
        shell_quote(&cleanup.ipset_prefix),
        keep_ipsets.join(" ")
    );
    let _ = writeln!(
        out,
        "for svc in $({FIREWALL_CMD} --get-services); do case \"$svc\" in {}*) case \" {} \" in *\" $svc \"*) ;; *) {FIREWALL_CMD} --delete-service=\"$svc\" ;; esac ;; esac; done",
        shell_quote(&cleanup.service_prefix),
        keep_services.join(" ")
    );
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::core::rule::RuleDecl;

    fn catalog(decls: &[RuleDecl], config: &PolicyConfig) -> Catalog {
        Catalog::compile(decls, config).unwrap()
    }

    #[test]
    fn test_script_orders_dependencies() {
        let script = firewall_cmd_script(&catalog(
            &[RuleDecl::new("allow_tcp_listen", "tcp")
                .with_trusted_nets(["1.2.3.4/24", "3.4.5.6", "5.6.7.8/32"])
                .with_dports([1234u16])],
            &PolicyConfig::default(),
        ));

        let ipset = script
            .find("--new-ipset=simp-qW7hdUIGrXNET1Dc05m4CnFaoQ --type=hash:net --option=family=inet")
            .unwrap();
        let service = script.find("--new-service=simp_allow_tcp_listen").unwrap();
        let rich = script.find("--add-rich-rule=").unwrap();
        let stale = script.find("# Remove stale").unwrap();

        assert!(ipset < service && service < rich && rich < stale);
        assert!(script.contains("--ipset=simp-qW7hdUIGrXNET1Dc05m4CnFaoQ --add-entry=3.4.5.6/32"));
        assert!(script.contains("--service=simp_allow_tcp_listen --add-port=1234/tcp"));
        assert!(script.contains("--zone=99_simp --set-target=DROP"));
        assert!(script.ends_with("firewall-cmd --lockdown-on\n"));
    }

    #[test]
    fn test_default_zone_set_after_reload() {
        let script = firewall_cmd_script(&catalog(&[], &PolicyConfig::default()));

        let new_zone = script.find("--new-zone=99_simp").unwrap();
        let reload = script.find("firewall-cmd --reload").unwrap();
        let default_zone = script.find("firewall-cmd --set-default-zone=99_simp").unwrap();
        let log_denied = script.find("firewall-cmd --set-log-denied=unicast").unwrap();
        let lockdown = script.find("firewall-cmd --lockdown-on").unwrap();

        assert!(new_zone < reload);
        assert!(reload < default_zone && default_zone < log_denied && log_denied < lockdown);
    }

    #[test]
    fn test_shared_zone_owned_entries_removed_before_stale_cleanup() {
        let script = firewall_cmd_script(&catalog(
            &[RuleDecl::new("lan", "all")
                .with_trusted_nets(["10.0.0.0/8", "192.168.0.0/16"])
                .with_zone("public")],
            &PolicyConfig::default(),
        ));

        let remove_rules = script
            .find(
                "--zone=public --list-rich-rules | while IFS= read -r rule; do case \"$rule\" in *'ipset=\"simp-'*|*'service name=\"simp_'*) firewall-cmd --permanent --zone=public --remove-rich-rule=\"$rule\" ;; esac; done",
            )
            .unwrap();
        let remove_services = script
            .find("case \"$svc\" in simp_*) firewall-cmd --permanent --zone=public --remove-service=\"$svc\"")
            .unwrap();
        let add_rule = script
            .find("--zone=public --add-rich-rule=")
            .unwrap();
        let stale = script.find("--delete-ipset=\"$set\"").unwrap();

        assert!(remove_rules < add_rule && remove_services < add_rule && add_rule < stale);
        // the purged managed zone needs no selective pass
        assert!(!script.contains("--zone=99_simp --list-rich-rules | while IFS= read -r rule; do case"));
    }

    #[test]
    fn test_unpurged_managed_zone_gets_owned_removal() {
        let config = PolicyConfig {
            purge: false,
            ..PolicyConfig::default()
        };
        let script = firewall_cmd_script(&catalog(&[], &config));
        assert!(script.contains("--zone=99_simp --list-rich-rules | while IFS= read -r rule; do case"));
        assert!(script.contains("--zone=99_simp --remove-service=\"$svc\" ;; esac"));
    }

    #[test]
    fn test_open_service_added_to_zone() {
        let script = firewall_cmd_script(&catalog(
            &[RuleDecl::new("allow_all_ssh", "tcp")
                .with_trusted_nets(["all"])
                .with_dports([22u16])],
            &PolicyConfig::default(),
        ));

        let service = script.find("--new-service=simp_allow_all_ssh").unwrap();
        let purge = script.find("--remove-service=\"$svc\"").unwrap();
        let zone_service = script
            .find("--zone=99_simp --add-service=simp_allow_all_ssh")
            .unwrap();
        assert!(purge < zone_service && service < zone_service);
    }

    #[test]
    fn test_script_quotes_rich_rules() {
        let script = firewall_cmd_script(&catalog(
            &[RuleDecl::new("esp", "esp").with_trusted_nets(["fe80::/64"])],
            &PolicyConfig::default(),
        ));
        assert!(script.contains(
            "--zone=99_simp --add-rich-rule='rule family=\"ipv6\" priority=\"11\" source address=\"fe80::/64\" protocol value=\"esp\" accept'"
        ));
    }

    #[test]
    fn test_script_ipv6_ipset_family() {
        let script = firewall_cmd_script(&catalog(
            &[RuleDecl::new("v6", "all").with_trusted_nets(["fe80::/64", "2001:db8::/32"])],
            &PolicyConfig::default(),
        ));
        assert!(script.contains("--type=hash:net --option=family=inet6"));
    }

    #[test]
    fn test_script_respects_policy_switches() {
        let config = PolicyConfig {
            lockdown: false,
            purge: false,
            remove_stale: false,
            zone_interfaces: vec!["eth1".to_string()],
            ..PolicyConfig::default()
        };
        let script = firewall_cmd_script(&catalog(&[], &config));
        assert!(script.contains("--lockdown-off"));
        assert!(!script.contains("--remove-rich-rule"));
        assert!(!script.contains("--remove-service"));
        assert!(!script.contains("--delete-ipset=\"$set\""));
        assert!(script.contains("--zone=99_simp --change-interface=eth1"));
    }

    #[test]
    fn test_rich_rules_text_groups_by_zone() {
        let text = rich_rules_text(&catalog(
            &[
                RuleDecl::new("a", "all").with_trusted_nets(["10.0.0.1"]),
                RuleDecl::new("b", "all").with_trusted_nets(["10.0.0.2"]).with_zone("public"),
            ],
            &PolicyConfig::default(),
        ));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# zone 99_simp");
        assert!(lines[1].contains("10.0.0.1/32"));
        assert_eq!(lines[2], "# zone public");
        assert!(lines[3].contains("10.0.0.2/32"));
    }
}
