//! Integration tests for simpfw
//!
//! These tests drive the public API end to end: rules documents in, catalogs and
//! rendered output out, with configuration loaded from real files.
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

#![allow(clippy::uninlined_format_args)]

use simpfw::config::{PolicyConfig, load_config};
use simpfw::core::render::{firewall_cmd_script, rich_rules_text};
use simpfw::utils::write_output;
use simpfw::{Catalog, Error, parse_rules};

const DOCUMENT: &str = r#"{
  "rules": [
    {
      "title": "allow_tcp_listen",
      "protocol": "tcp",
      "trusted_nets": ["1.2.3.4/24", "3.4.5.6", "5.6.7.8/32"],
      "dports": 1234
    },
    {
      "title": "allow_udp_range",
      "protocol": "udp",
      "trusted_nets": ["10.0.2.0/24", "fe80::/64", "foo.bar.baz"],
      "dports": [1234, "234:567"],
      "apply_to": "any"
    },
    {
      "title": "allow_esp",
      "protocol": "esp",
      "trusted_nets": ["10.0.0.0/8", "192.168.0.0/16"],
      "order": 15
    }
  ]
}"#;

fn compile(json: &str, config: &PolicyConfig) -> simpfw::Result<Catalog> {
    Catalog::compile(&parse_rules(json)?, config)
}

#[test]
fn test_document_compiles_to_catalog() {
    let catalog = compile(DOCUMENT, &PolicyConfig::default()).unwrap();

    // tcp: 1 ipset rule; udp: inline v4 + inline v6; esp: 1 ipset rule
    assert_eq!(catalog.rich_rules.len(), 4);
    assert_eq!(catalog.ipsets.len(), 2);
    assert_eq!(catalog.services.len(), 2);
    assert_eq!(catalog.notifications.len(), 1);
    assert!(catalog.notifications[0].message.contains("foo.bar.baz"));

    assert_eq!(catalog.ipsets[0].name, "simp-qW7hdUIGrXNET1Dc05m4CnFaoQ");
    assert_eq!(catalog.ipsets[1].name, "simp-05bpJIl1kk8pEEssTrYJJHGmdO");
    assert_eq!(
        catalog.rich_rules[3].name,
        "simp_15_allow_esp_simp-05bpJIl1kk8pEEssTrYJJHGmdO"
    );
}

#[test]
fn test_catalog_json_shape() {
    let catalog = compile(DOCUMENT, &PolicyConfig::default()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&catalog.to_json().unwrap()).unwrap();

    assert_eq!(value["daemon"]["default_zone"], "99_simp");
    assert_eq!(value["daemon"]["lockdown"], true);
    assert_eq!(value["daemon"]["log_denied"], "unicast");
    assert_eq!(value["daemon"]["firewall_backend"], "nftables");
    assert_eq!(value["zone"]["target"], "DROP");

    assert_eq!(value["ipsets"][0]["type"], "hash:net");
    assert_eq!(value["ipsets"][0]["family"], "inet");

    let rule = &value["rich_rules"][0];
    assert_eq!(rule["source"]["ipset"], "simp-qW7hdUIGrXNET1Dc05m4CnFaoQ");
    assert_eq!(rule["service"], "simp_allow_tcp_listen");
    assert!(rule.get("protocol").is_none());
    assert_eq!(rule["ensure"], "present");

    let inline = &value["rich_rules"][1];
    assert_eq!(inline["source"], "10.0.2.0/24");
}

#[test]
fn test_bare_array_document() {
    let catalog = compile(
        r#"[{"title": "allow_all_ssh", "protocol": "tcp", "trusted_nets": ["all"], "dports": 22}]"#,
        &PolicyConfig::default(),
    )
    .unwrap();

    assert!(catalog.ipsets.is_empty());
    assert_eq!(catalog.services[0].name, "simp_allow_all_ssh");
    let text = rich_rules_text(&catalog);
    assert!(text.contains(r#"source address="0.0.0.0/0" service name="simp_allow_all_ssh" accept"#));
    assert!(text.contains(r#"source address="::/0" service name="simp_allow_all_ssh" accept"#));

    assert_eq!(catalog.zone_services[0].service, "simp_allow_all_ssh");
    let script = firewall_cmd_script(&catalog);
    assert!(script.contains("firewall-cmd --permanent --zone=99_simp --add-service=simp_allow_all_ssh"));
}

#[test]
fn test_invalid_document_fails_whole() {
    let err = compile(
        r#"[
            {"title": "ok", "protocol": "all", "trusted_nets": ["10.0.0.0/8"]},
            {"title": "ipsec", "protocol": "ah", "dports": [500]}
        ]"#,
        &PolicyConfig::default(),
    )
    .unwrap_err();

    assert_eq!(err.rule_title(), Some("ipsec"));
    let translation = err.translate();
    assert!(!translation.suggestions.is_empty());
}

#[test]
fn test_malformed_json_is_serialization_error() {
    let err = compile("{ not json", &PolicyConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[test]
fn test_checksum_tracks_membership_not_order() {
    let a = compile(
        r#"[{"title": "r", "protocol": "all", "trusted_nets": ["10.0.0.0/8", "192.168.0.0/16"]}]"#,
        &PolicyConfig::default(),
    )
    .unwrap();
    let b = compile(
        r#"[{"title": "r", "protocol": "all", "trusted_nets": ["192.168.0.0/16", "10.0.0.0/8"]}]"#,
        &PolicyConfig::default(),
    )
    .unwrap();

    assert_eq!(a.ipsets[0].name, b.ipsets[0].name);
    assert_eq!(a.rich_rules, b.rich_rules);
}

#[test]
fn test_script_written_atomically() {
    let catalog = compile(DOCUMENT, &PolicyConfig::default()).unwrap();
    let script = firewall_cmd_script(&catalog);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apply.sh");
    write_output(&path, &script).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("#!/bin/sh\n"));
    assert!(written.contains("--new-ipset=simp-05bpJIl1kk8pEEssTrYJJHGmdO --type=hash:net --option=family=inet"));
    assert!(written.contains("--service=simp_allow_udp_range --add-port=234-567/udp"));
    assert!(written.contains("firewall-cmd --set-default-zone=99_simp"));
}

#[tokio::test]
async fn test_config_file_changes_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(
        &path,
        r#"{"namespace": "site", "ipset_prefix": "site-", "default_zone": "10_site", "default_order": 20}"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).await.unwrap();
    let catalog = compile(DOCUMENT, &config).unwrap();

    assert_eq!(catalog.zone.name, "10_site");
    assert_eq!(catalog.ipsets[0].name, "site-qW7hdUIGrXNET1Dc05m4CnFaoQ");
    assert_eq!(
        catalog.rich_rules[0].name,
        "site_20_allow_tcp_listen_site-qW7hdUIGrXNET1Dc05m4CnFaoQ"
    );
    assert_eq!(catalog.services[0].name, "site_allow_tcp_listen");
    assert_eq!(catalog.cleanup.ipset_prefix, "site-");
    assert_eq!(catalog.cleanup.service_prefix, "site_");
}

#[tokio::test]
async fn test_invalid_config_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, r#"{"ipset_prefix": "far-too-long-"}"#).unwrap();

    assert!(matches!(load_config(Some(&path)).await, Err(Error::Config(_))));
}

#[test]
fn test_diff_between_documents() {
    let config = PolicyConfig::default();
    let old = compile(DOCUMENT, &config).unwrap();
    let new = compile(&DOCUMENT.replace("\"order\": 15", "\"order\": 16"), &config).unwrap();

    let diff = old.diff(&new).unwrap().unwrap();
    assert!(diff.contains("simp_16_allow_esp"));
    assert!(diff.contains("simp_15_allow_esp"));
    assert_ne!(old.checksum().unwrap(), new.checksum().unwrap());
}
