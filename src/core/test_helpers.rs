//! Shared test utilities for core module tests
//!
//! Provides common fixtures and helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::config::PolicyConfig;
use crate::core::binder::{RuleResources, bind};
use crate::core::error::Result;
use crate::core::expand::expand;
use crate::core::rule::{RuleDecl, RuleSpec};

/// A mix of host and network entries, with a /32 that overlaps a /24
pub fn ipv4_nets() -> Vec<&'static str> {
    vec![
        "10.0.2.0/24",
        "10.0.2.33/32",
        "1.2.3.4/32",
        "2.3.4.0/24",
        "3.0.0.0/8",
    ]
}

/// Includes a non-canonical spelling and a prefix with host bits set
pub fn ipv6_nets() -> Vec<&'static str> {
    vec![
        "fe80::/64",
        "2001:cdba:0000:0000:0000:0000:3257:9652/128",
        "2001:cdba:0000:0000:0000:0000:3257:9652/16",
    ]
}

pub fn hostnames() -> Vec<&'static str> {
    vec!["foo.bar.baz", "i.like.cheese"]
}

/// Concatenates fixture lists into one `trusted_nets` value
pub fn nets(parts: &[Vec<&'static str>]) -> Vec<&'static str> {
    parts.iter().flatten().copied().collect()
}

/// Runs one declaration through validation, expansion, and binding with the
/// default policy.
pub fn compile_rule(decl: &RuleDecl) -> Result<RuleResources> {
    let config = PolicyConfig::default();
    let spec = RuleSpec::from_decl(decl, &config)?;
    Ok(bind(expand(&spec, &config)?, &spec, &config))
}
