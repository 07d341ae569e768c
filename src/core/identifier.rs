//! Deterministic identifiers for network sets
//!
//! An identifier names the ipset holding a network set and is embedded in the names
//! of the rich rules built from it. It is persisted on the firewall host and compared
//! run-over-run, so it must depend on nothing but the set's normalized membership:
//!
//! 1. Members are rendered in normalized form, sorted, and joined with `,`.
//! 2. The canonical bytes are hashed with SHA-256 and base64 encoded.
//! 3. Non-alphanumeric characters are dropped and the first 26 kept; if fewer than
//!    26 survive, the digest is hashed again and encoding continues.
//! 4. The namespace prefix (`simp-` by default) is prepended.
//!
//! With the default prefix the result is 31 characters, the longest ipset name
//! firewalld accepts.

use super::partition::NetworkSet;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Characters of digest material after the prefix
pub const IDENTIFIER_LEN: usize = 26;

/// Longest ipset name firewalld and the kernel accept
pub const IPSET_NAME_MAX: usize = 31;

const CANONICAL_DELIMITER: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedIdentifier(String);

impl DerivedIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DerivedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DerivedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical serialization of a set of normalized members.
///
/// Order-independent: members are sorted before joining.
pub fn canonical_form<S: AsRef<str>>(members: &[S]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(CANONICAL_DELIMITER)
}

/// Derives the identifier of a network set.
///
/// # Examples
///
/// ```
/// use simpfw::core::identifier::derive;
/// use simpfw::core::partition::NetworkSet;
/// use simpfw::core::rule::Family;
///
/// let a = NetworkSet::from_networks(
///     Family::Ipv4,
///     ["3.4.5.6/32".parse().unwrap(), "1.2.3.0/24".parse().unwrap()],
/// );
/// let b = NetworkSet::from_networks(
///     Family::Ipv4,
///     ["1.2.3.0/24".parse().unwrap(), "3.4.5.6/32".parse().unwrap()],
/// );
///
/// assert_eq!(derive(&a, "simp-"), derive(&b, "simp-"));
/// assert_eq!(derive(&a, "simp-").as_str().len(), 31);
/// ```
pub fn derive(set: &NetworkSet, prefix: &str) -> DerivedIdentifier {
    derive_from_members(&set.canonical_members(), prefix)
}

/// Derives an identifier straight from normalized member strings.
pub fn derive_from_members<S: AsRef<str>>(members: &[S], prefix: &str) -> DerivedIdentifier {
    let canonical = canonical_form(members);
    DerivedIdentifier(format!("{prefix}{}", digest_body(canonical.as_bytes())))
}

fn digest_body(canonical: &[u8]) -> String {
    let mut body = String::with_capacity(IDENTIFIER_LEN);
    let mut digest = Sha256::digest(canonical);

    loop {
        let encoded = STANDARD.encode(digest);
        let wanted = IDENTIFIER_LEN - body.len();
        body.extend(
            encoded
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(wanted),
        );
        if body.len() >= IDENTIFIER_LEN {
            return body;
        }
        digest = Sha256::digest(digest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form_sorts_and_dedups() {
        assert_eq!(
            canonical_form(&["5.6.7.8/32", "1.2.3.0/24", "5.6.7.8/32"]),
            "1.2.3.0/24,5.6.7.8/32"
        );
    }

    #[test]
    fn test_known_identifiers() {
        // Pinned so any change to canonicalization or encoding shows up as a diff in
        // persisted ipset names.
        assert_eq!(
            derive_from_members(&["1.2.3.0/24", "3.4.5.6/32", "5.6.7.8/32"], "simp-").as_str(),
            "simp-qW7hdUIGrXNET1Dc05m4CnFaoQ"
        );
        assert_eq!(
            derive_from_members(&["0.0.0.0/0"], "simp-").as_str(),
            "simp-tC4YNmq699Jd6F2U5HypLHzoWc"
        );
    }

    #[test]
    fn test_shape() {
        let id = derive_from_members(&["10.0.0.0/8"], "simp-");
        assert!(id.as_str().starts_with("simp-"));
        assert_eq!(id.as_str().len(), IPSET_NAME_MAX);
        assert!(id.as_str()[5..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_prefix_is_namespace_only() {
        let a = derive_from_members(&["10.0.0.0/8"], "simp-");
        let b = derive_from_members(&["10.0.0.0/8"], "site-");
        assert_eq!(a.as_str()[5..], b.as_str()[5..]);
    }

    #[test]
    fn test_empty_set_still_derives() {
        let id = derive_from_members::<&str>(&[], "simp-");
        assert_eq!(id.as_str().len(), IPSET_NAME_MAX);
    }
}
